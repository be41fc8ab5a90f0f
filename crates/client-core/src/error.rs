//! Error types for the client-core library

use std::path::PathBuf;

use thiserror::Error;

/// Result type for client operations
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors surfaced by the client control plane
#[derive(Debug, Error)]
pub enum ClientError {
    /// A SIP address could not be built from the given input
    #[error("Invalid SIP address '{input}': {reason}")]
    InvalidAddress { input: String, reason: String },

    /// A dial was attempted while another call is live
    #[error("A call is already in progress, rejected dial to {destination}")]
    CallInProgress { destination: String },

    /// An operation needed a live call and there was none
    #[error("No active call")]
    NoActiveCall,

    /// The engine task is no longer running
    #[error("Engine task has stopped")]
    EngineStopped,

    /// A native engine primitive failed
    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    /// Configuration error
    #[error("Configuration error: {message}")]
    Configuration { message: String },
}

impl ClientError {
    /// Create an invalid address error
    pub fn invalid_address(input: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidAddress {
            input: input.into(),
            reason: reason.into(),
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }
}

/// Errors reported by a [`SipEngine`](crate::engine::SipEngine) primitive
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EngineError {
    #[error("engine has not been started")]
    NotStarted,

    #[error("engine was already started")]
    AlreadyStarted,

    #[error("invite failed: {reason}")]
    InviteFailed { reason: String },

    #[error("{operation} rejected: {reason}")]
    Rejected { operation: String, reason: String },

    #[error("cannot collect logs in {}: {reason}", path.display())]
    LogCollection { path: PathBuf, reason: String },
}

impl EngineError {
    /// Create an invite failure
    pub fn invite_failed(reason: impl Into<String>) -> Self {
        Self::InviteFailed {
            reason: reason.into(),
        }
    }

    /// Create a rejected-operation error
    pub fn rejected(operation: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Rejected {
            operation: operation.into(),
            reason: reason.into(),
        }
    }
}
