//! Call lifecycle for the single outgoing call
//!
//! # State machine
//!
//! ```text
//! (no call) --place_call--> OutgoingInit --> OutgoingProgress --> OutgoingRinging
//!     ^                                                                |
//!     |                                                            Connected
//!     |                                                                |
//!     +------ record history <-- Ended | Error <-----------------------+
//! ```
//!
//! "No call" is `None`, never a [`CallState`] variant. `Ended` and `Error` are only
//! ever observed transiently: the controller records a history entry and returns to
//! `None` in the same step.
//!
//! Only one call may be live. A dial while a call is live is rejected with
//! [`ClientError::CallInProgress`] and leaves the live call untouched.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::address::{normalize_destination, SipAddress};
use crate::config::{ClientConfig, MediaEncryption};
use crate::engine::{CallParams, EngineCallId, EngineCallState, SipEngine};
use crate::error::{ClientError, ClientResult};
use crate::history::{CallHistory, CallHistoryEntry};

/// Unique identifier of a call session
pub type CallId = Uuid;

/// Typed call state of the live call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CallState {
    OutgoingInit,
    OutgoingProgress,
    OutgoingRinging,
    /// Media is flowing (engine `Connected` or `StreamsRunning`)
    Connected,
    /// Engine `End` or `Released`
    Ended,
    Error,
}

impl CallState {
    /// Map a native engine state; `None` for states this client does not model
    pub fn from_engine(state: EngineCallState) -> Option<Self> {
        match state {
            EngineCallState::OutgoingInit => Some(CallState::OutgoingInit),
            EngineCallState::OutgoingProgress => Some(CallState::OutgoingProgress),
            EngineCallState::OutgoingRinging | EngineCallState::OutgoingEarlyMedia => {
                Some(CallState::OutgoingRinging)
            }
            EngineCallState::Connected | EngineCallState::StreamsRunning => Some(CallState::Connected),
            EngineCallState::End | EngineCallState::Released => Some(CallState::Ended),
            EngineCallState::Error => Some(CallState::Error),
            EngineCallState::Idle
            | EngineCallState::IncomingReceived
            | EngineCallState::Pausing
            | EngineCallState::Paused
            | EngineCallState::Resuming
            | EngineCallState::Updating => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, CallState::Ended | CallState::Error)
    }
}

impl fmt::Display for CallState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallState::OutgoingInit => write!(f, "OutgoingInit"),
            CallState::OutgoingProgress => write!(f, "OutgoingProgress"),
            CallState::OutgoingRinging => write!(f, "OutgoingRinging"),
            CallState::Connected => write!(f, "Connected"),
            CallState::Ended => write!(f, "Ended"),
            CallState::Error => write!(f, "Error"),
        }
    }
}

/// The live call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallSession {
    pub id: CallId,
    /// Handle the engine assigned to this call
    pub engine_call: EngineCallId,
    /// Normalized number that was dialed
    pub destination: String,
    pub state: CallState,
    pub duration_secs: u32,
    pub started_at: DateTime<Utc>,
}

/// What an engine call event did to the controller
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallUpdate {
    /// No live call, an unmodelled state, or a repeat of the current state
    Unchanged,
    /// The live call moved to a new non-terminal state
    Changed { previous: CallState, current: CallState },
    /// The live call finished; its history entry was recorded
    Finished {
        previous: CallState,
        terminal: CallState,
        entry: CallHistoryEntry,
    },
}

/// Owns the optional live call and turns engine events into typed transitions
#[derive(Debug)]
pub struct CallController {
    session: Option<CallSession>,
    dial_prefix: String,
    default_route_domain: String,
    media_encryption: MediaEncryption,
}

impl CallController {
    pub fn new(config: &ClientConfig) -> Self {
        Self {
            session: None,
            dial_prefix: config.dial_prefix.clone(),
            default_route_domain: config.default_route_domain.clone(),
            media_encryption: config.media.media_encryption,
        }
    }

    pub fn session(&self) -> Option<&CallSession> {
        self.session.as_ref()
    }

    pub fn state(&self) -> Option<CallState> {
        self.session.as_ref().map(|s| s.state)
    }

    /// Duration to publish: zero with no call, otherwise never below the last value
    pub fn duration_secs(&self) -> u32 {
        self.session.as_ref().map(|s| s.duration_secs).unwrap_or(0)
    }

    /// Dial `destination` through `engine`
    ///
    /// `registered_domain` is the host of the current account's registrar; without
    /// one the configured default route is used. On success the call is live in
    /// `OutgoingInit`. On any error nothing changes.
    pub fn place_call<E: SipEngine + ?Sized>(
        &mut self,
        engine: &mut E,
        destination: &str,
        registered_domain: Option<&str>,
    ) -> ClientResult<&CallSession> {
        if let Some(live) = &self.session {
            warn!(
                call_id = %live.id,
                live_destination = %live.destination,
                destination,
                "Dial rejected, a call is already in progress"
            );
            return Err(ClientError::CallInProgress {
                destination: destination.to_string(),
            });
        }

        if destination.trim().is_empty() {
            return Err(ClientError::invalid_address(destination, "empty destination"));
        }

        let number = normalize_destination(destination, &self.dial_prefix);
        let domain = registered_domain.unwrap_or(self.default_route_domain.as_str());
        let target = SipAddress::call_target(&number, domain)?;

        let params = CallParams {
            media_encryption: self.media_encryption,
        };
        let engine_call = engine.invite(&target, params)?;

        let session = CallSession {
            id: Uuid::new_v4(),
            engine_call,
            destination: number,
            state: CallState::OutgoingInit,
            duration_secs: 0,
            started_at: Utc::now(),
        };
        info!(call_id = %session.id, target = %target, "Outgoing call started");
        Ok(self.session.insert(session))
    }

    /// Ask the engine to hang up; the resulting `Ended` arrives as an engine event
    pub fn end_call<E: SipEngine + ?Sized>(&mut self, engine: &mut E) -> ClientResult<()> {
        let Some(session) = &self.session else {
            return Err(ClientError::NoActiveCall);
        };
        info!(call_id = %session.id, "Hanging up");
        if !engine.terminate_current_call() {
            debug!(call_id = %session.id, "Engine reported no current call to terminate");
        }
        Ok(())
    }

    /// Apply a call event from the engine
    ///
    /// The first terminal event of a live call records `entry` into `history` and
    /// clears the call. Later events for the same call (`Released` after `End`) find
    /// no live call and change nothing, as do events for any other engine call.
    pub fn on_engine_event(
        &mut self,
        call: EngineCallId,
        state: EngineCallState,
        duration_secs: u32,
        history: &mut CallHistory,
    ) -> CallUpdate {
        let Some(mapped) = CallState::from_engine(state) else {
            debug!(%call, %state, "Ignoring unmodelled engine call state");
            return CallUpdate::Unchanged;
        };
        let Some(session) = self.session.as_mut().filter(|s| s.engine_call == call) else {
            debug!(%call, %state, "Call event does not belong to the live call");
            return CallUpdate::Unchanged;
        };

        let previous = session.state;
        if mapped.is_terminal() {
            let entry = CallHistoryEntry {
                number: session.destination.clone(),
                timestamp: Utc::now(),
                duration_secs,
                status: mapped.to_string(),
            };
            info!(
                call_id = %session.id,
                status = %mapped,
                duration_secs,
                "Call finished"
            );
            history.record(entry.clone());
            self.session = None;
            return CallUpdate::Finished {
                previous,
                terminal: mapped,
                entry,
            };
        }

        if previous == mapped {
            return CallUpdate::Unchanged;
        }
        debug!(call_id = %session.id, from = %previous, to = %mapped, "Call state changed");
        session.state = mapped;
        CallUpdate::Changed {
            previous,
            current: mapped,
        }
    }

    /// Fold the engine's current duration into the live call
    pub fn refresh_duration(&mut self, engine_duration: Option<u32>) -> u32 {
        match self.session.as_mut() {
            Some(session) => {
                session.duration_secs = session.duration_secs.max(engine_duration.unwrap_or(0));
                session.duration_secs
            }
            None => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::SimulatedEngine;
    use tokio::sync::mpsc;
    use tracing_test::traced_test;

    fn started_engine() -> SimulatedEngine {
        let (tx, _) = mpsc::unbounded_channel();
        let mut engine = SimulatedEngine::new();
        engine.start(tx).unwrap();
        engine
    }

    #[test]
    fn test_engine_state_mapping() {
        assert_eq!(
            CallState::from_engine(EngineCallState::StreamsRunning),
            Some(CallState::Connected)
        );
        assert_eq!(CallState::from_engine(EngineCallState::Released), Some(CallState::Ended));
        assert_eq!(CallState::from_engine(EngineCallState::IncomingReceived), None);
        assert_eq!(CallState::Error.to_string(), "Error");
    }

    #[test]
    fn test_place_call_normalizes_and_uses_fallback_domain() {
        let mut engine = started_engine();
        let mut calls = CallController::new(&ClientConfig::default());

        let session = calls.place_call(&mut engine, "5551234", None).unwrap();
        assert_eq!(session.destination, "005551234");
        assert_eq!(session.state, CallState::OutgoingInit);
        assert_eq!(calls.state(), Some(CallState::OutgoingInit));
    }

    #[test]
    fn test_malformed_domain_leaves_no_trace() {
        let mut engine = started_engine();
        let config = ClientConfig::default().with_default_route_domain("not a host");
        let mut calls = CallController::new(&config);

        let err = calls.place_call(&mut engine, "5551234", None).unwrap_err();
        assert!(matches!(err, ClientError::InvalidAddress { .. }));
        assert_eq!(calls.state(), None);
        assert_eq!(engine.current_call_duration(), None);
    }

    #[test]
    fn test_empty_destination_is_refused() {
        let mut engine = started_engine();
        let mut calls = CallController::new(&ClientConfig::default());
        assert!(matches!(
            calls.place_call(&mut engine, "", None),
            Err(ClientError::InvalidAddress { .. })
        ));
        assert_eq!(engine.current_call_duration(), None);
    }

    #[test]
    fn test_separators_are_not_stripped() {
        let mut engine = started_engine();
        let mut calls = CallController::new(&ClientConfig::default());

        let err = calls.place_call(&mut engine, "555 1234", None).unwrap_err();
        assert!(matches!(err, ClientError::InvalidAddress { .. }));
        assert_eq!(calls.state(), None);
    }

    #[test]
    fn test_invite_refused_by_engine() {
        let mut engine = SimulatedEngine::new();
        let mut calls = CallController::new(&ClientConfig::default());

        let err = calls.place_call(&mut engine, "5551234", Some("pbx.example.com")).unwrap_err();
        assert!(matches!(err, ClientError::Engine(_)));
        assert!(calls.session().is_none());
    }

    #[test]
    #[traced_test]
    fn test_second_dial_is_rejected() {
        let mut engine = started_engine();
        let mut calls = CallController::new(&ClientConfig::default());
        let first = calls.place_call(&mut engine, "111", None).unwrap().id;

        let err = calls.place_call(&mut engine, "222", None).unwrap_err();
        assert!(matches!(err, ClientError::CallInProgress { ref destination } if destination == "222"));
        assert_eq!(calls.session().map(|s| s.id), Some(first));
        assert_eq!(calls.session().map(|s| s.destination.as_str()), Some("00111"));
        assert!(logs_contain("Dial rejected"));
    }

    #[test]
    fn test_terminal_event_records_once() {
        let mut engine = started_engine();
        let mut calls = CallController::new(&ClientConfig::default());
        let mut history = CallHistory::default();
        let call = calls.place_call(&mut engine, "5551234", None).unwrap().engine_call;

        assert_eq!(
            calls.on_engine_event(call, EngineCallState::OutgoingRinging, 0, &mut history),
            CallUpdate::Changed {
                previous: CallState::OutgoingInit,
                current: CallState::OutgoingRinging
            }
        );
        calls.on_engine_event(call, EngineCallState::Connected, 0, &mut history);
        assert_eq!(
            calls.on_engine_event(call, EngineCallState::StreamsRunning, 1, &mut history),
            CallUpdate::Unchanged
        );

        let update = calls.on_engine_event(call, EngineCallState::End, 42, &mut history);
        let CallUpdate::Finished { previous, terminal, entry } = update else {
            panic!("expected Finished, got {:?}", update);
        };
        assert_eq!(previous, CallState::Connected);
        assert_eq!(terminal, CallState::Ended);
        assert_eq!(entry.number, "005551234");
        assert_eq!(entry.duration_secs, 42);
        assert_eq!(entry.status, "Ended");

        assert_eq!(
            calls.on_engine_event(call, EngineCallState::Released, 42, &mut history),
            CallUpdate::Unchanged
        );
        assert_eq!(history.len(), 1);
        assert_eq!(calls.state(), None);
        assert_eq!(calls.duration_secs(), 0);
    }

    #[test]
    fn test_error_is_recorded_with_error_status() {
        let mut engine = started_engine();
        let mut calls = CallController::new(&ClientConfig::default());
        let mut history = CallHistory::default();
        let call = calls.place_call(&mut engine, "0044123", None).unwrap().engine_call;

        calls.on_engine_event(call, EngineCallState::Error, 0, &mut history);
        let latest = history.latest().unwrap();
        assert_eq!(latest.status, "Error");
        assert_eq!(latest.number, "0044123");
    }

    #[test]
    fn test_events_without_live_call_are_ignored() {
        let mut calls = CallController::new(&ClientConfig::default());
        let mut history = CallHistory::default();
        assert_eq!(
            calls.on_engine_event(EngineCallId(7), EngineCallState::Released, 10, &mut history),
            CallUpdate::Unchanged
        );
        assert!(history.is_empty());
    }

    #[test]
    fn test_stale_events_from_previous_call_are_ignored() {
        let mut engine = started_engine();
        let mut calls = CallController::new(&ClientConfig::default());
        let mut history = CallHistory::default();

        let first = calls.place_call(&mut engine, "111", None).unwrap().engine_call;
        calls.on_engine_event(first, EngineCallState::End, 3, &mut history);
        assert!(engine.terminate_current_call());
        engine.iterate();
        for _ in 0..25 {
            engine.iterate();
        }

        let second = calls.place_call(&mut engine, "222", None).unwrap().engine_call;
        assert_ne!(first, second);
        assert_eq!(
            calls.on_engine_event(first, EngineCallState::Released, 3, &mut history),
            CallUpdate::Unchanged
        );
        assert_eq!(calls.state(), Some(CallState::OutgoingInit));
        assert_eq!(history.len(), 1);
    }

    #[test]
    fn test_end_call_without_call() {
        let mut engine = started_engine();
        let mut calls = CallController::new(&ClientConfig::default());
        assert!(matches!(calls.end_call(&mut engine), Err(ClientError::NoActiveCall)));
    }

    #[test]
    fn test_duration_never_decreases_while_live() {
        let mut engine = started_engine();
        let mut calls = CallController::new(&ClientConfig::default());
        assert_eq!(calls.refresh_duration(Some(5)), 0);

        calls.place_call(&mut engine, "1", None).unwrap();
        assert_eq!(calls.refresh_duration(Some(3)), 3);
        assert_eq!(calls.refresh_duration(Some(2)), 3);
        assert_eq!(calls.refresh_duration(None), 3);
        assert_eq!(calls.refresh_duration(Some(4)), 4);
    }
}
