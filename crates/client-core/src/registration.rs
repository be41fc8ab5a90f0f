//! Registration management for the SIP user agent
//!
//! One account at a time: registering replaces whatever account and credential the
//! engine held before. The outcome is never returned synchronously; it arrives as
//! [`RegistrationState`] changes raised by the engine.
//!
//! # Registration flow
//!
//! 1. **Validate** - build the identity and registrar addresses
//! 2. **Clear** - drop the previous account and credential from the engine
//! 3. **Submit** - add the digest credential and the new account
//! 4. **Default** - make the account the engine's default; registration starts
//! 5. **Observe** - `Progress` then `Ok` or `Failed` arrive through the engine
//!
//! There is no retry. A `Failed` registration stays failed until `register` is called
//! again.
//!
//! # Examples
//!
//! ```rust
//! use sipua_client_core::registration::{Credentials, RegistrationState};
//!
//! let creds = Credentials::from_json(
//!     r#"{"username":"alice","password":"s3cret","server":"sip.example.com","port":5060,"transport":"udp"}"#,
//! ).unwrap();
//! assert_eq!(creds.port, 5060);
//!
//! assert_eq!(RegistrationState::Ok.to_string(), "Ok");
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::address::{SipAddress, Transport};
use crate::engine::{AccountParams, AuthInfo, SipEngine};
use crate::error::{ClientError, ClientResult};

/// Registration state of the single account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum RegistrationState {
    /// Nothing registered yet
    #[default]
    None,
    /// REGISTER sent, waiting for the registrar
    Progress,
    /// The registrar accepted the binding
    Ok,
    /// The binding was removed
    Cleared,
    /// Transport or authentication failure
    Failed,
}

impl fmt::Display for RegistrationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistrationState::None => write!(f, "None"),
            RegistrationState::Progress => write!(f, "Progress"),
            RegistrationState::Ok => write!(f, "Ok"),
            RegistrationState::Cleared => write!(f, "Cleared"),
            RegistrationState::Failed => write!(f, "Failed"),
        }
    }
}

/// Account credentials as delivered by the credential source
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
    pub server: String,
    pub port: u16,
    #[serde(default = "default_transport")]
    pub transport: String,
}

fn default_transport() -> String {
    "udp".to_string()
}

impl Credentials {
    /// Parse the credential source's JSON record
    pub fn from_json(json: &str) -> ClientResult<Self> {
        serde_json::from_str(json)
            .map_err(|e| ClientError::config(format!("invalid credentials record: {}", e)))
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("server", &self.server)
            .field("port", &self.port)
            .field("transport", &self.transport)
            .finish()
    }
}

/// Parameters of a `register` command
#[derive(Clone, PartialEq, Eq)]
pub struct RegisterRequest {
    pub username: String,
    pub domain_host: String,
    pub domain_port: u16,
    pub password: String,
}

impl fmt::Debug for RegisterRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisterRequest")
            .field("username", &self.username)
            .field("domain_host", &self.domain_host)
            .field("domain_port", &self.domain_port)
            .finish_non_exhaustive()
    }
}

impl From<&Credentials> for RegisterRequest {
    fn from(creds: &Credentials) -> Self {
        match creds.transport.parse::<Transport>() {
            Ok(Transport::Udp) => {}
            Ok(other) => warn!(transport = %other, "Only UDP signaling is used, ignoring transport"),
            Err(_) => warn!(transport = %creds.transport, "Unknown transport in credentials, using UDP"),
        }
        Self {
            username: creds.username.clone(),
            domain_host: creds.server.clone(),
            domain_port: creds.port,
            password: creds.password.clone(),
        }
    }
}

/// Owns the single configured account and tracks its registration state
#[derive(Debug, Default)]
pub struct RegistrationController {
    state: RegistrationState,
    server: Option<SipAddress>,
}

impl RegistrationController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current registration state as last reported by the engine
    pub fn state(&self) -> RegistrationState {
        self.state
    }

    /// Registrar address of the current account, if one was submitted
    pub fn server(&self) -> Option<&SipAddress> {
        self.server.as_ref()
    }

    /// Replace the engine's account with one for `request` and start registering
    ///
    /// Addresses are built before anything is cleared, so an invalid request leaves
    /// the previous account in place.
    pub fn register<E: SipEngine + ?Sized>(
        &mut self,
        engine: &mut E,
        request: &RegisterRequest,
    ) -> ClientResult<()> {
        let identity = SipAddress::identity(&request.username, &request.domain_host)?;
        let server = SipAddress::server(&request.domain_host, request.domain_port, Transport::Udp)?;

        engine.clear_accounts();
        engine.clear_auth_info();
        self.server = None;

        let auth = AuthInfo {
            username: request.username.clone(),
            password: request.password.clone(),
            realm: None,
            domain: request.domain_host.clone(),
        };
        let params = AccountParams {
            identity: identity.clone(),
            server: server.clone(),
            register_enabled: true,
        };

        engine.add_auth_info(auth);
        let account = engine.add_account(params)?;
        engine.set_default_account(account)?;
        self.server = Some(server.clone());

        info!(identity = %identity, server = %server, "Registration submitted");
        Ok(())
    }

    /// Mirror an engine registration event; returns `true` if the state changed
    pub fn on_engine_event(&mut self, state: RegistrationState, message: &str) -> bool {
        if self.state == state {
            return false;
        }
        match state {
            RegistrationState::Failed => warn!(reason = message, "Registration failed"),
            _ => info!(from = %self.state, to = %state, reason = message, "Registration state changed"),
        }
        self.state = state;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::SimulatedEngine;

    fn request(host: &str) -> RegisterRequest {
        RegisterRequest {
            username: "alice".to_string(),
            domain_host: host.to_string(),
            domain_port: 5060,
            password: "s3cret".to_string(),
        }
    }

    #[test]
    fn test_register_builds_account_and_credential() {
        let mut engine = SimulatedEngine::new();
        let mut controller = RegistrationController::new();

        controller.register(&mut engine, &request("sip.example.com")).unwrap();

        let accounts: Vec<_> = engine.accounts().collect();
        assert_eq!(accounts.len(), 1);
        assert_eq!(accounts[0].identity.to_string(), "sip:alice@sip.example.com");
        assert_eq!(
            accounts[0].server.to_string(),
            "sip:sip.example.com:5060;transport=udp"
        );
        assert!(accounts[0].register_enabled);

        let auth = engine.auth_info();
        assert_eq!(auth.len(), 1);
        assert_eq!(auth[0].realm, None);
        assert_eq!(auth[0].domain, "sip.example.com");
        assert_eq!(controller.server().map(|s| s.host()), Some("sip.example.com"));
    }

    #[test]
    fn test_register_replaces_previous_account() {
        let mut engine = SimulatedEngine::new();
        let mut controller = RegistrationController::new();

        controller.register(&mut engine, &request("one.example.com")).unwrap();
        controller.register(&mut engine, &request("two.example.com")).unwrap();

        let hosts: Vec<_> = engine.accounts().map(|a| a.server.host().to_string()).collect();
        assert_eq!(hosts, vec!["two.example.com".to_string()]);
        assert_eq!(engine.auth_info().len(), 1);
    }

    #[test]
    fn test_invalid_host_keeps_previous_account() {
        let mut engine = SimulatedEngine::new();
        let mut controller = RegistrationController::new();
        controller.register(&mut engine, &request("good.example.com")).unwrap();

        let err = controller.register(&mut engine, &request("bad host")).unwrap_err();
        assert!(matches!(err, ClientError::InvalidAddress { .. }));
        assert_eq!(engine.accounts().count(), 1);
        assert_eq!(controller.server().map(|s| s.host()), Some("good.example.com"));
        assert_eq!(controller.state(), RegistrationState::None);
    }

    #[test]
    fn test_state_mirroring_reports_changes_only() {
        let mut controller = RegistrationController::new();
        assert!(controller.on_engine_event(RegistrationState::Progress, ""));
        assert!(!controller.on_engine_event(RegistrationState::Progress, ""));
        assert!(controller.on_engine_event(RegistrationState::Failed, "401"));
        assert_eq!(controller.state(), RegistrationState::Failed);
    }

    #[test]
    fn test_credentials_json_and_redaction() {
        let creds = Credentials::from_json(
            r#"{"username":"bob","password":"hunter2","server":"10.1.1.1","port":5070}"#,
        )
        .unwrap();
        assert_eq!(creds.transport, "udp");
        assert!(!format!("{:?}", creds).contains("hunter2"));

        let request = RegisterRequest::from(&creds);
        assert_eq!(request.domain_host, "10.1.1.1");
        assert_eq!(request.domain_port, 5070);
        assert!(!format!("{:?}", request).contains("hunter2"));

        assert!(Credentials::from_json("{}").is_err());
    }
}
