//! Native SIP/RTP engine abstraction
//!
//! The control plane never speaks SIP or RTP itself. It drives an engine through the
//! [`SipEngine`] trait and consumes the [`EngineEvent`]s the engine raises.
//!
//! # Threading contract
//!
//! Engines are not safe for concurrent access. An engine is moved into the client's
//! engine task by [`Client::start`](crate::client::Client::start) and every method,
//! including [`SipEngine::iterate`], is called from that task only. Events are pushed
//! into the [`EngineEventSink`] given to [`SipEngine::start`] and are applied by the
//! same task in the order they were sent.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────┐
//! │       Engine task        │
//! │  commands / drive tick   │
//! └─────┬──────────────▲─────┘
//!       │ SipEngine    │ EngineEvent
//! ┌─────▼──────────────┴─────┐
//! │   native SIP/RTP engine  │
//! └──────────────────────────┘
//! ```

pub mod policy;
pub mod simulated;

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::address::SipAddress;
use crate::config::MediaEncryption;
use crate::error::EngineError;
use crate::registration::RegistrationState;

pub use policy::apply_media_policy;
pub use simulated::SimulatedEngine;

/// Channel the engine reports its events on
pub type EngineEventSink = mpsc::UnboundedSender<EngineEvent>;

/// Receiving side of [`EngineEventSink`], owned by the engine task
pub type EngineEventStream = mpsc::UnboundedReceiver<EngineEvent>;

/// Call states as the native engine reports them
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EngineCallState {
    Idle,
    IncomingReceived,
    OutgoingInit,
    OutgoingProgress,
    OutgoingRinging,
    OutgoingEarlyMedia,
    Connected,
    StreamsRunning,
    Pausing,
    Paused,
    Resuming,
    Updating,
    End,
    Released,
    Error,
}

impl EngineCallState {
    /// Whether the engine considers the call finished
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            EngineCallState::End | EngineCallState::Released | EngineCallState::Error
        )
    }
}

impl fmt::Display for EngineCallState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Event raised by the engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// The default account's registration changed
    Registration {
        state: RegistrationState,
        message: String,
    },
    /// A call changed state
    Call {
        call: EngineCallId,
        state: EngineCallState,
        /// Engine-measured call duration at the time of the event
        duration_secs: u32,
        message: String,
    },
}

/// An audio codec the engine can negotiate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioCodec {
    /// MIME subtype, e.g. `opus`, `G722`, `PCMU`
    pub mime_type: String,
    pub clock_rate: u32,
    pub enabled: bool,
    /// Bitrate in bits per second the engine will target
    pub normal_bitrate_bps: u32,
}

/// Physical kind of an audio route
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AudioDeviceType {
    Microphone,
    Earpiece,
    Speaker,
    Bluetooth,
    Headset,
    Unknown,
}

/// An audio device as enumerated by the engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioDevice {
    pub id: String,
    pub name: String,
    pub device_type: AudioDeviceType,
}

impl AudioDevice {
    pub fn new(id: impl Into<String>, name: impl Into<String>, device_type: AudioDeviceType) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            device_type,
        }
    }
}

/// Digest credential bound to a user and domain
#[derive(Clone, PartialEq, Eq)]
pub struct AuthInfo {
    pub username: String,
    pub password: String,
    /// `None` lets the server's challenge pick the realm
    pub realm: Option<String>,
    pub domain: String,
}

impl fmt::Debug for AuthInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthInfo")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("realm", &self.realm)
            .field("domain", &self.domain)
            .finish()
    }
}

/// Parameters of an account to add to the engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountParams {
    pub identity: SipAddress,
    pub server: SipAddress,
    pub register_enabled: bool,
}

/// Engine-assigned handle of a call, returned by [`SipEngine::invite`] and carried by
/// every [`EngineEvent::Call`] for that call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EngineCallId(pub u64);

impl fmt::Display for EngineCallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "call-{}", self.0)
    }
}

/// Engine-assigned account handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AccountId(pub u64);

/// Per-call parameters for an invite
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallParams {
    pub media_encryption: MediaEncryption,
}

/// Primitive operations of the native SIP/RTP engine
///
/// Implementations must only ever be driven from one execution context; see the
/// module documentation.
pub trait SipEngine: Send + 'static {
    /// Bring the engine to running state; events flow into `events` from now on
    fn start(&mut self, events: EngineEventSink) -> Result<(), EngineError>;

    /// Process pending network and timer work; may raise events
    fn iterate(&mut self);

    // ---- audio processing and QoS ----

    fn set_echo_cancellation(&mut self, enabled: bool);
    fn set_auto_gain_control(&mut self, enabled: bool);
    fn set_audio_dscp(&mut self, dscp: u8);
    fn set_sip_dscp(&mut self, dscp: u8);
    fn set_adaptive_rate_control(&mut self, enabled: bool);
    fn set_adaptive_jitter_compensation(&mut self, enabled: bool);
    /// Bandwidth caps in kbit/s; `None` means unlimited
    fn set_bandwidth_limits(&mut self, upload_kbps: Option<u32>, download_kbps: Option<u32>);

    // ---- codecs ----

    fn audio_codecs(&self) -> Vec<AudioCodec>;
    fn set_codec_enabled(&mut self, mime_type: &str, enabled: bool) -> Result<(), EngineError>;
    fn set_codec_bitrate(&mut self, mime_type: &str, bitrate_bps: u32) -> Result<(), EngineError>;

    /// Write diagnostic logs below `path`
    fn enable_log_collection(&mut self, path: &Path) -> Result<(), EngineError>;

    // ---- accounts ----

    fn clear_accounts(&mut self);
    fn clear_auth_info(&mut self);
    fn add_auth_info(&mut self, auth: AuthInfo);
    fn add_account(&mut self, params: AccountParams) -> Result<AccountId, EngineError>;
    fn set_default_account(&mut self, account: AccountId) -> Result<(), EngineError>;

    // ---- calls ----

    /// Send an INVITE; success means the engine accepted the call for setup
    fn invite(&mut self, address: &SipAddress, params: CallParams) -> Result<EngineCallId, EngineError>;
    /// Terminate the current call, returns `false` if there was none
    fn terminate_current_call(&mut self) -> bool;
    /// Duration of the current call, `None` with no call
    fn current_call_duration(&self) -> Option<u32>;

    // ---- audio routing ----

    fn set_mic_enabled(&mut self, enabled: bool);
    fn audio_devices(&self) -> Vec<AudioDevice>;
    fn set_input_audio_device(&mut self, device: &AudioDevice);
    fn set_output_audio_device(&mut self, device: &AudioDevice);
}
