//! # SIP user-agent client core
//!
//! Control plane of a single-account SIP softphone. It configures a native SIP/RTP
//! engine for high-fidelity audio, registers one account, places and tracks one
//! outgoing call at a time, toggles microphone mute and speaker routing, and keeps a
//! bounded history of finished calls.
//!
//! The engine itself (SIP signaling, RTP, codecs, audio I/O) is abstracted behind
//! the [`SipEngine`] trait. [`SimulatedEngine`] is an in-process implementation that
//! scripts registration and call progress, used by the `sipua` binary and by tests.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────┐
//! │   UI / host process (any task or thread)   │
//! └───────┬──────────────────────────▲─────────┘
//!         │ ClientHandle commands    │ watch cells + ClientEvent
//! ┌───────▼──────────────────────────┴─────────┐
//! │ Engine task                                │
//! │  registration · call · media · history     │
//! │  drive tick (iterate every 20 ms)          │
//! └───────┬──────────────────────────▲─────────┘
//!         │ SipEngine                │ EngineEvent
//! ┌───────▼──────────────────────────┴─────────┐
//! │ Native SIP/RTP engine                      │
//! └────────────────────────────────────────────┘
//! ```
//!
//! Every engine call and every state mutation happens on the engine task.
//! Observers read state through `tokio::sync::watch` cells and receive
//! [`ClientEvent`]s through a broadcast channel.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use sipua_client_core::{Client, ClientConfig, ClientEvent, SimulatedEngine};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = Client::start(SimulatedEngine::new(), ClientConfig::default())?;
//! let mut events = client.subscribe_events();
//!
//! client.register("alice", "pbx.example.com", 5060, "secret")?;
//! client.place_call("5551234")?;
//!
//! while let Ok(event) = events.recv().await {
//!     if let ClientEvent::CallRecorded(entry) = event {
//!         println!("{} {}s {}", entry.number, entry.duration_secs, entry.status);
//!         break;
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod address;
pub mod call;
pub mod client;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod history;
pub mod media;
pub mod registration;
mod state;

pub use address::{SipAddress, Transport, normalize_destination, sanitize_dial_string};
pub use call::{CallController, CallId, CallSession, CallState, CallUpdate};
pub use client::{Client, ClientHandle};
pub use config::{ClientConfig, CodecSetting, MediaEncryption, MediaPolicy};
pub use engine::{
    AudioCodec, AudioDevice, AudioDeviceType, EngineCallId, EngineCallState, EngineEvent,
    EngineEventSink, SimulatedEngine, SipEngine, apply_media_policy,
};
pub use error::{ClientError, ClientResult, EngineError};
pub use events::ClientEvent;
pub use history::{CallHistory, CallHistoryEntry};
pub use media::{MediaControl, MediaFlags};
pub use registration::{Credentials, RegisterRequest, RegistrationController, RegistrationState};
