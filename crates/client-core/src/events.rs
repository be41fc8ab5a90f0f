//! Client event notifications
//!
//! State cells, read through [`ClientHandle`](crate::ClientHandle), always hold the
//! latest value of each facet. [`ClientEvent`]s complement them with the transitions
//! themselves and with outcomes that have no state of their own, such as a rejected
//! dial.
//!
//! # Usage Examples
//!
//! ```rust,no_run
//! # use sipua_client_core::{ClientHandle, ClientEvent};
//! # async fn example(client: ClientHandle) {
//! let mut events = client.subscribe_events();
//! while let Ok(event) = events.recv().await {
//!     match event {
//!         ClientEvent::CallRecorded(entry) => {
//!             println!("{} lasted {}s ({})", entry.number, entry.duration_secs, entry.status);
//!         }
//!         ClientEvent::CallSetupFailed { destination, reason } => {
//!             eprintln!("could not dial {}: {}", destination, reason);
//!         }
//!         _ => {}
//!     }
//! }
//! # }
//! ```

use crate::call::CallState;
use crate::history::CallHistoryEntry;
use crate::media::MediaFlags;
use crate::registration::RegistrationState;

/// Notification broadcast by the engine task
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    /// The engine reported a new registration state
    RegistrationChanged {
        state: RegistrationState,
        message: String,
    },

    /// A `register` command was refused before reaching the engine
    RegistrationRejected { reason: String },

    /// The live call changed state; `current` is `None` once the call is over
    CallStateChanged {
        previous: Option<CallState>,
        current: Option<CallState>,
    },

    /// A finished call was added to history
    CallRecorded(CallHistoryEntry),

    /// A dial was refused because another call is live
    CallRejected { destination: String, reason: String },

    /// A dial failed before the engine accepted it
    CallSetupFailed { destination: String, reason: String },

    /// Mute or speaker flags changed
    MediaChanged(MediaFlags),
}

impl ClientEvent {
    /// Whether this event reports a failed or refused command
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            ClientEvent::RegistrationRejected { .. }
                | ClientEvent::CallRejected { .. }
                | ClientEvent::CallSetupFailed { .. }
                | ClientEvent::RegistrationChanged {
                    state: RegistrationState::Failed,
                    ..
                }
        )
    }
}
