//! Observable state cells
//!
//! One `watch` channel per facet. The engine task holds the only [`StateCells`]
//! and is therefore the single writer; any number of readers hold a [`StateView`].
//! Writes that do not change the value are not broadcast.

use tokio::sync::watch;

use crate::call::CallState;
use crate::history::CallHistoryEntry;
use crate::media::MediaFlags;
use crate::registration::RegistrationState;

/// Writer side, owned by the engine task
#[derive(Debug)]
pub(crate) struct StateCells {
    registration: watch::Sender<RegistrationState>,
    call_state: watch::Sender<Option<CallState>>,
    duration: watch::Sender<u32>,
    muted: watch::Sender<bool>,
    speaker: watch::Sender<bool>,
    history: watch::Sender<Vec<CallHistoryEntry>>,
}

/// Reader side, cloned into every [`ClientHandle`](crate::ClientHandle)
#[derive(Debug, Clone)]
pub(crate) struct StateView {
    pub(crate) registration: watch::Receiver<RegistrationState>,
    pub(crate) call_state: watch::Receiver<Option<CallState>>,
    pub(crate) duration: watch::Receiver<u32>,
    pub(crate) muted: watch::Receiver<bool>,
    pub(crate) speaker: watch::Receiver<bool>,
    pub(crate) history: watch::Receiver<Vec<CallHistoryEntry>>,
}

pub(crate) fn state_cells() -> (StateCells, StateView) {
    let (registration, registration_rx) = watch::channel(RegistrationState::None);
    let (call_state, call_state_rx) = watch::channel(None);
    let (duration, duration_rx) = watch::channel(0);
    let (muted, muted_rx) = watch::channel(false);
    let (speaker, speaker_rx) = watch::channel(false);
    let (history, history_rx) = watch::channel(Vec::new());

    (
        StateCells {
            registration,
            call_state,
            duration,
            muted,
            speaker,
            history,
        },
        StateView {
            registration: registration_rx,
            call_state: call_state_rx,
            duration: duration_rx,
            muted: muted_rx,
            speaker: speaker_rx,
            history: history_rx,
        },
    )
}

fn publish<T: PartialEq>(cell: &watch::Sender<T>, value: T) {
    cell.send_if_modified(|current| {
        if *current == value {
            false
        } else {
            *current = value;
            true
        }
    });
}

impl StateCells {
    pub(crate) fn set_registration(&self, state: RegistrationState) {
        publish(&self.registration, state);
    }

    pub(crate) fn set_call_state(&self, state: Option<CallState>) {
        publish(&self.call_state, state);
    }

    pub(crate) fn set_duration(&self, secs: u32) {
        publish(&self.duration, secs);
    }

    pub(crate) fn set_media(&self, flags: MediaFlags) {
        publish(&self.muted, flags.is_muted);
        publish(&self.speaker, flags.is_speaker_on);
    }

    pub(crate) fn set_history(&self, entries: Vec<CallHistoryEntry>) {
        self.history.send_replace(entries);
    }
}
