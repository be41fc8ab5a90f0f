//! The engine task: the one execution context that touches the engine
//!
//! Commands from any number of [`ClientHandle`](super::ClientHandle)s, events raised
//! by the engine, and the periodic drive tick are all multiplexed here and handled
//! one at a time. Engine events are preferred over commands so that a command always
//! sees every event the engine raised before it.

use std::time::Duration;

use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::call::{CallController, CallUpdate};
use crate::config::ClientConfig;
use crate::engine::{EngineEvent, EngineEventStream, SipEngine};
use crate::error::ClientError;
use crate::events::ClientEvent;
use crate::history::CallHistory;
use crate::media::MediaControl;
use crate::registration::{RegisterRequest, RegistrationController};
use crate::state::StateCells;

/// Message queued for the engine task
#[derive(Debug)]
pub(crate) enum Command {
    Request(Request),
    Shutdown { done: oneshot::Sender<()> },
}

/// User command applied on the engine task
#[derive(Debug)]
pub(crate) enum Request {
    Register(RegisterRequest),
    PlaceCall { destination: String },
    EndCall,
    ToggleMute,
    ToggleSpeaker,
}

pub(crate) struct EngineTask<E: SipEngine> {
    engine: E,
    engine_events: EngineEventStream,
    commands: mpsc::UnboundedReceiver<Command>,
    registration: RegistrationController,
    calls: CallController,
    history: CallHistory,
    media: MediaControl,
    cells: StateCells,
    events: broadcast::Sender<ClientEvent>,
    iterate_interval: Duration,
}

impl<E: SipEngine> EngineTask<E> {
    pub(crate) fn new(
        engine: E,
        engine_events: EngineEventStream,
        commands: mpsc::UnboundedReceiver<Command>,
        cells: StateCells,
        events: broadcast::Sender<ClientEvent>,
        config: &ClientConfig,
    ) -> Self {
        Self {
            engine,
            engine_events,
            commands,
            registration: RegistrationController::new(),
            calls: CallController::new(config),
            history: CallHistory::new(config.history_capacity),
            media: MediaControl::new(),
            cells,
            events,
            iterate_interval: config.iterate_interval(),
        }
    }

    pub(crate) async fn run(mut self) {
        let mut tick = tokio::time::interval(self.iterate_interval);
        tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;

                Some(event) = self.engine_events.recv() => self.apply_engine_event(event),

                command = self.commands.recv() => match command {
                    Some(Command::Shutdown { done }) => {
                        self.commands.close();
                        self.stop();
                        let _ = done.send(());
                        break;
                    }
                    Some(Command::Request(request)) => self.handle_request(request),
                    None => {
                        debug!("All client handles dropped");
                        self.stop();
                        break;
                    }
                },

                _ = tick.tick() => self.drive(),
            }
        }
    }

    /// One drive-loop tick: let the engine work, apply what it raised, publish duration
    fn drive(&mut self) {
        self.engine.iterate();
        self.drain_engine_events();
        let duration = self.calls.refresh_duration(self.engine.current_call_duration());
        self.cells.set_duration(duration);
    }

    fn drain_engine_events(&mut self) {
        while let Ok(event) = self.engine_events.try_recv() {
            self.apply_engine_event(event);
        }
    }

    fn emit(&self, event: ClientEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    fn apply_engine_event(&mut self, event: EngineEvent) {
        match event {
            EngineEvent::Registration { state, message } => {
                if self.registration.on_engine_event(state, &message) {
                    self.cells.set_registration(state);
                    self.emit(ClientEvent::RegistrationChanged { state, message });
                }
            }
            EngineEvent::Call {
                call,
                state,
                duration_secs,
                ..
            } => match self.calls.on_engine_event(call, state, duration_secs, &mut self.history) {
                CallUpdate::Unchanged => {}
                CallUpdate::Changed { previous, current } => {
                    self.cells.set_call_state(Some(current));
                    self.emit(ClientEvent::CallStateChanged {
                        previous: Some(previous),
                        current: Some(current),
                    });
                }
                CallUpdate::Finished {
                    previous,
                    terminal,
                    entry,
                } => {
                    self.cells.set_call_state(Some(terminal));
                    self.emit(ClientEvent::CallStateChanged {
                        previous: Some(previous),
                        current: Some(terminal),
                    });

                    self.cells.set_history(self.history.list());
                    self.emit(ClientEvent::CallRecorded(entry));

                    self.cells.set_call_state(None);
                    self.cells.set_duration(0);
                    self.emit(ClientEvent::CallStateChanged {
                        previous: Some(terminal),
                        current: None,
                    });
                }
            },
        }
    }

    fn handle_request(&mut self, request: Request) {
        self.drain_engine_events();

        match request {
            Request::Register(request) => {
                if let Err(e) = self.registration.register(&mut self.engine, &request) {
                    warn!(error = %e, username = %request.username, "Registration not submitted");
                    self.emit(ClientEvent::RegistrationRejected {
                        reason: e.to_string(),
                    });
                }
            }
            Request::PlaceCall { destination } => {
                let domain = self.registration.server().map(|s| s.host().to_string());
                match self
                    .calls
                    .place_call(&mut self.engine, &destination, domain.as_deref())
                {
                    Ok(session) => {
                        let state = session.state;
                        self.cells.set_call_state(Some(state));
                        self.cells.set_duration(0);
                        self.emit(ClientEvent::CallStateChanged {
                            previous: None,
                            current: Some(state),
                        });
                    }
                    Err(e @ ClientError::CallInProgress { .. }) => {
                        self.emit(ClientEvent::CallRejected {
                            destination,
                            reason: e.to_string(),
                        });
                    }
                    Err(e) => {
                        warn!(error = %e, %destination, "Call setup failed before reaching the engine");
                        self.emit(ClientEvent::CallSetupFailed {
                            destination,
                            reason: e.to_string(),
                        });
                    }
                }
            }
            Request::EndCall => {
                if let Err(e) = self.calls.end_call(&mut self.engine) {
                    debug!(error = %e, "Nothing to hang up");
                }
            }
            Request::ToggleMute => {
                self.media.toggle_mute(&mut self.engine);
                self.publish_media();
            }
            Request::ToggleSpeaker => {
                self.media.toggle_speaker(&mut self.engine);
                self.publish_media();
            }
        }
    }

    fn publish_media(&self) {
        let flags = self.media.flags();
        self.cells.set_media(flags);
        self.emit(ClientEvent::MediaChanged(flags));
    }

    fn stop(&mut self) {
        if self.calls.session().is_some() {
            self.engine.terminate_current_call();
        }
        info!("Engine task stopped");
    }
}
