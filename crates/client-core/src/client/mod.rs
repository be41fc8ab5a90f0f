//! Client entry point and command handle
//!
//! [`Client::start`] configures an engine, moves it into a dedicated engine task and
//! returns a [`ClientHandle`]. The handle is cheap to clone and can be used from any
//! task or thread.
//!
//! # Command model
//!
//! Commands are fire-and-forget. A handle method only queues the command and returns
//! at once; the returned `Result` says whether the engine task accepted the command,
//! not whether it succeeded. Outcomes are observed through the state cells
//! (`registration_state`, `call_state`, ...) and through [`ClientEvent`]s:
//!
//! | Command          | Success observed as                          | Failure observed as              |
//! |------------------|----------------------------------------------|----------------------------------|
//! | `register`       | `RegistrationChanged` (Progress, then Ok)    | `RegistrationRejected`, `Failed` |
//! | `place_call`     | `CallStateChanged { previous: None, .. }`    | `CallRejected`, `CallSetupFailed`|
//! | `end_call`       | `CallStateChanged` to `Ended`, `CallRecorded`| nothing, no call was live        |
//! | `toggle_mute`    | `MediaChanged`                               | never fails                      |
//! | `toggle_speaker` | `MediaChanged`                               | never fails                      |
//!
//! # Example
//!
//! ```rust,no_run
//! use sipua_client_core::{Client, ClientConfig, SimulatedEngine, CallState};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = Client::start(SimulatedEngine::new(), ClientConfig::default())?;
//! client.register("alice", "pbx.example.com", 5060, "secret")?;
//! client.place_call("5551234")?;
//!
//! let mut state = client.subscribe_call_state();
//! state.wait_for(|s| *s == Some(CallState::Connected)).await?;
//! client.end_call()?;
//! client.shutdown().await;
//! # Ok(())
//! # }
//! ```

mod engine_task;

use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio_stream::wrappers::{BroadcastStream, WatchStream};
use tracing::{debug, info};

use crate::call::CallState;
use crate::config::ClientConfig;
use crate::engine::{SipEngine, apply_media_policy};
use crate::error::{ClientError, ClientResult};
use crate::events::ClientEvent;
use crate::history::CallHistoryEntry;
use crate::registration::{Credentials, RegisterRequest, RegistrationState};
use crate::state::{StateView, state_cells};

use engine_task::{Command, EngineTask, Request};

/// Starts SIP clients
pub struct Client;

impl Client {
    /// Configure `engine`, start it, and spawn the engine task
    ///
    /// The media policy from `config` is applied and log collection is enabled before
    /// the engine is started. Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Configuration`] for an invalid `config` and
    /// [`ClientError::Engine`] if the engine refuses the policy or fails to start.
    pub fn start<E: SipEngine>(mut engine: E, config: ClientConfig) -> ClientResult<ClientHandle> {
        config.validate()?;

        apply_media_policy(&mut engine, &config.media)?;
        engine.enable_log_collection(&config.log_collection_path)?;
        debug!(path = %config.log_collection_path.display(), "Engine log collection enabled");

        let (engine_tx, engine_rx) = mpsc::unbounded_channel();
        engine.start(engine_tx)?;

        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (event_tx, _) = broadcast::channel(config.event_channel_capacity);
        let (cells, view) = state_cells();

        let task = EngineTask::new(engine, engine_rx, command_rx, cells, event_tx.clone(), &config);
        tokio::spawn(task.run());

        info!(
            default_route = %config.default_route_domain,
            dial_prefix = %config.dial_prefix,
            interval_ms = config.iterate_interval_ms,
            "SIP client started"
        );

        Ok(ClientHandle {
            commands: command_tx,
            events: event_tx,
            state: view,
        })
    }
}

/// Handle to a running client
///
/// All handles share one engine task. The task stops after [`ClientHandle::shutdown`]
/// or once every handle has been dropped.
#[derive(Debug, Clone)]
pub struct ClientHandle {
    commands: mpsc::UnboundedSender<Command>,
    events: broadcast::Sender<ClientEvent>,
    state: StateView,
}

impl ClientHandle {
    fn send(&self, request: Request) -> ClientResult<()> {
        self.commands
            .send(Command::Request(request))
            .map_err(|_| ClientError::EngineStopped)
    }

    // ---- commands ----

    /// Register `username@domain_host` with the registrar at `domain_host:domain_port`
    ///
    /// Any previous account and credential are replaced.
    pub fn register(
        &self,
        username: impl Into<String>,
        domain_host: impl Into<String>,
        domain_port: u16,
        password: impl Into<String>,
    ) -> ClientResult<()> {
        self.send(Request::Register(RegisterRequest {
            username: username.into(),
            domain_host: domain_host.into(),
            domain_port,
            password: password.into(),
        }))
    }

    /// Register with a stored credential document
    pub fn register_credentials(&self, credentials: &Credentials) -> ClientResult<()> {
        self.send(Request::Register(RegisterRequest::from(credentials)))
    }

    /// Dial `destination`, a phone number or SIP user
    ///
    /// The configured dial prefix is prepended unless the number already starts with
    /// it. The call is routed to the registered domain, or to the configured default
    /// route when not registered.
    pub fn place_call(&self, destination: impl Into<String>) -> ClientResult<()> {
        self.send(Request::PlaceCall {
            destination: destination.into(),
        })
    }

    /// Hang up the live call, if any
    pub fn end_call(&self) -> ClientResult<()> {
        self.send(Request::EndCall)
    }

    pub fn toggle_mute(&self) -> ClientResult<()> {
        self.send(Request::ToggleMute)
    }

    pub fn toggle_speaker(&self) -> ClientResult<()> {
        self.send(Request::ToggleSpeaker)
    }

    /// Stop the engine task, terminating any live call first
    ///
    /// Resolves once the task has stopped. Calling it on a stopped client is a no-op.
    pub async fn shutdown(&self) {
        let (done, stopped) = oneshot::channel();
        if self.commands.send(Command::Shutdown { done }).is_ok() {
            let _ = stopped.await;
        }
    }

    /// Whether the engine task is still accepting commands
    pub fn is_running(&self) -> bool {
        !self.commands.is_closed()
    }

    // ---- current state ----

    pub fn registration_state(&self) -> RegistrationState {
        *self.state.registration.borrow()
    }

    /// State of the live call, `None` when idle
    pub fn call_state(&self) -> Option<CallState> {
        *self.state.call_state.borrow()
    }

    /// Seconds since the live call was answered, 0 when idle
    pub fn call_duration(&self) -> u32 {
        *self.state.duration.borrow()
    }

    pub fn is_muted(&self) -> bool {
        *self.state.muted.borrow()
    }

    pub fn is_speaker_on(&self) -> bool {
        *self.state.speaker.borrow()
    }

    /// Finished calls, newest first
    pub fn call_history(&self) -> Vec<CallHistoryEntry> {
        self.state.history.borrow().clone()
    }

    // ---- subscriptions ----

    pub fn subscribe_registration(&self) -> watch::Receiver<RegistrationState> {
        self.state.registration.clone()
    }

    pub fn subscribe_call_state(&self) -> watch::Receiver<Option<CallState>> {
        self.state.call_state.clone()
    }

    pub fn subscribe_duration(&self) -> watch::Receiver<u32> {
        self.state.duration.clone()
    }

    pub fn subscribe_muted(&self) -> watch::Receiver<bool> {
        self.state.muted.clone()
    }

    pub fn subscribe_speaker(&self) -> watch::Receiver<bool> {
        self.state.speaker.clone()
    }

    pub fn subscribe_history(&self) -> watch::Receiver<Vec<CallHistoryEntry>> {
        self.state.history.clone()
    }

    /// Receive every [`ClientEvent`] emitted from now on
    ///
    /// A subscriber that falls more than `event_channel_capacity` events behind
    /// receives `RecvError::Lagged` and skips ahead.
    pub fn subscribe_events(&self) -> broadcast::Receiver<ClientEvent> {
        self.events.subscribe()
    }

    /// Call state as a `Stream`, starting with the current value
    pub fn call_state_stream(&self) -> WatchStream<Option<CallState>> {
        WatchStream::new(self.state.call_state.clone())
    }

    /// Events as a `Stream`; lag is reported as an error item
    pub fn event_stream(&self) -> BroadcastStream<ClientEvent> {
        BroadcastStream::new(self.events.subscribe())
    }
}
