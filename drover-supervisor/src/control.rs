//! Supervisor runtime: command queue + engine-signal drain.
//!
//! All mutating operations funnel through one mpsc queue consumed by a
//! single control task: at most one in-flight operation at a time, with
//! callers parked on their oneshot responder until it completes. The
//! engine's two asynchronous callback streams (run-level reached, event
//! raised) arrive on a second channel drained by the same task, so no
//! foreign-thread callback ever touches supervisor state directly. The
//! observable [`DaemonState`] is published through a `watch` channel and
//! can be read without entering the queue.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;

use drover_core::engine::{Engine, EngineEvent, EngineSignal};
use drover_core::keys::{
    KeyExchangeProtocol, KeyInfo, HASH_RESPONSE, NEW_KEY_RESPONSE, PASSWORD_RESPONSE,
};
use drover_core::notifications::NotificationSink;
use drover_core::prefs::{PrefValue, PreferenceStore};
use drover_core::types::{
    DaemonState, EndpointId, EngineStats, EngineVersion, Neighbor, RunLevel, SessionId,
};

use crate::discovery::{DiscoveryController, MulticastLock};
use crate::error::SupervisorError;
use crate::events;
use crate::logging;
use crate::router::{route, RouteAction};

const COMMAND_QUEUE_DEPTH: usize = 64;

/// Observer for staged-restart progress, registered at spawn time.
///
/// Typically backs the embedding application's foreground progress
/// display; callbacks run inside the supervisor's exclusion domain.
pub trait RestartListener: Send + Sync {
    fn on_stop(&self, previous: RunLevel, next: RunLevel);
    fn on_reload_configuration(&self);
    fn on_start(&self, previous: RunLevel, next: RunLevel);
}

// ---------------------------------------------------------------------------
// Engine signal channel
// ---------------------------------------------------------------------------

/// Create the channel pair an engine pushes [`EngineSignal`]s through.
pub fn signal_channel() -> (SignalSender, SignalReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (SignalSender { tx }, rx)
}

/// Cloneable handle the engine uses from its own execution context.
#[derive(Debug, Clone)]
pub struct SignalSender {
    tx: mpsc::UnboundedSender<EngineSignal>,
}

impl SignalSender {
    pub fn level_reached(&self, level: RunLevel) {
        let _ = self.tx.send(EngineSignal::LevelReached(level));
    }

    pub fn event(&self, event: EngineEvent) {
        let _ = self.tx.send(EngineSignal::Event(event));
    }
}

pub type SignalReceiver = mpsc::UnboundedReceiver<EngineSignal>;

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

enum Command {
    Initialize {
        respond_to: oneshot::Sender<Result<(), SupervisorError>>,
    },
    Start {
        respond_to: oneshot::Sender<Result<(), SupervisorError>>,
    },
    Stop {
        respond_to: oneshot::Sender<Result<(), SupervisorError>>,
    },
    Restart {
        target: RunLevel,
        respond_to: oneshot::Sender<Result<(), SupervisorError>>,
    },
    Teardown {
        respond_to: oneshot::Sender<Result<(), SupervisorError>>,
    },
    StartDiscovery {
        respond_to: oneshot::Sender<()>,
    },
    StopDiscovery {
        respond_to: oneshot::Sender<()>,
    },
    PreferenceChanged {
        key: String,
        respond_to: oneshot::Sender<Result<(), SupervisorError>>,
    },
    Version {
        respond_to: oneshot::Sender<EngineVersion>,
    },
    Stats {
        respond_to: oneshot::Sender<EngineStats>,
    },
    Neighbors {
        respond_to: oneshot::Sender<Vec<Neighbor>>,
    },
    ClearStorage {
        respond_to: oneshot::Sender<()>,
    },
    InitiateConnection {
        endpoint: EndpointId,
        respond_to: oneshot::Sender<()>,
    },
    KeyExchangeBegin {
        endpoint: EndpointId,
        protocol: KeyExchangeProtocol,
        data: String,
        respond_to: oneshot::Sender<()>,
    },
    KeyExchangeResponse {
        endpoint: EndpointId,
        code: i32,
        session: SessionId,
        answer: i32,
        respond_to: oneshot::Sender<()>,
    },
    KeyInfo {
        endpoint: EndpointId,
        respond_to: oneshot::Sender<Option<KeyInfo>>,
    },
    RemoveKey {
        endpoint: EndpointId,
        respond_to: oneshot::Sender<()>,
    },
}

// ---------------------------------------------------------------------------
// Supervisor handle
// ---------------------------------------------------------------------------

/// Handle to a supervised daemon instance.
///
/// Cheap to clone; all clones talk to the same control task.
#[derive(Clone)]
pub struct Supervisor {
    cmd_tx: mpsc::Sender<Command>,
    state_rx: watch::Receiver<DaemonState>,
    shutdown_tx: broadcast::Sender<()>,
}

impl Supervisor {
    /// Spawn the control task for one supervised daemon instance.
    ///
    /// `signals` is the receiving half of [`signal_channel`]; the engine
    /// holds the sending half. `base` is the daemon's data directory
    /// (configuration, key material, storage, logs).
    pub fn spawn(
        engine: Arc<dyn Engine>,
        signals: SignalReceiver,
        prefs: Arc<dyn PreferenceStore>,
        sink: Arc<dyn NotificationSink>,
        multicast: Arc<dyn MulticastLock>,
        restart_listener: Option<Arc<dyn RestartListener>>,
        base: PathBuf,
    ) -> (Supervisor, JoinHandle<()>) {
        let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_QUEUE_DEPTH);
        let (state_tx, state_rx) = watch::channel(DaemonState::Offline);
        let (shutdown_tx, shutdown_rx) = broadcast::channel(16);

        let task = ControlTask {
            engine,
            prefs,
            sink,
            multicast,
            restart_listener,
            base,
            state_tx,
            shutdown_tx: shutdown_tx.clone(),
            discovery: DiscoveryController::new(),
            initialized: false,
        };
        let handle = tokio::spawn(task.run(cmd_rx, signals, shutdown_rx));

        (
            Supervisor {
                cmd_tx,
                state_rx,
                shutdown_tx,
            },
            handle,
        )
    }

    /// Current observable daemon state; reads the published value without
    /// entering the command queue.
    pub fn state(&self) -> DaemonState {
        *self.state_rx.borrow()
    }

    /// Subscribe to observable state edges.
    pub fn state_changes(&self) -> watch::Receiver<DaemonState> {
        self.state_rx.clone()
    }

    pub(crate) fn shutdown_subscribe(&self) -> broadcast::Receiver<()> {
        self.shutdown_tx.subscribe()
    }

    // --- lifecycle ---------------------------------------------------------

    /// First-call setup: apply logging preferences, regenerate the
    /// configuration, raise the run-level to `Api`.
    pub async fn initialize(&self) -> Result<(), SupervisorError> {
        self.request(|tx| Command::Initialize { respond_to: tx }).await?
    }

    /// Regenerate the configuration and raise to `RoutingExtensions`.
    pub async fn start(&self) -> Result<(), SupervisorError> {
        self.request(|tx| Command::Start { respond_to: tx }).await?
    }

    /// Lower the run-level to `Api`.
    pub async fn stop(&self) -> Result<(), SupervisorError> {
        self.request(|tx| Command::Stop { respond_to: tx }).await?
    }

    /// Selective subsystem restart: drop to `target`, reload the
    /// configuration, restore the level held before the call. When the
    /// current level is already at or below `target` this reloads the
    /// configuration without any level change.
    pub async fn restart(&self, target: RunLevel) -> Result<(), SupervisorError> {
        self.request(|tx| Command::Restart {
            target,
            respond_to: tx,
        })
        .await?
    }

    /// Lower the run-level to `Zero` and end supervision; the multicast
    /// lease is released and the preference watcher stops.
    pub async fn teardown(&self) -> Result<(), SupervisorError> {
        self.request(|tx| Command::Teardown { respond_to: tx }).await?
    }

    // --- discovery ---------------------------------------------------------

    pub async fn start_discovery(&self) -> Result<(), SupervisorError> {
        self.request(|tx| Command::StartDiscovery { respond_to: tx }).await
    }

    pub async fn stop_discovery(&self) -> Result<(), SupervisorError> {
        self.request(|tx| Command::StopDiscovery { respond_to: tx }).await
    }

    // --- preference change feed --------------------------------------------

    /// Route one changed preference key to its minimal action. This is the
    /// entry point of the change feed; the file watcher calls it for every
    /// key it sees change.
    pub async fn preference_changed(&self, key: &str) -> Result<(), SupervisorError> {
        self.request(|tx| Command::PreferenceChanged {
            key: key.to_owned(),
            respond_to: tx,
        })
        .await?
    }

    // --- control facade ----------------------------------------------------

    pub async fn version(&self) -> Result<EngineVersion, SupervisorError> {
        self.request(|tx| Command::Version { respond_to: tx }).await
    }

    pub async fn stats(&self) -> Result<EngineStats, SupervisorError> {
        self.request(|tx| Command::Stats { respond_to: tx }).await
    }

    /// All neighbors resolved to their extended info records; neighbors
    /// the engine no longer knows are silently skipped.
    pub async fn neighbors(&self) -> Result<Vec<Neighbor>, SupervisorError> {
        self.request(|tx| Command::Neighbors { respond_to: tx }).await
    }

    pub async fn clear_storage(&self) -> Result<(), SupervisorError> {
        self.request(|tx| Command::ClearStorage { respond_to: tx }).await
    }

    /// Ask the engine to dial `endpoint`; silently ignored unless the
    /// daemon is online.
    pub async fn initiate_connection(&self, endpoint: EndpointId) -> Result<(), SupervisorError> {
        self.request(|tx| Command::InitiateConnection {
            endpoint,
            respond_to: tx,
        })
        .await
    }

    pub async fn begin_key_exchange(
        &self,
        endpoint: EndpointId,
        protocol: KeyExchangeProtocol,
        secret: impl Into<String>,
    ) -> Result<(), SupervisorError> {
        self.request(|tx| Command::KeyExchangeBegin {
            endpoint,
            protocol,
            data: secret.into(),
            respond_to: tx,
        })
        .await
    }

    /// Confirm the password round of a running exchange.
    pub async fn password_response(
        &self,
        endpoint: EndpointId,
        session: SessionId,
    ) -> Result<(), SupervisorError> {
        self.key_exchange_response(endpoint, PASSWORD_RESPONSE, session, 0).await
    }

    /// Answer the hash-comparison round.
    pub async fn hash_response(
        &self,
        endpoint: EndpointId,
        session: SessionId,
        matches: bool,
    ) -> Result<(), SupervisorError> {
        self.key_exchange_response(endpoint, HASH_RESPONSE, session, i32::from(matches))
            .await
    }

    /// Accept or reject a newly negotiated key.
    pub async fn new_key_response(
        &self,
        endpoint: EndpointId,
        session: SessionId,
        accept: bool,
    ) -> Result<(), SupervisorError> {
        self.key_exchange_response(endpoint, NEW_KEY_RESPONSE, session, i32::from(accept))
            .await
    }

    /// Relay scanned QR code data as an exchange begin.
    pub async fn qr_response(
        &self,
        endpoint: EndpointId,
        data: impl Into<String>,
    ) -> Result<(), SupervisorError> {
        self.begin_key_exchange(endpoint, KeyExchangeProtocol::QrCode, data).await
    }

    /// Relay near-field data as an exchange begin.
    pub async fn nfc_response(
        &self,
        endpoint: EndpointId,
        data: impl Into<String>,
    ) -> Result<(), SupervisorError> {
        self.begin_key_exchange(endpoint, KeyExchangeProtocol::Nfc, data).await
    }

    /// Stored key material for `endpoint`, with its derived trust level;
    /// `None` when the engine knows no key.
    pub async fn key_info(&self, endpoint: EndpointId) -> Result<Option<KeyInfo>, SupervisorError> {
        self.request(|tx| Command::KeyInfo {
            endpoint,
            respond_to: tx,
        })
        .await
    }

    pub async fn remove_key(&self, endpoint: EndpointId) -> Result<(), SupervisorError> {
        self.request(|tx| Command::RemoveKey {
            endpoint,
            respond_to: tx,
        })
        .await
    }

    async fn key_exchange_response(
        &self,
        endpoint: EndpointId,
        code: i32,
        session: SessionId,
        answer: i32,
    ) -> Result<(), SupervisorError> {
        self.request(|tx| Command::KeyExchangeResponse {
            endpoint,
            code,
            session,
            answer,
            respond_to: tx,
        })
        .await
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, SupervisorError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(build(tx))
            .await
            .map_err(|_| SupervisorError::ChannelClosed("command queue"))?;
        rx.await
            .map_err(|_| SupervisorError::ChannelClosed("command response"))
    }
}

// ---------------------------------------------------------------------------
// Control task
// ---------------------------------------------------------------------------

struct ControlTask {
    engine: Arc<dyn Engine>,
    prefs: Arc<dyn PreferenceStore>,
    sink: Arc<dyn NotificationSink>,
    multicast: Arc<dyn MulticastLock>,
    restart_listener: Option<Arc<dyn RestartListener>>,
    base: PathBuf,
    state_tx: watch::Sender<DaemonState>,
    shutdown_tx: broadcast::Sender<()>,
    discovery: DiscoveryController,
    initialized: bool,
}

impl ControlTask {
    async fn run(
        mut self,
        mut cmd_rx: mpsc::Receiver<Command>,
        mut signals: SignalReceiver,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) {
        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => break,
                maybe_cmd = cmd_rx.recv() => {
                    let Some(cmd) = maybe_cmd else { break };
                    self.handle_command(cmd).await;
                }
                maybe_signal = signals.recv() => {
                    let Some(signal) = maybe_signal else { break };
                    self.handle_signal(signal);
                }
            }
        }

        // The lease must not outlive supervision, however it ended.
        self.discovery.teardown(self.multicast.as_ref());
        tracing::debug!("supervisor control task finished");
    }

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::Initialize { respond_to } => {
                let _ = respond_to.send(self.do_initialize().await);
            }
            Command::Start { respond_to } => {
                let _ = respond_to.send(self.do_start().await);
            }
            Command::Stop { respond_to } => {
                let _ = respond_to.send(self.do_stop().await);
            }
            Command::Restart { target, respond_to } => {
                let _ = respond_to.send(self.do_restart(target).await);
            }
            Command::Teardown { respond_to } => {
                let _ = respond_to.send(self.do_teardown().await);
            }
            Command::StartDiscovery { respond_to } => {
                self.discovery
                    .start(self.engine.as_ref(), self.multicast.as_ref());
                let _ = respond_to.send(());
            }
            Command::StopDiscovery { respond_to } => {
                self.discovery
                    .stop(self.engine.as_ref(), self.multicast.as_ref());
                let _ = respond_to.send(());
            }
            Command::PreferenceChanged { key, respond_to } => {
                let _ = respond_to.send(self.do_preference_changed(&key).await);
            }
            Command::Version { respond_to } => {
                let _ = respond_to.send(self.engine.version());
            }
            Command::Stats { respond_to } => {
                let _ = respond_to.send(self.engine.stats());
            }
            Command::Neighbors { respond_to } => {
                let _ = respond_to.send(self.do_neighbors());
            }
            Command::ClearStorage { respond_to } => {
                self.engine.clear_storage();
                let _ = respond_to.send(());
            }
            Command::InitiateConnection {
                endpoint,
                respond_to,
            } => {
                self.do_initiate_connection(&endpoint);
                let _ = respond_to.send(());
            }
            Command::KeyExchangeBegin {
                endpoint,
                protocol,
                data,
                respond_to,
            } => {
                self.engine
                    .key_exchange_begin(&endpoint, protocol.code(), &data);
                let _ = respond_to.send(());
            }
            Command::KeyExchangeResponse {
                endpoint,
                code,
                session,
                answer,
                respond_to,
            } => {
                self.engine
                    .key_exchange_response(&endpoint, code, session, answer, "");
                let _ = respond_to.send(());
            }
            Command::KeyInfo {
                endpoint,
                respond_to,
            } => {
                let _ = respond_to.send(self.engine.key_info(&endpoint).ok());
            }
            Command::RemoveKey {
                endpoint,
                respond_to,
            } => {
                if let Err(err) = self.engine.remove_key(&endpoint) {
                    tracing::error!(endpoint = %endpoint, error = %err, "failed to remove peer key");
                }
                let _ = respond_to.send(());
            }
        }
    }

    // --- lifecycle operations ----------------------------------------------

    async fn do_initialize(&mut self) -> Result<(), SupervisorError> {
        if self.initialized {
            return Err(SupervisorError::AlreadyInitialized);
        }
        self.initialized = true;

        let settings = logging::settings(self.prefs.as_ref());
        self.engine.set_logging(logging::LOG_TAG, settings.level);
        logging::apply_log_file(self.engine.as_ref(), &self.base, &settings);
        self.engine.set_debug_verbosity(settings.verbosity);

        let config = self.regenerate_config().await;
        self.engine_init(RunLevel::Api).await?;
        tracing::info!("daemon initialized");
        config
    }

    async fn do_start(&mut self) -> Result<(), SupervisorError> {
        let config = self.regenerate_config().await;
        self.engine_init(RunLevel::RoutingExtensions).await?;
        tracing::info!("daemon started");
        config
    }

    async fn do_stop(&mut self) -> Result<(), SupervisorError> {
        self.engine_init(RunLevel::Api).await?;
        tracing::info!("daemon stopped");
        Ok(())
    }

    async fn do_restart(&mut self, target: RunLevel) -> Result<(), SupervisorError> {
        let restore = self.engine.run_level();

        // At or below the target already: configuration reload only.
        if restore <= target {
            let config = self.regenerate_config().await;
            if let Some(listener) = &self.restart_listener {
                listener.on_reload_configuration();
            }
            return config;
        }

        tracing::info!(from = %restore, to = %target, "restarting daemon subsystems");
        if let Some(listener) = &self.restart_listener {
            listener.on_stop(restore, target);
        }
        self.engine_init(target).await?;

        let config = self.regenerate_config().await;
        if let Some(listener) = &self.restart_listener {
            listener.on_reload_configuration();
        }

        // Restore the level held before the call, not a derived one.
        self.engine_init(restore).await?;
        if let Some(listener) = &self.restart_listener {
            listener.on_start(target, restore);
        }
        config
    }

    async fn do_teardown(&mut self) -> Result<(), SupervisorError> {
        let result = self.engine_init(RunLevel::Zero).await;
        self.discovery.teardown(self.multicast.as_ref());
        // Ends the control loop and every listener attached to it.
        let _ = self.shutdown_tx.send(());
        tracing::info!("supervision ended");
        result
    }

    async fn do_preference_changed(&mut self, key: &str) -> Result<(), SupervisorError> {
        let value = self
            .prefs
            .get_bool(key)
            .map(PrefValue::from)
            .or_else(|| self.prefs.get_string(key).map(PrefValue::from));
        let action = route(key, value.as_ref());
        tracing::debug!(key, action = ?action, "preference changed");

        match action {
            RouteAction::Restart(level) => self.do_restart(level).await,
            RouteAction::Startup => self.do_start().await,
            RouteAction::Shutdown => self.do_stop().await,
            RouteAction::ApplyLogging => {
                let settings = logging::settings(self.prefs.as_ref());
                logging::apply_logging(self.engine.as_ref(), &settings);
                // The log file carries the level, so a level change
                // re-derives it as well.
                logging::apply_log_file(self.engine.as_ref(), &self.base, &settings);
                Ok(())
            }
            RouteAction::ApplyVerbosity => {
                let settings = logging::settings(self.prefs.as_ref());
                self.engine.set_debug_verbosity(settings.verbosity);
                Ok(())
            }
            RouteAction::ApplyLogFile => {
                let settings = logging::settings(self.prefs.as_ref());
                logging::apply_log_file(self.engine.as_ref(), &self.base, &settings);
                Ok(())
            }
            RouteAction::ReloadConfiguration => self.regenerate_config().await,
            RouteAction::Ignore => Ok(()),
        }
    }

    // --- facade helpers ----------------------------------------------------

    fn do_neighbors(&self) -> Vec<Neighbor> {
        let mut resolved = Vec::new();
        for endpoint in self.engine.neighbors() {
            match self.engine.node_info(&endpoint) {
                Ok(node_type) => resolved.push(Neighbor {
                    endpoint,
                    node_type,
                }),
                Err(err) => {
                    tracing::debug!(endpoint = %endpoint, error = %err, "skipping unresolvable neighbor");
                }
            }
        }
        resolved
    }

    fn do_initiate_connection(&self, endpoint: &EndpointId) {
        if *self.state_tx.borrow() != DaemonState::Online {
            tracing::debug!(endpoint = %endpoint, "connection request ignored while offline");
            return;
        }
        self.engine.initiate_connection(endpoint);
    }

    // --- engine plumbing ---------------------------------------------------

    /// Regenerate all configuration artifacts and point the engine at the
    /// fresh document. Failures are reported but never block the caller's
    /// transition sequence.
    async fn regenerate_config(&self) -> Result<(), SupervisorError> {
        let base = self.base.clone();
        let snapshot = self.prefs.snapshot();
        let generated =
            tokio::task::spawn_blocking(move || drover_config::generate(&base, &snapshot))
                .await
                .map_err(|err| SupervisorError::TaskJoin(format!("config generation: {err}")))?;
        match generated {
            Ok(generated) => {
                self.engine.set_config_file(&generated.config_path);
                Ok(())
            }
            Err(err) => {
                tracing::error!(error = %err, "configuration generation failed");
                Err(err.into())
            }
        }
    }

    async fn engine_init(&self, level: RunLevel) -> Result<(), SupervisorError> {
        let engine = self.engine.clone();
        tokio::task::spawn_blocking(move || engine.init(level))
            .await
            .map_err(|err| SupervisorError::TaskJoin(format!("engine transition: {err}")))?
            .map_err(SupervisorError::from)
    }

    // --- engine signals ----------------------------------------------------

    fn handle_signal(&mut self, signal: EngineSignal) {
        match signal {
            EngineSignal::LevelReached(level) => self.on_level_reached(level),
            EngineSignal::Event(event) => self.on_event(&event),
        }
    }

    fn on_level_reached(&mut self, level: RunLevel) {
        tracing::debug!(level = %level, "engine reached run-level");
        match level {
            RunLevel::RoutingExtensions => self.set_state(DaemonState::Online),
            RunLevel::Api => self.set_state(DaemonState::Offline),
            RunLevel::Network => self
                .discovery
                .on_network_level(self.engine.as_ref(), self.multicast.as_ref()),
            _ => {}
        }
    }

    /// Idempotent: publishing the same state twice produces no edge.
    fn set_state(&mut self, next: DaemonState) {
        if *self.state_tx.borrow() == next {
            return;
        }
        let _ = self.state_tx.send(next);
        self.sink.state_changed(next);
        tracing::info!(state = %next, "daemon state changed");
    }

    fn on_event(&mut self, event: &EngineEvent) {
        let translated = events::translate(event);
        for notification in translated.notifications {
            self.sink.publish(notification);
        }
        if translated.neighborhood_changed {
            self.sink.neighborhood_changed();
        }
    }
}
