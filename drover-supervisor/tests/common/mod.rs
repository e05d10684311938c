//! Shared test doubles: a recording mock engine, notification sink,
//! multicast lease, and restart listener wired into a spawned supervisor.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tempfile::TempDir;
use tokio::task::JoinHandle;

use drover_core::engine::{Engine, EngineError};
use drover_core::keys::KeyInfo;
use drover_core::notifications::{Notification, NotificationSink};
use drover_core::types::{
    DaemonState, EndpointId, EngineStats, EngineVersion, RunLevel, SessionId,
};
use drover_core::YamlPreferences;
use drover_supervisor::{signal_channel, MulticastLock, RestartListener, SignalSender, Supervisor};

// ---------------------------------------------------------------------------
// Mock engine
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineCall {
    SetLogging(String, i32),
    SetDebugVerbosity(i32),
    SetLogFile(Option<PathBuf>, i32),
    SetConfigFile(PathBuf),
    Init(RunLevel),
    StartDiscovery,
    StopDiscovery,
    InitiateConnection(String),
    ClearStorage,
    KeyExchangeBegin(String, i32, String),
    KeyExchangeResponse(String, i32, u32, i32, String),
    RemoveKey(String),
}

pub struct MockEngine {
    pub signals: SignalSender,
    calls: Mutex<Vec<EngineCall>>,
    level: Mutex<RunLevel>,
    fail_init_at: Mutex<Option<RunLevel>>,
    pub neighbor_list: Mutex<Vec<EndpointId>>,
    pub unknown_nodes: Mutex<HashSet<String>>,
    pub stored_keys: Mutex<HashMap<String, KeyInfo>>,
    pub fail_remove_key: Mutex<bool>,
}

impl MockEngine {
    pub fn new(signals: SignalSender) -> Arc<Self> {
        Arc::new(Self {
            signals,
            calls: Mutex::new(Vec::new()),
            level: Mutex::new(RunLevel::Zero),
            fail_init_at: Mutex::new(None),
            neighbor_list: Mutex::new(Vec::new()),
            unknown_nodes: Mutex::new(HashSet::new()),
            stored_keys: Mutex::new(HashMap::new()),
            fail_remove_key: Mutex::new(false),
        })
    }

    pub fn calls(&self) -> Vec<EngineCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    pub fn init_calls(&self) -> Vec<RunLevel> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                EngineCall::Init(level) => Some(level),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, matcher: impl Fn(&EngineCall) -> bool) -> usize {
        self.calls().iter().filter(|call| matcher(call)).count()
    }

    pub fn current_level(&self) -> RunLevel {
        *self.level.lock().unwrap()
    }

    pub fn fail_next_init_at(&self, level: RunLevel) {
        *self.fail_init_at.lock().unwrap() = Some(level);
    }

    fn record(&self, call: EngineCall) {
        self.calls.lock().unwrap().push(call);
    }
}

impl Engine for MockEngine {
    fn set_logging(&self, tag: &str, level: i32) {
        self.record(EngineCall::SetLogging(tag.to_string(), level));
    }

    fn set_debug_verbosity(&self, verbosity: i32) {
        self.record(EngineCall::SetDebugVerbosity(verbosity));
    }

    fn set_log_file(&self, path: Option<&Path>, level: i32) {
        self.record(EngineCall::SetLogFile(path.map(Path::to_path_buf), level));
    }

    fn set_config_file(&self, path: &Path) {
        self.record(EngineCall::SetConfigFile(path.to_path_buf()));
    }

    fn init(&self, level: RunLevel) -> Result<(), EngineError> {
        self.record(EngineCall::Init(level));
        if self.fail_init_at.lock().unwrap().take() == Some(level) {
            return Err(EngineError::new(format!("cannot reach {level}")));
        }
        *self.level.lock().unwrap() = level;
        self.signals.level_reached(level);
        Ok(())
    }

    fn run_level(&self) -> RunLevel {
        self.current_level()
    }

    fn version(&self) -> EngineVersion {
        EngineVersion {
            version: "1.0.1".into(),
            build: "mock-7".into(),
        }
    }

    fn stats(&self) -> EngineStats {
        EngineStats {
            uptime_secs: 90,
            neighbors: 2,
            ..EngineStats::default()
        }
    }

    fn neighbors(&self) -> Vec<EndpointId> {
        self.neighbor_list.lock().unwrap().clone()
    }

    fn node_info(&self, endpoint: &EndpointId) -> Result<String, EngineError> {
        if self.unknown_nodes.lock().unwrap().contains(&endpoint.0) {
            return Err(EngineError::new("node not found"));
        }
        Ok("node".to_string())
    }

    fn clear_storage(&self) {
        self.record(EngineCall::ClearStorage);
    }

    fn initiate_connection(&self, endpoint: &EndpointId) {
        self.record(EngineCall::InitiateConnection(endpoint.0.clone()));
    }

    fn start_discovery(&self) {
        self.record(EngineCall::StartDiscovery);
    }

    fn stop_discovery(&self) {
        self.record(EngineCall::StopDiscovery);
    }

    fn key_exchange_begin(&self, endpoint: &EndpointId, protocol: i32, data: &str) {
        self.record(EngineCall::KeyExchangeBegin(
            endpoint.0.clone(),
            protocol,
            data.to_string(),
        ));
    }

    fn key_exchange_response(
        &self,
        endpoint: &EndpointId,
        code: i32,
        session: SessionId,
        answer: i32,
        data: &str,
    ) {
        self.record(EngineCall::KeyExchangeResponse(
            endpoint.0.clone(),
            code,
            session.0,
            answer,
            data.to_string(),
        ));
    }

    fn key_info(&self, endpoint: &EndpointId) -> Result<KeyInfo, EngineError> {
        self.stored_keys
            .lock()
            .unwrap()
            .get(&endpoint.0)
            .cloned()
            .ok_or_else(|| EngineError::new("no key info"))
    }

    fn remove_key(&self, endpoint: &EndpointId) -> Result<(), EngineError> {
        self.record(EngineCall::RemoveKey(endpoint.0.clone()));
        if *self.fail_remove_key.lock().unwrap() {
            return Err(EngineError::new("no such key"));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Recording sink / lease / listener
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct RecordingSink {
    pub notifications: Mutex<Vec<Notification>>,
    pub states: Mutex<Vec<DaemonState>>,
    pub neighborhood_signals: Mutex<usize>,
}

impl RecordingSink {
    pub fn notification_count(&self) -> usize {
        self.notifications.lock().unwrap().len()
    }

    pub fn states(&self) -> Vec<DaemonState> {
        self.states.lock().unwrap().clone()
    }
}

impl NotificationSink for RecordingSink {
    fn publish(&self, notification: Notification) {
        self.notifications.lock().unwrap().push(notification);
    }

    fn state_changed(&self, state: DaemonState) {
        self.states.lock().unwrap().push(state);
    }

    fn neighborhood_changed(&self) {
        *self.neighborhood_signals.lock().unwrap() += 1;
    }
}

#[derive(Default)]
pub struct CountingLock {
    pub acquires: Mutex<usize>,
    pub releases: Mutex<usize>,
}

impl CountingLock {
    pub fn acquires(&self) -> usize {
        *self.acquires.lock().unwrap()
    }

    pub fn releases(&self) -> usize {
        *self.releases.lock().unwrap()
    }
}

impl MulticastLock for CountingLock {
    fn acquire(&self) -> io::Result<()> {
        *self.acquires.lock().unwrap() += 1;
        Ok(())
    }

    fn release(&self) {
        *self.releases.lock().unwrap() += 1;
    }
}

#[derive(Default)]
pub struct RecordingListener {
    pub phases: Mutex<Vec<String>>,
}

impl RecordingListener {
    pub fn phases(&self) -> Vec<String> {
        self.phases.lock().unwrap().clone()
    }
}

impl RestartListener for RecordingListener {
    fn on_stop(&self, previous: RunLevel, next: RunLevel) {
        self.phases.lock().unwrap().push(format!("stop {previous}->{next}"));
    }

    fn on_reload_configuration(&self) {
        self.phases.lock().unwrap().push("reload".to_string());
    }

    fn on_start(&self, previous: RunLevel, next: RunLevel) {
        self.phases.lock().unwrap().push(format!("start {previous}->{next}"));
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

pub struct Harness {
    pub dir: TempDir,
    pub engine: Arc<MockEngine>,
    pub sink: Arc<RecordingSink>,
    pub lock: Arc<CountingLock>,
    pub listener: Arc<RecordingListener>,
    pub prefs: Arc<YamlPreferences>,
    pub supervisor: Supervisor,
    pub handle: JoinHandle<()>,
}

impl Harness {
    /// Spawn a supervisor over fresh mocks. Must run inside a tokio
    /// runtime.
    pub fn spawn() -> Harness {
        let dir = TempDir::new().expect("tempdir");
        let (signals, signal_rx) = signal_channel();
        let engine = MockEngine::new(signals);
        let sink = Arc::new(RecordingSink::default());
        let lock = Arc::new(CountingLock::default());
        let listener = Arc::new(RecordingListener::default());
        let prefs = Arc::new(
            YamlPreferences::load_at(dir.path().join("prefs.yaml")).expect("load prefs"),
        );

        let (supervisor, handle) = Supervisor::spawn(
            engine.clone(),
            signal_rx,
            prefs.clone(),
            sink.clone(),
            lock.clone(),
            Some(listener.clone()),
            dir.path().join("daemon"),
        );

        Harness {
            dir,
            engine,
            sink,
            lock,
            listener,
            prefs,
            supervisor,
            handle,
        }
    }

    pub fn base(&self) -> PathBuf {
        self.dir.path().join("daemon")
    }

    /// Initialize and raise to `RoutingExtensions`, then wait online.
    pub async fn bring_online(&self) {
        self.supervisor.initialize().await.expect("initialize");
        self.supervisor.start().await.expect("start");
        wait_for_state(&self.supervisor, DaemonState::Online).await;
    }
}

// ---------------------------------------------------------------------------
// Async helpers
// ---------------------------------------------------------------------------

pub async fn wait_for_state(supervisor: &Supervisor, expected: DaemonState) {
    let mut rx = supervisor.state_changes();
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if *rx.borrow_and_update() == expected {
                return;
            }
            rx.changed().await.expect("state channel closed");
        }
    })
    .await
    .unwrap_or_else(|_| panic!("timed out waiting for state {expected}"));
}

pub async fn wait_until(description: &str, mut condition: impl FnMut() -> bool) {
    let result = tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
    assert!(result.is_ok(), "timed out waiting until: {description}");
}
