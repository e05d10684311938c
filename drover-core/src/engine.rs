//! The narrow control/query interface of the wrapped DTN engine.
//!
//! The supervisor never reaches into the engine's internals; everything it
//! needs goes through [`Engine`]. The engine pushes run-level and event
//! notifications back as [`EngineSignal`] records, which the supervisor
//! drains from a channel under its own exclusion domain; implementations
//! must never call back into supervisor state directly.

use std::path::Path;

use thiserror::Error;

use crate::keys::KeyInfo;
use crate::types::{EndpointId, EngineStats, EngineVersion, RunLevel, SessionId};

/// Failure reported by the wrapped engine.
///
/// Transition failures leave the run-level wherever the engine last
/// reported it; the supervisor does not retry.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("engine error: {message}")]
pub struct EngineError {
    pub message: String,
}

impl EngineError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Control/query surface of the supervised daemon engine.
///
/// All methods are synchronous from the engine's point of view; long
/// transitions (`init`) are wrapped in blocking tasks by the supervisor.
pub trait Engine: Send + Sync {
    /// Set the log level for the given logging domain tag.
    fn set_logging(&self, tag: &str, level: i32);

    /// Set the debug verbosity; `0` disables debug output.
    fn set_debug_verbosity(&self, verbosity: i32);

    /// Enable file logging at `path`, or disable it when `path` is `None`.
    fn set_log_file(&self, path: Option<&Path>, level: i32);

    /// Point the engine at a regenerated configuration document.
    fn set_config_file(&self, path: &Path);

    /// Drive the engine to `level`. The engine sequences intermediate
    /// levels internally and reports each reached level as a signal.
    fn init(&self, level: RunLevel) -> Result<(), EngineError>;

    /// The run-level the engine last reported.
    fn run_level(&self) -> RunLevel;

    fn version(&self) -> EngineVersion;

    fn stats(&self) -> EngineStats;

    /// Endpoint identifiers of all currently known neighbors.
    fn neighbors(&self) -> Vec<EndpointId>;

    /// Extended node info; `Err` when the engine no longer knows `endpoint`.
    fn node_info(&self, endpoint: &EndpointId) -> Result<String, EngineError>;

    fn clear_storage(&self);

    fn initiate_connection(&self, endpoint: &EndpointId);

    fn start_discovery(&self);

    fn stop_discovery(&self);

    /// Begin a key exchange with `endpoint` using the given protocol code.
    fn key_exchange_begin(&self, endpoint: &EndpointId, protocol: i32, data: &str);

    /// Answer a pending key-exchange round.
    fn key_exchange_response(
        &self,
        endpoint: &EndpointId,
        code: i32,
        session: SessionId,
        answer: i32,
        data: &str,
    );

    /// Stored key material for `endpoint`; `Err` when none is known.
    fn key_info(&self, endpoint: &EndpointId) -> Result<KeyInfo, EngineError>;

    fn remove_key(&self, endpoint: &EndpointId) -> Result<(), EngineError>;
}

// ---------------------------------------------------------------------------
// Asynchronous engine signals
// ---------------------------------------------------------------------------

/// Push notification from the engine's own execution context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineSignal {
    /// The engine finished a transition step and now holds `RunLevel`.
    LevelReached(RunLevel),
    /// The engine raised an event record.
    Event(EngineEvent),
}

/// Raw engine-emitted event record.
///
/// Attributes are unparsed `key: value` lines; lines without the separator
/// are dropped during translation rather than failing the event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineEvent {
    pub name: String,
    /// Action string; empty when the event carries none.
    pub action: String,
    pub attributes: Vec<String>,
}

impl EngineEvent {
    pub fn new(name: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            action: action.into(),
            attributes: Vec::new(),
        }
    }

    pub fn with_attribute(mut self, line: impl Into<String>) -> Self {
        self.attributes.push(line.into());
        self
    }
}
