use thiserror::Error;

use drover_config::ConfigError;
use drover_core::engine::EngineError;
use drover_core::PrefsError;

/// Error surface for supervisor operations.
#[derive(Debug, Error)]
pub enum SupervisorError {
    /// The engine refused or failed a requested transition; the run-level
    /// is left wherever the engine last reported it.
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// Configuration regeneration failed; the transition sequence was
    /// still attempted.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("preference store error: {0}")]
    Prefs(#[from] PrefsError),

    #[error("watcher error: {0}")]
    Watch(#[from] notify::Error),

    #[error("channel closed: {0}")]
    ChannelClosed(&'static str),

    #[error("task join failure: {0}")]
    TaskJoin(String),

    /// `initialize()` was called on an already-initialized supervisor.
    #[error("supervisor already initialized")]
    AlreadyInitialized,
}
