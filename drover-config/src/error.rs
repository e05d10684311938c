//! Error types for drover-config.

use std::path::PathBuf;

use thiserror::Error;

/// Failures on the configuration write path.
///
/// The orchestrator reports these to its caller but still attempts the
/// requested run-level transition; a stale configuration is preferable to
/// blocking the daemon indefinitely.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> ConfigError {
    ConfigError::Io {
        path: path.into(),
        source,
    }
}
