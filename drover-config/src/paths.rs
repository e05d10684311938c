//! Path helpers and fixed operational constants.
//!
//! Every function takes the caller-supplied base directory of the
//! supervised daemon instance; nothing here resolves an implicit home.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

pub const CONFIG_FILE: &str = "config";

/// Fixed convergence-layer port for every enabled interface binding.
pub const TRANSPORT_PORT: u16 = 4556;

/// IPv6 + IPv4 multicast groups announced for neighbor discovery.
pub const DISCOVERY_ADDRESS: &str = "ff02::142 224.0.0.142";

/// Maximum bundle lifetime: 30 days.
pub const LIMIT_LIFETIME_SECS: u64 = 2_592_000;
/// Maximum accepted pre-dated timestamp: 2 weeks.
pub const LIMIT_PREDATED_TIMESTAMP_SECS: u64 = 1_209_600;
pub const LIMIT_BLOCKSIZE: &str = "250M";
pub const LIMIT_FOREIGN_BLOCKSIZE: &str = "50M";

/// Static uplink/relay contact parameters.
pub const UPLINK_ADDRESS: &str = "134.169.35.130";
pub const UPLINK_PORT: u16 = 4559;
pub const UPLINK_ENDPOINT: &str = "dtn://cloud.dtnbone.dtn";
pub const UPLINK_PROTOCOL: &str = "tcp";

/// Endpoint identity used when the preference is unset.
pub const DEFAULT_ENDPOINT_ID: &str = "dtn://node.dtn";

/// `<base>/config`
pub fn config_path(base: &Path) -> PathBuf {
    base.join(CONFIG_FILE)
}

/// `<base>/bpsec`, the key material directory referenced by the engine.
pub fn security_dir(base: &Path) -> PathBuf {
    base.join("bpsec")
}

/// `<base>/bpsec/dh_params.txt`
pub fn dh_params_path(base: &Path) -> PathBuf {
    security_dir(base).join("dh_params.txt")
}

/// `<base>/default-bab-key.mac`, the restricted pre-shared key file.
pub fn bab_key_path(base: &Path) -> PathBuf {
    base.join("default-bab-key.mac")
}

/// `<base>/blob`, scratch blob storage cleared on every regeneration.
pub fn blob_dir(base: &Path) -> PathBuf {
    base.join("blob")
}

/// `<base>/bundles`, the durable bundle store for persistent storage mode.
pub fn bundles_dir(base: &Path) -> PathBuf {
    base.join("bundles")
}

/// `<base>/logs`, where engine log files land.
pub fn logs_dir(base: &Path) -> PathBuf {
    base.join("logs")
}

/// Timestamped engine log file, e.g. `logs/dtnd_20260807174233.log`.
pub fn log_file_path(base: &Path, now: DateTime<Utc>) -> PathBuf {
    logs_dir(base).join(format!("dtnd_{}.log", now.format("%Y%m%d%H%M%S")))
}
