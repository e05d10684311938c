//! Persisted daemon preferences.
//!
//! # Storage layout
//!
//! One YAML map per supervised daemon instance (mode `0600`):
//!
//! ```text
//! routing: default
//! storage_mode: disk-persistent
//! interface_wlan0: true
//! ```
//!
//! Snapshots are `BTreeMap`s so iteration order (and therefore the
//! generated configuration) is deterministic.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

use crate::error::{io_err, PrefsError};

// ---------------------------------------------------------------------------
// Preference keys
// ---------------------------------------------------------------------------

/// Well-known preference keys consumed by the supervisor.
pub mod pref_keys {
    /// Master enable/disable switch for the whole daemon.
    pub const ENABLED: &str = "enabled";
    pub const ENDPOINT_ID: &str = "endpoint_id";
    pub const ROUTING: &str = "routing";
    pub const TIMESYNC_MODE: &str = "timesync_mode";
    pub const STORAGE_MODE: &str = "storage_mode";
    pub const UPLINK_MODE: &str = "uplink_mode";
    pub const SECURITY_MODE: &str = "security_mode";
    pub const SECURITY_BAB_KEY: &str = "security_bab_key";
    pub const LOG_LEVEL: &str = "log_options";
    pub const LOG_DEBUG_VERBOSITY: &str = "log_debug_verbosity";
    pub const LOG_ENABLE_FILE: &str = "log_enable_file";
    /// Prefix for per-interface enable flags, e.g. `interface_wlan0`.
    pub const INTERFACE_PREFIX: &str = "interface_";
}

// ---------------------------------------------------------------------------
// Values and snapshots
// ---------------------------------------------------------------------------

/// A single preference value: string or boolean.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PrefValue {
    Flag(bool),
    Text(String),
}

impl PrefValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            PrefValue::Text(s) => Some(s),
            PrefValue::Flag(_) => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PrefValue::Flag(b) => Some(*b),
            PrefValue::Text(_) => None,
        }
    }
}

impl From<&str> for PrefValue {
    fn from(s: &str) -> Self {
        PrefValue::Text(s.to_owned())
    }
}

impl From<String> for PrefValue {
    fn from(s: String) -> Self {
        PrefValue::Text(s)
    }
}

impl From<bool> for PrefValue {
    fn from(b: bool) -> Self {
        PrefValue::Flag(b)
    }
}

/// Point-in-time copy of all preferences, sorted by key.
pub type PrefSnapshot = BTreeMap<String, PrefValue>;

// ---------------------------------------------------------------------------
// Store trait
// ---------------------------------------------------------------------------

/// Read access to the persisted preference store.
///
/// The change-notification feed is delivered separately (the supervisor
/// watches the backing file, or the embedder dispatches changed keys
/// directly).
pub trait PreferenceStore: Send + Sync {
    fn get_string(&self, key: &str) -> Option<String>;

    fn get_bool(&self, key: &str) -> Option<bool>;

    /// Consistent snapshot of the whole store.
    fn snapshot(&self) -> PrefSnapshot;
}

// ---------------------------------------------------------------------------
// YAML-backed store
// ---------------------------------------------------------------------------

/// File-backed preference store; every mutation persists immediately.
pub struct YamlPreferences {
    path: PathBuf,
    values: RwLock<PrefSnapshot>,
}

impl YamlPreferences {
    /// Load the store at `path`, starting empty when the file is absent.
    pub fn load_at(path: impl Into<PathBuf>) -> Result<Self, PrefsError> {
        let path = path.into();
        let values = read_values(&path)?;
        Ok(Self {
            path,
            values: RwLock::new(values),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Set `key` to `value` and persist the whole map.
    pub fn set(&self, key: &str, value: impl Into<PrefValue>) -> Result<(), PrefsError> {
        let mut values = self.values.write().expect("preference lock poisoned");
        values.insert(key.to_owned(), value.into());
        save_values(&self.path, &values)
    }

    /// Remove `key` and persist; absent keys are a no-op.
    pub fn remove(&self, key: &str) -> Result<(), PrefsError> {
        let mut values = self.values.write().expect("preference lock poisoned");
        if values.remove(key).is_none() {
            return Ok(());
        }
        save_values(&self.path, &values)
    }

    /// Re-read the backing file and return the keys whose values changed
    /// (added, removed, or modified), sorted.
    pub fn reload(&self) -> Result<Vec<String>, PrefsError> {
        let fresh = read_values(&self.path)?;
        let mut values = self.values.write().expect("preference lock poisoned");
        let mut changed: Vec<String> = Vec::new();
        for (key, value) in &fresh {
            if values.get(key) != Some(value) {
                changed.push(key.clone());
            }
        }
        for key in values.keys() {
            if !fresh.contains_key(key) {
                changed.push(key.clone());
            }
        }
        *values = fresh;
        changed.sort();
        Ok(changed)
    }
}

impl PreferenceStore for YamlPreferences {
    fn get_string(&self, key: &str) -> Option<String> {
        let values = self.values.read().expect("preference lock poisoned");
        values.get(key).and_then(|v| v.as_str().map(str::to_owned))
    }

    fn get_bool(&self, key: &str) -> Option<bool> {
        let values = self.values.read().expect("preference lock poisoned");
        values.get(key).and_then(PrefValue::as_bool)
    }

    fn snapshot(&self) -> PrefSnapshot {
        self.values.read().expect("preference lock poisoned").clone()
    }
}

fn read_values(path: &Path) -> Result<PrefSnapshot, PrefsError> {
    if !path.exists() {
        return Ok(PrefSnapshot::new());
    }
    let contents = std::fs::read_to_string(path).map_err(|e| io_err(path, e))?;
    if contents.trim().is_empty() {
        return Ok(PrefSnapshot::new());
    }
    serde_yaml::from_str(&contents).map_err(|e| PrefsError::Parse {
        path: path.to_path_buf(),
        source: e,
    })
}

fn save_values(path: &Path, values: &PrefSnapshot) -> Result<(), PrefsError> {
    if let Some(parent) = path.parent() {
        if !parent.exists() {
            std::fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
        }
    }
    let yaml = serde_yaml::to_string(values)?;
    std::fs::write(path, yaml).map_err(|e| io_err(path, e))?;
    set_file_permissions(path)
}

#[cfg(unix)]
fn set_file_permissions(path: &Path) -> Result<(), PrefsError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
        .map_err(|e| io_err(path, e))
}

#[cfg(not(unix))]
fn set_file_permissions(_path: &Path) -> Result<(), PrefsError> {
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
