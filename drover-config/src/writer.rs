//! Configuration write path.
//!
//! `generate` regenerates every on-disk artifact the engine reads:
//!
//! 1. Rewrite (or remove) the restricted pre-shared key file.
//! 2. Clear the scratch blob directory for the disk storage modes.
//! 3. Render the document and atomically write it (`.tmp` + rename),
//!    skipping the write when the content hash is unchanged.

use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use drover_core::prefs::{pref_keys, PrefSnapshot, PrefValue};

use crate::error::{io_err, ConfigError};
use crate::paths;
use crate::render::render;

/// Outcome of a configuration generation pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Generated {
    /// Final location of the configuration document.
    pub config_path: PathBuf,
    /// `false` when the rendered content matched the existing file.
    pub updated: bool,
}

/// Regenerate all configuration artifacts under `base` from `prefs`.
pub fn generate(base: &Path, prefs: &PrefSnapshot) -> Result<Generated, ConfigError> {
    if !base.exists() {
        std::fs::create_dir_all(base).map_err(|e| io_err(base, e))?;
    }
    let security = paths::security_dir(base);
    if !security.exists() {
        std::fs::create_dir_all(&security).map_err(|e| io_err(&security, e))?;
    }

    write_key_material(base, prefs)?;
    clear_blob_scratch(base, prefs)?;

    let content = render(prefs, base);
    let config = paths::config_path(base);
    let updated = atomic_write(&config, &content)?;
    Ok(Generated {
        config_path: config,
        updated,
    })
}

/// Rewrite the restricted key file on every generation; the old file is
/// removed first so a mode change never leaves stale key material behind.
fn write_key_material(base: &Path, prefs: &PrefSnapshot) -> Result<(), ConfigError> {
    let key_file = paths::bab_key_path(base);
    if key_file.exists() {
        std::fs::remove_file(&key_file).map_err(|e| io_err(&key_file, e))?;
    }

    let mode = prefs
        .get(pref_keys::SECURITY_MODE)
        .and_then(PrefValue::as_str)
        .unwrap_or("encrypt");
    if mode != "bab" {
        return Ok(());
    }

    let key = prefs
        .get(pref_keys::SECURITY_BAB_KEY)
        .and_then(PrefValue::as_str)
        .unwrap_or("");
    std::fs::write(&key_file, key).map_err(|e| io_err(&key_file, e))?;
    restrict_permissions(&key_file)
}

/// Delete the contents of the scratch blob directory for the disk storage
/// modes; left-over blobs from a previous run are garbage to the engine.
fn clear_blob_scratch(base: &Path, prefs: &PrefSnapshot) -> Result<(), ConfigError> {
    let mode = prefs
        .get(pref_keys::STORAGE_MODE)
        .and_then(PrefValue::as_str)
        .unwrap_or("disk-persistent");
    if mode != "disk" && mode != "disk-persistent" {
        return Ok(());
    }

    let blob = paths::blob_dir(base);
    if !blob.exists() {
        std::fs::create_dir_all(&blob).map_err(|e| io_err(&blob, e))?;
        return Ok(());
    }
    let entries = std::fs::read_dir(&blob).map_err(|e| io_err(&blob, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| io_err(&blob, e))?;
        let path = entry.path();
        if path.is_dir() {
            std::fs::remove_dir_all(&path).map_err(|e| io_err(&path, e))?;
        } else {
            std::fs::remove_file(&path).map_err(|e| io_err(&path, e))?;
        }
    }

    if mode == "disk-persistent" {
        let bundles = paths::bundles_dir(base);
        if !bundles.exists() {
            std::fs::create_dir_all(&bundles).map_err(|e| io_err(&bundles, e))?;
        }
    }
    Ok(())
}

/// Write `content` to `path` atomically, skipping identical content.
fn atomic_write(path: &Path, content: &str) -> Result<bool, ConfigError> {
    let digest = {
        let mut h = Sha256::new();
        h.update(content.as_bytes());
        hex::encode(h.finalize())
    };

    if let Ok(existing) = std::fs::read(path) {
        let mut h = Sha256::new();
        h.update(&existing);
        if hex::encode(h.finalize()) == digest {
            tracing::debug!(path = %path.display(), "configuration unchanged");
            return Ok(false);
        }
    }

    let tmp = PathBuf::from(format!("{}.drover.tmp", path.display()));
    std::fs::write(&tmp, content).map_err(|e| io_err(&tmp, e))?;
    if let Err(e) = std::fs::rename(&tmp, path) {
        let _ = std::fs::remove_file(&tmp);
        return Err(io_err(path, e));
    }

    tracing::info!(path = %path.display(), "configuration written");
    Ok(true)
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> Result<(), ConfigError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
        .map_err(|e| io_err(path, e))
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> Result<(), ConfigError> {
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
