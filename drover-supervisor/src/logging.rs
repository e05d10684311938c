//! Live application of logging preferences to the engine.

use std::path::Path;

use chrono::Utc;

use drover_core::engine::Engine;
use drover_core::prefs::{pref_keys, PreferenceStore};

/// Logging domain tag the engine expects.
pub(crate) const LOG_TAG: &str = "Core";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct LogSettings {
    pub level: i32,
    pub verbosity: i32,
    pub file_enabled: bool,
}

/// Read the effective log settings from the preference store.
///
/// Debug verbosity is forced to zero whenever the log level is below 3;
/// unparseable numbers read as zero.
pub(crate) fn settings(prefs: &dyn PreferenceStore) -> LogSettings {
    let level = numeric(prefs, pref_keys::LOG_LEVEL);
    let mut verbosity = numeric(prefs, pref_keys::LOG_DEBUG_VERBOSITY);
    if level < 3 {
        verbosity = 0;
    }
    LogSettings {
        level,
        verbosity,
        file_enabled: prefs.get_bool(pref_keys::LOG_ENABLE_FILE).unwrap_or(false),
    }
}

/// Apply level and verbosity to the engine.
pub(crate) fn apply_logging(engine: &dyn Engine, settings: &LogSettings) {
    engine.set_logging(LOG_TAG, settings.level);
    engine.set_debug_verbosity(settings.verbosity);
}

/// Point the engine at a fresh timestamped log file, or disable file
/// logging entirely.
pub(crate) fn apply_log_file(engine: &dyn Engine, base: &Path, settings: &LogSettings) {
    if !settings.file_enabled {
        engine.set_log_file(None, 0);
        return;
    }
    let dir = drover_config::paths::logs_dir(base);
    if let Err(err) = std::fs::create_dir_all(&dir) {
        tracing::warn!(
            path = %dir.display(),
            error = %err,
            "cannot create log directory; file logging disabled"
        );
        engine.set_log_file(None, 0);
        return;
    }
    let path = drover_config::paths::log_file_path(base, Utc::now());
    engine.set_log_file(Some(&path), settings.level);
}

fn numeric(prefs: &dyn PreferenceStore, key: &str) -> i32 {
    prefs
        .get_string(key)
        .and_then(|raw| raw.parse().ok())
        .unwrap_or(0)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use drover_core::YamlPreferences;
    use tempfile::TempDir;

    fn store(entries: &[(&str, &str)]) -> (TempDir, YamlPreferences) {
        let dir = TempDir::new().expect("tempdir");
        let prefs = YamlPreferences::load_at(dir.path().join("p.yaml")).expect("load");
        for (key, value) in entries {
            prefs.set(key, *value).expect("set");
        }
        (dir, prefs)
    }

    #[test]
    fn verbosity_survives_at_debug_capable_levels() {
        let (_dir, prefs) = store(&[("log_options", "4"), ("log_debug_verbosity", "2")]);
        let s = settings(&prefs);
        assert_eq!(s.level, 4);
        assert_eq!(s.verbosity, 2);
    }

    #[test]
    fn verbosity_forced_to_zero_below_level_three() {
        let (_dir, prefs) = store(&[("log_options", "2"), ("log_debug_verbosity", "2")]);
        let s = settings(&prefs);
        assert_eq!(s.level, 2);
        assert_eq!(s.verbosity, 0);
    }

    #[test]
    fn unparseable_numbers_read_as_zero() {
        let (_dir, prefs) = store(&[("log_options", "loud"), ("log_debug_verbosity", "-")]);
        let s = settings(&prefs);
        assert_eq!(s.level, 0);
        assert_eq!(s.verbosity, 0);
        assert!(!s.file_enabled);
    }
}
