//! Preference-change routing.
//!
//! An ordered list of `(predicate, decision)` rules evaluated top-down
//! until one matches, so the policy stays declarative and testable apart
//! from the control task that executes it. Restart decisions drop one
//! level below where the changed feature activates, so re-raising through
//! the mapped level re-establishes it.

use drover_core::prefs::{pref_keys, PrefValue};
use drover_core::tables;
use drover_core::types::RunLevel;

/// Outcome of routing one preference change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteAction {
    /// Restart the daemon down to the given level, then restore.
    Restart(RunLevel),
    /// Bring the daemon fully up.
    Startup,
    /// Bring the daemon fully down.
    Shutdown,
    /// Re-apply log level and debug verbosity.
    ApplyLogging,
    /// Re-apply debug verbosity only.
    ApplyVerbosity,
    /// Recompute and re-apply the engine log file.
    ApplyLogFile,
    /// Regenerate and reload the configuration without a level change.
    ReloadConfiguration,
    /// Not a supervised preference.
    Ignore,
}

struct Rule {
    matches: fn(&str) -> bool,
    decide: fn(&str, Option<&PrefValue>) -> RouteAction,
}

const RULES: &[Rule] = &[
    Rule {
        matches: is_restart_mapped,
        decide: restart_below_mapped,
    },
    Rule {
        matches: is_master_switch,
        decide: toggle_daemon,
    },
    Rule {
        matches: is_interface_key,
        decide: restart_below_network,
    },
    Rule {
        matches: is_log_level_key,
        decide: apply_logging,
    },
    Rule {
        matches: is_verbosity_key,
        decide: apply_verbosity,
    },
    Rule {
        matches: is_log_file_key,
        decide: apply_log_file,
    },
    Rule {
        matches: tables::is_live_reload,
        decide: reload_configuration,
    },
];

/// Route one changed preference to the minimal action required.
pub fn route(key: &str, value: Option<&PrefValue>) -> RouteAction {
    for rule in RULES {
        if (rule.matches)(key) {
            return (rule.decide)(key, value);
        }
    }
    RouteAction::Ignore
}

// --- predicates ------------------------------------------------------------

fn is_restart_mapped(key: &str) -> bool {
    tables::restart_level(key).is_some()
}

fn is_master_switch(key: &str) -> bool {
    key == pref_keys::ENABLED
}

fn is_interface_key(key: &str) -> bool {
    key.starts_with(pref_keys::INTERFACE_PREFIX)
}

fn is_log_level_key(key: &str) -> bool {
    key.starts_with(pref_keys::LOG_LEVEL)
}

fn is_verbosity_key(key: &str) -> bool {
    key.starts_with(pref_keys::LOG_DEBUG_VERBOSITY)
}

fn is_log_file_key(key: &str) -> bool {
    key.starts_with(pref_keys::LOG_ENABLE_FILE)
}

// --- decisions -------------------------------------------------------------

fn restart_below_mapped(key: &str, _: Option<&PrefValue>) -> RouteAction {
    match tables::restart_level(key) {
        Some(level) => RouteAction::Restart(level.predecessor()),
        None => RouteAction::Ignore,
    }
}

fn toggle_daemon(_: &str, value: Option<&PrefValue>) -> RouteAction {
    if value.and_then(PrefValue::as_bool).unwrap_or(false) {
        RouteAction::Startup
    } else {
        RouteAction::Shutdown
    }
}

fn restart_below_network(_: &str, _: Option<&PrefValue>) -> RouteAction {
    RouteAction::Restart(tables::INTERFACE_RUN_LEVEL.predecessor())
}

fn apply_logging(_: &str, _: Option<&PrefValue>) -> RouteAction {
    RouteAction::ApplyLogging
}

fn apply_verbosity(_: &str, _: Option<&PrefValue>) -> RouteAction {
    RouteAction::ApplyVerbosity
}

fn apply_log_file(_: &str, _: Option<&PrefValue>) -> RouteAction {
    RouteAction::ApplyLogFile
}

fn reload_configuration(_: &str, _: Option<&PrefValue>) -> RouteAction {
    RouteAction::ReloadConfiguration
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
