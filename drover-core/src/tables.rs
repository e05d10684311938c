//! Static preference-to-run-level routing tables.
//!
//! Process-wide immutable lookup data, declared as plain consts. The
//! restart map and the live-reload set are disjoint by construction; a key
//! belongs to exactly one of them or to neither.

use crate::prefs::pref_keys;
use crate::types::RunLevel;

/// Preference keys whose change forces a leveled daemon restart, paired
/// with the run-level at which the affected feature activates.
pub const RESTART_MAP: &[(&str, RunLevel)] = &[
    (pref_keys::ENDPOINT_ID, RunLevel::Core),
    (pref_keys::ROUTING, RunLevel::RoutingExtensions),
    (pref_keys::TIMESYNC_MODE, RunLevel::Api),
    (pref_keys::STORAGE_MODE, RunLevel::Core),
    (pref_keys::UPLINK_MODE, RunLevel::Network),
];

/// Run-level behind the `interface_` key family (matched by prefix, not
/// listed in [`RESTART_MAP`]).
pub const INTERFACE_RUN_LEVEL: RunLevel = RunLevel::Network;

/// Preference keys applied live, without any run-level change.
pub const LIVE_RELOAD_KEYS: &[&str] = &[
    pref_keys::SECURITY_MODE,
    pref_keys::SECURITY_BAB_KEY,
    pref_keys::LOG_LEVEL,
    pref_keys::LOG_DEBUG_VERBOSITY,
    pref_keys::LOG_ENABLE_FILE,
];

/// The run-level at which the feature behind `key` activates, if `key` is
/// restart-mapped.
pub fn restart_level(key: &str) -> Option<RunLevel> {
    RESTART_MAP
        .iter()
        .find(|(mapped, _)| *mapped == key)
        .map(|(_, level)| *level)
}

/// Whether `key` is applied without a run-level change.
pub fn is_live_reload(key: &str) -> bool {
    LIVE_RELOAD_KEYS.contains(&key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn restart_map_holds_expected_levels() {
        assert_eq!(restart_level("endpoint_id"), Some(RunLevel::Core));
        assert_eq!(restart_level("routing"), Some(RunLevel::RoutingExtensions));
        assert_eq!(restart_level("timesync_mode"), Some(RunLevel::Api));
        assert_eq!(restart_level("storage_mode"), Some(RunLevel::Core));
        assert_eq!(restart_level("uplink_mode"), Some(RunLevel::Network));
        assert_eq!(restart_level("no_such_key"), None);
    }

    #[test]
    fn live_reload_keys_are_disjoint_from_restart_map() {
        for key in LIVE_RELOAD_KEYS {
            assert!(
                restart_level(key).is_none(),
                "{key} must not appear in both tables"
            );
        }
    }

    #[test]
    fn interface_family_targets_network_level() {
        assert_eq!(INTERFACE_RUN_LEVEL, RunLevel::Network);
    }
}
