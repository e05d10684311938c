//! Pure configuration rendering.
//!
//! `render` is a function of (preference snapshot, base directory) only;
//! no I/O, no clocks. Emission order is fixed so that identical snapshots
//! produce byte-identical documents; the order itself carries no meaning
//! to the engine but keeps documents diffable.

use std::path::Path;

use drover_core::prefs::{pref_keys, PrefSnapshot, PrefValue};

use crate::paths;

/// Render the engine configuration document for `prefs`.
pub fn render(prefs: &PrefSnapshot, base: &Path) -> String {
    let mut lines: Vec<String> = Vec::new();

    // Identity and routing.
    lines.push(format!("local_uri = {}", text(prefs, pref_keys::ENDPOINT_ID, paths::DEFAULT_ENDPOINT_ID)));
    lines.push(format!("routing = {}", text(prefs, pref_keys::ROUTING, "default")));
    lines.push("stats_traffic = yes".to_string());

    // Fixed operational limits.
    lines.push(format!("limit_lifetime = {}", paths::LIMIT_LIFETIME_SECS));
    lines.push(format!(
        "limit_predated_timestamp = {}",
        paths::LIMIT_PREDATED_TIMESTAMP_SECS
    ));
    lines.push(format!("limit_blocksize = {}", paths::LIMIT_BLOCKSIZE));
    lines.push(format!(
        "limit_foreign_blocksize = {}",
        paths::LIMIT_FOREIGN_BLOCKSIZE
    ));

    // Key material locations.
    lines.push(format!(
        "security_path = {}",
        paths::security_dir(base).display()
    ));
    lines.push(format!(
        "dh_params_path = {}",
        paths::dh_params_path(base).display()
    ));

    // Pre-shared-key authentication, only with non-empty key material.
    if text(prefs, pref_keys::SECURITY_MODE, "encrypt") == "bab" {
        let key = text(prefs, pref_keys::SECURITY_BAB_KEY, "");
        if !key.is_empty() {
            lines.push("security_level = 1".to_string());
            lines.push(format!(
                "security_bab_default_key = {}",
                paths::bab_key_path(base).display()
            ));
        }
    }

    // Time synchronization: off, reference (master), or client (slave).
    match text(prefs, pref_keys::TIMESYNC_MODE, "disabled").as_str() {
        "master" => {
            lines.push("time_reference = yes".to_string());
            lines.push("time_discovery_announcements = yes".to_string());
            lines.push("time_synchronize = no".to_string());
            lines.push("time_set_clock = no".to_string());
        }
        "slave" => {
            lines.push("time_reference = no".to_string());
            lines.push("time_discovery_announcements = yes".to_string());
            lines.push("time_synchronize = yes".to_string());
            lines.push("time_set_clock = no".to_string());
            lines.push("#time_sigma = 1.001".to_string());
            lines.push("#time_psi = 0.9".to_string());
            lines.push("#time_sync_level = 0.15".to_string());
        }
        _ => {}
    }

    lines.push("fragmentation = yes".to_string());
    lines.push(format!("discovery_address = {}", paths::DISCOVERY_ADDRESS));

    // Enabled interfaces: one transport binding each, plus the summary
    // list. Snapshot iteration is sorted, so the order is stable.
    let interfaces = enabled_interfaces(prefs);
    for iface in &interfaces {
        lines.push(format!("net_{iface}_type = tcp"));
        lines.push(format!("net_{iface}_interface = {iface}"));
        lines.push(format!("net_{iface}_port = {}", paths::TRANSPORT_PORT));
    }
    lines.push(format!("net_interfaces = {}", interfaces.join(" ")));

    // Static uplink contact, unless uplink is off entirely.
    let uplink_mode = text(prefs, pref_keys::UPLINK_MODE, "off");
    if uplink_mode != "off" {
        if uplink_mode == "wifi" {
            lines.push(format!("net_internet = {}", interfaces.join(" ")));
        }
        lines.push(format!("static1_address = {}", paths::UPLINK_ADDRESS));
        lines.push(format!("static1_port = {}", paths::UPLINK_PORT));
        lines.push(format!("static1_uri = {}", paths::UPLINK_ENDPOINT));
        lines.push(format!("static1_proto = {}", paths::UPLINK_PROTOCOL));
        lines.push("static1_immediately = yes".to_string());
        lines.push("static1_global = yes".to_string());
    }

    // Storage: scratch blob path for both disk modes, durable bundle
    // store plus persistent index only for disk-persistent.
    let storage_mode = text(prefs, pref_keys::STORAGE_MODE, "disk-persistent");
    if storage_mode == "disk" || storage_mode == "disk-persistent" {
        lines.push(format!("blob_path = {}", paths::blob_dir(base).display()));
    }
    if storage_mode == "disk-persistent" {
        lines.push(format!(
            "storage_path = {}",
            paths::bundles_dir(base).display()
        ));
        lines.push("use_persistent_bundlesets = yes".to_string());
    }

    lines.push("net_rebind = yes".to_string());

    let mut out = lines.join("\n");
    out.push('\n');
    out
}

fn text(prefs: &PrefSnapshot, key: &str, default: &str) -> String {
    prefs
        .get(key)
        .and_then(PrefValue::as_str)
        .unwrap_or(default)
        .to_string()
}

/// Interface names with an enabled `interface_<name>` flag, sorted.
fn enabled_interfaces(prefs: &PrefSnapshot) -> Vec<String> {
    prefs
        .iter()
        .filter(|(key, _)| key.starts_with(pref_keys::INTERFACE_PREFIX))
        .filter(|(_, value)| value.as_bool() == Some(true))
        .map(|(key, _)| key[pref_keys::INTERFACE_PREFIX.len()..].to_string())
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
