//! Engine event translation.
//!
//! Every engine event becomes one generic notification. Neighbor-change
//! and key-exchange events additionally produce a specialized
//! notification, always published after the generic one. Translation is
//! pure; the control task performs the publishing.

use drover_core::engine::EngineEvent;
use drover_core::notifications::{Notification, NotificationChannel};

/// Event name signalling a neighbor appearing or disappearing.
pub const NEIGHBOR_EVENT: &str = "NodeEvent";
/// Event name carrying key-exchange protocol rounds.
pub const KEY_EXCHANGE_EVENT: &str = "KeyExchangeEvent";

/// Prefix applied to generic and neighbor attribute keys so they cannot
/// collide with the fixed `name`/`action` fields.
const ATTR_PREFIX: &str = "attr:";
const ATTR_SEPARATOR: &str = ": ";

/// Result of translating one engine event.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Translated {
    /// Notifications in publish order: generic first, specialized second.
    pub notifications: Vec<Notification>,
    /// Whether the neighbor-list-changed signal must fire afterwards.
    pub neighborhood_changed: bool,
}

/// Translate one engine event into its notification set.
pub fn translate(event: &EngineEvent) -> Translated {
    let action = (!event.action.is_empty()).then(|| event.action.clone());

    // Attribute lines without the separator are dropped individually.
    let attributes: Vec<(String, String)> = event
        .attributes
        .iter()
        .filter_map(|line| line.split_once(ATTR_SEPARATOR))
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect();

    let prefixed: Vec<(String, String)> = attributes
        .iter()
        .map(|(key, value)| (format!("{ATTR_PREFIX}{key}"), value.clone()))
        .collect();

    let mut translated = Translated {
        notifications: vec![Notification {
            channel: NotificationChannel::Event,
            name: event.name.clone(),
            action: action.clone(),
            attributes: prefixed.clone(),
        }],
        neighborhood_changed: false,
    };

    match event.name.as_str() {
        NEIGHBOR_EVENT => {
            translated.notifications.push(Notification {
                channel: NotificationChannel::Neighbor,
                name: event.name.clone(),
                action,
                attributes: prefixed,
            });
            translated.neighborhood_changed = true;
        }
        KEY_EXCHANGE_EVENT => {
            translated.notifications.push(Notification {
                channel: NotificationChannel::KeyExchange,
                name: event.name.clone(),
                action,
                attributes,
            });
        }
        _ => {}
    }

    translated
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
