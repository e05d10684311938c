//! Host-facing notification records and the delivery sink.

use serde::{Deserialize, Serialize};

use crate::types::DaemonState;

/// Host channel a notification is addressed to.
///
/// Every engine event produces one `Event` notification; neighbor-change
/// and key-exchange events additionally produce their specialized variant,
/// always published after the generic one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationChannel {
    Event,
    Neighbor,
    KeyExchange,
}

/// A structured event record delivered to the host notification sink.
///
/// `Event` and `Neighbor` attribute keys carry the `attr:` prefix to avoid
/// colliding with the fixed `name`/`action` fields; `KeyExchange`
/// attribute keys are unprefixed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub channel: NotificationChannel,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    pub attributes: Vec<(String, String)>,
}

/// Sink accepting supervisor output: notifications, state edges, and the
/// neighbor-list-changed signal.
///
/// Implementations must be cheap and non-blocking; they run inside the
/// supervisor's exclusion domain.
pub trait NotificationSink: Send + Sync {
    fn publish(&self, notification: Notification);

    /// Called exactly once per observable state edge.
    fn state_changed(&self, state: DaemonState);

    fn neighborhood_changed(&self);
}
