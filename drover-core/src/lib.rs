//! Drover core library: domain types, engine and host traits, preferences.
//!
//! Public API surface:
//! - [`types`]: run-levels, daemon state, newtypes and engine records
//! - [`engine`]: the [`Engine`] trait and its asynchronous signal records
//! - [`keys`]: peer key material and trust scoring
//! - [`prefs`]: [`PreferenceStore`] trait and the YAML-backed store
//! - [`tables`]: static preference-to-run-level routing tables
//! - [`notifications`]: host notification records and the sink trait
//! - [`error`]: [`PrefsError`]

pub mod engine;
pub mod error;
pub mod keys;
pub mod notifications;
pub mod prefs;
pub mod tables;
pub mod types;

pub use engine::{Engine, EngineError, EngineEvent, EngineSignal};
pub use error::PrefsError;
pub use keys::{trust_level, KeyExchangeProtocol, KeyFlags, KeyInfo};
pub use notifications::{Notification, NotificationChannel, NotificationSink};
pub use prefs::{PrefSnapshot, PrefValue, PreferenceStore, YamlPreferences};
pub use types::{
    DaemonState, EndpointId, EngineStats, EngineVersion, Neighbor, RunLevel, SessionId,
};
