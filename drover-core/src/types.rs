//! Domain types for the drover supervisor.
//!
//! Run-levels are totally ordered; the derived `Ord` follows declaration
//! order, so the variants must stay sorted from lowest to highest stage.

use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Run-levels
// ---------------------------------------------------------------------------

/// Ordered operational stages the supervised daemon passes through.
///
/// Each level enables a superset of the functionality of the one below it.
/// The engine sequences intermediate levels itself when asked to move more
/// than one step.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum RunLevel {
    Zero,
    Api,
    Core,
    Network,
    RoutingExtensions,
}

impl RunLevel {
    /// All run-levels, lowest first.
    pub fn all() -> &'static [RunLevel] {
        &[
            RunLevel::Zero,
            RunLevel::Api,
            RunLevel::Core,
            RunLevel::Network,
            RunLevel::RoutingExtensions,
        ]
    }

    /// The level directly below this one; `Zero` is its own predecessor.
    pub fn predecessor(self) -> RunLevel {
        match self {
            RunLevel::Zero | RunLevel::Api => RunLevel::Zero,
            RunLevel::Core => RunLevel::Api,
            RunLevel::Network => RunLevel::Core,
            RunLevel::RoutingExtensions => RunLevel::Network,
        }
    }
}

impl fmt::Display for RunLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunLevel::Zero => write!(f, "zero"),
            RunLevel::Api => write!(f, "api"),
            RunLevel::Core => write!(f, "core"),
            RunLevel::Network => write!(f, "network"),
            RunLevel::RoutingExtensions => write!(f, "routing_extensions"),
        }
    }
}

// ---------------------------------------------------------------------------
// Daemon state
// ---------------------------------------------------------------------------

/// Observable daemon state derived from run-level edges.
///
/// `Online` when the engine reaches `RoutingExtensions`, `Offline` when it
/// reaches `Api`; no other level changes this state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DaemonState {
    #[default]
    Offline,
    Online,
}

impl fmt::Display for DaemonState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DaemonState::Offline => write!(f, "offline"),
            DaemonState::Online => write!(f, "online"),
        }
    }
}

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// A strongly-typed singleton endpoint identifier (`dtn://...`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EndpointId(pub String);

impl fmt::Display for EndpointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for EndpointId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for EndpointId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// An ephemeral key-exchange session number assigned by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub u32);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<u32> for SessionId {
    fn from(n: u32) -> Self {
        Self(n)
    }
}

// ---------------------------------------------------------------------------
// Engine records
// ---------------------------------------------------------------------------

/// Engine version pair as reported by the wrapped daemon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct EngineVersion {
    pub version: String,
    pub build: String,
}

/// Aggregate engine statistics snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct EngineStats {
    pub uptime_secs: u64,
    pub neighbors: u64,
    pub storage_size: u64,
    pub bundles_stored: u64,
    pub bundles_received: u64,
    pub bundles_transmitted: u64,
    pub bundles_generated: u64,
    /// Clock offset against the time reference, in milliseconds.
    pub time_offset_ms: i64,
}

/// A neighbor resolved to its extended info record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Neighbor {
    pub endpoint: EndpointId,
    /// Convergence-layer node type as reported by the engine.
    pub node_type: String,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
