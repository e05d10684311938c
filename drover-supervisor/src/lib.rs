//! Daemon lifecycle supervisor: run-level orchestration, event
//! translation, discovery control, and preference-change routing for a
//! wrapped DTN engine.
//!
//! The supervisor owns one control task per daemon instance. Commands and
//! engine callbacks are both drained there, so every mutation of shared
//! state happens in a single exclusion domain; see [`Supervisor`].

mod control;
pub mod discovery;
mod error;
pub mod events;
mod logging;
pub mod router;
mod watch;

pub use control::{signal_channel, RestartListener, SignalReceiver, SignalSender, Supervisor};
pub use discovery::{MulticastLock, UdpMulticastLock};
pub use error::SupervisorError;
pub use router::RouteAction;
pub use watch::DEBOUNCE_WINDOW;

/// Install a default `tracing` subscriber honoring `RUST_LOG`, for
/// embedders without their own subscriber. Safe to call more than once.
pub fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).with_target(false).try_init();
}
