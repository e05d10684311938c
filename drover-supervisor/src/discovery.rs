//! Neighbor discovery control and the exclusive multicast-receive lease.
//!
//! The controller tracks two flags: `desired` (the user wants discovery)
//! and `active` (discovery currently runs). A run-level drop deactivates
//! discovery inside the engine without touching `desired`, so the
//! supervisor can restore the user's choice when the networking level is
//! reached again.

use std::io;
use std::net::{Ipv4Addr, UdpSocket};
use std::sync::Mutex;

use drover_core::engine::Engine;

/// IPv4 discovery group; must match the rendered `discovery_address`.
const DISCOVERY_GROUP_V4: Ipv4Addr = Ipv4Addr::new(224, 0, 0, 142);

/// Exclusive multicast-receive resource held while discovery is active.
///
/// `acquire`/`release` are called at most once per activation cycle; the
/// controller guarantees the pairing.
pub trait MulticastLock: Send + Sync {
    fn acquire(&self) -> io::Result<()>;

    fn release(&self);
}

/// Keeps a UDP socket joined to the discovery group so the host keeps
/// delivering multicast frames while discovery is active.
#[derive(Debug, Default)]
pub struct UdpMulticastLock {
    socket: Mutex<Option<UdpSocket>>,
}

impl UdpMulticastLock {
    pub fn new() -> Self {
        Self::default()
    }
}

impl MulticastLock for UdpMulticastLock {
    fn acquire(&self) -> io::Result<()> {
        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0))?;
        socket.join_multicast_v4(&DISCOVERY_GROUP_V4, &Ipv4Addr::UNSPECIFIED)?;
        *self.socket.lock().expect("multicast lock poisoned") = Some(socket);
        Ok(())
    }

    fn release(&self) {
        if let Some(socket) = self.socket.lock().expect("multicast lock poisoned").take() {
            let _ = socket.leave_multicast_v4(&DISCOVERY_GROUP_V4, &Ipv4Addr::UNSPECIFIED);
        }
    }
}

// ---------------------------------------------------------------------------
// Controller
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub(crate) struct DiscoveryController {
    desired: bool,
    active: bool,
    held: bool,
}

impl DiscoveryController {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Explicit start request; no-op while already active.
    pub(crate) fn start(&mut self, engine: &dyn Engine, lock: &dyn MulticastLock) {
        if self.active {
            return;
        }
        self.desired = true;
        self.acquire(lock);
        engine.start_discovery();
        self.active = true;
        tracing::info!("neighbor discovery started");
    }

    /// Explicit stop request; no-op while already inactive.
    pub(crate) fn stop(&mut self, engine: &dyn Engine, lock: &dyn MulticastLock) {
        if !self.active {
            return;
        }
        self.desired = false;
        engine.stop_discovery();
        self.release(lock);
        self.active = false;
        tracing::info!("neighbor discovery stopped");
    }

    /// Called whenever the engine (re)reaches the networking level.
    ///
    /// The engine loses its discovery state on a run-level drop, so the
    /// decision is re-asserted unconditionally: resume when desired,
    /// otherwise keep discovery stopped.
    pub(crate) fn on_network_level(&mut self, engine: &dyn Engine, lock: &dyn MulticastLock) {
        if self.desired {
            self.acquire(lock);
            engine.start_discovery();
            self.active = true;
        } else {
            engine.stop_discovery();
            self.release(lock);
            self.active = false;
        }
    }

    /// Supervisor teardown: the lease must not outlive the daemon.
    pub(crate) fn teardown(&mut self, lock: &dyn MulticastLock) {
        self.release(lock);
        self.active = false;
    }

    fn acquire(&mut self, lock: &dyn MulticastLock) {
        if self.held {
            return;
        }
        match lock.acquire() {
            Ok(()) => self.held = true,
            Err(err) => {
                // Discovery still runs inside the engine; only the host-side
                // multicast delivery may be unreliable.
                tracing::warn!(error = %err, "multicast lease acquisition failed");
            }
        }
    }

    fn release(&mut self, lock: &dyn MulticastLock) {
        if !self.held {
            return;
        }
        lock.release();
        self.held = false;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
