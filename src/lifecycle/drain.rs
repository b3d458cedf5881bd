//! Drain state shared between the request path and the shutdown coordinator.
//!
//! # Responsibilities
//! - Flip the process into draining mode exactly once.
//! - Count requests currently executing so shutdown can wait for them.
//! - Let the coordinator block until the count reaches zero, bounded by a
//!   deadline.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

/// Shared drain flag plus in-flight request counter.
///
/// The middleware stack increments the counter for every admitted request
/// and rejects new work once draining starts. The shutdown coordinator
/// waits on the counter before closing resources.
#[derive(Debug, Default)]
pub struct DrainState {
    draining: AtomicBool,
    in_flight: AtomicU64,
}

impl DrainState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enter draining mode. Idempotent; only the first call logs.
    pub fn begin_drain(&self) {
        if !self.draining.swap(true, Ordering::SeqCst) {
            tracing::info!(
                in_flight = self.in_flight(),
                "Draining started, rejecting new requests"
            );
        }
    }

    pub fn is_draining(&self) -> bool {
        self.draining.load(Ordering::SeqCst)
    }

    /// Record an admitted request. The returned guard decrements the
    /// counter when dropped, whichever way the request ends.
    pub fn track(self: &Arc<Self>) -> InFlightGuard {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        InFlightGuard {
            state: Arc::clone(self),
        }
    }

    pub fn in_flight(&self) -> u64 {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Wait until no requests are executing or `deadline` passes.
    /// Returns `true` when the counter reached zero in time.
    pub async fn wait_idle(&self, deadline: Instant) -> bool {
        while self.in_flight() > 0 {
            if Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        true
    }
}

/// Guard covering one in-flight request.
#[derive(Debug)]
pub struct InFlightGuard {
    state: Arc<DrainState>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.state.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}
