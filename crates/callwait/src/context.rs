//! Per-test registry of the latches the call-await layers decrement.

use std::sync::{Arc, Mutex};

use crate::client::ClientCallAwaitLayer;
use crate::latch::CallLatch;
use crate::server::ServerCallAwaitLayer;

/// Shared registry holding the active [`CallLatch`] for each side of the
/// wire.
///
/// One context per test (or per server/channel pair under test). Cloning is
/// cheap and every clone sees the same slots, so the context can be handed
/// to the server wiring, the channel wiring, and the test body
/// independently.
///
/// Arm before starting the calls to observe: each layer captures the active
/// latch when a call starts, so calls already in flight keep the latch they
/// saw at call start and re-arming never affects them.
#[derive(Clone, Default)]
pub struct AwaitContext {
    slots: Arc<Slots>,
}

#[derive(Default)]
struct Slots {
    server: Mutex<Option<Arc<CallLatch>>>,
    client: Mutex<Option<Arc<CallLatch>>>,
}

impl AwaitContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm a fresh latch for the next `count` server call closes, replacing
    /// any previously armed server latch. Returns the latch to wait on.
    pub fn arm_server(&self, count: usize) -> Arc<CallLatch> {
        let latch = Arc::new(CallLatch::new(count));
        *self.slots.server.lock().unwrap() = Some(Arc::clone(&latch));
        tracing::debug!(count, side = "server", "armed call latch");
        latch
    }

    /// Arm a fresh latch for the next `count` client call closes, replacing
    /// any previously armed client latch. Returns the latch to wait on.
    pub fn arm_client(&self, count: usize) -> Arc<CallLatch> {
        let latch = Arc::new(CallLatch::new(count));
        *self.slots.client.lock().unwrap() = Some(Arc::clone(&latch));
        tracing::debug!(count, side = "client", "armed call latch");
        latch
    }

    /// Arm one shared latch for `count` matched server+client call pairs.
    ///
    /// The latch starts at `2 * count` and is installed on both sides, so a
    /// single wait covers both closes of every pair.
    pub fn arm_both(&self, count: usize) -> Arc<CallLatch> {
        let latch = Arc::new(CallLatch::new(count * 2));
        *self.slots.server.lock().unwrap() = Some(Arc::clone(&latch));
        *self.slots.client.lock().unwrap() = Some(Arc::clone(&latch));
        tracing::debug!(count, side = "both", "armed call latch");
        latch
    }

    /// Layer for `tonic::transport::Server::builder().layer(..)`.
    ///
    /// Add it ahead of other layers so it observes the true terminal event
    /// of each call.
    pub fn server_layer(&self) -> ServerCallAwaitLayer {
        ServerCallAwaitLayer::new(self.clone())
    }

    /// Layer to wrap directly around the `Channel`, below the generated
    /// client, so every close is observed next to the wire.
    pub fn client_layer(&self) -> ClientCallAwaitLayer {
        ClientCallAwaitLayer::new(self.clone())
    }

    /// Active, non-exhausted server latch, read once at call start.
    pub(crate) fn active_server(&self) -> Option<Arc<CallLatch>> {
        Self::active(&self.slots.server)
    }

    /// Active, non-exhausted client latch, read once at call start.
    pub(crate) fn active_client(&self) -> Option<Arc<CallLatch>> {
        Self::active(&self.slots.client)
    }

    fn active(slot: &Mutex<Option<Arc<CallLatch>>>) -> Option<Arc<CallLatch>> {
        slot.lock()
            .unwrap()
            .as_ref()
            .filter(|latch| latch.count() > 0)
            .cloned()
    }
}
