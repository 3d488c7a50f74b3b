//! Close-observation decorators shared by the client and server layers.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use http_body::{Body, Frame, SizeHint};

use crate::latch::CallLatch;

/// Fires a latch decrement at a call's terminal event, exactly once.
///
/// Armed with the latch captured at call start, or disarmed when none was
/// active. [`complete`](Self::complete) fires it at a known terminal point;
/// `Drop` fires it if the call is abandoned first. The take-once `Option`
/// rules out a double decrement.
#[derive(Default)]
pub(crate) struct CloseGuard {
    latch: Option<Arc<CallLatch>>,
}

impl CloseGuard {
    pub(crate) fn armed(latch: Option<Arc<CallLatch>>) -> Self {
        Self { latch }
    }

    /// The call reached its terminal event; count it.
    pub(crate) fn complete(&mut self) {
        if let Some(latch) = self.latch.take() {
            latch.count_down();
        }
    }

    /// Move the armed latch into a new guard, leaving this one disarmed.
    ///
    /// Hands responsibility for the close from the call future over to the
    /// response body.
    pub(crate) fn handoff(&mut self) -> Self {
        Self {
            latch: self.latch.take(),
        }
    }
}

impl Drop for CloseGuard {
    fn drop(&mut self) {
        self.complete();
    }
}

/// Response body wrapper that counts the call closed when the body ends.
///
/// gRPC carries the final status in the trailers, so end-of-stream on the
/// response body is the close event on both sides of the wire. A body
/// dropped before its end counts too, via the guard.
pub struct TrackedBody<B> {
    inner: Pin<Box<B>>,
    guard: CloseGuard,
}

impl<B> TrackedBody<B> {
    pub(crate) fn new(inner: B, guard: CloseGuard) -> Self {
        Self {
            inner: Box::pin(inner),
            guard,
        }
    }
}

impl<B: Body> Body for TrackedBody<B> {
    type Data = B::Data;
    type Error = B::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.get_mut();
        match this.inner.as_mut().poll_frame(cx) {
            Poll::Ready(None) => {
                this.guard.complete();
                Poll::Ready(None)
            }
            other => other,
        }
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}
