//! Server-side call awaiter.

use std::task::{Context, Poll};

use futures::future::BoxFuture;
use http::{Request, Response};
use http_body::Body;
use tower::{Layer, Service};

use crate::context::AwaitContext;
use crate::track::{CloseGuard, TrackedBody};

/// Tower layer that counts server call closes against the context's armed
/// server latch.
///
/// Install via `tonic::transport::Server::builder().layer(..)`, ahead of any
/// layer that might short-circuit a call, so the close observed here is the
/// real one. Calls seen while no latch is armed (or the armed latch is
/// already exhausted) pass through unobserved.
#[derive(Clone)]
pub struct ServerCallAwaitLayer {
    ctx: AwaitContext,
}

impl ServerCallAwaitLayer {
    pub fn new(ctx: AwaitContext) -> Self {
        Self { ctx }
    }
}

impl<S> Layer<S> for ServerCallAwaitLayer {
    type Service = ServerCallAwait<S>;

    fn layer(&self, inner: S) -> Self::Service {
        ServerCallAwait {
            inner,
            ctx: self.ctx.clone(),
        }
    }
}

/// Service produced by [`ServerCallAwaitLayer`].
///
/// A call is closed when its response body ends (the server sent its final
/// status) or when the call is dropped mid-flight (the client cancelled).
/// The call's outcome passes through untouched either way.
#[derive(Clone)]
pub struct ServerCallAwait<S> {
    inner: S,
    ctx: AwaitContext,
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for ServerCallAwait<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>>,
    S::Future: Send + 'static,
    S::Error: Send + 'static,
    ResBody: Body + Send + 'static,
{
    type Response = Response<TrackedBody<ResBody>>;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<ReqBody>) -> Self::Future {
        // The latch reference is captured here, at call start: calls already
        // in flight are unaffected by later re-arming.
        let mut guard = CloseGuard::armed(self.ctx.active_server());
        let fut = self.inner.call(req);
        Box::pin(async move {
            // Dropping this future before it resolves is a cancelled call;
            // the guard counts it on the way out.
            let response = fut.await?;
            Ok(response.map(|body| TrackedBody::new(body, guard.handoff())))
        })
    }
}
