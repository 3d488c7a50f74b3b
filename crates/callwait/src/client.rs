//! Client-side call awaiter.

use std::task::{Context, Poll};

use futures::future::BoxFuture;
use http::{Request, Response};
use http_body::Body;
use tower::{Layer, Service};

use crate::context::AwaitContext;
use crate::track::{CloseGuard, TrackedBody};

/// Tower layer that counts client call closes against the context's armed
/// client latch.
///
/// Wrap it directly around the `Channel` so it sits below the generated
/// client, closest to the wire, and sees every close:
///
/// ```ignore
/// let svc = tower::ServiceBuilder::new()
///     .layer(ctx.client_layer())
///     .service(channel);
/// let mut client = EchoClient::new(svc);
/// ```
#[derive(Clone)]
pub struct ClientCallAwaitLayer {
    ctx: AwaitContext,
}

impl ClientCallAwaitLayer {
    pub fn new(ctx: AwaitContext) -> Self {
        Self { ctx }
    }
}

impl<S> Layer<S> for ClientCallAwaitLayer {
    type Service = ClientCallAwait<S>;

    fn layer(&self, inner: S) -> Self::Service {
        ClientCallAwait {
            inner,
            ctx: self.ctx.clone(),
        }
    }
}

/// Service produced by [`ClientCallAwaitLayer`].
///
/// A call is closed when its response body ends (status and trailers
/// received), when the transport fails the call, or when the caller abandons
/// it mid-flight. The response itself passes through untouched.
#[derive(Clone)]
pub struct ClientCallAwait<S> {
    inner: S,
    ctx: AwaitContext,
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for ClientCallAwait<S>
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
        // Captured before the call starts; later re-arming does not touch
        // calls already in flight.
        let mut guard = CloseGuard::armed(self.ctx.active_client());
        let fut = self.inner.call(req);
        Box::pin(async move {
            // A transport error or an abandoned call future both end the
            // call; the guard counts them if it goes out of scope still
            // armed.
            let response = fut.await?;
            Ok(response.map(|body| TrackedBody::new(body, guard.handoff())))
        })
    }
}
