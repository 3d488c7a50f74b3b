//! Test utilities for awaiting gRPC call closes on tonic/tower stacks.
//!
//! gRPC calls are closed asynchronously: by the time a client future
//! resolves, the server side may still be flushing its final status, and a
//! cancelled call closes with no response at all. `callwait` lets an
//! integration test wait until a known number of calls have actually closed,
//! on either side of the wire, by installing tower layers that decrement a
//! shared countdown latch at each call's terminal event.
//!
//! Build an [`AwaitContext`], install its layers when wiring the server and
//! channel under test, arm a latch for the number of closes to expect, run
//! the calls, then await the latch:
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use callwait::AwaitContext;
//!
//! # async fn demo() -> Result<(), tokio::time::error::Elapsed> {
//! let ctx = AwaitContext::new();
//! // Server wiring: tonic::transport::Server::builder().layer(ctx.server_layer())
//! // Client wiring: tower::ServiceBuilder::new().layer(ctx.client_layer()).service(channel)
//!
//! let closed = ctx.arm_server(2);
//! // ...issue the two calls under test...
//! tokio::time::timeout(Duration::from_secs(5), closed.wait()).await?;
//! # Ok(())
//! # }
//! ```
//!
//! Arm before the calls start: each layer captures the active latch at call
//! start, so earlier calls never decrement a later latch.

pub mod client;
pub mod context;
pub mod latch;
pub mod server;

mod track;

pub use context::AwaitContext;
pub use latch::CallLatch;
pub use track::TrackedBody;
