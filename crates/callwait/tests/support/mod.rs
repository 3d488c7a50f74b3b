//! In-process Echo service and wiring helpers for the call-await tests.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::transport::{Channel, Server};
use tonic::{Request, Response, Status};
use tracing_subscriber::EnvFilter;

use callwait::AwaitContext;
use callwait::client::ClientCallAwait;
use callwait_proto::echo::echo_client::EchoClient;
use callwait_proto::echo::echo_server::{Echo, EchoServer};
use callwait_proto::echo::{EchoRequest, EchoResponse};

pub struct EchoSvc;

#[tonic::async_trait]
impl Echo for EchoSvc {
    async fn unary_echo(
        &self,
        request: Request<EchoRequest>,
    ) -> Result<Response<EchoResponse>, Status> {
        let req = request.into_inner();
        if req.delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(req.delay_ms)).await;
        }
        Ok(Response::new(EchoResponse {
            message: req.message,
        }))
    }
}

/// Spawn an Echo server wired with the context's server layer on an
/// ephemeral port. The server lives until the test runtime shuts down.
pub async fn spawn_echo_server(ctx: &AwaitContext) -> SocketAddr {
    init_tracing();
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind test listener");
    let addr = listener.local_addr().expect("listener addr");
    let layer = ctx.server_layer();
    tokio::spawn(async move {
        Server::builder()
            .layer(layer)
            .add_service(EchoServer::new(EchoSvc))
            .serve_with_incoming(TcpListenerStream::new(listener))
            .await
            .expect("echo server error");
    });
    addr
}

/// Client without the client layer, for exercising the server side alone.
pub async fn plain_client(addr: SocketAddr) -> EchoClient<Channel> {
    EchoClient::new(connect(addr).await)
}

/// Client whose channel is wrapped with the context's client layer.
pub async fn awaited_client(
    ctx: &AwaitContext,
    addr: SocketAddr,
) -> EchoClient<ClientCallAwait<Channel>> {
    let svc = tower::ServiceBuilder::new()
        .layer(ctx.client_layer())
        .service(connect(addr).await);
    EchoClient::new(svc)
}

async fn connect(addr: SocketAddr) -> Channel {
    Channel::from_shared(format!("http://{addr}"))
        .expect("channel uri")
        .connect()
        .await
        .expect("connect to echo server")
}

pub fn echo(message: &str) -> EchoRequest {
    EchoRequest {
        message: message.to_owned(),
        delay_ms: 0,
    }
}

pub fn slow_echo(message: &str, delay_ms: u64) -> EchoRequest {
    EchoRequest {
        message: message.to_owned(),
        delay_ms,
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .try_init();
}
