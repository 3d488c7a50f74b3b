//! Generated gRPC bindings for the Echo test service.

pub mod echo {
    tonic::include_proto!("callwait.echo");
}
