//! Library surface for the `karavi-gateway` binary: configuration,
//! telemetry, shared application state, and the HTTP/gRPC ingress modules
//! (`spec.md` §1-§6).

pub mod auth;
pub mod config;
pub mod grpc;
pub mod reject;
pub mod router;
pub mod state;
pub mod telemetry;
pub mod volumes;
