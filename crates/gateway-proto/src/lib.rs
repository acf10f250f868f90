//! Generated administrative gRPC bindings (`spec.md` §6, "gRPC surface").

tonic::include_proto!("karavi.gateway.v1");
