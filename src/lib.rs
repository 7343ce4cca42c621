pub mod config;
pub mod error;
pub mod grpc;
pub mod nomad;
pub mod shutdown;
pub mod status;

// Re-export generated protobuf types
pub mod proto {
    tonic::include_proto!("status");
}
