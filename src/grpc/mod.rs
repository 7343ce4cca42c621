pub mod server;
pub mod status_service;

pub use server::GrpcServer;
pub use status_service::StatusService;
