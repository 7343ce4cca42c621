use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio_stream::wrappers::TcpListenerStream;
use tokio_util::sync::CancellationToken;
use tonic::transport::Server;

use crate::config::ServerConfig;
use crate::grpc::status_service::StatusService;
use crate::nomad::{HttpSchedulerClient, SchedulerClient};
use crate::proto::cluster_status_server::ClusterStatusServer;
use crate::status::StatusAggregator;

pub struct GrpcServer {
    addr: SocketAddr,
    default_job: String,
    aggregator: StatusAggregator,
}

impl GrpcServer {
    /// Build a server whose aggregator talks to Nomad over HTTP.
    pub fn new(config: &ServerConfig) -> crate::error::Result<Self> {
        let client = HttpSchedulerClient::new(&config.client)?;
        Ok(Self::with_client(config, Arc::new(client)))
    }

    /// Build a server around any [`SchedulerClient`].
    pub fn with_client(config: &ServerConfig, client: Arc<dyn SchedulerClient>) -> Self {
        Self {
            addr: config.listen_addr,
            default_job: config.default_job.clone(),
            aggregator: StatusAggregator::new(client, config.concurrency),
        }
    }

    fn service(&self) -> ClusterStatusServer<StatusService> {
        ClusterStatusServer::new(StatusService::new(
            self.aggregator.clone(),
            self.default_job.clone(),
        ))
    }

    /// Serve on the configured address until `shutdown` is cancelled.
    pub async fn run(self, shutdown: CancellationToken) -> Result<(), tonic::transport::Error> {
        tracing::info!(addr = %self.addr, default_job = %self.default_job, "Starting gRPC server");

        Server::builder()
            .add_service(self.service())
            .serve_with_shutdown(self.addr, shutdown.cancelled_owned())
            .await
    }

    /// Serve on an already bound listener until `shutdown` is cancelled.
    pub async fn run_with_listener(
        self,
        listener: TcpListener,
        shutdown: CancellationToken,
    ) -> Result<(), tonic::transport::Error> {
        tracing::info!(addr = ?listener.local_addr().ok(), default_job = %self.default_job, "Starting gRPC server");

        Server::builder()
            .add_service(self.service())
            .serve_with_incoming_shutdown(TcpListenerStream::new(listener), shutdown.cancelled_owned())
            .await
    }
}
