use std::pin::Pin;

use futures::StreamExt;
use tokio_stream::wrappers::ReceiverStream;
use tonic::{Request, Response, Status};

use crate::proto::cluster_status_server::ClusterStatus;
use crate::proto::host_reply::HostStatus as ProtoHostStatus;
use crate::proto::{HostReply, HostsRequest};
use crate::status::{HostReport, HostStatus, StatusAggregator};

/// gRPC service streaming the per-host status of a job.
pub struct StatusService {
    aggregator: StatusAggregator,
    default_job: String,
}

impl StatusService {
    pub fn new(aggregator: StatusAggregator, default_job: impl Into<String>) -> Self {
        Self {
            aggregator,
            default_job: default_job.into(),
        }
    }
}

type HostStream = Pin<Box<dyn tokio_stream::Stream<Item = Result<HostReply, Status>> + Send>>;

#[tonic::async_trait]
impl ClusterStatus for StatusService {
    type ListHostsStream = HostStream;

    async fn list_hosts(
        &self,
        request: Request<HostsRequest>,
    ) -> Result<Response<Self::ListHostsStream>, Status> {
        let req = request.into_inner();
        let job_name = match req.job_name.trim() {
            "" => self.default_job.clone(),
            name => name.to_string(),
        };

        let mut reports = self.aggregator.resolve_all(&job_name).await.map_err(|e| {
            tracing::warn!(job = %job_name, error = %e, "Cannot resolve host statuses");
            Status::from(e)
        })?;

        let (tx, rx) = tokio::sync::mpsc::channel(32);

        tokio::spawn(async move {
            loop {
                let report = tokio::select! {
                    biased;
                    _ = tx.closed() => {
                        // Client went away; dropping `reports` abandons pending lookups.
                        tracing::debug!(job = %job_name, "Status stream cancelled by client");
                        break;
                    }
                    next = reports.next() => match next {
                        Some(report) => report,
                        None => break,
                    },
                };

                if tx.send(Ok(report_to_proto(report))).await.is_err() {
                    break;
                }
            }
        });

        let stream = ReceiverStream::new(rx);
        Ok(Response::new(Box::pin(stream) as Self::ListHostsStream))
    }
}

pub fn report_to_proto(report: HostReport) -> HostReply {
    match report.outcome {
        Ok(status) => HostReply {
            hostname: report.hostname,
            status: status_to_proto(status) as i32,
            error: String::new(),
        },
        Err(e) => HostReply {
            hostname: report.hostname,
            status: ProtoHostStatus::Started as i32,
            error: e.to_string(),
        },
    }
}

pub fn status_to_proto(status: HostStatus) -> ProtoHostStatus {
    match status {
        HostStatus::Started => ProtoHostStatus::Started,
        HostStatus::Stopped => ProtoHostStatus::Stopped,
        HostStatus::Pending => ProtoHostStatus::Pending,
        HostStatus::Mixed => ProtoHostStatus::Mixed,
    }
}

pub fn status_from_proto(status: i32) -> Option<HostStatus> {
    match ProtoHostStatus::try_from(status) {
        Ok(ProtoHostStatus::Started) => Some(HostStatus::Started),
        Ok(ProtoHostStatus::Stopped) => Some(HostStatus::Stopped),
        Ok(ProtoHostStatus::Pending) => Some(HostStatus::Pending),
        Ok(ProtoHostStatus::Mixed) => Some(HostStatus::Mixed),
        Err(_) => None,
    }
}
