use std::sync::Arc;

use futures::stream::{self, BoxStream, StreamExt};

use crate::error::{NomadError, Result};
use crate::nomad::{Host, Job, SchedulerClient};
use crate::status::resolver::{resolve, HostStatus};

/// Resolution outcome for one host. A failed lookup only affects its own host.
#[derive(Debug)]
pub struct HostReport {
    pub hostname: String,
    pub outcome: Result<HostStatus>,
}

/// Fans status resolution out over every host of the cluster.
#[derive(Clone)]
pub struct StatusAggregator {
    client: Arc<dyn SchedulerClient>,
    concurrency: usize,
}

impl StatusAggregator {
    pub fn new(client: Arc<dyn SchedulerClient>, concurrency: usize) -> Self {
        Self {
            client,
            concurrency: concurrency.max(1),
        }
    }

    pub fn client(&self) -> &Arc<dyn SchedulerClient> {
        &self.client
    }

    /// Resolve `job_name` on every host.
    ///
    /// Hosts and the job are fetched up front; failing to list hosts, or a job
    /// lookup failing for any reason other than absence, fails the whole call.
    /// The returned stream yields one report per host in host-list order while
    /// up to `concurrency` allocation lookups run at once. Dropping the stream
    /// abandons in-flight lookups and starts no new ones.
    pub async fn resolve_all(&self, job_name: &str) -> Result<BoxStream<'static, HostReport>> {
        let hosts = self.client.list_hosts().await?;

        let job = match self.client.find_job(job_name).await {
            Ok(job) => Some(Arc::new(job)),
            Err(e) if e.is_not_found() => {
                tracing::info!(job = job_name, "Job not registered, every host is stopped");
                None
            }
            Err(e) => return Err(e),
        };

        tracing::debug!(
            job = job_name,
            hosts = hosts.len(),
            concurrency = self.concurrency,
            "Resolving host statuses"
        );

        let client = self.client.clone();
        let reports = stream::iter(hosts)
            .map(move |host| {
                let client = client.clone();
                let job = job.clone();
                async move { resolve_host(client.as_ref(), host, job.as_deref()).await }
            })
            .buffered(self.concurrency);

        Ok(reports.boxed())
    }

    /// Convenience wrapper collecting every report.
    pub async fn resolve_all_collected(&self, job_name: &str) -> Result<Vec<HostReport>> {
        Ok(self.resolve_all(job_name).await?.collect().await)
    }
}

async fn resolve_host(client: &dyn SchedulerClient, host: Host, job: Option<&Job>) -> HostReport {
    let outcome = match job {
        // No allocation can change the verdict for an unknown job.
        None => Ok(resolve(&host, None, None)),
        Some(job) => match client.find_allocation(job, &host).await {
            Ok(alloc) => Ok(resolve(&host, Some(job), Some(&alloc))),
            Err(e) if e.is_not_found() => Ok(resolve(&host, Some(job), None)),
            Err(e) => {
                tracing::warn!(host = %host.name, job = %job.name, error = %e, "Allocation lookup failed");
                Err(e)
            }
        },
    };

    HostReport {
        hostname: host.name,
        outcome,
    }
}

impl HostReport {
    pub fn status(&self) -> Option<HostStatus> {
        self.outcome.as_ref().ok().copied()
    }

    pub fn error(&self) -> Option<&NomadError> {
        self.outcome.as_ref().err()
    }
}
