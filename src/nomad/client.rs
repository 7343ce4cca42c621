use std::path::Path;

use crate::error::{NomadError, Result};
use crate::nomad::types::{Allocation, Host, Job};

/// Typed access to a Nomad cluster's hosts, jobs and allocations.
///
/// Implementors only provide the raw collection fetches and the three
/// control calls; every lookup is derived from those, so fakes used in
/// tests get identical correlation behaviour for free.
#[tonic::async_trait]
pub trait SchedulerClient: Send + Sync {
    async fn list_hosts(&self) -> Result<Vec<Host>>;

    async fn list_jobs(&self) -> Result<Vec<Job>>;

    async fn list_allocations(&self) -> Result<Vec<Allocation>>;

    /// Enable or disable drain on a node. Returns the HTTP status code.
    async fn set_drain(&self, host_id: &str, enable: bool) -> Result<u16>;

    /// Register a job from its JSON definition. Returns the HTTP status code.
    async fn submit_job(&self, payload: Vec<u8>) -> Result<u16>;

    /// Deregister (stop) a job. Returns the HTTP status code.
    async fn stop_job(&self, name: &str) -> Result<u16>;

    async fn find_job(&self, name: &str) -> Result<Job> {
        let jobs = self.list_jobs().await?;
        jobs.into_iter()
            .find(|job| job.name == name)
            .ok_or_else(|| NomadError::job_not_found(name))
    }

    async fn find_host(&self, name: &str) -> Result<Host> {
        let hosts = self.list_hosts().await?;
        hosts
            .into_iter()
            .find(|host| host.name == name)
            .ok_or_else(|| NomadError::host_not_found(name))
    }

    /// The current allocation of `job` on `host`.
    async fn find_allocation(&self, job: &Job, host: &Host) -> Result<Allocation> {
        let allocs = self.list_allocations().await?;
        select_allocation(allocs, job, host)
            .ok_or_else(|| NomadError::alloc_not_found(&job.name, &host.name))
    }

    /// Whether a live worker allocation of `job` sits on `host`.
    async fn is_active(&self, job: &Job, host: &Host) -> Result<bool> {
        let allocs = self.list_allocations().await?;
        Ok(has_active_worker(&allocs, job, host))
    }

    /// Task groups of every live allocation of `job` on `host`.
    async fn services(&self, job: &Job, host: &Host) -> Result<Vec<String>> {
        let allocs = self.list_allocations().await?;
        Ok(live_task_groups(&allocs, job, host))
    }
}

/// Pick the current allocation among those correlated to (`job`, `host`).
///
/// An allocation with desired status `stop` is stale when another candidate
/// exists for the same pair, so a live candidate wins. When every candidate is
/// stopping the first one is still returned.
pub fn select_allocation(allocs: Vec<Allocation>, job: &Job, host: &Host) -> Option<Allocation> {
    let mut candidates: Vec<Allocation> = allocs
        .into_iter()
        .filter(|alloc| alloc.belongs_to(job, host))
        .collect();

    match candidates.iter().position(|alloc| !alloc.is_stopping()) {
        Some(idx) => Some(candidates.swap_remove(idx)),
        None => candidates.into_iter().next(),
    }
}

pub fn has_active_worker(allocs: &[Allocation], job: &Job, host: &Host) -> bool {
    allocs.iter().any(|alloc| {
        alloc.belongs_to(job, host) && !alloc.is_stopping() && alloc.name.contains("worker")
    })
}

pub fn live_task_groups(allocs: &[Allocation], job: &Job, host: &Host) -> Vec<String> {
    allocs
        .iter()
        .filter(|alloc| alloc.belongs_to(job, host) && !alloc.is_stopping())
        .map(|alloc| alloc.task_group.clone())
        .collect()
}

/// Reject payloads Nomad's `/v1/jobs` endpoint cannot accept.
pub fn validate_job_payload(payload: &[u8]) -> Result<()> {
    if payload.iter().all(u8::is_ascii_whitespace) {
        return Err(NomadError::Validation("payload is empty".to_string()));
    }
    serde_json::from_slice::<serde_json::Value>(payload)
        .map_err(|e| NomadError::Validation(format!("payload is not JSON: {}", e)))?;
    Ok(())
}

/// Read and validate a JSON job definition from disk.
pub async fn load_job_payload(path: &Path) -> Result<Vec<u8>> {
    let payload = tokio::fs::read(path)
        .await
        .map_err(|e| NomadError::Validation(format!("cannot read {}: {}", path.display(), e)))?;
    validate_job_payload(&payload)?;
    Ok(payload)
}
