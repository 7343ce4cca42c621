use serde::Serialize;

use crate::nomad::types::{Allocation, Host, Job, CLIENT_LOST, CLIENT_RUNNING, TASK_RUNNING};

/// Deployment verdict for one host and one job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HostStatus {
    Started,
    Stopped,
    Pending,
    Mixed,
}

impl std::fmt::Display for HostStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HostStatus::Started => write!(f, "STARTED"),
            HostStatus::Stopped => write!(f, "STOPPED"),
            HostStatus::Pending => write!(f, "PENDING"),
            HostStatus::Mixed => write!(f, "MIXED"),
        }
    }
}

/// Derive a host's status for a job. Rules apply in order, first match wins:
///
/// 1. no such job anywhere: `Stopped`
/// 2. allocation lost while the host drains: `Pending`
/// 3. allocation running with some task not running: `Mixed`
/// 4. anything else, including a missing allocation: `Started`
pub fn resolve(host: &Host, job: Option<&Job>, alloc: Option<&Allocation>) -> HostStatus {
    if job.is_none() {
        return HostStatus::Stopped;
    }

    if let Some(alloc) = alloc {
        if alloc.client_status == CLIENT_LOST && host.draining {
            return HostStatus::Pending;
        }
        if alloc.client_status == CLIENT_RUNNING && !alloc.all_tasks_in_state(TASK_RUNNING) {
            return HostStatus::Mixed;
        }
    }

    HostStatus::Started
}
