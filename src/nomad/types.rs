use std::collections::HashMap;

use serde::{Deserialize, Deserializer, Serialize};

/// Allocation desired status marking an allocation the scheduler is tearing down.
pub const DESIRED_STOP: &str = "stop";
pub const CLIENT_RUNNING: &str = "running";
pub const CLIENT_LOST: &str = "lost";
pub const TASK_RUNNING: &str = "running";

/// A Nomad client node, as listed by `/v1/nodes`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Host {
    #[serde(rename = "ID")]
    pub id: String,
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Drain", default)]
    pub draining: bool,
}

impl Host {
    pub fn new(id: impl Into<String>, name: impl Into<String>, draining: bool) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            draining,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskGroupSummary {
    #[serde(rename = "Running", alias = "running", default)]
    pub running: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSummary {
    #[serde(rename = "JobID", default)]
    pub job_id: String,
    #[serde(rename = "Summary", default, deserialize_with = "null_as_default")]
    pub summary: HashMap<String, TaskGroupSummary>,
}

/// A Nomad job stub, as listed by `/v1/jobs`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Priority", default)]
    pub priority: i64,
    #[serde(rename = "Status", alias = "status", default)]
    pub status: String,
    #[serde(rename = "JobSummary", default)]
    pub job_summary: Option<JobSummary>,
}

impl Job {
    pub fn new(name: impl Into<String>, status: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            priority: 50,
            status: status.into(),
            job_summary: None,
        }
    }

    /// Running instances summed across every task group.
    pub fn running(&self) -> i64 {
        self.job_summary
            .as_ref()
            .map(|s| s.summary.values().map(|g| g.running).sum())
            .unwrap_or(0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskState {
    #[serde(rename = "State", default)]
    pub state: String,
}

/// A placement of one job's task group onto one node, as listed by
/// `/v1/allocations`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Allocation {
    #[serde(rename = "ID")]
    pub id: String,
    #[serde(rename = "JobID", default)]
    pub job_id: String,
    #[serde(rename = "NodeID", default)]
    pub node_id: String,
    #[serde(rename = "Name", default)]
    pub name: String,
    #[serde(rename = "ClientStatus", default)]
    pub client_status: String,
    #[serde(rename = "DesiredStatus", default)]
    pub desired_status: String,
    #[serde(rename = "TaskGroup", default)]
    pub task_group: String,
    #[serde(rename = "TaskStates", default, deserialize_with = "null_as_default")]
    pub tasks: HashMap<String, TaskState>,
}

impl Allocation {
    /// True iff every task reports `state`. An allocation without tasks
    /// satisfies any state.
    pub fn all_tasks_in_state(&self, state: &str) -> bool {
        self.tasks.values().all(|task| task.state == state)
    }

    pub fn is_stopping(&self) -> bool {
        self.desired_status == DESIRED_STOP
    }

    /// Heuristic job correlation: the allocation name embeds the job name.
    /// A job named `sync` therefore also matches `sync-backup` allocations.
    pub fn belongs_to(&self, job: &Job, host: &Host) -> bool {
        self.node_id == host.id && self.name.contains(&job.name)
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
