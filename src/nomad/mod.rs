//! Client side of the Nomad HTTP API.
//!
//! - [`types`]: serde models for nodes, jobs and allocations
//! - [`client`]: the [`SchedulerClient`] trait and the lookups derived from it
//! - [`http`]: [`HttpSchedulerClient`], the `reqwest` implementation
//! - [`retry`]: bounded, jittered backoff for transport failures

pub mod client;
pub mod http;
pub mod retry;
pub mod types;

pub use client::{load_job_payload, SchedulerClient};
pub use http::HttpSchedulerClient;
pub use types::{Allocation, Host, Job, JobSummary, TaskGroupSummary, TaskState};
