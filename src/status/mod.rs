//! Per-host deployment status.
//!
//! [`resolve`] is the pure decision table; [`StatusAggregator`] feeds it with
//! data fetched through a [`SchedulerClient`](crate::nomad::SchedulerClient)
//! for every host of the cluster.

pub mod aggregator;
pub mod resolver;

pub use aggregator::{HostReport, StatusAggregator};
pub use resolver::{resolve, HostStatus};
