// SPDX-License-Identifier: MIT
//! Service health reporting.
//!
//! [`HealthAggregator`] polls the task manager and the tracker client in
//! parallel and folds the results into one [`HealthStatus`] snapshot. It
//! never mutates anything.

pub mod aggregator;
pub mod checks;

pub use aggregator::{HealthAggregator, HealthStatus};
pub use checks::{
    ComponentHealth, ComponentStatus, HealthState, IntegrationHealth, MemoryReport, TaskCounts,
};
