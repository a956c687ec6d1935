//! Running a built topology.
//!
//! [Task] owns the topology, spawns one pump per source and funnels every
//! runtime failure through a single error handler.

mod config;
mod lifecycle;
#[cfg(test)]
mod lifecycle_test;
mod pump;
mod supervisor;

pub use config::{COMMIT_INTERVAL_ENV, IDLE_BACKOFF_ENV, TaskConfig};
pub use lifecycle::{Task, TaskState};
pub use supervisor::{ErrorAction, ErrorHandler};
