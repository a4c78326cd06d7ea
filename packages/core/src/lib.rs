//! Core domain types for the workflow backend.
//!
//! This crate contains the records shared by every package:
//! - Task, Workflow and ChainEntry for definitions
//! - Job, JobStatus and JobOutcome for queued work
//! - Runner for liveness bookkeeping

mod ids;
mod job;
mod runner;
mod task;
mod workflow;

pub use ids::{IdParseError, JobId, TaskId, WorkflowId};
pub use job::{Job, JobOutcome, JobStatus};
pub use runner::{Runner, RunnerId};
pub use task::Task;
pub use workflow::{ChainEntry, Workflow};
