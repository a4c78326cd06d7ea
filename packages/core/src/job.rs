//! Job domain types: workflows bound to runtime parameters.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{ChainEntry, JobId, Workflow, WorkflowId};

/// Queue position of a job.
///
/// A job sits in exactly one of the queued, running or finished lists and
/// this field always names that list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Waiting to be claimed by a runner.
    #[default]
    Queued,
    /// Claimed and executing under a runner.
    Running,
    /// Terminal. Never re-queued.
    Finished,
}

impl JobStatus {
    /// Get a simple status string for display.
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Running => "running",
            JobStatus::Finished => "finished",
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal result reported by the execution engine for a finished job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobOutcome {
    Succeeded,
    Failed,
    Canceled,
    TimedOut,
}

/// A runtime instance of a workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    /// Unique identifier for this job.
    pub uuid: JobId,
    /// Workflow this job was created from. Not checked for existence.
    pub workflow_uuid: WorkflowId,
    /// Display name, usually the workflow name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Correlation key used to suppress duplicate jobs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    /// Runtime parameters, compared verbatim for duplicate detection.
    #[serde(default)]
    pub params: Value,
    /// Resolved copy of the workflow chain.
    #[serde(default)]
    pub chain: Vec<ChainEntry>,
    /// Resolved copy of the workflow error chain.
    #[serde(default)]
    pub onerror: Vec<ChainEntry>,
    /// Queue position.
    #[serde(default)]
    pub status: JobStatus,
    /// Terminal result, set by the execution engine.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outcome: Option<JobOutcome>,
    /// Per-task results recorded by the engine for the chain.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub chain_results: Vec<Value>,
    /// Per-task results recorded by the engine for the error chain.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub onerror_results: Vec<Value>,
    /// Runner holding the job. Present only while running.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runner: Option<String>,
    /// When the job was created.
    pub created_at: DateTime<Utc>,
}

impl Job {
    /// Create a queued job for the given workflow, copying its chains.
    pub fn new(workflow: &Workflow) -> Self {
        Self {
            uuid: JobId::new(),
            workflow_uuid: workflow.uuid,
            name: Some(workflow.name.clone()),
            target: None,
            params: Value::Null,
            chain: workflow.chain.clone(),
            onerror: workflow.onerror.clone(),
            status: JobStatus::Queued,
            outcome: None,
            chain_results: Vec::new(),
            onerror_results: Vec::new(),
            runner: None,
            created_at: Utc::now(),
        }
    }

    /// Set the target correlation key.
    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    /// Set the runtime parameters.
    pub fn with_params(mut self, params: Value) -> Self {
        self.params = params;
        self
    }

    /// Check whether another job would run the same workflow with the same
    /// parameters.
    pub fn duplicates(&self, other: &Job) -> bool {
        self.workflow_uuid == other.workflow_uuid && self.params == other.params
    }
}
