//! Task definitions: named, reusable units of work referenced by workflows.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::TaskId;

/// A reusable task definition.
///
/// Only `uuid` and `name` mean anything to the backend; the remaining fields
/// are carried for the execution engine and persisted as given.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Unique identifier for this task.
    pub uuid: TaskId,
    /// Globally unique, human-facing key.
    pub name: String,
    /// Action source executed by the engine.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    /// Timeout in seconds enforced by the engine.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
    /// Number of retries the engine may attempt.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry: Option<u32>,
    /// Action run when the body fails.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback: Option<String>,
    /// Any other engine-specific fields.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Task {
    /// Create a task with a fresh identifier.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            uuid: TaskId::new(),
            name: name.into(),
            body: None,
            timeout: None,
            retry: None,
            fallback: None,
            extra: Map::new(),
        }
    }

    /// Set the action body.
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Set the timeout in seconds.
    pub fn with_timeout(mut self, timeout: u64) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the retry count.
    pub fn with_retry(mut self, retry: u32) -> Self {
        self.retry = Some(retry);
        self
    }
}
