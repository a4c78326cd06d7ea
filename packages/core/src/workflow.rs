//! Workflow definitions: ordered task chains plus an error-handling chain.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{Task, TaskId, WorkflowId};

/// A reference to a task inside a chain.
///
/// Callers may hand over either the full task record or just its identifier.
/// Before anything is persisted the entry is normalized to [`ChainEntry::Id`],
/// so stored chains only ever hold bare identifiers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChainEntry {
    /// Bare task identifier.
    Id(TaskId),
    /// Full task record.
    Task(Box<Task>),
}

impl ChainEntry {
    /// Identifier of the referenced task, whichever form was supplied.
    pub fn task_id(&self) -> TaskId {
        match self {
            ChainEntry::Id(id) => *id,
            ChainEntry::Task(task) => task.uuid,
        }
    }

    /// Collapse this entry to its bare identifier form.
    pub fn normalized(&self) -> Self {
        ChainEntry::Id(self.task_id())
    }
}

impl From<TaskId> for ChainEntry {
    fn from(id: TaskId) -> Self {
        ChainEntry::Id(id)
    }
}

impl From<Task> for ChainEntry {
    fn from(task: Task) -> Self {
        ChainEntry::Task(Box::new(task))
    }
}

impl From<&Task> for ChainEntry {
    fn from(task: &Task) -> Self {
        ChainEntry::Task(Box::new(task.clone()))
    }
}

/// A workflow: the chain of tasks a job runs, and what runs when it fails.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workflow {
    /// Unique identifier for this workflow.
    pub uuid: WorkflowId,
    /// Globally unique, human-facing key.
    pub name: String,
    /// Tasks run in order.
    #[serde(default)]
    pub chain: Vec<ChainEntry>,
    /// Tasks run in order when the chain fails.
    #[serde(default)]
    pub onerror: Vec<ChainEntry>,
    /// Whole-workflow timeout in seconds, enforced by the engine.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
    /// Any other engine-specific fields.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Workflow {
    /// Create an empty workflow with a fresh identifier.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            uuid: WorkflowId::new(),
            name: name.into(),
            chain: Vec::new(),
            onerror: Vec::new(),
            timeout: None,
            extra: Map::new(),
        }
    }

    /// Set the main chain.
    pub fn with_chain<I, E>(mut self, chain: I) -> Self
    where
        I: IntoIterator<Item = E>,
        E: Into<ChainEntry>,
    {
        self.chain = chain.into_iter().map(Into::into).collect();
        self
    }

    /// Set the error-handling chain.
    pub fn with_onerror<I, E>(mut self, onerror: I) -> Self
    where
        I: IntoIterator<Item = E>,
        E: Into<ChainEntry>,
    {
        self.onerror = onerror.into_iter().map(Into::into).collect();
        self
    }

    /// Set the timeout in seconds.
    pub fn with_timeout(mut self, timeout: u64) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Replace every chain and onerror entry with its bare identifier.
    pub fn normalize(&mut self) {
        self.chain = self.chain.iter().map(ChainEntry::normalized).collect();
        self.onerror = self.onerror.iter().map(ChainEntry::normalized).collect();
    }

    /// Task identifiers of the main chain, in order.
    pub fn chain_ids(&self) -> Vec<TaskId> {
        self.chain.iter().map(ChainEntry::task_id).collect()
    }

    /// Task identifiers of the error chain, in order.
    pub fn onerror_ids(&self) -> Vec<TaskId> {
        self.onerror.iter().map(ChainEntry::task_id).collect()
    }
}
