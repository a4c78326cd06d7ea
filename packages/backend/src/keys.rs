//! Store key naming.

use wf_core::{JobId, JobStatus, TaskId, WorkflowId};

use crate::integrity::Role;

/// Builds every key the backend touches, optionally under a deployment prefix.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Keys {
    prefix: Option<String>,
}

impl Keys {
    pub fn new(prefix: Option<String>) -> Self {
        Self {
            prefix: prefix.filter(|p| !p.is_empty()),
        }
    }

    pub fn prefix(&self) -> Option<&str> {
        self.prefix.as_deref()
    }

    fn key(&self, name: impl std::fmt::Display) -> String {
        match &self.prefix {
            Some(prefix) => format!("{prefix}:{name}"),
            None => name.to_string(),
        }
    }

    /// `task:<uuid>` hash.
    pub fn task(&self, id: TaskId) -> String {
        self.key(format_args!("task:{id}"))
    }

    /// `workflow:<uuid>` hash.
    pub fn workflow(&self, id: WorkflowId) -> String {
        self.key(format_args!("workflow:{id}"))
    }

    /// `job:<uuid>` hash.
    pub fn job(&self, id: JobId) -> String {
        self.key(format_args!("job:{id}"))
    }

    /// Set of every task name in use.
    pub fn task_names(&self) -> String {
        self.key("wf_task_names")
    }

    /// Set of every workflow name in use.
    pub fn workflow_names(&self) -> String {
        self.key("wf_workflow_names")
    }

    /// Set of workflows referencing `task` in the given role.
    pub fn reverse_index(&self, role: Role, task: TaskId) -> String {
        self.key(format_args!("wf_task_workflows_{}:{task}", role.field()))
    }

    /// Set of jobs sharing a target.
    pub fn target(&self, target: &str) -> String {
        self.key(format_args!("wf_target:{target}"))
    }

    /// Queue list holding jobs in the given status.
    pub fn queue(&self, status: JobStatus) -> String {
        self.key(format_args!("wf_{status}_jobs"))
    }

    /// Set of jobs running under a runner.
    pub fn runner_jobs(&self, runner: &str) -> String {
        self.key(format_args!("wf_runner:{runner}"))
    }

    /// Hash of runner id to last-active timestamp.
    pub fn runners(&self) -> String {
        self.key("wf_runners")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unprefixed_keys() {
        let keys = Keys::default();
        let task = TaskId::new();

        assert_eq!(keys.task(task), format!("task:{task}"));
        assert_eq!(keys.task_names(), "wf_task_names");
        assert_eq!(
            keys.reverse_index(Role::Chain, task),
            format!("wf_task_workflows_chain:{task}")
        );
        assert_eq!(
            keys.reverse_index(Role::OnError, task),
            format!("wf_task_workflows_onerror:{task}")
        );
        assert_eq!(keys.queue(JobStatus::Queued), "wf_queued_jobs");
        assert_eq!(keys.queue(JobStatus::Running), "wf_running_jobs");
        assert_eq!(keys.queue(JobStatus::Finished), "wf_finished_jobs");
        assert_eq!(keys.runner_jobs("runner-a"), "wf_runner:runner-a");
        assert_eq!(keys.target("host-1"), "wf_target:host-1");
    }

    #[test]
    fn prefix_is_prepended() {
        let keys = Keys::new(Some("staging".into()));
        let job = JobId::new();

        assert_eq!(keys.job(job), format!("staging:job:{job}"));
        assert_eq!(keys.runners(), "staging:wf_runners");
    }

    #[test]
    fn empty_prefix_is_ignored() {
        assert_eq!(Keys::new(Some(String::new())), Keys::default());
    }
}
