//! Referential integrity between tasks and the workflows that use them.
//!
//! Every workflow that names a task in its chain (or error chain) is listed in
//! that task's reverse-index set for the role. Workflow writes keep the sets
//! current inside their own batch; task deletion walks the sets and strips the
//! task from each referencing workflow before the task itself goes away.

use futures_util::{StreamExt, TryStreamExt, stream};
use wf_core::{ChainEntry, TaskId, WorkflowId};

use crate::codec::{decode_value, encode_value};
use crate::keys::Keys;
use crate::store::{Batch, Store};
use crate::{Backend, BackendError};

/// Which list of a workflow a task appears in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Chain,
    OnError,
}

impl Role {
    pub const ALL: [Role; 2] = [Role::Chain, Role::OnError];

    /// Workflow record field holding this role's list.
    pub fn field(self) -> &'static str {
        match self {
            Role::Chain => "chain",
            Role::OnError => "onerror",
        }
    }
}

/// Queue adding `workflow` to the reverse index of every task in `tasks`.
pub(crate) fn link(batch: &mut Batch, keys: &Keys, role: Role, workflow: WorkflowId, tasks: &[TaskId]) {
    let member = workflow.to_string();
    for task in tasks {
        batch.sadd(keys.reverse_index(role, *task), member.clone());
    }
}

/// Queue removing `workflow` from the reverse index of every task in `tasks`.
pub(crate) fn unlink(batch: &mut Batch, keys: &Keys, role: Role, workflow: WorkflowId, tasks: &[TaskId]) {
    let member = workflow.to_string();
    for task in tasks {
        batch.srem(keys.reverse_index(role, *task), member.clone());
    }
}

/// Queue the index changes for a workflow whose role list went from
/// `before` to `after`: tasks no longer present lose the workflow, every task
/// now present gets it.
pub(crate) fn reconcile(
    batch: &mut Batch,
    keys: &Keys,
    role: Role,
    workflow: WorkflowId,
    before: &[TaskId],
    after: &[TaskId],
) {
    let dropped: Vec<TaskId> = before.iter().filter(|id| !after.contains(id)).copied().collect();
    unlink(batch, keys, role, workflow, &dropped);
    link(batch, keys, role, workflow, after);
}

/// Remove `task` from the `role` list of every workflow that references it.
///
/// Workflows are rewritten with at most `backend.concurrency()` store calls in
/// flight. The first failure stops the walk; workflows already rewritten stay
/// rewritten. Workflows that disappeared since being indexed are skipped; one
/// deleted between the read and the write-back is left with a lone field.
pub(crate) async fn detach_task<S: Store>(
    backend: &Backend<S>,
    role: Role,
    task: TaskId,
) -> Result<usize, BackendError> {
    let store = backend.store();
    let keys = backend.keys();

    let members = store.smembers(&keys.reverse_index(role, task)).await?;
    let workflows = members
        .iter()
        .map(|raw| {
            WorkflowId::parse(raw).map_err(|e| BackendError::Serialization(e.to_string()))
        })
        .collect::<Result<Vec<_>, _>>()?;

    tracing::debug!(
        "Detaching task {task} from {} workflow(s) ({})",
        workflows.len(),
        role.field()
    );

    let rewritten = stream::iter(workflows)
        .map(|workflow| async move {
            let key = keys.workflow(workflow);
            let Some(raw) = store.hget(&key, role.field()).await? else {
                return Ok::<_, BackendError>(0usize);
            };

            let entries: Vec<ChainEntry> = decode_value(&raw)?;
            let kept: Vec<ChainEntry> = entries
                .into_iter()
                .filter(|entry| entry.task_id() != task)
                .collect();

            store.hset(&key, role.field(), &encode_value(&kept)?).await?;
            Ok::<_, BackendError>(1usize)
        })
        .buffer_unordered(backend.concurrency())
        .try_fold(0usize, |total, n| async move { Ok(total + n) })
        .await?;

    Ok(rewritten)
}
