//! Task repository.

use wf_core::{Task, TaskId};

use super::{claim_name, release_name};
use crate::codec::{from_fields, to_fields};
use crate::integrity::{self, Role};
use crate::store::{Batch, Store};
use crate::{Backend, BackendError};

/// Repository for task definitions.
pub struct TaskRepository<'a, S> {
    backend: &'a Backend<S>,
}

impl<'a, S: Store> TaskRepository<'a, S> {
    pub(crate) fn new(backend: &'a Backend<S>) -> Self {
        Self { backend }
    }

    /// Store a new task. Fails with `DuplicateName` if another task has the
    /// same name.
    pub async fn create(&self, task: &Task) -> Result<Task, BackendError> {
        let store = self.backend.store();
        let keys = self.backend.keys();
        let names = keys.task_names();

        let fields = to_fields(task)?;
        claim_name(store, &names, "task", &task.name).await?;

        let mut batch = Batch::new();
        batch.hset_all(keys.task(task.uuid), fields);

        if let Err(e) = store.exec(batch).await {
            release_name(store, &names, &task.name).await;
            return Err(e.into());
        }

        tracing::debug!("Created task {} ({})", task.uuid, task.name);
        Ok(task.clone())
    }

    /// Get a task by ID.
    pub async fn get(&self, id: TaskId) -> Result<Task, BackendError> {
        let fields = self.backend.store().hgetall(&self.backend.keys().task(id)).await?;

        from_fields(fields)?.ok_or_else(|| BackendError::NotFound(format!("Task not found: {id}")))
    }

    /// Replace a stored task. A rename claims the new name before anything
    /// is written and frees the old one in the same batch as the record.
    ///
    /// Two concurrent renames of the same task can both read the same old
    /// name; the loser's new name then stays claimed.
    pub async fn update(&self, task: &Task) -> Result<Task, BackendError> {
        let store = self.backend.store();
        let keys = self.backend.keys();
        let names = keys.task_names();

        let current = self.get(task.uuid).await?;
        let fields = to_fields(task)?;

        let renamed = current.name != task.name;
        if renamed {
            claim_name(store, &names, "task", &task.name).await?;
        }

        let key = keys.task(task.uuid);
        let mut batch = Batch::new();
        batch.del(&key).hset_all(&key, fields);
        if renamed {
            batch.srem(&names, &current.name);
        }

        if let Err(e) = store.exec(batch).await {
            if renamed {
                release_name(store, &names, &task.name).await;
            }
            return Err(e.into());
        }

        tracing::debug!("Updated task {} ({})", task.uuid, task.name);
        Ok(task.clone())
    }

    /// Delete a task, first removing it from every workflow that uses it.
    ///
    /// Workflows referencing the task in their chain are rewritten first,
    /// then those referencing it in their error chain. If any rewrite fails
    /// the task is left in place and the error is returned; rewrites that
    /// already happened are kept.
    pub async fn delete(&self, id: TaskId) -> Result<(), BackendError> {
        let store = self.backend.store();
        let keys = self.backend.keys();

        let task = self.get(id).await?;

        for role in Role::ALL {
            integrity::detach_task(self.backend, role, id).await?;
        }

        let mut batch = Batch::new();
        batch
            .del(keys.task(id))
            .srem(keys.task_names(), &task.name)
            .del(keys.reverse_index(Role::Chain, id))
            .del(keys.reverse_index(Role::OnError, id));
        store.exec(batch).await?;

        tracing::debug!("Deleted task {id} ({})", task.name);
        Ok(())
    }
}
