//! Workflow repository.
//!
//! Chains are stored as bare task ids. Every write also keeps the per-task
//! reverse indices in step, inside the same atomic batch as the record.

use wf_core::{Workflow, WorkflowId};

use super::{claim_name, release_name};
use crate::codec::{from_fields, to_fields};
use crate::integrity::{self, Role};
use crate::store::{Batch, Store};
use crate::{Backend, BackendError};

/// Repository for workflow definitions.
pub struct WorkflowRepository<'a, S> {
    backend: &'a Backend<S>,
}

impl<'a, S: Store> WorkflowRepository<'a, S> {
    pub(crate) fn new(backend: &'a Backend<S>) -> Self {
        Self { backend }
    }

    /// Store a new workflow. Chain entries given as full task records are
    /// reduced to their ids. Returns the stored form.
    pub async fn create(&self, workflow: &Workflow) -> Result<Workflow, BackendError> {
        let store = self.backend.store();
        let keys = self.backend.keys();
        let names = keys.workflow_names();

        let mut workflow = workflow.clone();
        workflow.normalize();
        let fields = to_fields(&workflow)?;

        claim_name(store, &names, "workflow", &workflow.name).await?;

        let mut batch = Batch::new();
        integrity::link(&mut batch, keys, Role::Chain, workflow.uuid, &workflow.chain_ids());
        integrity::link(&mut batch, keys, Role::OnError, workflow.uuid, &workflow.onerror_ids());
        batch.hset_all(keys.workflow(workflow.uuid), fields);

        if let Err(e) = store.exec(batch).await {
            release_name(store, &names, &workflow.name).await;
            return Err(e.into());
        }

        tracing::debug!("Created workflow {} ({})", workflow.uuid, workflow.name);
        Ok(workflow)
    }

    /// Get a workflow by ID.
    pub async fn get(&self, id: WorkflowId) -> Result<Workflow, BackendError> {
        let fields = self
            .backend
            .store()
            .hgetall(&self.backend.keys().workflow(id))
            .await?;

        from_fields(fields)?
            .ok_or_else(|| BackendError::NotFound(format!("Workflow not found: {id}")))
    }

    /// Replace a stored workflow.
    ///
    /// Tasks dropped from the chain or error chain lose this workflow from
    /// their reverse index for that role; every task now listed gets it
    /// added. Renames behave as for tasks.
    pub async fn update(&self, workflow: &Workflow) -> Result<Workflow, BackendError> {
        let store = self.backend.store();
        let keys = self.backend.keys();
        let names = keys.workflow_names();

        let current = self.get(workflow.uuid).await?;

        let mut workflow = workflow.clone();
        workflow.normalize();
        let fields = to_fields(&workflow)?;

        let renamed = current.name != workflow.name;
        if renamed {
            claim_name(store, &names, "workflow", &workflow.name).await?;
        }

        let key = keys.workflow(workflow.uuid);
        let mut batch = Batch::new();
        batch.del(&key).hset_all(&key, fields);
        if renamed {
            batch.srem(&names, &current.name);
        }
        integrity::reconcile(
            &mut batch,
            keys,
            Role::Chain,
            workflow.uuid,
            &current.chain_ids(),
            &workflow.chain_ids(),
        );
        integrity::reconcile(
            &mut batch,
            keys,
            Role::OnError,
            workflow.uuid,
            &current.onerror_ids(),
            &workflow.onerror_ids(),
        );

        if let Err(e) = store.exec(batch).await {
            if renamed {
                release_name(store, &names, &workflow.name).await;
            }
            return Err(e.into());
        }

        tracing::debug!("Updated workflow {} ({})", workflow.uuid, workflow.name);
        Ok(workflow)
    }

    /// Delete a workflow, its name, and its entries in every task's reverse
    /// index, in one batch.
    pub async fn delete(&self, id: WorkflowId) -> Result<(), BackendError> {
        let store = self.backend.store();
        let keys = self.backend.keys();

        let workflow = self.get(id).await?;

        let mut batch = Batch::new();
        integrity::unlink(&mut batch, keys, Role::Chain, id, &workflow.chain_ids());
        integrity::unlink(&mut batch, keys, Role::OnError, id, &workflow.onerror_ids());
        batch
            .del(keys.workflow(id))
            .srem(keys.workflow_names(), &workflow.name);
        store.exec(batch).await?;

        tracing::debug!("Deleted workflow {id} ({})", workflow.name);
        Ok(())
    }
}
