//! Repository implementations for store operations.

mod job_repo;
mod runner_repo;
mod task_repo;
mod workflow_repo;

pub use job_repo::JobRepository;
pub use runner_repo::RunnerRepository;
pub use task_repo::TaskRepository;
pub use workflow_repo::WorkflowRepository;

use crate::BackendError;
use crate::store::Store;

/// Claim `name` in a uniqueness set.
///
/// The set add is the store's add-if-absent, so of any number of concurrent
/// claims for one name exactly one succeeds.
async fn claim_name<S: Store>(
    store: &S,
    names_key: &str,
    kind: &'static str,
    name: &str,
) -> Result<(), BackendError> {
    if store.sadd(names_key, name).await? {
        Ok(())
    } else {
        Err(BackendError::DuplicateName {
            kind,
            name: name.to_string(),
        })
    }
}

/// Give back a name claimed by [`claim_name`] after the write it guarded failed.
async fn release_name<S: Store>(store: &S, names_key: &str, name: &str) {
    if let Err(e) = store.srem(names_key, name).await {
        tracing::warn!("Failed to release name '{name}' in {names_key}: {e}");
    }
}
