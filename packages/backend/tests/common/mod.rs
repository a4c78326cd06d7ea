#![allow(dead_code)]

use wf_backend::store::{MemoryStore, Store};
use wf_backend::{Backend, BackendError};
use wf_core::{Job, JobId, JobStatus, Task, Workflow};

pub fn setup_backend() -> Backend<MemoryStore> {
    Backend::new(MemoryStore::new())
}

pub async fn create_task(backend: &Backend<MemoryStore>, name: &str) -> Result<Task, BackendError> {
    backend.tasks().create(&Task::new(name).with_body("true")).await
}

pub async fn create_job(
    backend: &Backend<MemoryStore>,
    workflow: &Workflow,
) -> Result<Job, BackendError> {
    backend.jobs().create(&Job::new(workflow)).await
}

/// Ids in one queue list, head first.
pub async fn list_contents(
    backend: &Backend<MemoryStore>,
    status: JobStatus,
) -> Result<Vec<JobId>, BackendError> {
    let raw = backend
        .store()
        .lrange(&backend.keys().queue(status), 0, -1)
        .await?;
    Ok(raw.iter().filter_map(|id| JobId::parse(id).ok()).collect())
}

/// Assert the job sits in exactly the list its stored status names.
pub async fn assert_in_list(
    backend: &Backend<MemoryStore>,
    id: JobId,
    status: JobStatus,
) -> Result<(), BackendError> {
    for list in [JobStatus::Queued, JobStatus::Running, JobStatus::Finished] {
        let occurrences = list_contents(backend, list)
            .await?
            .into_iter()
            .filter(|member| *member == id)
            .count();
        let expected = usize::from(list == status);
        assert_eq!(
            occurrences, expected,
            "job {id} appears {occurrences} time(s) in the {list} list"
        );
    }

    let stored = backend.jobs().get(id).await?;
    assert_eq!(stored.status, status);
    Ok(())
}
