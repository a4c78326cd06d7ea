//! Job repository and queue.
//!
//! A job id lives in exactly one of the queued, running and finished lists.
//! Moving a job starts by removing its id from the source list; the store
//! reports how many entries it removed, and only the caller that actually
//! removed the id goes on to write the rest of the transition. That removal
//! is the whole locking protocol between competing runners.

use futures_util::{TryStreamExt, stream};
use wf_core::{Job, JobId, JobStatus};

use crate::codec::{decode_value, encode_value, from_fields, to_fields};
use crate::store::{Batch, Store};
use crate::{Backend, BackendError};

/// Repository for jobs and the queue lists.
pub struct JobRepository<'a, S> {
    backend: &'a Backend<S>,
}

impl<'a, S: Store> JobRepository<'a, S> {
    pub(crate) fn new(backend: &'a Backend<S>) -> Self {
        Self { backend }
    }

    /// Store a job and append it to the tail of the queued list.
    ///
    /// The stored job is always queued with no runner, whatever the caller
    /// passed. Target uniqueness is not checked here; see
    /// [`validate_target`](Self::validate_target).
    pub async fn create(&self, job: &Job) -> Result<Job, BackendError> {
        let store = self.backend.store();
        let keys = self.backend.keys();

        let mut job = job.clone();
        job.status = JobStatus::Queued;
        job.runner = None;

        let id = job.uuid.to_string();
        let mut batch = Batch::new();
        batch
            .hset_all(keys.job(job.uuid), to_fields(&job)?)
            .rpush(keys.queue(JobStatus::Queued), &id);
        if let Some(target) = &job.target {
            batch.sadd(keys.target(target), &id);
        }
        store.exec(batch).await?;

        tracing::debug!("Queued job {}", job.uuid);
        Ok(job)
    }

    /// Get a job by ID.
    pub async fn get(&self, id: JobId) -> Result<Job, BackendError> {
        self.find(id)
            .await?
            .ok_or_else(|| BackendError::NotFound(format!("Job not found: {id}")))
    }

    async fn find(&self, id: JobId) -> Result<Option<Job>, BackendError> {
        let fields = self.backend.store().hgetall(&self.backend.keys().job(id)).await?;
        from_fields(fields)
    }

    /// Check that no stored job with the same target runs the same workflow
    /// with equal params.
    ///
    /// This is a point-in-time check: two callers validating the same job
    /// concurrently can both pass before either creates it.
    pub async fn validate_target(&self, job: &Job) -> Result<(), BackendError> {
        let Some(target) = &job.target else {
            return Ok(());
        };

        let members = self
            .backend
            .store()
            .smembers(&self.backend.keys().target(target))
            .await?;

        stream::iter(members.into_iter().map(Ok::<_, BackendError>))
            .try_for_each_concurrent(self.backend.concurrency(), |raw| async move {
                let id = parse_job_id(&raw)?;
                if id == job.uuid {
                    return Ok(());
                }
                match self.find(id).await? {
                    Some(other) if other.duplicates(job) => Err(BackendError::DuplicateTarget {
                        target: target.clone(),
                    }),
                    _ => Ok(()),
                }
            })
            .await
    }

    /// Peek at the queued job at `index` (0 is the head) without claiming it.
    pub async fn next_job(&self, index: usize) -> Result<Option<Job>, BackendError> {
        let index = i64::try_from(index).unwrap_or(i64::MAX);
        let Some(id) = self.next_jobs(index, index).await?.into_iter().next() else {
            return Ok(None);
        };
        self.find(id).await
    }

    /// Queued job ids in the inclusive range `[start, stop]`. Negative
    /// indices count from the tail.
    pub async fn next_jobs(&self, start: i64, stop: i64) -> Result<Vec<JobId>, BackendError> {
        let ids = self
            .backend
            .store()
            .lrange(&self.backend.keys().queue(JobStatus::Queued), start, stop)
            .await?;

        ids.iter().map(|raw| parse_job_id(raw)).collect()
    }

    /// Number of jobs in one of the queue lists.
    pub async fn queue_len(&self, status: JobStatus) -> Result<usize, BackendError> {
        Ok(self
            .backend
            .store()
            .llen(&self.backend.keys().queue(status))
            .await?)
    }

    /// Claim a queued job for `runner`.
    ///
    /// Fails with `InvalidTransition` if the job is not in the queued list,
    /// which is also what a runner sees when another runner claimed the job
    /// first.
    pub async fn run_job(&self, id: JobId, runner: &str) -> Result<(), BackendError> {
        let store = self.backend.store();
        let keys = self.backend.keys();
        let member = id.to_string();

        let status = encode_value(&JobStatus::Running)?;
        let runner_value = encode_value(runner)?;

        let removed = store.lrem(&keys.queue(JobStatus::Queued), 0, &member).await?;
        if removed == 0 {
            return Err(BackendError::InvalidTransition(
                "only queued jobs can be run".to_string(),
            ));
        }

        let key = keys.job(id);
        let mut batch = Batch::new();
        batch
            .sadd(keys.runner_jobs(runner), &member)
            .rpush(keys.queue(JobStatus::Running), &member)
            .hset(&key, "status", status)
            .hset(&key, "runner", runner_value);

        if let Err(e) = store.exec(batch).await {
            tracing::error!("Job {id} left the queue but could not be marked running: {e}");
            return Err(e.into());
        }

        tracing::debug!("Job {id} claimed by runner {runner}");
        Ok(())
    }

    /// Move a running job to the finished list.
    ///
    /// Every field of `job` (outcome and results included) is written as
    /// given, with status set to finished and the runner cleared.
    pub async fn finish_job(&self, job: &Job) -> Result<Job, BackendError> {
        self.release(job, JobStatus::Finished, "only running jobs can be finished")
            .await
    }

    /// Put a running job back at the tail of the queued list.
    pub async fn queue_job(&self, job: &Job) -> Result<Job, BackendError> {
        self.release(job, JobStatus::Queued, "only running jobs can be queued again")
            .await
    }

    async fn release(&self, job: &Job, to: JobStatus, refusal: &str) -> Result<Job, BackendError> {
        let store = self.backend.store();
        let keys = self.backend.keys();
        let key = keys.job(job.uuid);
        let member = job.uuid.to_string();

        let mut job = job.clone();
        job.status = to;
        let runner = match job.runner.take() {
            Some(runner) => Some(runner),
            None => match store.hget(&key, "runner").await? {
                Some(raw) => Some(decode_value::<String>(&raw)?),
                None => None,
            },
        };
        let fields = to_fields(&job)?;

        let removed = store.lrem(&keys.queue(JobStatus::Running), 0, &member).await?;
        if removed == 0 {
            return Err(BackendError::InvalidTransition(refusal.to_string()));
        }

        let mut batch = Batch::new();
        if let Some(runner) = &runner {
            batch.srem(keys.runner_jobs(runner), &member);
        }
        batch
            .rpush(keys.queue(to), &member)
            .hset_all(&key, fields)
            .hdel(&key, "runner");

        if let Err(e) = store.exec(batch).await {
            tracing::error!("Job {} left the running list but could not be marked {to}: {e}", job.uuid);
            return Err(e.into());
        }

        tracing::debug!(
            "Job {} released by runner {} as {to}",
            job.uuid,
            runner.as_deref().unwrap_or("<unknown>")
        );
        Ok(job)
    }
}

fn parse_job_id(raw: &str) -> Result<JobId, BackendError> {
    JobId::parse(raw).map_err(|e| BackendError::Serialization(e.to_string()))
}
