//! Runner registry.

use chrono::{DateTime, SecondsFormat, Utc};
use wf_core::{JobId, Runner};

use crate::store::Store;
use crate::{Backend, BackendError};

/// Repository for runner liveness records.
pub struct RunnerRepository<'a, S> {
    backend: &'a Backend<S>,
}

impl<'a, S: Store> RunnerRepository<'a, S> {
    pub(crate) fn new(backend: &'a Backend<S>) -> Self {
        Self { backend }
    }

    /// Register a runner, marking it active now.
    pub async fn register(&self, id: &str) -> Result<(), BackendError> {
        self.touch(id).await?;
        tracing::info!("Registered runner {id}");
        Ok(())
    }

    /// Report that a runner is still alive.
    pub async fn active(&self, id: &str) -> Result<(), BackendError> {
        self.touch(id).await
    }

    async fn touch(&self, id: &str) -> Result<(), BackendError> {
        let now = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
        // Created and updated are both fine.
        let _ = self
            .backend
            .store()
            .hset(&self.backend.keys().runners(), id, &now)
            .await?;
        Ok(())
    }

    /// Every registered runner with its last-active time, ordered by id.
    pub async fn list(&self) -> Result<Vec<Runner>, BackendError> {
        let entries = self
            .backend
            .store()
            .hgetall(&self.backend.keys().runners())
            .await?;

        let mut runners = entries
            .into_iter()
            .map(|(id, raw)| -> Result<Runner, BackendError> {
                let active_at = parse_active_at(&id, &raw)?;
                Ok(Runner { id, active_at })
            })
            .collect::<Result<Vec<_>, _>>()?;

        runners.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(runners)
    }

    /// Get one runner's record.
    pub async fn get(&self, id: &str) -> Result<Runner, BackendError> {
        let raw = self
            .backend
            .store()
            .hget(&self.backend.keys().runners(), id)
            .await?
            .ok_or_else(|| BackendError::NotFound(format!("Runner not found: {id}")))?;

        Ok(Runner {
            id: id.to_string(),
            active_at: parse_active_at(id, &raw)?,
        })
    }

    /// Jobs currently running under a runner, in id order.
    pub async fn jobs(&self, id: &str) -> Result<Vec<JobId>, BackendError> {
        let members = self
            .backend
            .store()
            .smembers(&self.backend.keys().runner_jobs(id))
            .await?;

        let mut jobs = members
            .iter()
            .map(|raw| JobId::parse(raw).map_err(|e| BackendError::Serialization(e.to_string())))
            .collect::<Result<Vec<_>, _>>()?;

        jobs.sort();
        Ok(jobs)
    }
}

fn parse_active_at(id: &str, raw: &str) -> Result<DateTime<Utc>, BackendError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| BackendError::Serialization(format!("runner {id} timestamp '{raw}': {e}")))
}
