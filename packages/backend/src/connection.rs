//! Backend handle: a store plus key naming and fan-out settings.

use crate::config::{BackendConfig, DEFAULT_CONCURRENCY};
use crate::keys::Keys;
use crate::repositories::{JobRepository, RunnerRepository, TaskRepository, WorkflowRepository};
use crate::store::{AnyStore, Store};
use crate::BackendError;

/// Entry point to the repositories.
///
/// Holds no records; every repository call reads what it needs from the
/// store. Clone it freely when the store is cheap to clone.
#[derive(Debug, Clone)]
pub struct Backend<S> {
    store: S,
    keys: Keys,
    concurrency: usize,
}

impl<S: Store> Backend<S> {
    /// Wrap a store with default settings.
    pub fn new(store: S) -> Self {
        Self {
            store,
            keys: Keys::default(),
            concurrency: DEFAULT_CONCURRENCY,
        }
    }

    /// Wrap a store, taking key prefix and fan-out bound from a config.
    pub fn with_config(store: S, config: &BackendConfig) -> Self {
        Self {
            store,
            keys: Keys::new(config.key_prefix.clone()),
            concurrency: config.concurrency.max(1),
        }
    }

    pub fn tasks(&self) -> TaskRepository<'_, S> {
        TaskRepository::new(self)
    }

    pub fn workflows(&self) -> WorkflowRepository<'_, S> {
        WorkflowRepository::new(self)
    }

    pub fn jobs(&self) -> JobRepository<'_, S> {
        JobRepository::new(self)
    }

    pub fn runners(&self) -> RunnerRepository<'_, S> {
        RunnerRepository::new(self)
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn keys(&self) -> &Keys {
        &self.keys
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }
}

/// Connect to the store a config points at.
pub async fn connect(config: BackendConfig) -> Result<Backend<AnyStore>, BackendError> {
    tracing::info!("Connecting to workflow store: {}", redact(&config.endpoint));

    let store = AnyStore::connect(&config.endpoint).await?;

    tracing::info!(
        "Connected to workflow store ({:?}, prefix: {})",
        store.kind(),
        config.key_prefix.as_deref().unwrap_or("<none>")
    );

    Ok(Backend::with_config(store, &config))
}

fn redact(endpoint: &str) -> String {
    match endpoint.split_once("://") {
        Some((scheme, rest)) => match rest.rsplit_once('@') {
            Some((_, host)) => format!("{scheme}://***@{host}"),
            None => endpoint.to_string(),
        },
        None => endpoint.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passwords_are_not_logged() {
        assert_eq!(redact("redis://:pw@cache:6379/0"), "redis://***@cache:6379/0");
        assert_eq!(redact("mem://"), "mem://");
    }

    #[tokio::test]
    async fn connect_applies_prefix() {
        let backend = connect(BackendConfig::memory().with_prefix("test").with_concurrency(3))
            .await
            .unwrap();

        assert_eq!(backend.keys().prefix(), Some("test"));
        assert_eq!(backend.concurrency(), 3);
    }
}
