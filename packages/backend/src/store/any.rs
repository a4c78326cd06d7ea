use std::collections::HashMap;

#[cfg(feature = "redis")]
use super::RedisStore;
use super::{Batch, MemoryStore, Reply, Store, StoreError};

/// Store implementation named by an endpoint URL scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    /// `mem://`
    Memory,
    /// `redis://` or `rediss://`
    Redis,
}

impl StoreKind {
    /// Pick the store kind from an endpoint URL.
    pub fn from_endpoint(endpoint: &str) -> Option<Self> {
        let (scheme, _) = endpoint.split_once("://")?;
        match scheme {
            "mem" | "memory" => Some(StoreKind::Memory),
            "redis" | "rediss" => Some(StoreKind::Redis),
            _ => None,
        }
    }
}

/// Either store, chosen at runtime.
#[derive(Debug, Clone)]
pub enum AnyStore {
    Memory(MemoryStore),
    #[cfg(feature = "redis")]
    Redis(RedisStore),
}

impl AnyStore {
    /// Open the store an endpoint URL points at.
    pub async fn connect(endpoint: &str) -> Result<Self, StoreError> {
        match StoreKind::from_endpoint(endpoint) {
            Some(StoreKind::Memory) => Ok(AnyStore::Memory(MemoryStore::new())),
            #[cfg(feature = "redis")]
            Some(StoreKind::Redis) => Ok(AnyStore::Redis(RedisStore::connect(endpoint).await?)),
            #[cfg(not(feature = "redis"))]
            Some(StoreKind::Redis) => Err(StoreError::Connection(
                "redis endpoints need the `redis` feature".to_string(),
            )),
            None => Err(StoreError::Connection(format!(
                "unsupported store endpoint: {endpoint}"
            ))),
        }
    }

    pub fn kind(&self) -> StoreKind {
        match self {
            AnyStore::Memory(_) => StoreKind::Memory,
            #[cfg(feature = "redis")]
            AnyStore::Redis(_) => StoreKind::Redis,
        }
    }
}

impl From<MemoryStore> for AnyStore {
    fn from(store: MemoryStore) -> Self {
        AnyStore::Memory(store)
    }
}

#[cfg(feature = "redis")]
impl From<RedisStore> for AnyStore {
    fn from(store: RedisStore) -> Self {
        AnyStore::Redis(store)
    }
}

macro_rules! dispatch {
    ($self:ident, $store:ident => $call:expr) => {
        match $self {
            AnyStore::Memory($store) => $call,
            #[cfg(feature = "redis")]
            AnyStore::Redis($store) => $call,
        }
    };
}

impl Store for AnyStore {
    async fn hget(&self, key: &str, field: &str) -> Result<Option<String>, StoreError> {
        dispatch!(self, s => s.hget(key, field).await)
    }

    async fn hgetall(&self, key: &str) -> Result<HashMap<String, String>, StoreError> {
        dispatch!(self, s => s.hgetall(key).await)
    }

    async fn hset(&self, key: &str, field: &str, value: &str) -> Result<bool, StoreError> {
        dispatch!(self, s => s.hset(key, field, value).await)
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        dispatch!(self, s => s.exists(key).await)
    }

    async fn sadd(&self, key: &str, member: &str) -> Result<bool, StoreError> {
        dispatch!(self, s => s.sadd(key, member).await)
    }

    async fn srem(&self, key: &str, member: &str) -> Result<bool, StoreError> {
        dispatch!(self, s => s.srem(key, member).await)
    }

    async fn sismember(&self, key: &str, member: &str) -> Result<bool, StoreError> {
        dispatch!(self, s => s.sismember(key, member).await)
    }

    async fn smembers(&self, key: &str) -> Result<Vec<String>, StoreError> {
        dispatch!(self, s => s.smembers(key).await)
    }

    async fn rpush(&self, key: &str, value: &str) -> Result<usize, StoreError> {
        dispatch!(self, s => s.rpush(key, value).await)
    }

    async fn lrem(&self, key: &str, count: i64, value: &str) -> Result<usize, StoreError> {
        dispatch!(self, s => s.lrem(key, count, value).await)
    }

    async fn lrange(&self, key: &str, start: i64, stop: i64) -> Result<Vec<String>, StoreError> {
        dispatch!(self, s => s.lrange(key, start, stop).await)
    }

    async fn llen(&self, key: &str) -> Result<usize, StoreError> {
        dispatch!(self, s => s.llen(key).await)
    }

    async fn exec(&self, batch: Batch) -> Result<Vec<Reply>, StoreError> {
        dispatch!(self, s => s.exec(batch).await)
    }
}
