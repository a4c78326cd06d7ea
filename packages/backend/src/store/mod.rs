//! Store client adapter.
//!
//! The backend only needs a handful of primitives from its key-value/list/set
//! store: hash reads and writes, set membership, list push/remove/range, and a
//! batch that applies several commands as one transaction. [`Store`] is that
//! surface; [`MemoryStore`] and (with the `redis` feature) [`RedisStore`]
//! implement it, and [`AnyStore`] picks one from an endpoint URL.

mod any;
mod memory;
#[cfg(feature = "redis")]
mod redis;

use std::collections::HashMap;
use std::future::Future;

use thiserror::Error;

pub use any::{AnyStore, StoreKind};
pub use memory::MemoryStore;
#[cfg(feature = "redis")]
pub use self::redis::RedisStore;

/// Errors raised by a store implementation.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("WRONGTYPE operation against key {key} holding the wrong kind of value")]
    WrongType { key: String },

    #[error("Connection error: {0}")]
    Connection(String),

    #[cfg(feature = "redis")]
    #[error("Redis error: {0}")]
    Redis(#[from] ::redis::RedisError),
}

/// A single write queued inside a [`Batch`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Set several hash fields at once.
    HSetAll {
        key: String,
        fields: Vec<(String, String)>,
    },
    /// Set one hash field.
    HSet {
        key: String,
        field: String,
        value: String,
    },
    /// Delete one hash field.
    HDel { key: String, field: String },
    /// Delete a whole key of any type.
    Del { key: String },
    /// Add a set member.
    SAdd { key: String, member: String },
    /// Remove a set member.
    SRem { key: String, member: String },
    /// Append to the tail of a list.
    RPush { key: String, value: String },
    /// Remove up to `count` occurrences of `value` (0 = all, negative = from the tail).
    LRem {
        key: String,
        count: i64,
        value: String,
    },
}

/// Reply to one command of an executed [`Batch`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reply {
    Ok,
    Int(i64),
}

impl Reply {
    /// Integer payload, if the command returned one.
    pub(crate) fn as_int(&self) -> Option<i64> {
        match self {
            Reply::Int(n) => Some(*n),
            Reply::Ok => None,
        }
    }
}

/// Commands queued for atomic execution through [`Store::exec`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Batch {
    commands: Vec<Command>,
}

impl Batch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn hset_all(&mut self, key: impl Into<String>, fields: Vec<(String, String)>) -> &mut Self {
        self.push(Command::HSetAll {
            key: key.into(),
            fields,
        })
    }

    pub fn hset(
        &mut self,
        key: impl Into<String>,
        field: impl Into<String>,
        value: impl Into<String>,
    ) -> &mut Self {
        self.push(Command::HSet {
            key: key.into(),
            field: field.into(),
            value: value.into(),
        })
    }

    pub fn hdel(&mut self, key: impl Into<String>, field: impl Into<String>) -> &mut Self {
        self.push(Command::HDel {
            key: key.into(),
            field: field.into(),
        })
    }

    pub fn del(&mut self, key: impl Into<String>) -> &mut Self {
        self.push(Command::Del { key: key.into() })
    }

    pub fn sadd(&mut self, key: impl Into<String>, member: impl Into<String>) -> &mut Self {
        self.push(Command::SAdd {
            key: key.into(),
            member: member.into(),
        })
    }

    pub fn srem(&mut self, key: impl Into<String>, member: impl Into<String>) -> &mut Self {
        self.push(Command::SRem {
            key: key.into(),
            member: member.into(),
        })
    }

    pub fn rpush(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.push(Command::RPush {
            key: key.into(),
            value: value.into(),
        })
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    fn push(&mut self, command: Command) -> &mut Self {
        self.commands.push(command);
        self
    }
}

/// Primitives the backend needs from its remote store.
///
/// Every call is one round-trip. Single commands are atomic on their own;
/// [`Store::exec`] applies a whole [`Batch`] without interleaving other
/// clients' commands and returns one [`Reply`] per command.
pub trait Store: Send + Sync {
    /// Read one hash field.
    fn hget(
        &self,
        key: &str,
        field: &str,
    ) -> impl Future<Output = Result<Option<String>, StoreError>> + Send;

    /// Read every field of a hash. Missing keys read as empty.
    fn hgetall(
        &self,
        key: &str,
    ) -> impl Future<Output = Result<HashMap<String, String>, StoreError>> + Send;

    /// Set one hash field. Returns `true` if the field was created.
    fn hset(
        &self,
        key: &str,
        field: &str,
        value: &str,
    ) -> impl Future<Output = Result<bool, StoreError>> + Send;

    /// Check whether a key exists.
    fn exists(&self, key: &str) -> impl Future<Output = Result<bool, StoreError>> + Send;

    /// Add a set member. Returns `true` only if it was not already present,
    /// which makes this the store's atomic add-if-absent primitive.
    fn sadd(
        &self,
        key: &str,
        member: &str,
    ) -> impl Future<Output = Result<bool, StoreError>> + Send;

    /// Remove a set member. Returns `true` if it was present.
    fn srem(
        &self,
        key: &str,
        member: &str,
    ) -> impl Future<Output = Result<bool, StoreError>> + Send;

    /// Check set membership.
    fn sismember(
        &self,
        key: &str,
        member: &str,
    ) -> impl Future<Output = Result<bool, StoreError>> + Send;

    /// List set members, in no particular order.
    fn smembers(&self, key: &str) -> impl Future<Output = Result<Vec<String>, StoreError>> + Send;

    /// Append to the tail of a list. Returns the new length.
    fn rpush(
        &self,
        key: &str,
        value: &str,
    ) -> impl Future<Output = Result<usize, StoreError>> + Send;

    /// Remove occurrences of `value` from a list and return exactly how many
    /// were removed. `count` follows list-remove semantics: 0 removes all,
    /// positive counts from the head, negative from the tail.
    fn lrem(
        &self,
        key: &str,
        count: i64,
        value: &str,
    ) -> impl Future<Output = Result<usize, StoreError>> + Send;

    /// Read the inclusive range `[start, stop]`; negative indices count from
    /// the tail.
    fn lrange(
        &self,
        key: &str,
        start: i64,
        stop: i64,
    ) -> impl Future<Output = Result<Vec<String>, StoreError>> + Send;

    /// Length of a list.
    fn llen(&self, key: &str) -> impl Future<Output = Result<usize, StoreError>> + Send;

    /// Execute a batch as one transaction.
    ///
    /// No other client observes a partly applied batch. What happens when a
    /// command fails at runtime differs: [`MemoryStore`] discards the whole
    /// batch, while Redis `MULTI/EXEC` keeps the commands that succeeded and
    /// only reports the failure. Callers must not rely on rollback; the
    /// repositories only queue commands that cannot fail on well-typed keys.
    fn exec(&self, batch: Batch) -> impl Future<Output = Result<Vec<Reply>, StoreError>> + Send;
}
