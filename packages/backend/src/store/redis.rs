//! Redis-backed store.
//!
//! Single commands map one-to-one onto Redis commands; a [`Batch`] becomes a
//! `MULTI`/`EXEC` pipeline so its commands are applied together with no
//! other client's commands interleaved.

use std::collections::HashMap;

use ::redis::AsyncCommands;
use ::redis::aio::MultiplexedConnection;

use super::{Batch, Command, Reply, Store, StoreError};

/// Store talking to a Redis server over one multiplexed connection.
///
/// Cloning is cheap; all clones share the same TCP connection.
#[derive(Clone)]
pub struct RedisStore {
    conn: MultiplexedConnection,
}

impl std::fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisStore").finish_non_exhaustive()
    }
}

impl RedisStore {
    /// Connect to `redis://[:<password>@]<host>:<port>[/<db>]`.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let client = ::redis::Client::open(url)?;
        let conn = client.get_multiplexed_async_connection().await?;
        Ok(Self { conn })
    }

    /// Wrap an already established connection.
    pub fn with_connection(conn: MultiplexedConnection) -> Self {
        Self { conn }
    }
}

fn to_count(n: i64) -> usize {
    usize::try_from(n).unwrap_or_default()
}

impl Store for RedisStore {
    async fn hget(&self, key: &str, field: &str) -> Result<Option<String>, StoreError> {
        let mut conn = self.conn.clone();
        let value: Option<String> = conn.hget(key, field).await?;
        Ok(value)
    }

    async fn hgetall(&self, key: &str) -> Result<HashMap<String, String>, StoreError> {
        let mut conn = self.conn.clone();
        let fields: HashMap<String, String> = conn.hgetall(key).await?;
        Ok(fields)
    }

    async fn hset(&self, key: &str, field: &str, value: &str) -> Result<bool, StoreError> {
        let mut conn = self.conn.clone();
        let created: i64 = conn.hset(key, field, value).await?;
        Ok(created == 1)
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        let mut conn = self.conn.clone();
        let exists: bool = conn.exists(key).await?;
        Ok(exists)
    }

    async fn sadd(&self, key: &str, member: &str) -> Result<bool, StoreError> {
        let mut conn = self.conn.clone();
        let added: i64 = conn.sadd(key, member).await?;
        Ok(added == 1)
    }

    async fn srem(&self, key: &str, member: &str) -> Result<bool, StoreError> {
        let mut conn = self.conn.clone();
        let removed: i64 = conn.srem(key, member).await?;
        Ok(removed == 1)
    }

    async fn sismember(&self, key: &str, member: &str) -> Result<bool, StoreError> {
        let mut conn = self.conn.clone();
        let member: bool = conn.sismember(key, member).await?;
        Ok(member)
    }

    async fn smembers(&self, key: &str) -> Result<Vec<String>, StoreError> {
        let mut conn = self.conn.clone();
        let members: Vec<String> = conn.smembers(key).await?;
        Ok(members)
    }

    async fn rpush(&self, key: &str, value: &str) -> Result<usize, StoreError> {
        let mut conn = self.conn.clone();
        let len: i64 = conn.rpush(key, value).await?;
        Ok(to_count(len))
    }

    async fn lrem(&self, key: &str, count: i64, value: &str) -> Result<usize, StoreError> {
        let mut conn = self.conn.clone();
        let count = isize::try_from(count).unwrap_or(isize::MAX);
        let removed: i64 = conn.lrem(key, count, value).await?;
        Ok(to_count(removed))
    }

    async fn lrange(&self, key: &str, start: i64, stop: i64) -> Result<Vec<String>, StoreError> {
        let mut conn = self.conn.clone();
        let start = isize::try_from(start).unwrap_or(isize::MAX);
        let stop = isize::try_from(stop).unwrap_or(isize::MAX);
        let values: Vec<String> = conn.lrange(key, start, stop).await?;
        Ok(values)
    }

    async fn llen(&self, key: &str) -> Result<usize, StoreError> {
        let mut conn = self.conn.clone();
        let len: i64 = conn.llen(key).await?;
        Ok(to_count(len))
    }

    async fn exec(&self, batch: Batch) -> Result<Vec<Reply>, StoreError> {
        let mut pipe = ::redis::pipe();
        pipe.atomic();

        for command in batch.commands() {
            match command {
                Command::HSetAll { key, fields } => {
                    if fields.is_empty() {
                        // HSET with no field/value pairs is a syntax error.
                        pipe.exists(key);
                    } else {
                        pipe.hset_multiple(key, fields.as_slice());
                    }
                }
                Command::HSet { key, field, value } => {
                    pipe.hset(key, field, value);
                }
                Command::HDel { key, field } => {
                    pipe.hdel(key, field);
                }
                Command::Del { key } => {
                    pipe.del(key);
                }
                Command::SAdd { key, member } => {
                    pipe.sadd(key, member);
                }
                Command::SRem { key, member } => {
                    pipe.srem(key, member);
                }
                Command::RPush { key, value } => {
                    pipe.rpush(key, value);
                }
                Command::LRem { key, count, value } => {
                    let count = isize::try_from(*count).unwrap_or(isize::MAX);
                    pipe.lrem(key, count, value);
                }
            }
        }

        let mut conn = self.conn.clone();
        let replies: Vec<::redis::Value> = pipe.query_async(&mut conn).await?;

        replies.into_iter().map(to_reply).collect()
    }
}

/// Map one `EXEC` reply. An error reply for a single command still fails the
/// call even though Redis applied the rest of the transaction.
fn to_reply(value: ::redis::Value) -> Result<Reply, StoreError> {
    match value.extract_error()? {
        ::redis::Value::Int(n) => Ok(Reply::Int(n)),
        _ => Ok(Reply::Ok),
    }
}
