//! In-process store for tests and local development.

use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;

use super::{Batch, Command, Reply, Store, StoreError};

#[derive(Debug, Clone)]
enum Entry {
    Hash(HashMap<String, String>),
    Set(BTreeSet<String>),
    List(VecDeque<String>),
}

type Data = HashMap<String, Entry>;

/// Store kept in process memory.
///
/// Clones share the same data, so one instance can stand in for a remote
/// store seen by several concurrent callers. Every call yields to the
/// scheduler (or sleeps for the configured latency) before touching the data,
/// which lets concurrent operations interleave the way network round-trips do.
/// Batches run against a copy of the data that replaces the original only
/// when every command succeeded.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    data: Arc<Mutex<Data>>,
    latency: Option<Duration>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate a fixed round-trip latency on every call.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    async fn round_trip(&self) {
        match self.latency {
            Some(latency) => tokio::time::sleep(latency).await,
            None => tokio::task::yield_now().await,
        }
    }

    async fn apply_one(&self, command: Command) -> Result<Reply, StoreError> {
        self.round_trip().await;
        let mut data = self.data.lock().await;
        apply(&mut data, &command)
    }
}

fn wrong_type(key: &str) -> StoreError {
    StoreError::WrongType {
        key: key.to_string(),
    }
}

fn hash_mut<'a>(data: &'a mut Data, key: &str) -> Result<&'a mut HashMap<String, String>, StoreError> {
    match data
        .entry(key.to_string())
        .or_insert_with(|| Entry::Hash(HashMap::new()))
    {
        Entry::Hash(hash) => Ok(hash),
        _ => Err(wrong_type(key)),
    }
}

fn set_mut<'a>(data: &'a mut Data, key: &str) -> Result<&'a mut BTreeSet<String>, StoreError> {
    match data
        .entry(key.to_string())
        .or_insert_with(|| Entry::Set(BTreeSet::new()))
    {
        Entry::Set(set) => Ok(set),
        _ => Err(wrong_type(key)),
    }
}

fn list_mut<'a>(data: &'a mut Data, key: &str) -> Result<&'a mut VecDeque<String>, StoreError> {
    match data
        .entry(key.to_string())
        .or_insert_with(|| Entry::List(VecDeque::new()))
    {
        Entry::List(list) => Ok(list),
        _ => Err(wrong_type(key)),
    }
}

fn hash_ref<'a>(data: &'a Data, key: &str) -> Result<Option<&'a HashMap<String, String>>, StoreError> {
    match data.get(key) {
        None => Ok(None),
        Some(Entry::Hash(hash)) => Ok(Some(hash)),
        Some(_) => Err(wrong_type(key)),
    }
}

fn set_ref<'a>(data: &'a Data, key: &str) -> Result<Option<&'a BTreeSet<String>>, StoreError> {
    match data.get(key) {
        None => Ok(None),
        Some(Entry::Set(set)) => Ok(Some(set)),
        Some(_) => Err(wrong_type(key)),
    }
}

fn list_ref<'a>(data: &'a Data, key: &str) -> Result<Option<&'a VecDeque<String>>, StoreError> {
    match data.get(key) {
        None => Ok(None),
        Some(Entry::List(list)) => Ok(Some(list)),
        Some(_) => Err(wrong_type(key)),
    }
}

/// Empty collections do not exist.
fn prune(data: &mut Data, key: &str) {
    let empty = match data.get(key) {
        Some(Entry::Hash(hash)) => hash.is_empty(),
        Some(Entry::Set(set)) => set.is_empty(),
        Some(Entry::List(list)) => list.is_empty(),
        None => false,
    };
    if empty {
        data.remove(key);
    }
}

fn count(n: usize) -> Reply {
    Reply::Int(i64::try_from(n).unwrap_or(i64::MAX))
}

fn remove_from_list(list: &mut VecDeque<String>, count: i64, value: &str) -> usize {
    let limit = match count {
        0 => usize::MAX,
        n => usize::try_from(n.unsigned_abs()).unwrap_or(usize::MAX),
    };
    let mut removed = 0;

    if count >= 0 {
        list.retain(|item| {
            if removed < limit && item == value {
                removed += 1;
                false
            } else {
                true
            }
        });
    } else {
        let mut kept = VecDeque::with_capacity(list.len());
        while let Some(item) = list.pop_back() {
            if removed < limit && item == value {
                removed += 1;
            } else {
                kept.push_front(item);
            }
        }
        *list = kept;
    }

    removed
}

/// Resolve an inclusive `[start, stop]` range with negative indices counted
/// from the tail, clamped to the list.
fn range_bounds(len: usize, start: i64, stop: i64) -> Option<(usize, usize)> {
    let len = i64::try_from(len).ok()?;
    let start = if start < 0 { (len + start).max(0) } else { start };
    let stop = if stop < 0 { len + stop } else { stop.min(len - 1) };
    if start >= len || start > stop {
        return None;
    }
    Some((usize::try_from(start).ok()?, usize::try_from(stop).ok()?))
}

fn apply(data: &mut Data, command: &Command) -> Result<Reply, StoreError> {
    let reply = match command {
        Command::HSetAll { key, fields } => {
            let hash = hash_mut(data, key)?;
            for (field, value) in fields {
                hash.insert(field.clone(), value.clone());
            }
            prune(data, key);
            Reply::Ok
        }
        Command::HSet { key, field, value } => {
            let created = hash_mut(data, key)?
                .insert(field.clone(), value.clone())
                .is_none();
            count(usize::from(created))
        }
        Command::HDel { key, field } => {
            let removed = match data.get_mut(key) {
                None => false,
                Some(Entry::Hash(hash)) => hash.remove(field).is_some(),
                Some(_) => return Err(wrong_type(key)),
            };
            prune(data, key);
            count(usize::from(removed))
        }
        Command::Del { key } => count(usize::from(data.remove(key).is_some())),
        Command::SAdd { key, member } => {
            let added = set_mut(data, key)?.insert(member.clone());
            count(usize::from(added))
        }
        Command::SRem { key, member } => {
            let removed = match data.get_mut(key) {
                None => false,
                Some(Entry::Set(set)) => set.remove(member),
                Some(_) => return Err(wrong_type(key)),
            };
            prune(data, key);
            count(usize::from(removed))
        }
        Command::RPush { key, value } => {
            let list = list_mut(data, key)?;
            list.push_back(value.clone());
            count(list.len())
        }
        Command::LRem { key, count: n, value } => {
            let removed = match data.get_mut(key) {
                None => 0,
                Some(Entry::List(list)) => remove_from_list(list, *n, value),
                Some(_) => return Err(wrong_type(key)),
            };
            prune(data, key);
            count(removed)
        }
    };
    Ok(reply)
}

fn int_reply(reply: Reply) -> usize {
    reply
        .as_int()
        .and_then(|n| usize::try_from(n).ok())
        .unwrap_or_default()
}

impl Store for MemoryStore {
    async fn hget(&self, key: &str, field: &str) -> Result<Option<String>, StoreError> {
        self.round_trip().await;
        let data = self.data.lock().await;
        Ok(hash_ref(&data, key)?.and_then(|hash| hash.get(field).cloned()))
    }

    async fn hgetall(&self, key: &str) -> Result<HashMap<String, String>, StoreError> {
        self.round_trip().await;
        let data = self.data.lock().await;
        Ok(hash_ref(&data, key)?.cloned().unwrap_or_default())
    }

    async fn hset(&self, key: &str, field: &str, value: &str) -> Result<bool, StoreError> {
        let reply = self
            .apply_one(Command::HSet {
                key: key.to_string(),
                field: field.to_string(),
                value: value.to_string(),
            })
            .await?;
        Ok(int_reply(reply) == 1)
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        self.round_trip().await;
        let data = self.data.lock().await;
        Ok(data.contains_key(key))
    }

    async fn sadd(&self, key: &str, member: &str) -> Result<bool, StoreError> {
        let reply = self
            .apply_one(Command::SAdd {
                key: key.to_string(),
                member: member.to_string(),
            })
            .await?;
        Ok(int_reply(reply) == 1)
    }

    async fn srem(&self, key: &str, member: &str) -> Result<bool, StoreError> {
        let reply = self
            .apply_one(Command::SRem {
                key: key.to_string(),
                member: member.to_string(),
            })
            .await?;
        Ok(int_reply(reply) == 1)
    }

    async fn sismember(&self, key: &str, member: &str) -> Result<bool, StoreError> {
        self.round_trip().await;
        let data = self.data.lock().await;
        Ok(set_ref(&data, key)?.is_some_and(|set| set.contains(member)))
    }

    async fn smembers(&self, key: &str) -> Result<Vec<String>, StoreError> {
        self.round_trip().await;
        let data = self.data.lock().await;
        Ok(set_ref(&data, key)?
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn rpush(&self, key: &str, value: &str) -> Result<usize, StoreError> {
        let reply = self
            .apply_one(Command::RPush {
                key: key.to_string(),
                value: value.to_string(),
            })
            .await?;
        Ok(int_reply(reply))
    }

    async fn lrem(&self, key: &str, count: i64, value: &str) -> Result<usize, StoreError> {
        let reply = self
            .apply_one(Command::LRem {
                key: key.to_string(),
                count,
                value: value.to_string(),
            })
            .await?;
        Ok(int_reply(reply))
    }

    async fn lrange(&self, key: &str, start: i64, stop: i64) -> Result<Vec<String>, StoreError> {
        self.round_trip().await;
        let data = self.data.lock().await;
        let Some(list) = list_ref(&data, key)? else {
            return Ok(Vec::new());
        };
        Ok(match range_bounds(list.len(), start, stop) {
            Some((start, stop)) => list.range(start..=stop).cloned().collect(),
            None => Vec::new(),
        })
    }

    async fn llen(&self, key: &str) -> Result<usize, StoreError> {
        self.round_trip().await;
        let data = self.data.lock().await;
        Ok(list_ref(&data, key)?.map_or(0, VecDeque::len))
    }

    async fn exec(&self, batch: Batch) -> Result<Vec<Reply>, StoreError> {
        self.round_trip().await;
        let mut data = self.data.lock().await;
        let mut staged = data.clone();
        let replies = batch
            .commands()
            .iter()
            .map(|command| apply(&mut staged, command))
            .collect::<Result<Vec<_>, _>>()?;
        *data = staged;
        Ok(replies)
    }
}
