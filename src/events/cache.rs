use anyhow::Result;
use axum::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::{BTreeSet, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::error;

/// A key/value store with string values, set values and per-key expiry.
#[async_trait]
pub trait Cache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;

    async fn set(&self, key: &str, value: String, ttl: Option<Duration>) -> Result<()>;

    /// Overwrites an existing value and keeps its expiry. Returns `false` when the key is
    /// absent, in which case nothing is written.
    async fn replace(&self, key: &str, value: String) -> Result<bool>;

    async fn delete(&self, key: &str) -> Result<()>;

    /// Returns `true` when `member` was not in the set yet.
    async fn add_to_set(&self, key: &str, member: &str) -> Result<bool>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Value {
    Text(String),
    Set(BTreeSet<String>),
}

#[derive(Debug, Clone)]
struct Entry {
    value: Value,
    expires_at: Option<DateTime<Utc>>,
}

impl Entry {
    fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map(|at| at > now).unwrap_or(true)
    }
}

/// Process-local [`Cache`] used by the local harness and tests.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, Entry>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn members(&self, key: &str) -> Result<Vec<String>> {
        let mut entries = self.lock()?;
        match live(&mut entries, key).map(|e| &e.value) {
            Some(Value::Set(members)) => Ok(members.iter().cloned().collect()),
            Some(Value::Text(_)) => Err(wrong_type(key)),
            None => Ok(vec![]),
        }
    }

    pub fn expires_at(&self, key: &str) -> Result<Option<DateTime<Utc>>> {
        let mut entries = self.lock()?;
        Ok(live(&mut entries, key).and_then(|e| e.expires_at))
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, Entry>>> {
        self.entries.lock().map_err(from_guard)
    }
}

/// Drops `key` if it has expired and returns what is left.
fn live<'a>(entries: &'a mut HashMap<String, Entry>, key: &str) -> Option<&'a mut Entry> {
    let now = Utc::now();
    if entries.get(key).map(|e| !e.is_live(now)).unwrap_or(false) {
        entries.remove(key);
    }
    entries.get_mut(key)
}

fn wrong_type(key: &str) -> anyhow::Error {
    anyhow::anyhow!("`{key}` holds a value of another type")
}

fn from_guard<T>(error: PoisonError<T>) -> anyhow::Error {
    error!("{error}");
    anyhow::anyhow!("{error}")
}

#[async_trait]
impl Cache for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut entries = self.lock()?;
        match live(&mut entries, key).map(|e| &e.value) {
            Some(Value::Text(value)) => Ok(Some(value.clone())),
            Some(Value::Set(_)) => Err(wrong_type(key)),
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: String, ttl: Option<Duration>) -> Result<()> {
        let entry = Entry {
            value: Value::Text(value),
            expires_at: ttl.map(|ttl| Utc::now() + ttl),
        };
        self.lock()?.insert(key.to_string(), entry);
        Ok(())
    }

    async fn replace(&self, key: &str, value: String) -> Result<bool> {
        let mut entries = self.lock()?;
        match live(&mut entries, key) {
            Some(entry) => match entry.value {
                Value::Text(_) => {
                    entry.value = Value::Text(value);
                    Ok(true)
                }
                Value::Set(_) => Err(wrong_type(key)),
            },
            None => Ok(false),
        }
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.lock()?.remove(key);
        Ok(())
    }

    async fn add_to_set(&self, key: &str, member: &str) -> Result<bool> {
        let mut entries = self.lock()?;
        if live(&mut entries, key).is_none() {
            entries.insert(
                key.to_string(),
                Entry {
                    value: Value::Set(BTreeSet::new()),
                    expires_at: None,
                },
            );
        }

        match entries.get_mut(key).map(|e| &mut e.value) {
            Some(Value::Set(members)) => Ok(members.insert(member.to_string())),
            _ => Err(wrong_type(key)),
        }
    }
}
