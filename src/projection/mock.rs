use super::{
    CounterDelta, CounterStore, FailedWrite, FeedItem, FeedStore, FollowerDirectory,
    ProjectionTarget,
};

use anyhow::Result;
use axum::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

#[derive(Debug, Default)]
pub struct MemoryCounters {
    pub adds: Mutex<Vec<(ProjectionTarget, CounterDelta)>>,
    pub fail: bool,
}

impl MemoryCounters {
    pub fn adds(&self) -> Vec<(ProjectionTarget, CounterDelta)> {
        self.adds.lock().unwrap().clone()
    }

    pub fn total(&self, target: &ProjectionTarget, attribute: &str) -> i64 {
        self.adds()
            .iter()
            .filter(|(t, d)| t == target && d.attribute == attribute)
            .map(|(_, d)| d.delta)
            .sum()
    }
}

#[async_trait]
impl CounterStore for MemoryCounters {
    async fn add(&self, target: &ProjectionTarget, delta: &CounterDelta) -> Result<()> {
        if self.fail {
            return Err(anyhow::anyhow!("ProvisionedThroughputExceeded"));
        }
        self.adds
            .lock()
            .unwrap()
            .push((target.clone(), delta.clone()));
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MemoryDirectory {
    pub followers: HashMap<String, Vec<String>>,
    /// Reported count, when it should differ from the stored list.
    pub counts: HashMap<String, u64>,
    pub fail: bool,
    pub list_calls: Mutex<usize>,
}

impl MemoryDirectory {
    pub fn with_followers(user_id: &str, n: usize) -> Self {
        let followers = (0..n).map(|i| format!("follower-{i:03}")).collect();
        Self {
            followers: HashMap::from([(user_id.to_string(), followers)]),
            ..Self::default()
        }
    }

    pub fn list_calls(&self) -> usize {
        *self.list_calls.lock().unwrap()
    }
}

#[async_trait]
impl FollowerDirectory for MemoryDirectory {
    async fn follower_count(&self, user_id: &str) -> Result<u64> {
        if self.fail {
            return Err(anyhow::anyhow!("ResourceNotFoundException"));
        }
        let stored = self.followers.get(user_id).map(Vec::len).unwrap_or(0) as u64;
        Ok(self.counts.get(user_id).copied().unwrap_or(stored))
    }

    async fn follower_ids(&self, user_id: &str) -> Result<Vec<String>> {
        *self.list_calls.lock().unwrap() += 1;
        Ok(self.followers.get(user_id).cloned().unwrap_or_default())
    }
}

#[derive(Debug, Default)]
pub struct MemoryFeed {
    pub chunks: Mutex<Vec<usize>>,
    pub items: Mutex<Vec<FeedItem>>,
    /// Followers whose single write is rejected.
    pub reject: HashSet<String>,
    /// Fails the whole chunk that contains this follower.
    pub fail_chunk_with: Option<String>,
}

impl MemoryFeed {
    pub fn items(&self) -> Vec<FeedItem> {
        self.items.lock().unwrap().clone()
    }

    pub fn chunk_sizes(&self) -> Vec<usize> {
        let mut sizes = self.chunks.lock().unwrap().clone();
        sizes.sort_unstable_by(|a, b| b.cmp(a));
        sizes
    }
}

#[async_trait]
impl FeedStore for MemoryFeed {
    async fn write_chunk(&self, items: Vec<FeedItem>) -> Result<Vec<FailedWrite>> {
        self.chunks.lock().unwrap().push(items.len());

        if let Some(follower) = self.fail_chunk_with.as_deref() {
            if items.iter().any(|i| i.user_id == follower) {
                return Err(anyhow::anyhow!("InternalServerError"));
            }
        }

        let (rejected, accepted): (Vec<FeedItem>, Vec<FeedItem>) = items
            .into_iter()
            .partition(|i| self.reject.contains(&i.user_id));

        self.items.lock().unwrap().extend(accepted);

        Ok(rejected
            .into_iter()
            .map(|i| FailedWrite {
                user_id: i.user_id,
                reason: "ValidationException".into(),
            })
            .collect())
    }
}
