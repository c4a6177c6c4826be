use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

pub type SharedMetrics = Arc<Metrics>;

/// Failures that are logged and isolated instead of propagated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Failure {
    ReadRecords,
    MalformedRecord,
    MissingMetadata,
    CounterWrite,
    FollowerLookup,
    FeedWrite,
    Handler,
    Event,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Counter {
    Polls,
    BatchesDispatched,
    RecordsDispatched,
    CounterUpdates,
    FeedItemsWritten,
    EventsProcessed,
}

#[derive(Debug, Default)]
pub struct Metrics {
    inner: Mutex<Snapshot>,
}

#[derive(Debug, Default, Clone, Serialize, PartialEq, Eq)]
pub struct Snapshot {
    pub counters: BTreeMap<Counter, u64>,
    pub failures: BTreeMap<Failure, u64>,
    pub handler_failures: BTreeMap<String, u64>,
}

impl Metrics {
    pub fn new() -> SharedMetrics {
        Arc::new(Self::default())
    }

    pub fn fail(&self, kind: Failure) {
        self.add_failures(kind, 1);
    }

    pub fn add_failures(&self, kind: Failure, n: u64) {
        *self.lock().failures.entry(kind).or_default() += n;
    }

    pub fn fail_handler(&self, name: &str) {
        let mut inner = self.lock();
        *inner.failures.entry(Failure::Handler).or_default() += 1;
        *inner.handler_failures.entry(name.to_string()).or_default() += 1;
    }

    pub fn add(&self, counter: Counter, n: u64) {
        *self.lock().counters.entry(counter).or_default() += n;
    }

    pub fn failures(&self, kind: Failure) -> u64 {
        self.lock().failures.get(&kind).copied().unwrap_or(0)
    }

    pub fn handler_failures(&self, name: &str) -> u64 {
        self.lock().handler_failures.get(name).copied().unwrap_or(0)
    }

    pub fn count(&self, counter: Counter) -> u64 {
        self.lock().counters.get(&counter).copied().unwrap_or(0)
    }

    pub fn snapshot(&self) -> Snapshot {
        self.lock().clone()
    }

    // Counters stay usable even if a panicking thread held the lock.
    fn lock(&self) -> MutexGuard<'_, Snapshot> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
