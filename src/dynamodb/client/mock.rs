use super::{
    Client, DescribeLogOutput, GetIteratorOutput, GetRecordsOutput, GetShardsOutput, Records,
    ShardDescription, ShardPosition,
};
use crate::dynamodb::types::Record;
use crate::error::IteratorExpired;

use anyhow::Result;
use axum::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// An in-memory change log. Iterators are `"{shard_id}#{n}"`.
#[derive(Debug, Clone, Default)]
pub struct MockClient {
    source: Arc<Mutex<StreamSource>>,
}

#[derive(Debug, Default)]
pub struct StreamSource {
    pub enabled: bool,
    pub log_id: Option<String>,
    pub shards: Vec<MockShard>,
    pub page_size: usize,
    pub read_delay: Option<Duration>,
    pub fail_reads: usize,
    /// Reads that report the iterator as expired.
    pub expire_reads: usize,
    /// Resuming after a sequence number fails as if that record had been trimmed.
    pub trimmed: bool,
    pub get_records_calls: usize,
    pub describe_calls: usize,
    pub iterator_requests: Vec<(String, ShardPosition)>,
}

#[derive(Debug, Clone)]
pub struct MockShard {
    pub id: String,
    pub parent: Option<String>,
    pub pages: VecDeque<Vec<Record>>,
    /// Close the shard once every page has been read.
    pub closes: bool,
    pub served: usize,
}

impl MockShard {
    pub fn new<T: Into<String>>(id: T, parent: Option<&str>) -> Self {
        Self {
            id: id.into(),
            parent: parent.map(String::from),
            pages: VecDeque::new(),
            closes: false,
            served: 0,
        }
    }

    pub fn page<I: IntoIterator<Item = Record>>(mut self, records: I) -> Self {
        self.pages.push_back(records.into_iter().collect());
        self
    }

    pub fn closing(self) -> Self {
        Self {
            closes: true,
            ..self
        }
    }
}

impl MockClient {
    pub fn new<I: IntoIterator<Item = MockShard>>(shards: I) -> Self {
        let source = StreamSource {
            enabled: true,
            log_id: Some("arn:aws:dynamodb:local:000000000000:table/Social/stream/1".into()),
            shards: shards.into_iter().collect(),
            page_size: 2,
            ..StreamSource::default()
        };
        Self {
            source: Arc::new(Mutex::new(source)),
        }
    }

    pub fn with<F: FnOnce(&mut StreamSource)>(self, f: F) -> Self {
        f(&mut self.source.lock().unwrap());
        self
    }

    pub fn source(&self) -> std::sync::MutexGuard<'_, StreamSource> {
        self.source.lock().unwrap()
    }

    pub fn push_page<I: IntoIterator<Item = Record>>(&self, shard_id: &str, records: I) {
        let mut source = self.source();
        if let Some(shard) = source.shards.iter_mut().find(|s| s.id == shard_id) {
            shard.pages.push_back(records.into_iter().collect());
        }
    }

    pub fn with_shard<F: FnOnce(&mut MockShard)>(&self, shard_id: &str, f: F) {
        if let Some(shard) = self.source().shards.iter_mut().find(|s| s.id == shard_id) {
            f(shard);
        }
    }

    pub fn add_shard(&self, shard: MockShard) {
        self.source().shards.push(shard);
    }

    pub fn get_records_calls(&self) -> usize {
        self.source().get_records_calls
    }
}

#[async_trait]
impl Client for MockClient {
    async fn describe_log(&self, _table: &str) -> Result<DescribeLogOutput> {
        let source = self.source();
        Ok(DescribeLogOutput {
            enabled: source.enabled,
            log_id: source.log_id.clone(),
        })
    }

    async fn get_shards(
        &self,
        log_id: &str,
        exclusive_shard_id: Option<String>,
    ) -> Result<GetShardsOutput> {
        let mut source = self.source();
        assert_eq!(source.log_id.as_deref(), Some(log_id));
        source.describe_calls += 1;

        let start = exclusive_shard_id
            .and_then(|id| source.shards.iter().position(|s| s.id == id))
            .map(|n| n + 1)
            .unwrap_or(0);

        let page: Vec<ShardDescription> = source
            .shards
            .iter()
            .skip(start)
            .take(source.page_size)
            .map(|s| ShardDescription {
                id: s.id.clone(),
                parent: s.parent.clone(),
            })
            .collect();

        let last_shard_id = if start + page.len() < source.shards.len() {
            page.last().map(|s| s.id.clone())
        } else {
            None
        };

        Ok(GetShardsOutput {
            shards: page,
            last_shard_id,
        })
    }

    async fn get_iterator(
        &self,
        _log_id: &str,
        shard_id: &str,
        position: ShardPosition,
    ) -> Result<GetIteratorOutput> {
        let mut source = self.source();
        let trimmed = source.trimmed && matches!(position, ShardPosition::After(_));
        source
            .iterator_requests
            .push((shard_id.to_string(), position));

        if trimmed {
            return Err(anyhow::Error::new(IteratorExpired("trimmed".into())));
        }

        let iterator = source
            .shards
            .iter()
            .find(|s| s.id == shard_id)
            .map(|s| format!("{}#{}", s.id, s.served));

        Ok(GetIteratorOutput { iterator })
    }

    async fn get_records(&self, iterator: &str) -> Result<GetRecordsOutput> {
        let delay = {
            let mut source = self.source();
            source.get_records_calls += 1;
            source.read_delay
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut source = self.source();
        if source.fail_reads > 0 {
            source.fail_reads -= 1;
            return Err(anyhow::anyhow!("Throttled"));
        }
        if source.expire_reads > 0 {
            source.expire_reads -= 1;
            return Err(anyhow::Error::new(IteratorExpired(iterator.to_string())));
        }

        let shard_id = iterator.split('#').next().unwrap_or_default();
        let shard = source
            .shards
            .iter_mut()
            .find(|s| s.id == shard_id)
            .ok_or(anyhow::anyhow!("Unknown iterator `{iterator}`"))?;

        let records: Records = shard.pages.pop_front().unwrap_or_default().into();
        shard.served += 1;

        let next_iterator = if shard.closes && shard.pages.is_empty() {
            None
        } else {
            Some(format!("{}#{}", shard.id, shard.served))
        };

        Ok(GetRecordsOutput {
            records,
            next_iterator,
        })
    }
}
