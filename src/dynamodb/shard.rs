use super::{
    client::{Client, GetIteratorOutput, GetRecordsOutput, GetShardsOutput, ShardDescription},
    types::{Record, Records, ShardIteratorType, ShardPosition},
};
use crate::error::IteratorExpired;

use anyhow::Result;
use std::sync::Arc;
use tracing::warn;

/// Owns the continuation cursor of one shard.
pub struct ShardCursorManager {
    client: Arc<dyn Client>,
    log_id: String,
    shard: ShardDescription,
    start: ShardIteratorType,
    iterator: Option<String>,
    last_sequence_number: Option<String>,
}

impl std::fmt::Debug for ShardCursorManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShardCursorManager")
            .field("shard", &self.shard)
            .field("iterator", &self.iterator)
            .field("last_sequence_number", &self.last_sequence_number)
            .finish()
    }
}

impl ShardCursorManager {
    /// Creates the first cursor of `shard`. A shard that is already gone yields a closed
    /// manager rather than an error.
    pub async fn initialize(
        client: Arc<dyn Client>,
        log_id: &str,
        shard: ShardDescription,
        iterator_type: ShardIteratorType,
    ) -> Result<Self> {
        let output = client
            .get_iterator(log_id, &shard.id, iterator_type.into())
            .await?;

        Ok(Self {
            client,
            log_id: log_id.to_string(),
            shard,
            start: iterator_type,
            iterator: output.iterator,
            last_sequence_number: None,
        })
    }

    pub fn shard_id(&self) -> &str {
        self.shard.id.as_str()
    }

    pub fn log_id(&self) -> &str {
        self.log_id.as_str()
    }

    pub fn is_closed(&self) -> bool {
        self.iterator.is_none()
    }

    /// Reads the next page and moves the cursor past it. On error the cursor is left
    /// untouched so the same page can be retried. An expired iterator is replaced by one
    /// positioned right after the last record read.
    pub async fn advance(&mut self) -> Result<Records> {
        let Some(iterator) = self.iterator.clone() else {
            return Ok(Records::new());
        };

        let output = match self.client.get_records(&iterator).await {
            Ok(output) => output,
            Err(err) if err.is::<IteratorExpired>() => {
                warn!(shard_id = %self.shard.id, error = %err, "Repositioning shard cursor");
                self.reposition().await?;
                match self.iterator.as_deref() {
                    Some(iterator) => self.client.get_records(iterator).await?,
                    None => return Ok(Records::new()),
                }
            }
            Err(err) => return Err(err),
        };

        let GetRecordsOutput {
            mut records,
            next_iterator,
        } = output;

        self.iterator = next_iterator;
        records.sort();
        if let Some(last) = records.iter().filter_map(Record::sequence_number).last() {
            self.last_sequence_number = Some(last.to_string());
        }
        Ok(records)
    }

    async fn reposition(&mut self) -> Result<()> {
        let position = match &self.last_sequence_number {
            Some(sequence_number) => ShardPosition::After(sequence_number.clone()),
            None => ShardPosition::Start(self.start),
        };

        let GetIteratorOutput { iterator } = match self
            .client
            .get_iterator(&self.log_id, &self.shard.id, position)
            .await
        {
            Err(err) if err.is::<IteratorExpired>() => {
                warn!(
                    shard_id = %self.shard.id,
                    error = %err,
                    "Last record read was trimmed, resuming from the oldest record"
                );
                self.client
                    .get_iterator(&self.log_id, &self.shard.id, ShardIteratorType::TrimHorizon.into())
                    .await?
            }
            result => result?,
        };

        self.iterator = iterator;
        Ok(())
    }
}

/// Lists every shard of the log, following `LastEvaluatedShardId` pagination.
pub async fn discover(client: &dyn Client, log_id: &str) -> Result<Vec<ShardDescription>> {
    let GetShardsOutput {
        mut shards,
        mut last_shard_id,
    } = client.get_shards(log_id, None).await?;

    while last_shard_id.is_some() {
        let mut output = client.get_shards(log_id, last_shard_id.take()).await?;
        shards.append(&mut output.shards);
        last_shard_id = output.last_shard_id;
    }

    Ok(shards)
}

/// Picks the shards a fresh reader starts from. Replaying starts at the roots of each
/// lineage so parents are drained before children; tailing only needs the open leaves.
pub fn starting_shards(
    shards: &[ShardDescription],
    iterator_type: ShardIteratorType,
) -> Vec<ShardDescription> {
    let listed = |id: &str| shards.iter().any(|s| s.id == id);
    let has_child = |id: &str| shards.iter().any(|s| s.parent.as_deref() == Some(id));

    shards
        .iter()
        .filter(|shard| match iterator_type {
            ShardIteratorType::TrimHorizon => {
                shard.parent.as_deref().map(|p| !listed(p)).unwrap_or(true)
            }
            ShardIteratorType::Latest => !has_child(&shard.id),
        })
        .cloned()
        .collect()
}

pub fn children_of(shards: &[ShardDescription], parent_id: &str) -> Vec<ShardDescription> {
    shards
        .iter()
        .filter(|s| s.parent.as_deref() == Some(parent_id))
        .cloned()
        .collect()
}
