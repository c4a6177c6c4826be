mod dynamodb;
#[cfg(test)]
pub mod mock;

use super::types::{Records, ShardPosition};

use anyhow::Result;
use axum::async_trait;

pub use dynamodb::{DynamodbClient, DynamodbClientBuilder};

#[derive(Debug, Clone)]
pub struct DescribeLogOutput {
    pub enabled: bool,
    pub log_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShardDescription {
    pub id: String,
    pub parent: Option<String>,
}

#[derive(Debug)]
pub struct GetShardsOutput {
    pub shards: Vec<ShardDescription>,
    pub last_shard_id: Option<String>,
}

#[derive(Debug)]
pub struct GetIteratorOutput {
    pub iterator: Option<String>,
}

#[derive(Debug)]
pub struct GetRecordsOutput {
    pub records: Records,
    pub next_iterator: Option<String>,
}

/// Read access to a table's change log.
#[async_trait]
pub trait Client: Send + Sync {
    async fn describe_log(&self, table: &str) -> Result<DescribeLogOutput>;

    async fn get_shards(
        &self,
        log_id: &str,
        exclusive_shard_id: Option<String>,
    ) -> Result<GetShardsOutput>;

    async fn get_iterator(
        &self,
        log_id: &str,
        shard_id: &str,
        position: ShardPosition,
    ) -> Result<GetIteratorOutput>;

    async fn get_records(&self, iterator: &str) -> Result<GetRecordsOutput>;
}
