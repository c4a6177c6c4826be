use aws_sdk_dynamodbstreams::types;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Where a fresh cursor starts reading a shard.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ShardIteratorType {
    /// Only records written after the cursor is created.
    #[default]
    Latest,
    /// Every record still retained by the stream.
    TrimHorizon,
}

impl FromStr for ShardIteratorType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "LATEST" => Ok(Self::Latest),
            "TRIM_HORIZON" => Ok(Self::TrimHorizon),
            _ => Err(anyhow::anyhow!("Unknown shard iterator type: `{s}`")),
        }
    }
}

impl From<ShardIteratorType> for types::ShardIteratorType {
    fn from(value: ShardIteratorType) -> types::ShardIteratorType {
        match value {
            ShardIteratorType::Latest => types::ShardIteratorType::Latest,
            ShardIteratorType::TrimHorizon => types::ShardIteratorType::TrimHorizon,
        }
    }
}

/// Where a cursor is positioned when its iterator is requested.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShardPosition {
    Start(ShardIteratorType),
    /// Right after a record already read, used to resume once an iterator has expired.
    After(String),
}

impl From<ShardIteratorType> for ShardPosition {
    fn from(value: ShardIteratorType) -> Self {
        Self::Start(value)
    }
}
