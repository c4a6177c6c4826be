pub mod client;
mod locator;
pub mod shard;
pub mod types;

pub use client::{Client, DynamodbClient};
pub use locator::ChangeLogLocator;
pub use shard::ShardCursorManager;
