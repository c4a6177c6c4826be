pub mod config;
pub mod dispatch;
pub mod dynamodb;
pub mod entity;
pub mod error;
pub mod events;
pub mod metrics;
pub mod projection;
pub mod scheduler;
mod validation;
pub mod web;

pub const ENV_DYNAMODB_ENDPOINT_URL: &str = "DYNAMODB_ENDPOINT_URL";
pub const ENV_PORT: &str = "PORT";
pub const ENV_CONFIG_PATH: &str = "CONFIG_PATH";
pub const ENV_TABLE_NAME: &str = "TABLE_NAME";
pub const ENV_POLL_INTERVAL_MS: &str = "POLL_INTERVAL_MS";
pub const ENV_CELEBRITY_THRESHOLD: &str = "CELEBRITY_THRESHOLD";
pub const ENV_SHARD_ITERATOR_TYPE: &str = "SHARD_ITERATOR_TYPE";
