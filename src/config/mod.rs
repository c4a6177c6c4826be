use crate::dynamodb::types::ShardIteratorType;
use crate::{
    ENV_CELEBRITY_THRESHOLD, ENV_CONFIG_PATH, ENV_DYNAMODB_ENDPOINT_URL, ENV_POLL_INTERVAL_MS,
    ENV_PORT, ENV_SHARD_ITERATOR_TYPE, ENV_TABLE_NAME,
};

use std::env;
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

mod file;

use file::ConfigFile;

const DEFAULT_PORT: u16 = 3000;
const DEFAULT_TABLE: &str = "Social";
const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;
const DEFAULT_CELEBRITY_THRESHOLD: u64 = 5000;

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    endpoint_url: Option<String>,
    port: u16,
    table_name: String,
    poll_interval: Duration,
    celebrity_threshold: u64,
    shard_iterator_type: ShardIteratorType,
}

impl Config {
    /// Reads the YAML file named by `CONFIG_PATH`, then lets environment variables override it.
    pub fn new() -> Self {
        let file = ConfigFile::new(env::var(ENV_CONFIG_PATH).ok());
        Self::resolve(file, |key| env::var(key).ok())
    }

    fn resolve<F: Fn(&str) -> Option<String>>(file: ConfigFile, var: F) -> Self {
        Self {
            endpoint_url: var(ENV_DYNAMODB_ENDPOINT_URL),
            port: parsed(&var, ENV_PORT)
                .or(file.port)
                .unwrap_or(DEFAULT_PORT),
            table_name: var(ENV_TABLE_NAME)
                .or(file.table_name)
                .unwrap_or_else(|| DEFAULT_TABLE.to_string()),
            poll_interval: Duration::from_millis(
                parsed(&var, ENV_POLL_INTERVAL_MS)
                    .and_then(|ms| positive(ENV_POLL_INTERVAL_MS, ms))
                    .or(file
                        .poll_interval_ms
                        .and_then(|ms| positive("poll_interval_ms", ms)))
                    .unwrap_or(DEFAULT_POLL_INTERVAL_MS),
            ),
            celebrity_threshold: parsed(&var, ENV_CELEBRITY_THRESHOLD)
                .or(file.celebrity_threshold)
                .unwrap_or(DEFAULT_CELEBRITY_THRESHOLD),
            shard_iterator_type: parsed(&var, ENV_SHARD_ITERATOR_TYPE)
                .or(file.shard_iterator_type)
                .unwrap_or_default(),
        }
    }

    pub fn endpoint_url(&self) -> Option<String> {
        self.endpoint_url.clone()
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn table_name(&self) -> &str {
        self.table_name.as_str()
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    pub fn celebrity_threshold(&self) -> u64 {
        self.celebrity_threshold
    }

    pub fn shard_iterator_type(&self) -> ShardIteratorType {
        self.shard_iterator_type
    }
}

impl Default for Config {
    fn default() -> Config {
        Config::new()
    }
}

fn parsed<T, F>(var: &F, key: &str) -> Option<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    let value = var(key)?;
    match value.parse::<T>() {
        Ok(v) => Some(v),
        Err(err) => {
            warn!("Ignoring env {key}={value}. {err}");
            None
        }
    }
}

fn positive(key: &str, value: u64) -> Option<u64> {
    if value == 0 {
        warn!("Ignoring {key}=0. The poll interval must be greater than zero");
        None
    } else {
        Some(value)
    }
}
