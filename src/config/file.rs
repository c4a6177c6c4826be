use crate::dynamodb::types::ShardIteratorType;

use serde::Deserialize;
use std::fs;
use std::path::Path;
use tracing::warn;

/// Settings read from the optional YAML file. Every key may be omitted.
#[derive(Debug, Default, Clone, Deserialize, PartialEq)]
pub struct ConfigFile {
    pub port: Option<u16>,
    pub table_name: Option<String>,
    pub poll_interval_ms: Option<u64>,
    pub celebrity_threshold: Option<u64>,
    pub shard_iterator_type: Option<ShardIteratorType>,
}

impl ConfigFile {
    pub fn new<P: AsRef<Path>>(path: Option<P>) -> Self {
        path.map(read_config).unwrap_or_default()
    }
}

fn read_config<P: AsRef<Path>>(path: P) -> ConfigFile {
    _read_config(path).unwrap_or_else(|err| {
        warn!("{err}");
        warn!("Skip reading config file.");
        ConfigFile::default()
    })
}

fn _read_config<P: AsRef<Path>>(path: P) -> Result<ConfigFile, String> {
    let content = fs::read_to_string(&path)
        .map_err(|err| format!("Failed to read: {}. {err}", path.as_ref().to_string_lossy()))?;
    serde_yaml::from_str(&content)
        .map_err(|err| format!("Failed to deserialize config file: {err}"))
}
