use super::client::Client;
use crate::error::SetupError;

use std::sync::Arc;
use tracing::info;

/// Resolves the stream ARN of a table.
pub struct ChangeLogLocator {
    client: Arc<dyn Client>,
}

impl ChangeLogLocator {
    pub fn new(client: Arc<dyn Client>) -> Self {
        Self { client }
    }

    pub async fn locate(&self, table: &str) -> Result<String, SetupError> {
        let output = self.client.describe_log(table).await?;

        if !output.enabled {
            return Err(SetupError::LogDisabled(table.to_string()));
        }

        let log_id = output
            .log_id
            .ok_or_else(|| SetupError::LogIdMissing(table.to_string()))?;

        info!(table, log_id = %log_id, "Located change log");
        Ok(log_id)
    }
}
