use super::{
    Client, DescribeLogOutput, GetIteratorOutput, GetRecordsOutput, GetShardsOutput, Records,
    ShardDescription, ShardPosition,
};
use crate::dynamodb::types::Record;
use crate::error::IteratorExpired;

use anyhow::Result;
use aws_sdk_dynamodb::{config::Builder as DbConfigBuilder, Client as DbClient};
use aws_sdk_dynamodbstreams::{
    config::Builder as StreamConfigBuilder,
    error::SdkError,
    operation::{get_records::GetRecordsError, get_shard_iterator::GetShardIteratorError},
    types::{ShardIteratorType as SdkIteratorType, StreamDescription},
    Client as StreamClient,
};
use axum::async_trait;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct DynamodbClient {
    db_client: DbClient,
    stream_client: StreamClient,
}

impl DynamodbClient {
    pub async fn builder() -> DynamodbClientBuilder {
        DynamodbClientBuilder::new().await
    }

    /// The table client, shared with the projection store.
    pub fn db(&self) -> DbClient {
        self.db_client.clone()
    }
}

#[derive(Debug)]
pub struct DynamodbClientBuilder {
    db_builder: DbConfigBuilder,
    stream_builder: StreamConfigBuilder,
}

impl DynamodbClientBuilder {
    pub async fn new() -> Self {
        let config = aws_config::load_from_env().await;
        let db_builder = DbConfigBuilder::from(&config);
        let stream_builder = StreamConfigBuilder::from(&config);

        Self {
            db_builder,
            stream_builder,
        }
    }

    pub fn endpoint_url(self, url: Option<String>) -> Self {
        match url {
            Some(url) => {
                let db_builder = self.db_builder.endpoint_url(&url);
                let stream_builder = self.stream_builder.endpoint_url(&url);
                Self {
                    db_builder,
                    stream_builder,
                }
            }
            None => self,
        }
    }

    pub fn build(self) -> DynamodbClient {
        let db_config = self.db_builder.build();
        let db_client = DbClient::from_conf(db_config);

        let stream_config = self.stream_builder.build();
        let stream_client = StreamClient::from_conf(stream_config);

        DynamodbClient {
            db_client,
            stream_client,
        }
    }
}

#[async_trait]
impl Client for DynamodbClient {
    async fn describe_log(&self, table: &str) -> Result<DescribeLogOutput> {
        let table = self
            .db_client
            .describe_table()
            .table_name(table)
            .send()
            .await?
            .table
            .ok_or(anyhow::anyhow!("`table` is None in `DescribeTableOutput`"))?;

        let enabled = table
            .stream_specification
            .as_ref()
            .map(|spec| spec.stream_enabled)
            .unwrap_or(false);

        Ok(DescribeLogOutput {
            enabled,
            log_id: table.latest_stream_arn,
        })
    }

    async fn get_shards(
        &self,
        log_id: &str,
        exclusive_shard_id: Option<String>,
    ) -> Result<GetShardsOutput> {
        let StreamDescription {
            shards,
            last_evaluated_shard_id,
            ..
        } = self
            .stream_client
            .describe_stream()
            .stream_arn(log_id)
            .set_exclusive_start_shard_id(exclusive_shard_id)
            .send()
            .await?
            .stream_description
            .ok_or(anyhow::anyhow!("Stream Description is None"))?;

        let shards = shards
            .unwrap_or_default()
            .into_iter()
            .filter_map(|s| {
                let parent = s.parent_shard_id;
                s.shard_id.map(|id| ShardDescription { id, parent })
            })
            .collect();

        Ok(GetShardsOutput {
            shards,
            last_shard_id: last_evaluated_shard_id,
        })
    }

    async fn get_iterator(
        &self,
        log_id: &str,
        shard_id: &str,
        position: ShardPosition,
    ) -> Result<GetIteratorOutput> {
        let request = self
            .stream_client
            .get_shard_iterator()
            .stream_arn(log_id)
            .shard_id(shard_id);

        let request = match position {
            ShardPosition::Start(iterator_type) => request.shard_iterator_type(iterator_type.into()),
            ShardPosition::After(sequence_number) => request
                .shard_iterator_type(SdkIteratorType::AfterSequenceNumber)
                .sequence_number(sequence_number),
        };

        request
            .send()
            .await
            .map(|output| GetIteratorOutput {
                iterator: output.shard_iterator,
            })
            .or_else(from_get_iterator_err)
    }

    async fn get_records(&self, iterator: &str) -> Result<GetRecordsOutput> {
        self.stream_client
            .get_records()
            .shard_iterator(iterator)
            .send()
            .await
            .map(|output| {
                let records: Records = output
                    .records
                    .unwrap_or_default()
                    .into_iter()
                    .map(Record::from)
                    .collect::<Vec<Record>>()
                    .into();

                GetRecordsOutput {
                    records,
                    next_iterator: output.next_shard_iterator,
                }
            })
            .or_else(from_get_records_err)
    }
}

fn from_get_iterator_err<R>(err: SdkError<GetShardIteratorError, R>) -> Result<GetIteratorOutput>
where
    R: std::fmt::Debug + Send + Sync + 'static,
{
    use GetShardIteratorError::*;

    match err {
        SdkError::ServiceError(e) => {
            let e = e.into_err();
            match e {
                // The shard is gone: treat as closed.
                ResourceNotFoundException(_) => {
                    warn!(error = %e, "GetShardIterator closed the shard");
                    Ok(GetIteratorOutput { iterator: None })
                }
                // The requested sequence number has been trimmed.
                TrimmedDataAccessException(_) => {
                    Err(anyhow::Error::new(IteratorExpired(e.to_string())))
                }
                _ => Err(anyhow::Error::from(e)),
            }
        }
        _ => Err(anyhow::Error::from(err)),
    }
}

fn from_get_records_err<R>(err: SdkError<GetRecordsError, R>) -> Result<GetRecordsOutput>
where
    R: std::fmt::Debug + Send + Sync + 'static,
{
    use GetRecordsError::*;

    match err {
        SdkError::ServiceError(e) => {
            let e = e.into_err();
            match e {
                ResourceNotFoundException(_) => {
                    warn!(error = %e, "GetRecords closed the shard");
                    Ok(GetRecordsOutput {
                        records: Records::new(),
                        next_iterator: None,
                    })
                }
                // The shard is still open; the cursor has to be repositioned. LimitExceeded is
                // throttling and is retried on the next tick instead.
                ExpiredIteratorException(_) | TrimmedDataAccessException(_) => {
                    Err(anyhow::Error::new(IteratorExpired(e.to_string())))
                }
                _ => Err(anyhow::Error::from(e)),
            }
        }
        _ => Err(anyhow::Error::from(err)),
    }
}
