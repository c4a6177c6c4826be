use super::{
    CounterDelta, CounterStore, FailedWrite, FeedItem, FeedStore, FollowerDirectory,
    ProjectionTarget,
};
use crate::entity::{TYPE_TAG, USER_PREFIX};

use anyhow::Result;
use aws_sdk_dynamodb::{
    error::SdkError,
    operation::update_item::UpdateItemError,
    types::{AttributeValue, PutRequest, WriteRequest},
    Client as DbClient,
};
use axum::async_trait;
use std::collections::HashMap;
use tracing::{debug, warn};

const FOLLOWER_PREFIX: &str = "FOLLOWER#";
const PROFILE_SK: &str = "PROFILE";
const FEED_ITEM_TAG: &str = "FEED_ITEM";

type DbItem = HashMap<String, AttributeValue>;

/// Projection targets backed by the same single table the change log comes from.
#[derive(Debug, Clone)]
pub struct DynamodbStore {
    client: DbClient,
    table: String,
}

impl DynamodbStore {
    pub fn new<T: Into<String>>(client: DbClient, table: T) -> Self {
        Self {
            client,
            table: table.into(),
        }
    }
}

#[async_trait]
impl CounterStore for DynamodbStore {
    async fn add(&self, target: &ProjectionTarget, delta: &CounterDelta) -> Result<()> {
        let result = self
            .client
            .update_item()
            .table_name(&self.table)
            .key("PK", AttributeValue::S(target.pk.clone()))
            .key("SK", AttributeValue::S(target.sk.clone()))
            .update_expression("ADD #attr :delta")
            .expression_attribute_names("#attr", &delta.attribute)
            .expression_attribute_values(":delta", AttributeValue::N(delta.delta.to_string()))
            // ADD on a missing key would create a row holding only the counter.
            .condition_expression("attribute_exists(PK)")
            .send()
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(err) if is_missing_target(&err) => {
                warn!(
                    pk = %target.pk,
                    sk = %target.sk,
                    attribute = %delta.attribute,
                    "Counter target no longer exists"
                );
                Ok(())
            }
            Err(err) => Err(err.into()),
        }
    }
}

#[async_trait]
impl FollowerDirectory for DynamodbStore {
    async fn follower_count(&self, user_id: &str) -> Result<u64> {
        let output = self
            .client
            .get_item()
            .table_name(&self.table)
            .key("PK", AttributeValue::S(format!("{USER_PREFIX}{user_id}")))
            .key("SK", AttributeValue::S(PROFILE_SK.to_string()))
            .projection_expression("followersCount")
            .send()
            .await?;

        let count = output
            .item
            .as_ref()
            .and_then(|item| item.get("followersCount"))
            .and_then(|v| v.as_n().ok())
            .and_then(|n| n.parse::<u64>().ok())
            .unwrap_or(0);

        Ok(count)
    }

    async fn follower_ids(&self, user_id: &str) -> Result<Vec<String>> {
        let mut followers = vec![];
        let mut start_key: Option<DbItem> = None;

        loop {
            let output = self
                .client
                .query()
                .table_name(&self.table)
                .key_condition_expression("PK = :pk AND begins_with(SK, :prefix)")
                .expression_attribute_values(
                    ":pk",
                    AttributeValue::S(format!("{USER_PREFIX}{user_id}")),
                )
                .expression_attribute_values(
                    ":prefix",
                    AttributeValue::S(FOLLOWER_PREFIX.to_string()),
                )
                .projection_expression("SK")
                .set_exclusive_start_key(start_key)
                .send()
                .await?;

            followers.extend(
                output
                    .items
                    .unwrap_or_default()
                    .iter()
                    .filter_map(|item| item.get("SK"))
                    .filter_map(|sk| sk.as_s().ok())
                    .filter_map(|sk| sk.strip_prefix(FOLLOWER_PREFIX))
                    .map(String::from),
            );

            match output.last_evaluated_key {
                Some(key) if !key.is_empty() => start_key = Some(key),
                _ => break,
            }
        }

        debug!(user_id, followers = followers.len(), "Listed followers");
        Ok(followers)
    }
}

#[async_trait]
impl FeedStore for DynamodbStore {
    async fn write_chunk(&self, items: Vec<FeedItem>) -> Result<Vec<FailedWrite>> {
        let requests = items
            .iter()
            .map(|item| {
                let put = PutRequest::builder()
                    .set_item(Some(into_db_item(item)))
                    .build()?;
                Ok(WriteRequest::builder().put_request(put).build())
            })
            .collect::<Result<Vec<WriteRequest>>>()?;

        let output = self
            .client
            .batch_write_item()
            .request_items(&self.table, requests)
            .send()
            .await?;

        let failures = output
            .unprocessed_items
            .unwrap_or_default()
            .remove(&self.table)
            .unwrap_or_default()
            .iter()
            .filter_map(|request| request.put_request())
            .filter_map(|put| put.item().get("PK"))
            .filter_map(|pk| pk.as_s().ok())
            .map(|pk| FailedWrite {
                user_id: pk.trim_start_matches(USER_PREFIX).to_string(),
                reason: "unprocessed by BatchWriteItem".into(),
            })
            .collect();

        Ok(failures)
    }
}

/// The conditional `ADD` was rejected because the counted row no longer exists.
fn is_missing_target<R>(err: &SdkError<UpdateItemError, R>) -> bool {
    match err {
        SdkError::ServiceError(e) => e.err().is_conditional_check_failed_exception(),
        _ => false,
    }
}

fn into_db_item(item: &FeedItem) -> DbItem {
    let mut attrs: DbItem = HashMap::from([
        ("PK".to_string(), AttributeValue::S(item.pk())),
        ("SK".to_string(), AttributeValue::S(item.sk())),
        (TYPE_TAG.to_string(), AttributeValue::S(FEED_ITEM_TAG.into())),
        ("postId".to_string(), AttributeValue::S(item.post_id.clone())),
        ("authorId".to_string(), AttributeValue::S(item.author_id.clone())),
        (
            "authorHandle".to_string(),
            AttributeValue::S(item.author_handle.clone()),
        ),
        (
            "likesCount".to_string(),
            AttributeValue::N(item.likes_count.to_string()),
        ),
        (
            "commentsCount".to_string(),
            AttributeValue::N(item.comments_count.to_string()),
        ),
        ("isLiked".to_string(), AttributeValue::Bool(item.is_liked)),
        ("createdAt".to_string(), AttributeValue::S(item.created_at.clone())),
        ("ttl".to_string(), AttributeValue::N(item.ttl.to_string())),
    ]);

    let optional = [
        ("caption", &item.caption),
        ("imageUrl", &item.image_url),
        ("thumbnailUrl", &item.thumbnail_url),
    ];
    for (name, value) in optional {
        if let Some(value) = value {
            attrs.insert(name.to_string(), AttributeValue::S(value.clone()));
        }
    }

    attrs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::fixtures::post_item;
    use crate::entity::Entity;
    use chrono::Utc;

    fn feed_item() -> FeedItem {
        let post = match Entity::decode(&post_item("u1", "p1")).unwrap() {
            Entity::Post(post) => post,
            other => unreachable!("unexpected entity: {other:?}"),
        };
        FeedItem::snapshot("u2", &post, Utc::now())
    }

    #[test]
    fn only_a_failed_condition_means_the_post_is_gone() {
        use aws_sdk_dynamodb::types::error::{
            ConditionalCheckFailedException, ProvisionedThroughputExceededException,
        };

        let gone = SdkError::<_, ()>::service_error(
            UpdateItemError::ConditionalCheckFailedException(
                ConditionalCheckFailedException::builder().build(),
            ),
            (),
        );
        assert!(is_missing_target(&gone));

        let throttled = SdkError::<_, ()>::service_error(
            UpdateItemError::ProvisionedThroughputExceededException(
                ProvisionedThroughputExceededException::builder().build(),
            ),
            (),
        );
        assert!(!is_missing_target(&throttled));

        let timeout = SdkError::<UpdateItemError, ()>::timeout_error("no response");
        assert!(!is_missing_target(&timeout));
    }

    #[test]
    fn it_lays_out_a_feed_row() {
        let item = feed_item();
        let attrs = into_db_item(&item);

        assert_eq!(attrs["PK"], AttributeValue::S("USER#u2".into()));
        assert_eq!(
            attrs["SK"],
            AttributeValue::S("FEED#2026-10-19T08:00:00.000Z#p1".into())
        );
        assert_eq!(attrs["entityType"], AttributeValue::S("FEED_ITEM".into()));
        assert_eq!(attrs["isLiked"], AttributeValue::Bool(false));
        assert_eq!(attrs["likesCount"], AttributeValue::N("4".into()));
        assert_eq!(attrs["ttl"], AttributeValue::N(item.ttl.to_string()));
        assert!(attrs.contains_key("caption"));
    }

    #[test]
    fn it_omits_absent_media() {
        let mut item = feed_item();
        item.caption = None;
        item.thumbnail_url = None;

        let attrs = into_db_item(&item);
        assert!(!attrs.contains_key("caption"));
        assert!(!attrs.contains_key("thumbnailUrl"));
        assert!(attrs.contains_key("imageUrl"));
    }
}
