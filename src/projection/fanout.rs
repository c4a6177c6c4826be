use super::{FailedWrite, FeedItem, FeedStore, FollowerDirectory};
use crate::dispatch::{Handler, StreamEvent};
use crate::dynamodb::types::OperationType;
use crate::entity::{Entity, Post};
use crate::metrics::{Counter, Failure, SharedMetrics};

use anyhow::Result;
use axum::async_trait;
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// DynamoDB's `BatchWriteItem` limit.
pub const BATCH_WRITE_LIMIT: usize = 25;
pub const FEED_TTL_DAYS: i64 = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fanout {
    /// The author has too many followers; readers pull the post at read time.
    Pull { followers: u64 },
    Push { written: usize, failed: usize },
}

/// Copies new posts into each follower's feed.
pub struct FeedFanout {
    directory: Arc<dyn FollowerDirectory>,
    feed: Arc<dyn FeedStore>,
    celebrity_threshold: u64,
    metrics: SharedMetrics,
}

impl FeedFanout {
    pub fn new(
        directory: Arc<dyn FollowerDirectory>,
        feed: Arc<dyn FeedStore>,
        celebrity_threshold: u64,
        metrics: SharedMetrics,
    ) -> Self {
        Self {
            directory,
            feed,
            celebrity_threshold,
            metrics,
        }
    }

    pub async fn fan_out(&self, post: &Post) -> Result<Fanout> {
        let followers = self.directory.follower_count(&post.user_id).await?;

        if followers >= self.celebrity_threshold {
            info!(
                author_id = %post.user_id,
                post_id = %post.post_id,
                followers,
                "Skipping fan-out for celebrity author"
            );
            return Ok(Fanout::Pull { followers });
        }

        let follower_ids = self.directory.follower_ids(&post.user_id).await?;
        let now = Utc::now();
        let items: Vec<FeedItem> = follower_ids
            .iter()
            .map(|follower| FeedItem::snapshot(follower, post, now))
            .collect();
        let total = items.len();

        let tasks: Vec<_> = items
            .chunks(BATCH_WRITE_LIMIT)
            .map(|chunk| {
                let feed = Arc::clone(&self.feed);
                let chunk = chunk.to_vec();
                let followers: Vec<String> = chunk.iter().map(|i| i.user_id.clone()).collect();
                (followers, tokio::spawn(async move { feed.write_chunk(chunk).await }))
            })
            .collect();

        let mut failures: Vec<FailedWrite> = vec![];
        for (followers, task) in tasks {
            match task.await {
                Ok(Ok(mut rejected)) => failures.append(&mut rejected),
                Ok(Err(err)) => failures.extend(whole_chunk(followers, format!("{err:#}"))),
                Err(err) => failures.extend(whole_chunk(followers, format!("{err}"))),
            }
        }

        for failure in failures.iter() {
            warn!(
                post_id = %post.post_id,
                follower_id = %failure.user_id,
                reason = %failure.reason,
                "Failed to write feed item"
            );
        }

        let failed = failures.len();
        let written = total - failed;
        self.metrics.add(Counter::FeedItemsWritten, written as u64);
        if failed > 0 {
            self.metrics.add_failures(Failure::FeedWrite, failed as u64);
        }

        debug!(post_id = %post.post_id, written, failed, "Fanned out post");
        Ok(Fanout::Push { written, failed })
    }
}

fn whole_chunk(followers: Vec<String>, reason: String) -> impl Iterator<Item = FailedWrite> {
    followers.into_iter().map(move |user_id| FailedWrite {
        user_id,
        reason: reason.clone(),
    })
}

#[async_trait]
impl Handler for FeedFanout {
    fn name(&self) -> &str {
        "feed-fanout"
    }

    async fn handle(&self, event: Arc<StreamEvent>) -> Result<()> {
        for record in event.records() {
            if record.event_name != OperationType::Insert || !record.keys.is_post() {
                continue;
            }

            let Some(Entity::Post(post)) = record.new_image.as_ref() else {
                continue;
            };

            if let Err(err) = self.fan_out(post).await {
                error!(
                    author_id = %post.user_id,
                    post_id = %post.post_id,
                    error = ?err,
                    "Failed to fan out post"
                );
                self.metrics.fail(Failure::FollowerLookup);
            }
        }

        Ok(())
    }
}
