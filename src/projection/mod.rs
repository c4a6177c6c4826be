//! Read models kept in sync from the change log.

mod counter;
mod fanout;
#[cfg(test)]
pub mod mock;
mod store;

pub use counter::CounterAggregator;
pub use fanout::{Fanout, FeedFanout, BATCH_WRITE_LIMIT, FEED_TTL_DAYS};
pub use store::DynamodbStore;

use crate::entity::{Post, USER_PREFIX};

use anyhow::Result;
use axum::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

/// The aggregate row a projection updates.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProjectionTarget {
    pub pk: String,
    pub sk: String,
}

impl ProjectionTarget {
    pub fn post(post_user_id: &str, post_sk: &str) -> Self {
        Self {
            pk: format!("{USER_PREFIX}{post_user_id}"),
            sk: post_sk.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CounterDelta {
    pub attribute: String,
    pub delta: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedItem {
    pub user_id: String,
    pub post_id: String,
    pub author_id: String,
    pub author_handle: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
    pub likes_count: i64,
    pub comments_count: i64,
    pub is_liked: bool,
    pub created_at: String,
    /// Expiry, in epoch seconds.
    pub ttl: i64,
}

impl FeedItem {
    /// Freezes `post` into `follower`'s feed. Later edits of the post are not tracked.
    pub fn snapshot(follower: &str, post: &Post, now: DateTime<Utc>) -> Self {
        Self {
            user_id: follower.to_string(),
            post_id: post.post_id.clone(),
            author_id: post.user_id.clone(),
            author_handle: post.handle.clone(),
            caption: post.caption.clone(),
            image_url: post.image_url.clone(),
            thumbnail_url: post.thumbnail_url.clone(),
            likes_count: post.likes_count,
            comments_count: post.comments_count,
            is_liked: false,
            created_at: post.created_at.clone(),
            ttl: (now + Duration::days(FEED_TTL_DAYS)).timestamp(),
        }
    }

    pub fn pk(&self) -> String {
        format!("{USER_PREFIX}{}", self.user_id)
    }

    pub fn sk(&self) -> String {
        format!("FEED#{}#{}", self.created_at, self.post_id)
    }
}

/// One follower whose feed item did not land.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedWrite {
    pub user_id: String,
    pub reason: String,
}

#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Atomically adds `delta` to the target's attribute.
    async fn add(&self, target: &ProjectionTarget, delta: &CounterDelta) -> Result<()>;
}

#[async_trait]
pub trait FollowerDirectory: Send + Sync {
    async fn follower_count(&self, user_id: &str) -> Result<u64>;

    async fn follower_ids(&self, user_id: &str) -> Result<Vec<String>>;
}

#[async_trait]
pub trait FeedStore: Send + Sync {
    /// Writes at most [`BATCH_WRITE_LIMIT`] items in one round trip and returns the ones
    /// that were not written.
    async fn write_chunk(&self, items: Vec<FeedItem>) -> Result<Vec<FailedWrite>>;
}
