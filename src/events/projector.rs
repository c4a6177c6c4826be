use super::cache::Cache;
use super::event::{DomainEvent, Payload, PostCreated};

use anyhow::Result;
use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

const POST_TTL_HOURS: i64 = 1;

pub fn post_key(post_id: &str) -> String {
    format!("post:{post_id}")
}

pub fn read_set_key(user_id: &str) -> String {
    format!("user:{user_id}:read")
}

/// The post snapshot held under [`post_key`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedPost {
    pub post_id: String,
    pub user_id: String,
    pub handle: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
    pub likes_count: i64,
    pub comments_count: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

impl From<&PostCreated> for CachedPost {
    fn from(post: &PostCreated) -> Self {
        Self {
            post_id: post.post_id.clone(),
            user_id: post.user_id.clone(),
            handle: post.handle.clone(),
            caption: post.caption.clone(),
            image_url: post.image_url.clone(),
            thumbnail_url: post.thumbnail_url.clone(),
            likes_count: 0,
            comments_count: 0,
            created_at: post.created_at.clone(),
        }
    }
}

/// Applies domain events to the cache.
pub struct CacheProjector {
    cache: Arc<dyn Cache>,
}

impl CacheProjector {
    pub fn new(cache: Arc<dyn Cache>) -> Self {
        Self { cache }
    }

    pub async fn project(&self, event: &DomainEvent) -> Result<()> {
        match &event.payload {
            Payload::PostCreated(post) => {
                let snapshot = serde_json::to_string(&CachedPost::from(post))?;
                self.cache
                    .set(
                        &post_key(&post.post_id),
                        snapshot,
                        Some(Duration::hours(POST_TTL_HOURS)),
                    )
                    .await?;
                debug!(event_id = %event.event_id, post_id = %post.post_id, "Cached post");
            }
            Payload::PostRead { user_id, post_id } => {
                self.cache
                    .add_to_set(&read_set_key(user_id), post_id)
                    .await?;
            }
            Payload::PostDeleted { post_id } => {
                self.cache.delete(&post_key(post_id)).await?;
                debug!(event_id = %event.event_id, post_id = %post_id, "Evicted post");
            }
            Payload::PostLiked { post_id, delta, .. } => {
                let key = post_key(post_id);
                let Some(cached) = self.cache.get(&key).await? else {
                    info!(
                        event_id = %event.event_id,
                        post_id = %post_id,
                        "Post not cached, skipping like"
                    );
                    return Ok(());
                };

                let mut post: CachedPost = serde_json::from_str(&cached)?;
                post.likes_count += delta;
                self.cache
                    .replace(&key, serde_json::to_string(&post)?)
                    .await?;
            }
        }

        Ok(())
    }
}
