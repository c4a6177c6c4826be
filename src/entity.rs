//! Typed views over the single-table items carried in change record images.

use crate::dynamodb::types::{AttributeValue, Item};
use crate::error::DecodeError;

use std::fmt;

pub const TYPE_TAG: &str = "entityType";
pub const USER_PREFIX: &str = "USER#";
pub const POST_PREFIX: &str = "POST#";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Post,
    Comment,
    Like,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Post => write!(f, "POST"),
            Self::Comment => write!(f, "COMMENT"),
            Self::Like => write!(f, "LIKE"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Keys {
    pub pk: String,
    pub sk: String,
}

impl Keys {
    pub fn decode(item: &Item) -> Result<Self, DecodeError> {
        let get = |name: &str| item.get(name).and_then(AttributeValue::as_s).map(String::from);

        match (get("PK"), get("SK")) {
            (Some(pk), Some(sk)) => Ok(Self { pk, sk }),
            _ => Err(DecodeError::MissingKeys),
        }
    }

    pub fn is_post(&self) -> bool {
        self.sk.starts_with(POST_PREFIX)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Post {
    pub post_id: String,
    pub user_id: String,
    pub handle: String,
    pub caption: Option<String>,
    pub image_url: Option<String>,
    pub thumbnail_url: Option<String>,
    pub likes_count: i64,
    pub comments_count: i64,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comment {
    pub comment_id: String,
    pub post_id: String,
    pub user_id: String,
    pub content: Option<String>,
    pub post_user_id: Option<String>,
    pub post_sk: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Like {
    pub post_id: String,
    pub user_id: String,
    pub post_user_id: Option<String>,
    pub post_sk: Option<String>,
}

/// The row a child entity points at, as denormalized onto it at write time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PostMetadata<'a> {
    pub post_user_id: Option<&'a str>,
    pub post_sk: Option<&'a str>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entity {
    Post(Post),
    Comment(Comment),
    Like(Like),
    /// Any item this pipeline does not project, keyed by its tag.
    Other(String),
}

impl Entity {
    pub fn decode(item: &Item) -> Result<Self, DecodeError> {
        let image = Image(item);
        let tag = image.required("item", TYPE_TAG)?;

        let entity = match tag.as_str() {
            "POST" => Entity::Post(Post {
                post_id: image.required("POST", "postId")?,
                user_id: image.required("POST", "userId")?,
                handle: image.required("POST", "handle")?,
                caption: image.optional("caption"),
                image_url: image.optional("imageUrl"),
                thumbnail_url: image.optional("thumbnailUrl"),
                likes_count: image.number("POST", "likesCount")?,
                comments_count: image.number("POST", "commentsCount")?,
                created_at: image.required("POST", "createdAt")?,
            }),
            "COMMENT" => Entity::Comment(Comment {
                comment_id: image.required("COMMENT", "commentId")?,
                post_id: image.required("COMMENT", "postId")?,
                user_id: image.required("COMMENT", "userId")?,
                content: image.optional("content"),
                post_user_id: image.optional("postUserId"),
                post_sk: image.optional("postSK"),
            }),
            "LIKE" => Entity::Like(Like {
                post_id: image.required("LIKE", "postId")?,
                user_id: image.required("LIKE", "userId")?,
                post_user_id: image.optional("postUserId"),
                post_sk: image.optional("postSK"),
            }),
            _ => Entity::Other(tag),
        };

        Ok(entity)
    }

    pub fn kind(&self) -> Option<EntityKind> {
        match self {
            Self::Post(_) => Some(EntityKind::Post),
            Self::Comment(_) => Some(EntityKind::Comment),
            Self::Like(_) => Some(EntityKind::Like),
            Self::Other(_) => None,
        }
    }

    pub fn post_metadata(&self) -> Option<PostMetadata<'_>> {
        match self {
            Self::Comment(c) => Some(PostMetadata {
                post_user_id: c.post_user_id.as_deref(),
                post_sk: c.post_sk.as_deref(),
            }),
            Self::Like(l) => Some(PostMetadata {
                post_user_id: l.post_user_id.as_deref(),
                post_sk: l.post_sk.as_deref(),
            }),
            _ => None,
        }
    }
}

struct Image<'a>(&'a Item);

impl Image<'_> {
    fn required(&self, entity: &'static str, field: &'static str) -> Result<String, DecodeError> {
        match self.0.get(field) {
            Some(AttributeValue::S(v)) if !v.is_empty() => Ok(v.clone()),
            None => Err(DecodeError::MissingField { entity, field }),
            Some(v) if v.is_null() => Err(DecodeError::MissingField { entity, field }),
            Some(_) => Err(DecodeError::InvalidField { entity, field }),
        }
    }

    fn optional(&self, field: &str) -> Option<String> {
        self.0
            .get(field)
            .and_then(AttributeValue::as_s)
            .filter(|v| !v.is_empty())
            .map(String::from)
    }

    // Counters that were never written read as zero.
    fn number(&self, entity: &'static str, field: &'static str) -> Result<i64, DecodeError> {
        match self.0.get(field) {
            None => Ok(0),
            Some(v) => v
                .as_n()
                .and_then(|n| n.parse::<i64>().ok())
                .ok_or(DecodeError::InvalidField { entity, field }),
        }
    }
}
