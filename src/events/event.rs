use crate::error::EventError;
use crate::validation::{from_value, rfc3339, single_error, FromValidate, ValidateError};

use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::fmt;
use validator::{Validate, ValidationError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventType {
    PostCreated,
    PostRead,
    PostDeleted,
    PostLiked,
}

impl EventType {
    fn parse(value: &str) -> Option<Self> {
        match value {
            "POST_CREATED" => Some(Self::PostCreated),
            "POST_READ" => Some(Self::PostRead),
            "POST_DELETED" => Some(Self::PostDeleted),
            "POST_LIKED" => Some(Self::PostLiked),
            _ => None,
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::PostCreated => "POST_CREATED",
            Self::PostRead => "POST_READ",
            Self::PostDeleted => "POST_DELETED",
            Self::PostLiked => "POST_LIKED",
        };
        write!(f, "{name}")
    }
}

/// A validated domain event read off the partitioned log.
#[derive(Debug, Clone, PartialEq)]
pub struct DomainEvent {
    pub event_id: String,
    pub timestamp: DateTime<Utc>,
    pub version: u32,
    pub payload: Payload,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    PostCreated(PostCreated),
    PostRead { user_id: String, post_id: String },
    PostDeleted { post_id: String },
    PostLiked {
        post_id: String,
        user_id: String,
        delta: i64,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct PostCreated {
    pub post_id: String,
    pub user_id: String,
    pub handle: String,
    pub caption: Option<String>,
    pub image_url: Option<String>,
    pub thumbnail_url: Option<String>,
    pub created_at: Option<String>,
}

impl DomainEvent {
    /// Parses a JSON payload and validates it against the schema of its declared type.
    pub fn parse(bytes: &[u8]) -> Result<Self, EventError> {
        let value: serde_json::Value = serde_json::from_slice(bytes)?;

        let declared = value
            .get("eventType")
            .and_then(serde_json::Value::as_str)
            .map(String::from);
        let Some(declared) = declared else {
            return Err(EventError::Validation {
                event_type: String::new(),
                errors: single_error("event_type", "required"),
            });
        };
        let event_type =
            EventType::parse(&declared).ok_or_else(|| EventError::UnknownType(declared.clone()))?;

        let event = match event_type {
            EventType::PostCreated => {
                let StrictPostCreated(envelope, post) = strict(value, event_type)?;
                envelope.with(Payload::PostCreated(post))
            }
            EventType::PostRead => {
                let StrictPostRead(envelope, user_id, post_id) = strict(value, event_type)?;
                envelope.with(Payload::PostRead { user_id, post_id })
            }
            EventType::PostDeleted => {
                let StrictPostDeleted(envelope, post_id) = strict(value, event_type)?;
                envelope.with(Payload::PostDeleted { post_id })
            }
            EventType::PostLiked => {
                let StrictPostLiked(envelope, payload) = strict(value, event_type)?;
                envelope.with(payload)
            }
        };

        Ok(event)
    }

    pub fn event_type(&self) -> EventType {
        match self.payload {
            Payload::PostCreated(_) => EventType::PostCreated,
            Payload::PostRead { .. } => EventType::PostRead,
            Payload::PostDeleted { .. } => EventType::PostDeleted,
            Payload::PostLiked { .. } => EventType::PostLiked,
        }
    }
}

fn strict<T: FromValidate>(value: serde_json::Value, event_type: EventType) -> Result<T, EventError> {
    from_value(value).map_err(|err| match err {
        ValidateError::Parse(err) => EventError::Parse(err),
        ValidateError::Invalid(errors) => EventError::Validation {
            event_type: event_type.to_string(),
            errors,
        },
    })
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
struct RawEnvelope {
    #[validate(required, length(min = 1))]
    event_id: Option<String>,
    #[validate(required, custom = "rfc3339")]
    timestamp: Option<String>,
    #[validate(required, range(min = 1))]
    version: Option<u32>,
}

struct Envelope {
    event_id: String,
    timestamp: DateTime<Utc>,
    version: u32,
}

impl Envelope {
    fn with(self, payload: Payload) -> DomainEvent {
        DomainEvent {
            event_id: self.event_id,
            timestamp: self.timestamp,
            version: self.version,
            payload,
        }
    }
}

impl From<RawEnvelope> for Envelope {
    fn from(raw: RawEnvelope) -> Envelope {
        let timestamp = raw.timestamp.expect("`timestamp` should be Some");
        Envelope {
            event_id: raw.event_id.expect("`event_id` should be Some"),
            timestamp: DateTime::parse_from_rfc3339(&timestamp)
                .expect("`timestamp` should be RFC 3339")
                .with_timezone(&Utc),
            version: raw.version.expect("`version` should be Some"),
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
struct RawPostCreated {
    #[serde(flatten)]
    #[validate]
    envelope: RawEnvelope,
    #[validate(required, length(min = 1))]
    post_id: Option<String>,
    #[validate(required, length(min = 1))]
    user_id: Option<String>,
    #[validate(required, length(min = 1))]
    handle: Option<String>,
    #[validate(length(max = 2200))]
    caption: Option<String>,
    #[validate(url)]
    image_url: Option<String>,
    #[validate(url)]
    thumbnail_url: Option<String>,
    #[validate(custom = "rfc3339")]
    created_at: Option<String>,
}

struct StrictPostCreated(Envelope, PostCreated);

impl FromValidate for StrictPostCreated {
    type Validatable = RawPostCreated;

    fn from(raw: RawPostCreated) -> StrictPostCreated {
        StrictPostCreated(
            raw.envelope.into(),
            PostCreated {
                post_id: raw.post_id.expect("`post_id` should be Some"),
                user_id: raw.user_id.expect("`user_id` should be Some"),
                handle: raw.handle.expect("`handle` should be Some"),
                caption: raw.caption,
                image_url: raw.image_url,
                thumbnail_url: raw.thumbnail_url,
                created_at: raw.created_at,
            },
        )
    }
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
struct RawPostRead {
    #[serde(flatten)]
    #[validate]
    envelope: RawEnvelope,
    #[validate(required, length(min = 1))]
    user_id: Option<String>,
    #[validate(required, length(min = 1))]
    post_id: Option<String>,
}

struct StrictPostRead(Envelope, String, String);

impl FromValidate for StrictPostRead {
    type Validatable = RawPostRead;

    fn from(raw: RawPostRead) -> StrictPostRead {
        StrictPostRead(
            raw.envelope.into(),
            raw.user_id.expect("`user_id` should be Some"),
            raw.post_id.expect("`post_id` should be Some"),
        )
    }
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
struct RawPostDeleted {
    #[serde(flatten)]
    #[validate]
    envelope: RawEnvelope,
    #[validate(required, length(min = 1))]
    post_id: Option<String>,
}

struct StrictPostDeleted(Envelope, String);

impl FromValidate for StrictPostDeleted {
    type Validatable = RawPostDeleted;

    fn from(raw: RawPostDeleted) -> StrictPostDeleted {
        StrictPostDeleted(
            raw.envelope.into(),
            raw.post_id.expect("`post_id` should be Some"),
        )
    }
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
#[validate(schema(function = "unit_delta", skip_on_field_errors = true))]
struct RawPostLiked {
    #[serde(flatten)]
    #[validate]
    envelope: RawEnvelope,
    #[validate(required, length(min = 1))]
    post_id: Option<String>,
    #[validate(required, length(min = 1))]
    user_id: Option<String>,
    #[validate(required)]
    delta: Option<i64>,
}

fn unit_delta(raw: &RawPostLiked) -> Result<(), ValidationError> {
    match raw.delta {
        Some(1) | Some(-1) | None => Ok(()),
        Some(_) => Err(ValidationError::new("unit_delta")),
    }
}

struct StrictPostLiked(Envelope, Payload);

impl FromValidate for StrictPostLiked {
    type Validatable = RawPostLiked;

    fn from(raw: RawPostLiked) -> StrictPostLiked {
        StrictPostLiked(
            raw.envelope.into(),
            Payload::PostLiked {
                post_id: raw.post_id.expect("`post_id` should be Some"),
                user_id: raw.user_id.expect("`user_id` should be Some"),
                delta: raw.delta.expect("`delta` should be Some"),
            },
        )
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    fn parse(value: serde_json::Value) -> Result<DomainEvent, EventError> {
        DomainEvent::parse(value.to_string().as_bytes())
    }

    fn invalid_fields(result: Result<DomainEvent, EventError>) -> Vec<String> {
        match result {
            Err(EventError::Validation { errors, .. }) => {
                let mut fields: Vec<String> =
                    errors.errors().keys().map(|k| k.to_string()).collect();
                fields.sort();
                fields
            }
            other => unreachable!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn it_parses_a_post_created_event() {
        let event = parse(post_created("e1", "p1")).unwrap();

        assert_eq!(event.event_id, "e1");
        assert_eq!(event.version, 1);
        assert_eq!(event.event_type(), EventType::PostCreated);
        match event.payload {
            Payload::PostCreated(post) => {
                assert_eq!(post.post_id, "p1");
                assert_eq!(post.handle, "alice");
                assert_eq!(post.thumbnail_url, None);
            }
            other => unreachable!("unexpected payload: {other:?}"),
        }
    }

    #[test]
    fn it_parses_the_other_types() {
        let read = parse(post_read("e2", "u2", "p1")).unwrap();
        assert_eq!(
            read.payload,
            Payload::PostRead {
                user_id: "u2".into(),
                post_id: "p1".into()
            }
        );

        let deleted = parse(post_deleted("e3", "p1")).unwrap();
        assert_eq!(deleted.payload, Payload::PostDeleted { post_id: "p1".into() });

        let liked = parse(post_liked("e4", "p1", -1)).unwrap();
        assert_eq!(liked.event_type(), EventType::PostLiked);
    }

    #[test]
    fn it_rejects_unknown_types() {
        let result = parse(envelope("POST_SHARED", "e1"));
        assert!(matches!(result, Err(EventError::UnknownType(t)) if t == "POST_SHARED"));
    }

    #[test]
    fn it_requires_an_event_type() {
        let mut value = post_deleted("e1", "p1");
        value.as_object_mut().unwrap().remove("eventType");
        assert_eq!(invalid_fields(parse(value)), ["event_type"]);
    }

    #[test]
    fn it_validates_the_envelope() {
        let mut value = post_deleted("", "p1");
        value["version"] = 0.into();
        value["timestamp"] = "last tuesday".into();

        let fields = invalid_fields(parse(value));
        assert_eq!(fields, ["envelope"]);
    }

    #[test]
    fn it_validates_type_specific_fields() {
        let mut value = post_created("e1", "p1");
        value.as_object_mut().unwrap().remove("handle");
        value["imageUrl"] = "not a url".into();

        assert_eq!(invalid_fields(parse(value)), ["handle", "image_url"]);
    }

    #[test]
    fn it_only_accepts_unit_like_deltas() {
        let result = parse(post_liked("e1", "p1", 2));
        assert_eq!(invalid_fields(result), ["__all__"]);

        let mut value = post_liked("e1", "p1", 1);
        value.as_object_mut().unwrap().remove("delta");
        assert_eq!(invalid_fields(parse(value)), ["delta"]);
    }

    #[test]
    fn it_reports_invalid_json_as_parse_error() {
        let result = DomainEvent::parse(b"{\"eventType\":");
        assert!(matches!(result, Err(EventError::Parse(_))));
    }
}
