use super::{into_chrono, into_item, Item};

use aws_sdk_dynamodbstreams::types;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::cmp::{Ord, Ordering, PartialOrd};

#[derive(Debug, Serialize, Clone, Eq, PartialEq, Default)]
#[serde(rename_all = "PascalCase")]
pub struct StreamRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    approximate_creation_date_time: Option<DateTime<Utc>>,
    keys: Option<Item>,
    #[serde(skip_serializing_if = "Option::is_none")]
    new_image: Option<Item>,
    #[serde(skip_serializing_if = "Option::is_none")]
    old_image: Option<Item>,
    sequence_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    size_bytes: Option<i64>,
}

impl StreamRecord {
    pub fn new<T: Into<String>>(
        keys: Item,
        new_image: Option<Item>,
        old_image: Option<Item>,
        sequence_number: T,
    ) -> Self {
        Self {
            keys: Some(keys),
            new_image,
            old_image,
            sequence_number: Some(sequence_number.into()),
            ..Self::default()
        }
    }

    pub fn keys(&self) -> Option<&Item> {
        self.keys.as_ref()
    }

    pub fn new_image(&self) -> Option<&Item> {
        self.new_image.as_ref()
    }

    pub fn old_image(&self) -> Option<&Item> {
        self.old_image.as_ref()
    }

    pub fn sequence_number(&self) -> Option<&str> {
        self.sequence_number.as_deref()
    }
}

impl From<types::StreamRecord> for StreamRecord {
    fn from(value: types::StreamRecord) -> StreamRecord {
        StreamRecord {
            approximate_creation_date_time: value
                .approximate_creation_date_time
                .and_then(into_chrono),
            keys: value.keys.map(into_item),
            new_image: value.new_image.map(into_item),
            old_image: value.old_image.map(into_item),
            sequence_number: value.sequence_number,
            size_bytes: value.size_bytes,
        }
    }
}

impl PartialOrd for StreamRecord {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

// Sequence numbers are decimal strings of varying width, so compare by length first.
impl Ord for StreamRecord {
    fn cmp(&self, other: &Self) -> Ordering {
        match (
            self.sequence_number.as_ref(),
            other.sequence_number.as_ref(),
        ) {
            (Some(n), Some(m)) => n.len().cmp(&m.len()).then_with(|| n.cmp(m)),
            (None, Some(_)) => Ordering::Greater,
            (Some(_), None) => Ordering::Less,
            _ => Ordering::Equal,
        }
    }
}
