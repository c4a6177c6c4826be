use super::{Item, OperationType, StreamRecord};

use aws_sdk_dynamodbstreams::types;
use serde::Serialize;
use std::cmp::{Ord, Ordering, PartialOrd};

/// One change record as read from the stream, in the managed trigger's payload shape.
#[derive(Debug, Serialize, Clone, Eq, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    event_id: Option<String>,
    event_name: Option<OperationType>,
    event_version: Option<String>,
    event_source: Option<String>,
    aws_region: Option<String>,
    dynamodb: Option<StreamRecord>,
}

impl Record {
    pub fn new<T: Into<String>>(event_name: OperationType, dynamodb: StreamRecord, event_id: T) -> Self {
        Self {
            event_id: Some(event_id.into()),
            event_name: Some(event_name),
            event_version: Some("1.1".into()),
            event_source: Some("aws:dynamodb".into()),
            aws_region: None,
            dynamodb: Some(dynamodb),
        }
    }

    pub fn event_id(&self) -> Option<&str> {
        self.event_id.as_deref()
    }

    pub fn event_name(&self) -> OperationType {
        self.event_name.unwrap_or(OperationType::Unknown)
    }

    pub fn dynamodb(&self) -> Option<&StreamRecord> {
        self.dynamodb.as_ref()
    }

    pub fn keys(&self) -> Option<&Item> {
        self.dynamodb.as_ref().and_then(StreamRecord::keys)
    }

    pub fn sequence_number(&self) -> Option<&str> {
        self.dynamodb.as_ref().and_then(StreamRecord::sequence_number)
    }
}

impl From<types::Record> for Record {
    fn from(value: types::Record) -> Record {
        Record {
            event_id: value.event_id,
            event_name: value.event_name.map(OperationType::from),
            event_version: value.event_version,
            event_source: value.event_source,
            aws_region: value.aws_region,
            dynamodb: value.dynamodb.map(StreamRecord::from),
        }
    }
}

impl PartialOrd for Record {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Record {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.dynamodb.as_ref(), other.dynamodb.as_ref()) {
            (Some(s), Some(o)) => s.cmp(o),
            (None, Some(_)) => Ordering::Greater,
            (Some(_), None) => Ordering::Less,
            _ => Ordering::Equal,
        }
    }
}
