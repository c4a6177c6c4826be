use crate::dynamodb::types::{OperationType, Record, Records};
use crate::entity::{Entity, Keys};
use crate::error::DecodeError;

use serde::Serialize;

/// A change record with its images decoded once, at dispatch entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeRecord {
    pub event_name: OperationType,
    pub keys: Keys,
    pub new_image: Option<Entity>,
    pub old_image: Option<Entity>,
    pub sequence_number: String,
}

impl ChangeRecord {
    pub fn decode(record: &Record) -> Result<Self, DecodeError> {
        let stream = record.dynamodb().ok_or(DecodeError::MissingKeys)?;
        let keys = stream
            .keys()
            .ok_or(DecodeError::MissingKeys)
            .and_then(Keys::decode)?;
        let sequence_number = stream
            .sequence_number()
            .ok_or(DecodeError::MissingSequenceNumber)?
            .to_string();

        Ok(Self {
            event_name: record.event_name(),
            keys,
            new_image: stream.new_image().map(Entity::decode).transpose()?,
            old_image: stream.old_image().map(Entity::decode).transpose()?,
            sequence_number,
        })
    }

    /// The image that describes the entity the event is about.
    pub fn image(&self) -> Option<&Entity> {
        match self.event_name {
            OperationType::Remove => self.old_image.as_ref(),
            _ => self.new_image.as_ref(),
        }
    }
}

/// The batch handed to every handler. It serializes exactly like the managed stream
/// trigger's event, so handler code runs the same under either source.
#[derive(Debug, Clone, Serialize)]
pub struct StreamEvent {
    #[serde(flatten)]
    raw: Records,
    #[serde(skip)]
    records: Vec<ChangeRecord>,
}

impl StreamEvent {
    pub fn new(raw: Records, records: Vec<ChangeRecord>) -> Self {
        Self { raw, records }
    }

    pub fn records(&self) -> &[ChangeRecord] {
        &self.records
    }

    pub fn raw(&self) -> &Records {
        &self.raw
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
