use crate::validation::FromValidate;

use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

/// A batch as delivered by the partitioned log's event source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KinesisBatch {
    #[serde(rename = "Records")]
    pub records: Vec<KinesisRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KinesisRecord {
    #[serde(rename = "eventID", default, skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,
    pub kinesis: KinesisPayload,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KinesisPayload {
    /// Base64 of the JSON event.
    pub data: String,
    pub sequence_number: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partition_key: Option<String>,
}

impl KinesisRecord {
    pub fn sequence_number(&self) -> &str {
        self.kinesis.sequence_number.as_str()
    }
}

#[derive(Debug, Deserialize, Validate)]
#[validate(schema(function = "identified_records"))]
pub struct RawKinesisBatch {
    #[serde(rename = "Records")]
    #[validate(required)]
    records: Option<Vec<KinesisRecord>>,
}

// Failures are reported by sequence number, so every record needs one.
fn identified_records(raw: &RawKinesisBatch) -> Result<(), ValidationError> {
    let records = raw.records.as_deref().unwrap_or_default();
    if records.iter().any(|r| r.sequence_number().is_empty()) {
        let mut err = ValidationError::new("sequence_number");
        err.message = Some("every record needs a sequence number".into());
        return Err(err);
    }
    Ok(())
}

impl FromValidate for KinesisBatch {
    type Validatable = RawKinesisBatch;

    fn from(raw: RawKinesisBatch) -> KinesisBatch {
        KinesisBatch {
            records: raw.records.expect("`records` should be Some"),
        }
    }
}

/// Records to redeliver. An empty list means the whole batch succeeded.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchResponse {
    #[serde(rename = "batchItemFailures")]
    pub batch_item_failures: Vec<BatchItemFailure>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchItemFailure {
    #[serde(rename = "itemIdentifier")]
    pub item_identifier: String,
}

impl BatchResponse {
    pub fn failed_ids(&self) -> Vec<&str> {
        self.batch_item_failures
            .iter()
            .map(|f| f.item_identifier.as_str())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn it_reads_a_kinesis_batch() {
        let batch: KinesisBatch = serde_json::from_value(json!({
            "Records": [{
                "eventID": "shardId-000000000000:4954",
                "eventSource": "aws:kinesis",
                "kinesis": {
                    "data": "e30=",
                    "sequenceNumber": "4954",
                    "partitionKey": "p1",
                    "kinesisSchemaVersion": "1.0"
                }
            }]
        }))
        .unwrap();

        assert_eq!(batch.records.len(), 1);
        assert_eq!(batch.records[0].sequence_number(), "4954");
    }

    #[test]
    fn it_requires_records_with_sequence_numbers() {
        let raw: RawKinesisBatch = serde_json::from_value(json!({})).unwrap();
        let errors = raw.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("records"));

        let raw: RawKinesisBatch = serde_json::from_value(json!({
            "Records": [{ "kinesis": { "data": "e30=", "sequenceNumber": "" } }]
        }))
        .unwrap();
        assert!(raw.validate().is_err());

        let raw: RawKinesisBatch = serde_json::from_value(json!({ "Records": [] })).unwrap();
        assert!(raw.validate().is_ok());
        assert!(<KinesisBatch as FromValidate>::from(raw).records.is_empty());
    }

    #[test]
    fn it_serializes_the_failures() {
        let response = BatchResponse {
            batch_item_failures: vec![BatchItemFailure {
                item_identifier: "2".into(),
            }],
        };

        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            json!({ "batchItemFailures": [{ "itemIdentifier": "2" }] })
        );
        assert_eq!(response.failed_ids(), ["2"]);
    }
}
