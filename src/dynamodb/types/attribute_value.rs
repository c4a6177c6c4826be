use super::into_base64;

use aws_sdk_dynamodbstreams::types;
use serde::Serialize;
use std::collections::HashMap;

pub type Item = HashMap<String, AttributeValue>;

#[derive(Debug, Serialize, Clone, Eq, PartialEq)]
#[serde(rename_all = "UPPERCASE")]
pub enum AttributeValue {
    B(String),
    Bool(bool),
    Bs(Vec<String>),
    L(Vec<AttributeValue>),
    M(HashMap<String, AttributeValue>),
    N(String),
    Ns(Vec<String>),
    Null(bool),
    S(String),
    Ss(Vec<String>),
    Unknown,
}

impl AttributeValue {
    pub fn as_s(&self) -> Option<&str> {
        match self {
            Self::S(v) => Some(v.as_str()),
            _ => None,
        }
    }

    /// Numbers are kept as their decimal text, the way DynamoDB transmits them.
    pub fn as_n(&self) -> Option<&str> {
        match self {
            Self::N(v) => Some(v.as_str()),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null(true))
    }
}

impl From<types::AttributeValue> for AttributeValue {
    fn from(value: types::AttributeValue) -> AttributeValue {
        match value {
            types::AttributeValue::B(v) => AttributeValue::B(into_base64(v)),
            types::AttributeValue::Bool(v) => AttributeValue::Bool(v),
            types::AttributeValue::Bs(v) => {
                AttributeValue::Bs(v.into_iter().map(into_base64).collect())
            }
            types::AttributeValue::L(v) => {
                AttributeValue::L(v.into_iter().map(AttributeValue::from).collect())
            }
            types::AttributeValue::M(v) => AttributeValue::M(
                v.into_iter()
                    .map(|(key, val)| (key, AttributeValue::from(val)))
                    .collect(),
            ),
            types::AttributeValue::N(v) => AttributeValue::N(v),
            types::AttributeValue::Ns(v) => AttributeValue::Ns(v),
            types::AttributeValue::Null(v) => AttributeValue::Null(v),
            types::AttributeValue::S(v) => AttributeValue::S(v),
            types::AttributeValue::Ss(v) => AttributeValue::Ss(v),
            _ => AttributeValue::Unknown,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::{into_chrono, into_item};
    use super::*;
    use aws_sdk_dynamodbstreams::primitives;
    use chrono::{DateTime, Utc};

    #[test]
    fn it_encodes_blobs_as_base64() {
        let blob = primitives::Blob::new("Hello".as_bytes().to_vec());
        assert_eq!(into_base64(blob), "SGVsbG8=");
    }

    #[test]
    fn it_transforms_sdk_datetime_into_chrono_datetime() {
        let org = primitives::DateTime::from_secs_and_nanos(946_713_600, 500_000_000u32);
        let expected = DateTime::<Utc>::from_timestamp(946_713_600, 500_000_000u32);
        assert_eq!(into_chrono(org), expected);
    }

    #[test]
    fn it_converts_nested_sdk_items() {
        let mut inner: HashMap<String, types::AttributeValue> = HashMap::new();
        inner.insert("likesCount".into(), types::AttributeValue::N("3".into()));

        let mut sdk_item: HashMap<String, types::AttributeValue> = HashMap::new();
        sdk_item.insert("PK".into(), types::AttributeValue::S("USER#1".into()));
        sdk_item.insert("stats".into(), types::AttributeValue::M(inner));

        let item = into_item(sdk_item);
        assert_eq!(item.get("PK").and_then(AttributeValue::as_s), Some("USER#1"));

        match item.get("stats") {
            Some(AttributeValue::M(stats)) => {
                assert_eq!(stats.get("likesCount").and_then(AttributeValue::as_n), Some("3"));
            }
            other => unreachable!("unexpected attribute: {other:?}"),
        }
    }

    #[test]
    fn it_serializes_in_the_wire_shape() {
        let value = AttributeValue::L(vec![
            AttributeValue::S("Cookies".into()),
            AttributeValue::N("12".into()),
            AttributeValue::Null(true),
        ]);
        let json = serde_json::to_value(value).unwrap();
        let expected = serde_json::json!({
            "L": [
                { "S": "Cookies" },
                { "N": "12" },
                { "NULL": true }
            ]
        });
        assert_eq!(json, expected);
    }
}
