use aws_sdk_dynamodbstreams::types;
use serde::Serialize;
use std::fmt;

#[derive(Debug, Serialize, Clone, Copy, Eq, PartialEq)]
#[serde(rename_all = "UPPERCASE")]
pub enum OperationType {
    Insert,
    Modify,
    Remove,
    Unknown,
}

impl fmt::Display for OperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Insert => write!(f, "INSERT"),
            Self::Modify => write!(f, "MODIFY"),
            Self::Remove => write!(f, "REMOVE"),
            Self::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

impl From<types::OperationType> for OperationType {
    fn from(value: types::OperationType) -> OperationType {
        match value {
            types::OperationType::Insert => OperationType::Insert,
            types::OperationType::Modify => OperationType::Modify,
            types::OperationType::Remove => OperationType::Remove,
            _ => OperationType::Unknown,
        }
    }
}
