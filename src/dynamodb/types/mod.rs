mod attribute_value;
mod operation_type;
mod record;
mod records;
mod shard_iterator_type;
mod stream_record;

pub use attribute_value::{AttributeValue, Item};
pub use operation_type::OperationType;
pub use record::Record;
pub use records::Records;
pub use shard_iterator_type::{ShardIteratorType, ShardPosition};
pub use stream_record::StreamRecord;

use aws_sdk_dynamodbstreams::{primitives, types};
use base64::{engine::general_purpose::STANDARD, Engine};
use chrono::{DateTime, Utc};
use std::collections::HashMap;

// Binary attributes travel base64 encoded, the same way the managed trigger payload carries them.
fn into_base64(blob: primitives::Blob) -> String {
    STANDARD.encode(blob.into_inner())
}

fn into_chrono(datetime: primitives::DateTime) -> Option<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp(datetime.secs(), datetime.subsec_nanos())
}

fn into_item(value: HashMap<String, types::AttributeValue>) -> Item {
    value
        .into_iter()
        .map(|(key, val)| (key, AttributeValue::from(val)))
        .collect()
}
