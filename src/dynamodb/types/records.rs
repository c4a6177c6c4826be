use super::Record;

use serde::Serialize;

/// A batch of change records, serialized as `{"Records": [...]}`.
#[derive(Debug, Default, Serialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct Records {
    records: Vec<Record>,
}

impl Records {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn append(&mut self, records: &mut Records) {
        self.records.append(&mut records.records)
    }

    pub fn sort(&mut self) {
        self.records.sort()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Record> {
        self.records.iter()
    }
}

impl<I, T> From<I> for Records
where
    I: IntoIterator<Item = T>,
    T: Into<Record>,
{
    fn from(values: I) -> Records {
        let records = values.into_iter().map(|v| v.into()).collect();
        Records { records }
    }
}
