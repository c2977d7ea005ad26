use std::fmt;

use chrono::{DateTime, Utc};

use crate::domain::{
    entities::documents::DocumentEntity, value_objects::retention::TimestampField,
};

/// Opaque continuation token. Holds the id of the last record of the previous page.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PageToken(String);

impl PageToken {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PageToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Server-side selection of records whose timestamp is older than `older_than`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StaleFilter {
    pub timestamp_field: TimestampField,
    pub older_than: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    pub records: Vec<DocumentEntity>,
    pub next_token: Option<PageToken>,
}
