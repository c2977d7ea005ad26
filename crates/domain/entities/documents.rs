use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::domain::value_objects::retention::TimestampField;

/// A document as returned by the remote store. System timestamps are kept as raw text and
/// parsed on evaluation so a malformed value never blocks deserializing the page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentEntity {
    #[serde(rename = "$id")]
    pub id: String,
    #[serde(rename = "$createdAt", default)]
    pub created_at: Option<String>,
    #[serde(rename = "$updatedAt", default)]
    pub updated_at: Option<String>,
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

impl DocumentEntity {
    pub fn timestamp(&self, field: TimestampField) -> Option<&str> {
        match field {
            TimestampField::CreatedAt => self.created_at.as_deref(),
            TimestampField::UpdatedAt => self.updated_at.as_deref(),
        }
    }

    /// Returns the stored file id referenced by `attribute`, if any.
    pub fn file_id(&self, attribute: &str) -> Option<&str> {
        self.attributes
            .get(attribute)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|v| !v.is_empty())
    }
}
