use serde::{Deserialize, Serialize};

pub const PARTICIPANTS: &str = "participants";
pub const ACTIVE_PAIRS: &str = "active-pairs";

/// A collection to purge, identified by the id configured at deploy time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionTarget {
    pub name: String,
    pub collection_id: String,
    /// Attribute holding the id of a file in the storage bucket, if records carry one.
    pub file_attribute: Option<String>,
}

impl CollectionTarget {
    pub fn new(name: impl Into<String>, collection_id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            collection_id: collection_id.into(),
            file_attribute: None,
        }
    }

    pub fn with_file_attribute(mut self, attribute: Option<String>) -> Self {
        self.file_attribute = attribute;
        self
    }
}
