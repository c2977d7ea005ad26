use async_trait::async_trait;
use mockall::automock;

use crate::domain::{errors::PurgeError, value_objects::delete_outcomes::DeleteOutcome};

#[automock]
#[async_trait]
pub trait FileStorage {
    async fn delete_file(&self, bucket_id: &str, file_id: &str)
    -> Result<DeleteOutcome, PurgeError>;
}
