use async_trait::async_trait;
use mockall::automock;

use crate::domain::{
    errors::PurgeError,
    value_objects::{
        delete_outcomes::DeleteOutcome,
        pages::{Page, PageToken, StaleFilter},
    },
};

#[automock]
#[async_trait]
pub trait DocumentStore {
    /// Fetches the page of records matching `filter` that follows `page_token`.
    async fn query_page(
        &self,
        collection_id: &str,
        filter: &StaleFilter,
        page_token: Option<PageToken>,
        limit: u32,
    ) -> Result<Page, PurgeError>;

    async fn delete_record(
        &self,
        collection_id: &str,
        record_id: &str,
    ) -> Result<DeleteOutcome, PurgeError>;
}
