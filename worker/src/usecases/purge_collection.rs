use std::{fmt, future::Future, ops::ControlFlow, sync::Arc};

use async_trait::async_trait;
use cleaner_core::domain::{
    entities::documents::DocumentEntity,
    errors::PurgeError,
    repositories::{document_store::DocumentStore, file_storage::FileStorage},
    value_objects::{
        delete_outcomes::DeleteOutcome,
        pages::{PageToken, StaleFilter},
        purge_results::PurgeResult,
        retention::{Staleness, StalenessPredicate},
    },
};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Default)]
pub struct PurgeOptions {
    /// Count stale records without deleting anything.
    pub dry_run: bool,
    /// Stop once this many records have been deleted in one collection.
    pub max_deletes: Option<u64>,
    /// Overall invocation deadline supplied by the trigger.
    pub deadline: Option<Instant>,
}

impl PurgeOptions {
    fn deadline_passed(&self) -> bool {
        self.deadline.is_some_and(|deadline| Instant::now() >= deadline)
    }

    fn limit_reached(&self, result: &PurgeResult) -> bool {
        let processed = (result.deleted + result.would_delete) as u64;
        self.max_deletes.is_some_and(|max| processed >= max)
    }
}

/// Work to run for a stale record before the record itself is deleted.
#[async_trait]
pub trait SideCleanup: Send + Sync {
    /// Returns `None` when the record carries nothing to clean up.
    async fn cleanup(&self, record: &DocumentEntity) -> Result<Option<DeleteOutcome>, PurgeError>;
}

/// Deletes the bucket file referenced by `attribute`.
pub struct AttachedFileCleanup {
    storage: Arc<dyn FileStorage + Send + Sync>,
    bucket_id: String,
    attribute: String,
}

impl AttachedFileCleanup {
    pub fn new(
        storage: Arc<dyn FileStorage + Send + Sync>,
        bucket_id: impl Into<String>,
        attribute: impl Into<String>,
    ) -> Self {
        Self {
            storage,
            bucket_id: bucket_id.into(),
            attribute: attribute.into(),
        }
    }
}

#[async_trait]
impl SideCleanup for AttachedFileCleanup {
    async fn cleanup(&self, record: &DocumentEntity) -> Result<Option<DeleteOutcome>, PurgeError> {
        let Some(file_id) = record.file_id(&self.attribute) else {
            return Ok(None);
        };
        self.storage
            .delete_file(&self.bucket_id, file_id)
            .await
            .map(Some)
    }
}

/// One collection's purge: which records to look at, how to judge them and what else to
/// delete alongside each one.
pub struct CollectionPurge<'a> {
    pub collection_id: &'a str,
    pub filter: StaleFilter,
    pub predicate: &'a dyn StalenessPredicate,
    pub side_cleanup: Option<&'a dyn SideCleanup>,
}

/// A collection-level failure, with whatever was achieved before it happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionFailure {
    pub error: PurgeError,
    pub partial: PurgeResult,
}

impl fmt::Display for CollectionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (after {} scanned, {} deleted)",
            self.error, self.partial.scanned, self.partial.deleted
        )
    }
}

pub struct PurgeCollectionUseCase {
    store: Arc<dyn DocumentStore + Send + Sync>,
    page_size: u32,
}

impl PurgeCollectionUseCase {
    pub fn new(store: Arc<dyn DocumentStore + Send + Sync>, page_size: u32) -> Self {
        Self {
            store,
            page_size: page_size.max(1),
        }
    }

    /// Drains every record matching the purge's filter, one page at a time.
    ///
    /// Record-level failures are collected in the result and never stop the scan. A failed
    /// page query ends this collection's purge with a [`CollectionFailure`].
    pub async fn run(
        &self,
        purge: CollectionPurge<'_>,
        options: &PurgeOptions,
    ) -> Result<PurgeResult, CollectionFailure> {
        let collection_id = purge.collection_id;
        let mut result = PurgeResult::default();
        let mut page_token: Option<PageToken> = None;

        loop {
            if options.deadline_passed() {
                result.interrupted = true;
                break;
            }

            let query = self.store.query_page(
                collection_id,
                &purge.filter,
                page_token.clone(),
                self.page_size,
            );
            let page = match within_deadline(options.deadline, query).await {
                None => {
                    result.interrupted = true;
                    break;
                }
                Some(Ok(page)) => page,
                Some(Err(error)) => {
                    error!(
                        collection_id,
                        page = result.pages + 1,
                        error = %error,
                        "purge_collection: failed to query page; aborting collection"
                    );
                    return Err(CollectionFailure {
                        error,
                        partial: result,
                    });
                }
            };
            result.pages += 1;

            let next_token = page.next_token;
            if let ControlFlow::Break(()) = self
                .purge_page(&purge, page.records, options, &mut result)
                .await
            {
                break;
            }

            match next_token {
                None => break,
                Some(next) if page_token.as_ref() == Some(&next) => {
                    let error = PurgeError::BackendUnavailable(format!(
                        "pagination did not advance past {next} in collection {collection_id}"
                    ));
                    error!(collection_id, error = %error, "purge_collection: aborting collection");
                    return Err(CollectionFailure {
                        error,
                        partial: result,
                    });
                }
                Some(next) => page_token = Some(next),
            }
        }

        if result.interrupted {
            warn!(
                collection_id,
                scanned = result.scanned,
                deleted = result.deleted,
                "purge_collection: invocation deadline reached; reporting partial results"
            );
        }

        info!(
            collection_id,
            pages = result.pages,
            scanned = result.scanned,
            deleted = result.deleted,
            already_absent = result.already_absent,
            files_deleted = result.files_deleted,
            skipped_fresh = result.skipped_fresh,
            skipped_ambiguous = result.skipped_ambiguous,
            would_delete = result.would_delete,
            errors = result.error_count(),
            limit_reached = result.limit_reached,
            dry_run = options.dry_run,
            "purge_collection: completed"
        );

        Ok(result)
    }

    /// Every delete of the page finishes before the caller fetches the next one.
    async fn purge_page(
        &self,
        purge: &CollectionPurge<'_>,
        records: Vec<DocumentEntity>,
        options: &PurgeOptions,
        result: &mut PurgeResult,
    ) -> ControlFlow<()> {
        let collection_id = purge.collection_id;

        for record in records {
            if options.deadline_passed() {
                result.interrupted = true;
                return ControlFlow::Break(());
            }

            result.scanned += 1;

            match purge.predicate.evaluate(&record) {
                Staleness::Stale => {}
                Staleness::Fresh => {
                    result.skipped_fresh += 1;
                    continue;
                }
                Staleness::Ambiguous(reason) => {
                    warn!(
                        collection_id,
                        record_id = %record.id,
                        reason = %reason,
                        "purge_collection: ambiguous timestamp; keeping record"
                    );
                    result.record_warning(&record.id);
                    continue;
                }
            }

            if options.dry_run {
                result.would_delete += 1;
                if options.limit_reached(result) {
                    result.limit_reached = true;
                    return ControlFlow::Break(());
                }
                continue;
            }

            // Delete the attached file first; if that fails the record stays so the next
            // run can retry instead of orphaning the file.
            if let Some(side_cleanup) = purge.side_cleanup {
                match within_deadline(options.deadline, side_cleanup.cleanup(&record)).await {
                    None => {
                        result.interrupted = true;
                        return ControlFlow::Break(());
                    }
                    Some(Ok(Some(DeleteOutcome::Deleted))) => result.files_deleted += 1,
                    Some(Ok(Some(DeleteOutcome::AlreadyAbsent))) => {
                        warn!(
                            collection_id,
                            record_id = %record.id,
                            "purge_collection: attached file already missing; continuing"
                        );
                    }
                    Some(Ok(None)) => {}
                    Some(Err(err)) => {
                        error!(
                            collection_id,
                            record_id = %record.id,
                            error = %err,
                            "purge_collection: failed to delete attached file; skipping record"
                        );
                        result.record_failure(&record.id, format!("attached file: {err}"));
                        continue;
                    }
                }
            }

            let delete = self.store.delete_record(collection_id, &record.id);
            match within_deadline(options.deadline, delete).await {
                None => {
                    result.interrupted = true;
                    return ControlFlow::Break(());
                }
                Some(Ok(DeleteOutcome::Deleted)) => result.record_deleted(&record.id, false),
                Some(Ok(DeleteOutcome::AlreadyAbsent)) => {
                    debug!(
                        collection_id,
                        record_id = %record.id,
                        "purge_collection: record already deleted"
                    );
                    result.record_deleted(&record.id, true);
                }
                Some(Err(err)) => {
                    error!(
                        collection_id,
                        record_id = %record.id,
                        error = %err,
                        "purge_collection: failed to delete record; continuing"
                    );
                    result.record_failure(&record.id, err.to_string());
                    continue;
                }
            }

            if options.limit_reached(result) {
                result.limit_reached = true;
                return ControlFlow::Break(());
            }
        }

        ControlFlow::Continue(())
    }
}

/// Runs `fut` to completion, or returns `None` once the deadline passes.
async fn within_deadline<F: Future>(deadline: Option<Instant>, fut: F) -> Option<F::Output> {
    match deadline {
        Some(deadline) => tokio::time::timeout_at(deadline, fut).await.ok(),
        None => Some(fut.await),
    }
}
