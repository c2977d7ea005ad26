use std::sync::Arc;

use cleaner_core::domain::{
    errors::PurgeError,
    repositories::file_storage::FileStorage,
    value_objects::{
        clock::Clock,
        collections::CollectionTarget,
        pages::StaleFilter,
        purge_results::PurgeResult,
        retention::{self, OlderThanCutoff, TimestampField},
    },
};
use tracing::{error, info};

use super::purge_collection::{
    AttachedFileCleanup, CollectionFailure, CollectionPurge, PurgeCollectionUseCase, PurgeOptions,
    SideCleanup,
};

/// Outcome of one collection within a run. Failures are values, never propagated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionReport {
    pub collection: String,
    pub outcome: Result<PurgeResult, CollectionFailure>,
}

impl CollectionReport {
    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }
}

pub struct PurgeOrchestrator {
    purger: PurgeCollectionUseCase,
    file_storage: Arc<dyn FileStorage + Send + Sync>,
    bucket_id: String,
    collections: Vec<CollectionTarget>,
    retention_days: i64,
    timestamp_field: TimestampField,
    clock: Arc<dyn Clock>,
}

impl PurgeOrchestrator {
    pub fn new(
        purger: PurgeCollectionUseCase,
        file_storage: Arc<dyn FileStorage + Send + Sync>,
        bucket_id: impl Into<String>,
        collections: Vec<CollectionTarget>,
        retention_days: i64,
        timestamp_field: TimestampField,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            purger,
            file_storage,
            bucket_id: bucket_id.into(),
            collections,
            retention_days,
            timestamp_field,
            clock,
        }
    }

    /// Purges every configured collection in order.
    ///
    /// Only an invalid retention value fails the run, and it does so before any backend
    /// call. A failing collection is reported and the next one is still attempted.
    pub async fn run(&self, options: &PurgeOptions) -> Result<Vec<CollectionReport>, PurgeError> {
        let cutoff = retention::cutoff(self.retention_days, self.clock.now())?;
        let predicate = OlderThanCutoff {
            field: self.timestamp_field,
            cutoff,
        };
        let filter = StaleFilter {
            timestamp_field: self.timestamp_field,
            older_than: cutoff,
        };

        info!(
            retention_days = self.retention_days,
            cutoff = %cutoff,
            timestamp_field = %self.timestamp_field,
            collections = self.collections.len(),
            dry_run = options.dry_run,
            "purge_orchestrator: starting run"
        );

        let mut reports = Vec::with_capacity(self.collections.len());
        for target in &self.collections {
            let file_cleanup = target.file_attribute.as_ref().map(|attribute| {
                AttachedFileCleanup::new(
                    Arc::clone(&self.file_storage),
                    self.bucket_id.clone(),
                    attribute.clone(),
                )
            });

            let outcome = self
                .purger
                .run(
                    CollectionPurge {
                        collection_id: &target.collection_id,
                        filter,
                        predicate: &predicate,
                        side_cleanup: file_cleanup.as_ref().map(|c| c as &dyn SideCleanup),
                    },
                    options,
                )
                .await;

            if let Err(failure) = &outcome {
                error!(
                    collection = %target.name,
                    collection_id = %target.collection_id,
                    error = %failure,
                    "purge_orchestrator: collection purge failed; continuing with the next one"
                );
            }

            reports.push(CollectionReport {
                collection: target.name.clone(),
                outcome,
            });
        }

        Ok(reports)
    }
}
