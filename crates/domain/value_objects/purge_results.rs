use serde::Serialize;

use crate::domain::errors::PurgeError;

/// Only the first few ids of each kind are kept for reporting; counters are always exact.
pub const MAX_REPORTED_IDS: usize = 20;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordFailure {
    pub record_id: String,
    pub reason: String,
}

impl RecordFailure {
    pub fn to_error(&self) -> PurgeError {
        PurgeError::RecordDeleteFailed {
            record_id: self.record_id.clone(),
            reason: self.reason.clone(),
        }
    }
}

/// Per-collection outcome of one purge run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PurgeResult {
    pub scanned: usize,
    /// Records removed by this run, including ones that were already gone.
    pub deleted: usize,
    /// Records another process removed between the query and the delete.
    pub already_absent: usize,
    pub files_deleted: usize,
    pub skipped_fresh: usize,
    /// Records with a missing or malformed timestamp; reported as warnings.
    pub skipped_ambiguous: usize,
    /// Dry runs only: stale records that would have been deleted.
    pub would_delete: usize,
    pub pages: usize,
    pub errors: Vec<RecordFailure>,
    pub warning_ids: Vec<String>,
    pub deleted_ids: Vec<String>,
    pub interrupted: bool,
    pub limit_reached: bool,
}

impl PurgeResult {
    pub fn error_count(&self) -> usize {
        self.errors.len()
    }

    pub(crate) fn push_capped(ids: &mut Vec<String>, id: &str) {
        if ids.len() < MAX_REPORTED_IDS {
            ids.push(id.to_string());
        }
    }

    pub fn record_deleted(&mut self, id: &str, already_absent: bool) {
        self.deleted += 1;
        if already_absent {
            self.already_absent += 1;
        }
        Self::push_capped(&mut self.deleted_ids, id);
    }

    pub fn record_warning(&mut self, id: &str) {
        self.skipped_ambiguous += 1;
        Self::push_capped(&mut self.warning_ids, id);
    }

    pub fn record_failure(&mut self, id: &str, reason: impl Into<String>) {
        self.errors.push(RecordFailure {
            record_id: id.to_string(),
            reason: reason.into(),
        });
    }
}
