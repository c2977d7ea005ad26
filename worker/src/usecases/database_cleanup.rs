use std::sync::{Arc, Mutex};

use cleaner_core::domain::errors::PurgeError;
use tracing::{error, info};

use super::{
    purge_collection::PurgeOptions,
    purge_orchestrator::{CollectionReport, PurgeOrchestrator},
};

pub const COMPLETION_MESSAGE: &str = "Database Cleanup completed";

/// Text and error channels of whatever triggered the job.
pub trait InvocationContext: Send + Sync {
    fn log(&self, message: &str);
    fn error(&self, message: &str);
}

/// Forwards both channels to `tracing`; used for scheduled one-shot runs.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingContext;

impl InvocationContext for TracingContext {
    fn log(&self, message: &str) {
        info!("database_cleanup: {message}");
    }

    fn error(&self, message: &str) {
        error!("database_cleanup: {message}");
    }
}

/// Keeps every message in memory so it can be returned to an HTTP caller.
#[derive(Debug, Default)]
pub struct CollectingContext {
    logs: Mutex<Vec<String>>,
    errors: Mutex<Vec<String>>,
}

impl CollectingContext {
    pub fn logs(&self) -> Vec<String> {
        self.logs.lock().map(|l| l.clone()).unwrap_or_default()
    }

    pub fn errors(&self) -> Vec<String> {
        self.errors.lock().map(|e| e.clone()).unwrap_or_default()
    }
}

impl InvocationContext for CollectingContext {
    fn log(&self, message: &str) {
        if let Ok(mut logs) = self.logs.lock() {
            logs.push(message.to_string());
        }
    }

    fn error(&self, message: &str) {
        if let Ok(mut errors) = self.errors.lock() {
            errors.push(message.to_string());
        }
    }
}

#[derive(Debug, Clone)]
pub struct CleanupSummary {
    pub message: String,
    pub reports: Vec<CollectionReport>,
}

pub struct DatabaseCleanupUseCase {
    orchestrator: Arc<PurgeOrchestrator>,
}

impl DatabaseCleanupUseCase {
    pub fn new(orchestrator: Arc<PurgeOrchestrator>) -> Self {
        Self { orchestrator }
    }

    /// Runs one cleanup and reports it through `ctx`.
    ///
    /// Collection failures are reported on the error channel and still end in the
    /// completion message; only configuration errors come back as `Err`.
    pub async fn run(
        &self,
        ctx: &dyn InvocationContext,
        options: &PurgeOptions,
    ) -> Result<CleanupSummary, PurgeError> {
        let reports = match self.orchestrator.run(options).await {
            Ok(reports) => reports,
            Err(err) => {
                ctx.error(&format!("Database Cleanup aborted: {err}"));
                return Err(err);
            }
        };

        for report in &reports {
            match &report.outcome {
                Ok(result) => {
                    let mut line = format!(
                        "{}: scanned {}, deleted {}, files deleted {}, kept {} fresh, \
                         {} with unreadable timestamps",
                        report.collection,
                        result.scanned,
                        result.deleted,
                        result.files_deleted,
                        result.skipped_fresh,
                        result.skipped_ambiguous,
                    );
                    if options.dry_run {
                        line.push_str(&format!(", would delete {}", result.would_delete));
                    }
                    if result.limit_reached {
                        line.push_str(", delete limit reached");
                    }
                    ctx.log(&line);

                    for failure in &result.errors {
                        ctx.error(&format!("{}: {}", report.collection, failure.to_error()));
                    }
                    if result.interrupted {
                        ctx.error(&format!(
                            "{}: {}; partial results reported",
                            report.collection,
                            PurgeError::DeadlineExceeded
                        ));
                    }
                }
                Err(failure) => {
                    ctx.error(&format!("Failed to clean {}: {failure}", report.collection));
                }
            }
        }

        ctx.log(COMPLETION_MESSAGE);

        Ok(CleanupSummary {
            message: COMPLETION_MESSAGE.to_string(),
            reports,
        })
    }
}
