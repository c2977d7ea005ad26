use std::time::Duration;

use cleaner_core::{
    domain::value_objects::{
        collections::CollectionTarget,
        retention::{RetentionPolicy, TimestampField},
    },
    infra::appwrite::client::AppwriteConfig,
};

use crate::usecases::purge_collection::PurgeOptions;

#[derive(Debug, Clone)]
pub struct DotEnvyConfig {
    pub appwrite: AppwriteConfig,
    pub retention: Retention,
    pub collections: Collections,
    pub cleanup: Cleanup,
    /// Present only when the HTTP trigger should be served.
    pub worker_server: Option<WorkerServer>,
}

#[derive(Debug, Clone)]
pub struct WorkerServer {
    pub port: u16,
    pub timeout: u64,
    pub body_limit: u64,
}

#[derive(Debug, Clone)]
pub struct Retention {
    pub policy: RetentionPolicy,
    pub timestamp_field: TimestampField,
}

#[derive(Debug, Clone)]
pub struct Collections {
    pub participants: CollectionTarget,
    pub active_pairs: CollectionTarget,
}

impl Collections {
    pub fn targets(&self) -> Vec<CollectionTarget> {
        vec![self.participants.clone(), self.active_pairs.clone()]
    }
}

#[derive(Debug, Clone)]
pub struct Cleanup {
    pub bucket_id: String,
    pub page_size: u32,
    pub dry_run: bool,
    pub max_deletes_per_run: Option<u64>,
    pub deadline_secs: Option<u64>,
    pub internal_token: Option<String>,
}

impl Cleanup {
    /// Options for one invocation; the deadline starts counting now.
    pub fn purge_options(&self) -> PurgeOptions {
        PurgeOptions {
            dry_run: self.dry_run,
            max_deletes: self.max_deletes_per_run,
            deadline: self
                .deadline_secs
                .map(|secs| tokio::time::Instant::now() + Duration::from_secs(secs)),
        }
    }
}
