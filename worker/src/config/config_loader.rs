use std::str::FromStr;

use super::config_model::{Cleanup, Collections, DotEnvyConfig, Retention, WorkerServer};
use anyhow::{Context, Result};
use cleaner_core::{
    domain::{
        errors::PurgeError,
        value_objects::{
            collections::{ACTIVE_PAIRS, CollectionTarget, PARTICIPANTS},
            retention::{RetentionPolicy, TimestampField},
        },
    },
    infra::appwrite::client::AppwriteConfig,
};

pub const REQUIRED_VARS: [&str; 5] = [
    "APPWRITE_API_KEY",
    "RETENTION_PERIOD_DAYS",
    "APPWRITE_BUCKET_ID",
    "APPWRITE_FUNCTION_PROJECT_ID",
    "APPWRITE_DATABASE_ID",
];

const DEFAULT_ENDPOINT: &str = "https://cloud.appwrite.io/v1";
const MAX_PAGE_SIZE: u32 = 5000;

/// Reads the process environment; `.env` is loaded once by the binary before this runs.
pub fn load() -> Result<DotEnvyConfig> {
    load_from(|key| std::env::var(key).ok())
}

/// Builds the config from any key lookup so tests do not have to touch the process env.
pub fn load_from(lookup: impl Fn(&str) -> Option<String>) -> Result<DotEnvyConfig> {
    let get = |key: &str| {
        lookup(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    };

    let missing = REQUIRED_VARS
        .iter()
        .filter(|key| get(**key).is_none())
        .copied()
        .collect::<Vec<_>>();
    if !missing.is_empty() {
        return Err(PurgeError::InvalidConfiguration(format!(
            "Missing required fields: {}",
            missing.join(", ")
        ))
        .into());
    }
    let required = |key: &str| get(key).unwrap_or_default();

    let retention = Retention {
        policy: RetentionPolicy::parse(&required("RETENTION_PERIOD_DAYS"))?,
        timestamp_field: match get("RETENTION_TIMESTAMP_FIELD") {
            Some(raw) => TimestampField::parse(&raw).ok_or_else(|| {
                PurgeError::InvalidConfiguration(format!(
                    "RETENTION_TIMESTAMP_FIELD must be `created` or `updated` (got {raw:?})"
                ))
            })?,
            None => TimestampField::default(),
        },
    };

    let appwrite = AppwriteConfig {
        endpoint: get("APPWRITE_ENDPOINT").unwrap_or_else(|| DEFAULT_ENDPOINT.to_string()),
        project_id: required("APPWRITE_FUNCTION_PROJECT_ID"),
        api_key: required("APPWRITE_API_KEY"),
        database_id: required("APPWRITE_DATABASE_ID"),
        timeout_secs: parse_or(&get, "APPWRITE_HTTP_TIMEOUT_SECS", 30)?,
    };

    let collections = Collections {
        participants: CollectionTarget::new(
            PARTICIPANTS,
            get("PARTICIPANTS_COLLECTION_ID").unwrap_or_else(|| "participants".to_string()),
        )
        .with_file_attribute(get("PARTICIPANTS_FILE_ATTRIBUTE")),
        active_pairs: CollectionTarget::new(
            ACTIVE_PAIRS,
            get("ACTIVE_PAIRS_COLLECTION_ID").unwrap_or_else(|| "activePairs".to_string()),
        )
        .with_file_attribute(get("ACTIVE_PAIRS_FILE_ATTRIBUTE")),
    };

    let page_size: u32 = parse_or(&get, "CLEANUP_PAGE_SIZE", 100)?;
    if page_size == 0 || page_size > MAX_PAGE_SIZE {
        return Err(PurgeError::InvalidConfiguration(format!(
            "CLEANUP_PAGE_SIZE must be between 1 and {MAX_PAGE_SIZE} (got {page_size})"
        ))
        .into());
    }

    let max_deletes: u64 = parse_or(&get, "CLEANUP_MAX_DELETES_PER_RUN", 0)?;
    let cleanup = Cleanup {
        bucket_id: required("APPWRITE_BUCKET_ID"),
        page_size,
        dry_run: match get("CLEANUP_DRY_RUN") {
            Some(raw) => parse_bool(&raw).ok_or_else(|| {
                PurgeError::InvalidConfiguration(format!("CLEANUP_DRY_RUN is invalid: {raw:?}"))
            })?,
            None => false,
        },
        max_deletes_per_run: (max_deletes > 0).then_some(max_deletes),
        deadline_secs: get("CLEANUP_DEADLINE_SECS")
            .map(|raw| raw.parse::<u64>())
            .transpose()
            .context("CLEANUP_DEADLINE_SECS is invalid")?
            .filter(|secs| *secs > 0),
        internal_token: get("INTERNAL_CLEANUP_TOKEN"),
    };

    let worker_server = match get("SERVER_PORT_WORKER") {
        Some(raw) => Some(WorkerServer {
            port: raw.parse().context("SERVER_PORT_WORKER is invalid")?,
            timeout: parse_or(&get, "SERVER_TIMEOUT", 60)?,
            body_limit: parse_or(&get, "SERVER_BODY_LIMIT", 1)?,
        }),
        None => None,
    };

    Ok(DotEnvyConfig {
        appwrite,
        retention,
        collections,
        cleanup,
        worker_server,
    })
}

fn parse_or<T>(get: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match get(key) {
        Some(raw) => raw
            .parse::<T>()
            .with_context(|| format!("{key} is invalid (got {raw:?})")),
        None => Ok(default),
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "t" | "yes" | "y" | "on" => Some(true),
        "0" | "false" | "f" | "no" | "n" | "off" => Some(false),
        _ => None,
    }
}
