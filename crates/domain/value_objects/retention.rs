use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{entities::documents::DocumentEntity, errors::PurgeError};

/// Computes `now - retention_days * 24h`.
///
/// Records whose timestamp is strictly before the cutoff are eligible for deletion.
pub fn cutoff(retention_days: i64, now: DateTime<Utc>) -> Result<DateTime<Utc>, PurgeError> {
    if retention_days <= 0 {
        return Err(PurgeError::InvalidConfiguration(format!(
            "retention period must be a positive number of days (got {retention_days})"
        )));
    }

    let window = Duration::try_days(retention_days).ok_or_else(|| {
        PurgeError::InvalidConfiguration(format!(
            "retention period of {retention_days} days is too large"
        ))
    })?;

    now.checked_sub_signed(window).ok_or_else(|| {
        PurgeError::InvalidConfiguration(format!(
            "retention period of {retention_days} days is too large"
        ))
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetentionPolicy {
    days: i64,
}

impl RetentionPolicy {
    pub fn new(days: i64) -> Result<Self, PurgeError> {
        if days <= 0 {
            return Err(PurgeError::InvalidConfiguration(format!(
                "RETENTION_PERIOD_DAYS must be a positive integer (got {days})"
            )));
        }
        Ok(Self { days })
    }

    /// Parses a whole number of days; fractional or non-numeric text is rejected.
    pub fn parse(raw: &str) -> Result<Self, PurgeError> {
        let trimmed = raw.trim();
        let days = trimmed.parse::<i64>().map_err(|_| {
            PurgeError::InvalidConfiguration(format!(
                "RETENTION_PERIOD_DAYS must be a positive integer (got {trimmed:?})"
            ))
        })?;
        Self::new(days)
    }

    pub fn days(&self) -> i64 {
        self.days
    }
}

/// The record timestamp staleness is measured against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimestampField {
    CreatedAt,
    /// Last activity; a long-lived but recently touched record is kept.
    #[default]
    UpdatedAt,
}

impl TimestampField {
    pub fn attribute(&self) -> &'static str {
        match self {
            TimestampField::CreatedAt => "$createdAt",
            TimestampField::UpdatedAt => "$updatedAt",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "created" | "created_at" | "$createdat" => Some(TimestampField::CreatedAt),
            "updated" | "updated_at" | "$updatedat" => Some(TimestampField::UpdatedAt),
            _ => None,
        }
    }
}

impl fmt::Display for TimestampField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.attribute())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Staleness {
    Stale,
    Fresh,
    /// The timestamp is missing or unparseable; never delete on ambiguity.
    Ambiguous(String),
}

pub trait StalenessPredicate: Send + Sync {
    fn evaluate(&self, record: &DocumentEntity) -> Staleness;
}

/// Stale when the chosen timestamp is strictly older than the cutoff.
#[derive(Debug, Clone, Copy)]
pub struct OlderThanCutoff {
    pub field: TimestampField,
    pub cutoff: DateTime<Utc>,
}

impl StalenessPredicate for OlderThanCutoff {
    fn evaluate(&self, record: &DocumentEntity) -> Staleness {
        let Some(raw) = record.timestamp(self.field) else {
            return Staleness::Ambiguous(format!("{} is missing", self.field));
        };

        match DateTime::parse_from_rfc3339(raw.trim()) {
            Ok(ts) if ts.with_timezone(&Utc) < self.cutoff => Staleness::Stale,
            Ok(_) => Staleness::Fresh,
            Err(err) => {
                Staleness::Ambiguous(format!("{} {raw:?} is malformed: {err}", self.field))
            }
        }
    }
}
