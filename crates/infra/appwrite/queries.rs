//! Appwrite query strings (JSON form, accepted by servers 1.5 and newer).

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::json;

use crate::domain::value_objects::pages::{PageToken, StaleFilter};

pub const ID_ATTRIBUTE: &str = "$id";

pub fn less_than(attribute: &str, value: &str) -> String {
    json!({ "method": "lessThan", "attribute": attribute, "values": [value] }).to_string()
}

pub fn greater_than(attribute: &str, value: &str) -> String {
    json!({ "method": "greaterThan", "attribute": attribute, "values": [value] }).to_string()
}

pub fn order_asc(attribute: &str) -> String {
    json!({ "method": "orderAsc", "attribute": attribute }).to_string()
}

pub fn limit(limit: u32) -> String {
    json!({ "method": "limit", "values": [limit] }).to_string()
}

/// Formats timestamps the way Appwrite stores them, e.g. `2024-06-01T00:00:00.000+00:00`.
pub fn format_timestamp(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Millis, false)
}

/// Keyset pagination on `$id`: each page continues strictly after the last id seen, so
/// deleting the records of a page never shifts or invalidates the next one.
pub fn stale_page(
    filter: &StaleFilter,
    page_token: Option<&PageToken>,
    page_size: u32,
) -> Vec<String> {
    let mut queries = vec![less_than(
        filter.timestamp_field.attribute(),
        &format_timestamp(filter.older_than),
    )];

    if let Some(token) = page_token {
        queries.push(greater_than(ID_ATTRIBUTE, token.as_str()));
    }

    queries.push(order_asc(ID_ATTRIBUTE));
    queries.push(limit(page_size));
    queries
}
