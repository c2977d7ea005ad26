use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{
    StatusCode,
    header::{HeaderMap, HeaderValue},
};
use serde::Deserialize;
use tracing::{debug, warn};
use url::Url;

use crate::{
    domain::{
        entities::documents::DocumentEntity,
        errors::PurgeError,
        repositories::{document_store::DocumentStore, file_storage::FileStorage},
        value_objects::{
            delete_outcomes::DeleteOutcome,
            pages::{Page, PageToken, StaleFilter},
        },
    },
    infra::appwrite::queries,
};

#[derive(Debug, Clone)]
pub struct AppwriteConfig {
    /// Base API url including the version segment, e.g. `https://cloud.appwrite.io/v1`.
    pub endpoint: String,
    pub project_id: String,
    pub api_key: String,
    pub database_id: String,
    pub timeout_secs: u64,
}

/// REST client for one Appwrite project/database. Holds no state beyond its credentials.
pub struct AppwriteClient {
    http: reqwest::Client,
    endpoint: Url,
    database_id: String,
}

#[derive(Debug, Deserialize)]
struct DocumentList {
    #[serde(default)]
    total: u64,
    #[serde(default)]
    documents: Vec<DocumentEntity>,
}

#[derive(Debug, Default, Deserialize)]
struct AppwriteErrorBody {
    message: Option<String>,
    #[serde(rename = "type")]
    type_: Option<String>,
}

#[derive(Debug)]
struct ApiFailure {
    status: StatusCode,
    error_type: String,
    message: String,
}

impl AppwriteClient {
    pub fn new(config: AppwriteConfig) -> Result<Self> {
        let endpoint = Url::parse(config.endpoint.trim())
            .with_context(|| format!("APPWRITE_ENDPOINT is invalid: {}", config.endpoint))?;
        if endpoint.cannot_be_a_base() {
            anyhow::bail!("APPWRITE_ENDPOINT must be an http(s) url: {}", config.endpoint);
        }

        let mut headers = HeaderMap::new();
        headers.insert(
            "x-appwrite-project",
            HeaderValue::from_str(&config.project_id)
                .context("APPWRITE_FUNCTION_PROJECT_ID is not a valid header value")?,
        );
        let mut api_key = HeaderValue::from_str(&config.api_key)
            .context("APPWRITE_API_KEY is not a valid header value")?;
        api_key.set_sensitive(true);
        headers.insert("x-appwrite-key", api_key);

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()
            .context("failed to build Appwrite http client")?;

        Ok(Self {
            http,
            endpoint,
            database_id: config.database_id,
        })
    }

    fn url(&self, segments: &[&str]) -> Result<Url, PurgeError> {
        let mut url = self.endpoint.clone();
        url.path_segments_mut()
            .map_err(|_| {
                PurgeError::InvalidConfiguration(format!(
                    "endpoint {} cannot carry a path",
                    self.endpoint
                ))
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn documents_url(&self, collection_id: &str) -> Result<Url, PurgeError> {
        self.url(&[
            "databases",
            &self.database_id,
            "collections",
            collection_id,
            "documents",
        ])
    }

    async fn read_failure(resp: reqwest::Response, context: &str) -> ApiFailure {
        let status = resp.status();
        let body = match resp.text().await {
            Ok(text) => text,
            Err(err) => format!("<failed to read response body: {err}>"),
        };

        let parsed = serde_json::from_str::<AppwriteErrorBody>(&body).unwrap_or_default();
        let message = parsed.message.unwrap_or_else(|| {
            // Keep a short preview of the response body for debugging.
            body.chars().take(512).collect::<String>()
        });
        let error_type = parsed.type_.unwrap_or_else(|| "unknown".to_string());

        warn!(
            status = %status,
            appwrite_error_type = %error_type,
            appwrite_error_message = %message,
            context = %context,
            "appwrite: api request failed"
        );

        ApiFailure {
            status,
            error_type,
            message,
        }
    }
}

fn transport_error(err: reqwest::Error, context: &str) -> PurgeError {
    if err.is_timeout() {
        PurgeError::BackendUnavailable(format!("{context}: request timed out"))
    } else {
        PurgeError::BackendUnavailable(format!("{context}: {err}"))
    }
}

/// Maps failures that are not a plain "not found" on the requested resource.
fn classify_failure(failure: ApiFailure, context: &str) -> PurgeError {
    let status = failure.status;
    if status == StatusCode::UNAUTHORIZED
        || status == StatusCode::FORBIDDEN
        || status == StatusCode::REQUEST_TIMEOUT
        || status == StatusCode::TOO_MANY_REQUESTS
        || status.is_server_error()
    {
        return PurgeError::BackendUnavailable(format!(
            "{context} (status {}, {}): {}",
            status.as_u16(),
            failure.error_type,
            failure.message
        ));
    }

    PurgeError::RequestRejected {
        status: status.as_u16(),
        message: format!("{context} ({}): {}", failure.error_type, failure.message),
    }
}

fn is_container_missing(error_type: &str) -> bool {
    matches!(error_type, "collection_not_found" | "database_not_found")
}

#[async_trait]
impl DocumentStore for AppwriteClient {
    async fn query_page(
        &self,
        collection_id: &str,
        filter: &StaleFilter,
        page_token: Option<PageToken>,
        limit: u32,
    ) -> Result<Page, PurgeError> {
        let context = format!("list documents in collection {collection_id}");
        let queries = queries::stale_page(filter, page_token.as_ref(), limit);
        let params = queries
            .iter()
            .map(|q| ("queries[]", q.as_str()))
            .collect::<Vec<_>>();

        let resp = self
            .http
            .get(self.documents_url(collection_id)?)
            .query(&params)
            .send()
            .await
            .map_err(|err| transport_error(err, &context))?;

        if !resp.status().is_success() {
            let failure = Self::read_failure(resp, &context).await;
            if failure.status == StatusCode::NOT_FOUND {
                return Err(PurgeError::CollectionNotFound(format!(
                    "{collection_id} in database {} ({}: {})",
                    self.database_id, failure.error_type, failure.message
                )));
            }
            return Err(classify_failure(failure, &context));
        }

        let list: DocumentList = resp.json().await.map_err(|err| {
            PurgeError::BackendUnavailable(format!("{context}: malformed response: {err}"))
        })?;

        let next_token = if limit > 0 && list.documents.len() >= limit as usize {
            list.documents.last().map(|doc| PageToken::new(doc.id.clone()))
        } else {
            None
        };

        debug!(
            collection_id,
            returned = list.documents.len(),
            total = list.total,
            has_more = next_token.is_some(),
            "appwrite: listed documents"
        );

        Ok(Page {
            records: list.documents,
            next_token,
        })
    }

    async fn delete_record(
        &self,
        collection_id: &str,
        record_id: &str,
    ) -> Result<DeleteOutcome, PurgeError> {
        let context = format!("delete document {record_id} from collection {collection_id}");
        let mut url = self.documents_url(collection_id)?;
        url.path_segments_mut()
            .map_err(|_| PurgeError::InvalidConfiguration("endpoint cannot carry a path".into()))?
            .push(record_id);

        let resp = self
            .http
            .delete(url)
            .send()
            .await
            .map_err(|err| transport_error(err, &context))?;

        if resp.status().is_success() {
            return Ok(DeleteOutcome::Deleted);
        }

        let failure = Self::read_failure(resp, &context).await;
        if failure.status == StatusCode::NOT_FOUND {
            if is_container_missing(&failure.error_type) {
                return Err(PurgeError::CollectionNotFound(format!(
                    "{collection_id} ({}: {})",
                    failure.error_type, failure.message
                )));
            }
            return Ok(DeleteOutcome::AlreadyAbsent);
        }

        Err(classify_failure(failure, &context))
    }
}

#[async_trait]
impl FileStorage for AppwriteClient {
    async fn delete_file(
        &self,
        bucket_id: &str,
        file_id: &str,
    ) -> Result<DeleteOutcome, PurgeError> {
        let context = format!("delete file {file_id} from bucket {bucket_id}");
        let url = self.url(&["storage", "buckets", bucket_id, "files", file_id])?;

        let resp = self
            .http
            .delete(url)
            .send()
            .await
            .map_err(|err| transport_error(err, &context))?;

        if resp.status().is_success() {
            return Ok(DeleteOutcome::Deleted);
        }

        let failure = Self::read_failure(resp, &context).await;
        if failure.status == StatusCode::NOT_FOUND {
            if failure.error_type == "storage_bucket_not_found" {
                return Err(PurgeError::BackendUnavailable(format!(
                    "bucket {bucket_id} not found: {}",
                    failure.message
                )));
            }
            return Ok(DeleteOutcome::AlreadyAbsent);
        }

        Err(classify_failure(failure, &context))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::value_objects::retention::TimestampField;
    use chrono::{TimeZone, Utc};
    use serde_json::json;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{header, method, path, query_param},
    };

    const DOCS_PATH: &str = "/v1/databases/main/collections/participants/documents";

    fn client(server: &MockServer) -> AppwriteClient {
        AppwriteClient::new(AppwriteConfig {
            endpoint: format!("{}/v1", server.uri()),
            project_id: "project-1".to_string(),
            api_key: "secret-key".to_string(),
            database_id: "main".to_string(),
            timeout_secs: 5,
        })
        .unwrap()
    }

    fn filter() -> StaleFilter {
        StaleFilter {
            timestamp_field: TimestampField::UpdatedAt,
            older_than: Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap(),
        }
    }

    fn doc(id: &str) -> serde_json::Value {
        json!({
            "$id": id,
            "$createdAt": "2024-01-01T00:00:00.000+00:00",
            "$updatedAt": "2024-01-02T00:00:00.000+00:00",
            "uid": format!("user-{id}")
        })
    }

    fn not_found(error_type: &str) -> ResponseTemplate {
        ResponseTemplate::new(404).set_body_json(json!({
            "message": "Not found",
            "code": 404,
            "type": error_type,
            "version": "1.5.7"
        }))
    }

    #[tokio::test]
    async fn full_page_yields_continuation_token_and_sends_credentials() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(DOCS_PATH))
            .and(header("x-appwrite-project", "project-1"))
            .and(header("x-appwrite-key", "secret-key"))
            .and(query_param("queries[]", queries::limit(2).as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "total": 5,
                "documents": [doc("a"), doc("b")]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let page = client(&server)
            .query_page("participants", &filter(), None, 2)
            .await
            .unwrap();

        assert_eq!(page.records.len(), 2);
        assert_eq!(page.records[0].id, "a");
        assert_eq!(page.next_token, Some(PageToken::new("b")));
    }

    #[tokio::test]
    async fn short_page_ends_pagination_and_forwards_keyset() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(DOCS_PATH))
            .and(query_param("queries[]", queries::greater_than("$id", "b").as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "total": 1,
                "documents": [doc("c")]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let page = client(&server)
            .query_page("participants", &filter(), Some(PageToken::new("b")), 2)
            .await
            .unwrap();

        assert_eq!(page.records.len(), 1);
        assert_eq!(page.next_token, None);
    }

    #[tokio::test]
    async fn missing_collection_maps_to_collection_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(DOCS_PATH))
            .respond_with(not_found("collection_not_found"))
            .mount(&server)
            .await;

        let err = client(&server)
            .query_page("participants", &filter(), None, 25)
            .await
            .unwrap_err();

        assert!(matches!(err, PurgeError::CollectionNotFound(_)));
    }

    #[tokio::test]
    async fn auth_and_server_failures_map_to_backend_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(DOCS_PATH))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({
                "message": "Invalid API key",
                "code": 401,
                "type": "user_unauthorized"
            })))
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path(format!("{DOCS_PATH}/a")))
            .respond_with(ResponseTemplate::new(503).set_body_string("upstream down"))
            .mount(&server)
            .await;

        let client = client(&server);
        let list_err = client
            .query_page("participants", &filter(), None, 25)
            .await
            .unwrap_err();
        let delete_err = client.delete_record("participants", "a").await.unwrap_err();

        assert!(matches!(list_err, PurgeError::BackendUnavailable(_)));
        assert!(matches!(delete_err, PurgeError::BackendUnavailable(_)));
    }

    #[tokio::test]
    async fn unreachable_backend_is_unavailable() {
        let client = AppwriteClient::new(AppwriteConfig {
            endpoint: "http://127.0.0.1:9/v1".to_string(),
            project_id: "project-1".to_string(),
            api_key: "secret-key".to_string(),
            database_id: "main".to_string(),
            timeout_secs: 2,
        })
        .unwrap();

        let err = client
            .query_page("participants", &filter(), None, 25)
            .await
            .unwrap_err();

        assert!(matches!(err, PurgeError::BackendUnavailable(_)));
    }

    #[tokio::test]
    async fn delete_record_is_idempotent() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path(format!("{DOCS_PATH}/a")))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path(format!("{DOCS_PATH}/gone")))
            .respond_with(not_found("document_not_found"))
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path(format!("{DOCS_PATH}/bad")))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "message": "Invalid document id",
                "code": 400,
                "type": "general_argument_invalid"
            })))
            .mount(&server)
            .await;

        let client = client(&server);
        assert_eq!(
            client.delete_record("participants", "a").await.unwrap(),
            DeleteOutcome::Deleted
        );
        assert_eq!(
            client.delete_record("participants", "gone").await.unwrap(),
            DeleteOutcome::AlreadyAbsent
        );
        assert!(matches!(
            client.delete_record("participants", "bad").await.unwrap_err(),
            PurgeError::RequestRejected { status: 400, .. }
        ));
    }

    #[tokio::test]
    async fn delete_file_treats_missing_file_as_absent_but_missing_bucket_as_error() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/v1/storage/buckets/avatars/files/f-1"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/v1/storage/buckets/avatars/files/f-2"))
            .respond_with(not_found("storage_file_not_found"))
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/v1/storage/buckets/nope/files/f-1"))
            .respond_with(not_found("storage_bucket_not_found"))
            .mount(&server)
            .await;

        let client = client(&server);
        assert_eq!(
            client.delete_file("avatars", "f-1").await.unwrap(),
            DeleteOutcome::Deleted
        );
        assert_eq!(
            client.delete_file("avatars", "f-2").await.unwrap(),
            DeleteOutcome::AlreadyAbsent
        );
        assert!(matches!(
            client.delete_file("nope", "f-1").await.unwrap_err(),
            PurgeError::BackendUnavailable(_)
        ));
    }

    #[test]
    fn rejects_invalid_endpoint() {
        let result = AppwriteClient::new(AppwriteConfig {
            endpoint: "not a url".to_string(),
            project_id: "p".to_string(),
            api_key: "k".to_string(),
            database_id: "main".to_string(),
            timeout_secs: 5,
        });

        assert!(result.is_err());
    }
}
