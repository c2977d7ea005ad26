use std::{sync::Arc, time::Duration};

use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, StatusCode, header::AUTHORIZATION},
    response::{IntoResponse, Response},
    routing::post,
};
use cleaner_core::domain::value_objects::purge_results::PurgeResult;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::error;

use crate::{
    config::config_model::DotEnvyConfig,
    usecases::{
        database_cleanup::{CollectingContext, DatabaseCleanupUseCase},
        purge_orchestrator::CollectionReport,
    },
};

// Run example
//   curl -X POST "http://localhost:$SERVER_PORT_WORKER/internal/v1/cleanup/run" \
//     -H "Authorization: Bearer $INTERNAL_CLEANUP_TOKEN" \
//     -H "Content-Type: application/json" \
//     -d '{"dry_run":true,"max_deletes":500}'

/// Kept back from the server timeout so the report goes out before the request is cut.
const REPORT_MARGIN: Duration = Duration::from_millis(500);

#[derive(Clone)]
pub struct CleanupRouteState {
    config: Arc<DotEnvyConfig>,
    usecase: Arc<DatabaseCleanupUseCase>,
    /// How long a run may take before it must stop and report.
    run_budget: Option<Duration>,
}

pub fn routes(config: Arc<DotEnvyConfig>, usecase: Arc<DatabaseCleanupUseCase>) -> Router {
    let run_budget = config
        .worker_server
        .as_ref()
        .map(|server| run_budget(Duration::from_secs(server.timeout)));

    Router::new()
        .route("/run", post(run_cleanup))
        .with_state(CleanupRouteState {
            config,
            usecase,
            run_budget,
        })
}

fn run_budget(server_timeout: Duration) -> Duration {
    if server_timeout > REPORT_MARGIN * 2 {
        server_timeout - REPORT_MARGIN
    } else {
        server_timeout / 2
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct RunCleanupRequest {
    pub dry_run: Option<bool>,
    /// `0` lifts the configured limit for this run.
    pub max_deletes: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct CollectionResponse {
    pub collection: String,
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<PurgeResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<CollectionReport> for CollectionResponse {
    fn from(report: CollectionReport) -> Self {
        match report.outcome {
            Ok(result) => Self {
                collection: report.collection,
                status: "ok",
                result: Some(result),
                error: None,
            },
            Err(failure) => Self {
                collection: report.collection,
                status: "failed",
                error: Some(failure.error.to_string()),
                result: Some(failure.partial),
            },
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RunCleanupResponse {
    pub message: String,
    pub dry_run: bool,
    pub collections: Vec<CollectionResponse>,
    pub errors: Vec<String>,
}

pub async fn run_cleanup(
    State(state): State<CleanupRouteState>,
    headers: HeaderMap,
    payload: Option<Json<RunCleanupRequest>>,
) -> Response {
    let expected_token = match state.config.cleanup.internal_token.as_deref() {
        Some(token) => token,
        None => {
            return (
                StatusCode::SERVICE_UNAVAILABLE,
                "cleanup token is not configured",
            )
                .into_response();
        }
    };

    if let Err(status) = authorize_bearer(&headers, expected_token) {
        return (status, "unauthorized").into_response();
    }

    let Json(payload) = payload.unwrap_or_default();
    let mut options = state.config.cleanup.purge_options();
    if let Some(dry_run) = payload.dry_run {
        options.dry_run = dry_run;
    }
    if let Some(max_deletes) = payload.max_deletes {
        options.max_deletes = (max_deletes > 0).then_some(max_deletes);
    }
    if let Some(budget) = state.run_budget {
        let cap = Instant::now() + budget;
        options.deadline = Some(options.deadline.map_or(cap, |deadline| deadline.min(cap)));
    }

    let ctx = CollectingContext::default();
    match state.usecase.run(&ctx, &options).await {
        Ok(summary) => Json(RunCleanupResponse {
            message: summary.message,
            dry_run: options.dry_run,
            collections: summary.reports.into_iter().map(Into::into).collect(),
            errors: ctx.errors(),
        })
        .into_response(),
        Err(err) => {
            error!(error = %err, "run_cleanup: usecase failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "cleanup failed").into_response()
        }
    }
}

fn authorize_bearer(headers: &HeaderMap, expected_token: &str) -> Result<(), StatusCode> {
    let token = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|auth| auth.strip_prefix("Bearer "))
        .ok_or(StatusCode::UNAUTHORIZED)?;

    if token == expected_token {
        Ok(())
    } else {
        Err(StatusCode::UNAUTHORIZED)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::config_loader,
        usecases::{
            purge_collection::{
                PurgeCollectionUseCase,
                tests::{InMemoryStore, cutoff, doc, fresh_ts, stale_ts},
            },
            purge_orchestrator::PurgeOrchestrator,
        },
    };
    use axum::{
        body::{Body, to_bytes},
        http::Request,
    };
    use chrono::TimeDelta;
    use cleaner_core::domain::{
        repositories::file_storage::MockFileStorage,
        value_objects::{
            clock::FixedClock,
            collections::{CollectionTarget, PARTICIPANTS},
            retention::TimestampField,
        },
    };
    use serde_json::Value;
    use tower::ServiceExt;

    fn config(token: Option<&'static str>) -> Arc<DotEnvyConfig> {
        let loaded = config_loader::load_from(|key| {
            let value = match key {
                "APPWRITE_API_KEY" => "secret",
                "RETENTION_PERIOD_DAYS" => "30",
                "APPWRITE_BUCKET_ID" => "avatars",
                "APPWRITE_FUNCTION_PROJECT_ID" => "project",
                "APPWRITE_DATABASE_ID" => "main",
                "INTERNAL_CLEANUP_TOKEN" => token?,
                _ => return None,
            };
            Some(value.to_string())
        });
        Arc::new(loaded.unwrap())
    }

    fn app(token: Option<&'static str>, store: Arc<InMemoryStore>) -> Router {
        let orchestrator = PurgeOrchestrator::new(
            PurgeCollectionUseCase::new(store, 10),
            Arc::new(MockFileStorage::new()),
            "avatars",
            vec![CollectionTarget::new(PARTICIPANTS, "participants")],
            30,
            TimestampField::UpdatedAt,
            Arc::new(FixedClock(cutoff() + TimeDelta::days(30))),
        );
        routes(
            config(token),
            Arc::new(DatabaseCleanupUseCase::new(Arc::new(orchestrator))),
        )
    }

    fn store() -> Arc<InMemoryStore> {
        Arc::new(InMemoryStore::with_records(vec![
            doc("a", &stale_ts()),
            doc("b", &fresh_ts()),
        ]))
    }

    fn request(auth: Option<&str>, body: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().method("POST").uri("/run");
        if let Some(auth) = auth {
            builder = builder.header(AUTHORIZATION, auth);
        }
        match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }

    async fn json_body(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn runs_cleanup_with_valid_token() {
        let store = store();
        let response = app(Some("s3cret"), store.clone())
            .oneshot(request(Some("Bearer s3cret"), None))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["message"], "Database Cleanup completed");
        assert_eq!(body["dry_run"], false);
        assert_eq!(body["collections"][0]["collection"], "participants");
        assert_eq!(body["collections"][0]["status"], "ok");
        assert_eq!(body["collections"][0]["result"]["deleted"], 1);
        assert_eq!(store.ids(), vec!["b"]);
    }

    #[tokio::test]
    async fn dry_run_from_body_deletes_nothing() {
        let store = store();
        let response = app(Some("s3cret"), store.clone())
            .oneshot(request(Some("Bearer s3cret"), Some(r#"{"dry_run":true}"#)))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["dry_run"], true);
        assert_eq!(body["collections"][0]["result"]["would_delete"], 1);
        assert_eq!(store.ids(), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn rejects_wrong_or_missing_token() {
        for auth in [None, Some("Bearer nope"), Some("s3cret")] {
            let store = store();
            let response = app(Some("s3cret"), store.clone())
                .oneshot(request(auth, None))
                .await
                .unwrap();

            assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
            assert_eq!(store.ids(), vec!["a", "b"]);
        }
    }

    #[test]
    fn run_budget_leaves_room_for_the_report() {
        assert_eq!(run_budget(Duration::from_secs(60)), Duration::from_millis(59_500));
        assert_eq!(run_budget(Duration::from_secs(1)), Duration::from_millis(500));
        assert_eq!(run_budget(Duration::ZERO), Duration::ZERO);
    }

    #[tokio::test]
    async fn unavailable_without_configured_token() {
        let response = app(None, store())
            .oneshot(request(Some("Bearer anything"), None))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
