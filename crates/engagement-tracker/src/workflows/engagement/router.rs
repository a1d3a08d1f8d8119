use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::error;

use super::domain::OwnerId;
use super::repository::EngagementRepository;
use super::service::{EngagementService, EngagementServiceError};
use crate::workflows::ingest::{IngestError, SAMPLE_CSV};

/// Router builder exposing upload, dashboard and point value endpoints.
pub fn engagement_router<R>(service: Arc<EngagementService<R>>) -> Router
where
    R: EngagementRepository + 'static,
{
    Router::new()
        .route(
            "/api/v1/owners/:owner_id/uploads",
            post(upload_handler::<R>),
        )
        .route(
            "/api/v1/owners/:owner_id/engagements",
            get(dashboard_handler::<R>),
        )
        .route(
            "/api/v1/owners/:owner_id/weights",
            get(weights_handler::<R>).put(update_weights_handler::<R>),
        )
        .route(
            "/api/v1/owners/:owner_id/weights/recompute",
            post(recompute_handler::<R>),
        )
        .route(
            "/api/v1/owners/:owner_id/weights/impact",
            get(impact_handler::<R>),
        )
        .route("/api/v1/engagement/sample.csv", get(sample_csv_handler))
        .with_state(service)
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct DashboardQuery {
    pub(crate) limit: Option<usize>,
}

pub(crate) async fn upload_handler<R>(
    State(service): State<Arc<EngagementService<R>>>,
    Path(owner_id): Path<String>,
    body: Bytes,
) -> Response
where
    R: EngagementRepository + 'static,
{
    let owner_id = OwnerId(owner_id);
    match blocking(move || service.upload(&owner_id, &body)).await {
        Ok(Ok(report)) if report.records_processed == 0 => {
            let payload = json!({
                "error": "No valid engagement data found in CSV",
                "errors": report.error_messages(),
            });
            (StatusCode::UNPROCESSABLE_ENTITY, axum::Json(payload)).into_response()
        }
        Ok(Ok(report)) => (StatusCode::OK, axum::Json(report)).into_response(),
        Ok(Err(error)) => error_response(error),
        Err(response) => response,
    }
}

pub(crate) async fn dashboard_handler<R>(
    State(service): State<Arc<EngagementService<R>>>,
    Path(owner_id): Path<String>,
    Query(query): Query<DashboardQuery>,
) -> Response
where
    R: EngagementRepository + 'static,
{
    match service.dashboard(&OwnerId(owner_id), query.limit) {
        Ok(dashboard) => (StatusCode::OK, axum::Json(dashboard)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn weights_handler<R>(
    State(service): State<Arc<EngagementService<R>>>,
    Path(owner_id): Path<String>,
) -> Response
where
    R: EngagementRepository + 'static,
{
    match service.weights(&OwnerId(owner_id)) {
        Ok(weights) => (StatusCode::OK, axum::Json(weights.to_point_values())).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn update_weights_handler<R>(
    State(service): State<Arc<EngagementService<R>>>,
    Path(owner_id): Path<String>,
    axum::Json(point_values): axum::Json<BTreeMap<String, Value>>,
) -> Response
where
    R: EngagementRepository + 'static,
{
    let owner_id = OwnerId(owner_id);
    let submitted = point_values.clone();
    match blocking(move || service.update_weights(&owner_id, &submitted)).await {
        Ok(Ok(report)) => {
            let payload = json!({
                "point_values": point_values,
                "updated_count": report.updated_count,
                "failed_count": report.failed_count,
            });
            (StatusCode::OK, axum::Json(payload)).into_response()
        }
        Ok(Err(error)) => error_response(error),
        Err(response) => response,
    }
}

pub(crate) async fn recompute_handler<R>(
    State(service): State<Arc<EngagementService<R>>>,
    Path(owner_id): Path<String>,
) -> Response
where
    R: EngagementRepository + 'static,
{
    let owner_id = OwnerId(owner_id);
    match blocking(move || service.recompute_all(&owner_id)).await {
        Ok(Ok(report)) => (StatusCode::OK, axum::Json(report)).into_response(),
        Ok(Err(error)) => error_response(error),
        Err(response) => response,
    }
}

pub(crate) async fn impact_handler<R>(
    State(service): State<Arc<EngagementService<R>>>,
    Path(owner_id): Path<String>,
) -> Response
where
    R: EngagementRepository + 'static,
{
    match service.impact(&OwnerId(owner_id)) {
        Ok(analysis) => (StatusCode::OK, axum::Json(analysis)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn sample_csv_handler() -> Response {
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/csv"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=sample_twitter_analytics.csv",
            ),
        ],
        SAMPLE_CSV,
    )
        .into_response()
}

/// Runs repository-bound work on the blocking pool instead of an async worker.
async fn blocking<T, F>(work: F) -> Result<T, Response>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work).await.map_err(|err| {
        error!(error = %err, "engagement task did not complete");
        let payload = json!({
            "error": "internal server error",
        });
        (StatusCode::INTERNAL_SERVER_ERROR, axum::Json(payload)).into_response()
    })
}

fn error_response(error: EngagementServiceError) -> Response {
    let status = match &error {
        EngagementServiceError::Ingest(IngestError::Io(_)) => StatusCode::INTERNAL_SERVER_ERROR,
        EngagementServiceError::Ingest(_) => StatusCode::BAD_REQUEST,
        EngagementServiceError::InvalidWeights(_) => StatusCode::UNPROCESSABLE_ENTITY,
        EngagementServiceError::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    let payload = json!({
        "error": error.to_string(),
    });
    (status, axum::Json(payload)).into_response()
}
