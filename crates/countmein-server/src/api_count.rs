//! Live presence estimate.
//!
//! `GET /api/announcements/count?since=<secs>` reports how many distinct
//! devices have been seen after `since`, excluding simulator traffic.

use crate::AppState;
use axum::{
    extract::{Extension, Query},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use countmein_ingest::COUNT_UNAVAILABLE;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Query parameters for `GET /api/announcements/count`.
#[derive(Debug, Deserialize)]
pub struct CountQuery {
    /// Only announcements with a client time after this are counted.
    pub since: i64,
}

/// Response body for the device count.
#[derive(Debug, Serialize, Deserialize)]
pub struct CountResponse {
    /// Distinct observed devices, or [`COUNT_UNAVAILABLE`] on failure.
    pub count: i64,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error: Option<String>,
}

/// Handler for `GET /api/announcements/count`.
///
/// A missing or non-integer `since` is rejected by the query extractor
/// with 400.
pub async fn get_device_count_handler(
    Extension(state): Extension<Arc<AppState>>,
    Query(params): Query<CountQuery>,
) -> Result<Json<CountResponse>, Response> {
    let ingestor = state.ingestor.clone();

    let result = tokio::task::spawn_blocking(move || ingestor.count_distinct_devices(params.since))
        .await
        .map_err(|e| e.to_string())
        .and_then(|count| count.map_err(|e| e.to_string()));

    match result {
        Ok(count) => Ok(Json(CountResponse { count, error: None })),
        Err(error) => Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(CountResponse {
                count: COUNT_UNAVAILABLE,
                error: Some(error),
            }),
        )
            .into_response()),
    }
}
