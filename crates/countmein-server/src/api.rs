//! Announcement ingestion endpoint.
//!
//! `POST /api/announcements` answers with a bare status code: 201 when every
//! announcement was stored, 400 when the body is unusable or any
//! announcement is out of bounds, 500 when the store failed.

use crate::AppState;
use axum::{
    body::Bytes,
    extract::Extension,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use countmein_ingest::IngestError;
use countmein_types::Announcement;
use serde::Deserialize;
use std::sync::Arc;
use thiserror::Error;

/// Request body for `POST /api/announcements`.
#[derive(Debug, Deserialize)]
pub struct AnnouncementsRequest {
    /// `None` when the field is absent or `null`.
    #[serde(default)]
    pub announcements: Option<Vec<Announcement>>,
}

/// Why a request body could not be turned into announcements.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("failed to decode announcements request: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("no 'announcements' field in request")]
    MissingAnnouncements,
}

/// Decodes a request body into the submitted announcements.
///
/// # Errors
///
/// `DecodeError::Malformed` if the body is not a JSON object of the expected
/// shape, `DecodeError::MissingAnnouncements` if it lacks the array.
pub fn decode_announcements(body: &[u8]) -> Result<Vec<Announcement>, DecodeError> {
    let request: AnnouncementsRequest = serde_json::from_slice(body)?;
    request
        .announcements
        .ok_or(DecodeError::MissingAnnouncements)
}

/// API error type mapping to HTTP status codes. Responses carry no body.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("bad request")]
    BadRequest,
    #[error("internal server error")]
    InternalServerError,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::BadRequest => StatusCode::BAD_REQUEST,
            ApiError::InternalServerError => StatusCode::INTERNAL_SERVER_ERROR,
        }
        .into_response()
    }
}

impl From<IngestError> for ApiError {
    fn from(e: IngestError) -> Self {
        match e {
            IngestError::Rejected(_) => ApiError::BadRequest,
            IngestError::Persist(_) => ApiError::InternalServerError,
        }
    }
}

/// Handler for `POST /api/announcements`.
pub async fn post_announcements_handler(
    Extension(state): Extension<Arc<AppState>>,
    body: Bytes,
) -> Result<StatusCode, ApiError> {
    let announcements = decode_announcements(&body).map_err(|e| {
        tracing::info!(error = %e, "rejecting announcements request");
        ApiError::BadRequest
    })?;

    let ingestor = state.ingestor.clone();
    tokio::task::spawn_blocking(move || ingestor.ingest(announcements))
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "ingest task panicked or was cancelled");
            ApiError::InternalServerError
        })??;

    Ok(StatusCode::CREATED)
}
