use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;

use super::error::ApiError;
use super::state::AppState;
use crate::application::services::ingest::IngestRequest;
use crate::domain::entities::sample::Sample;

/// `POST /api/samples`: record one reading.
///
/// Responds once the sample is stored; evaluation and notification happen
/// afterwards and never change the response.
pub async fn create_sample(
    State(state): State<AppState>,
    payload: Result<Json<IngestRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Sample>), ApiError> {
    let Json(request) = payload.map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;
    let sample = state.ingest.ingest(request).await?;
    Ok((StatusCode::CREATED, Json(sample)))
}
