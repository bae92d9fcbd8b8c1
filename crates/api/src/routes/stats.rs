//! Statistics Routes

use axum::extract::State;

use super::WindowQuery;
use crate::analysis::{self, AnalysisResults, DeviceAnalysis};
use crate::error::ApiError;
use crate::extract::{Json, Path, Query};
use crate::observability::ANALYSIS_REQUESTS;
use crate::SharedState;

/// Summary of one device, optionally restricted to a time window
pub async fn device_summary(
    State(state): State<SharedState>,
    Path(device_id): Path<i64>,
    Query(params): Query<WindowQuery>,
) -> Result<Json<AnalysisResults>, ApiError> {
    metrics::counter!(ANALYSIS_REQUESTS, "scope" => "device").increment(1);
    let window = params.to_window()?;

    analysis::aggregate_over_window(&state.repository, device_id, window)
        .await?
        .map(|summary| Json(summary.into()))
        .ok_or_else(|| ApiError::not_found("Device", device_id))
}

pub async fn user_stats(
    State(state): State<SharedState>,
    Path(user_id): Path<i64>,
) -> Result<Json<Vec<DeviceAnalysis>>, ApiError> {
    metrics::counter!(ANALYSIS_REQUESTS, "scope" => "user").increment(1);

    analysis::aggregate_for_user(&state.repository, user_id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("User", user_id))
}

pub async fn user_device_stats(
    State(state): State<SharedState>,
    Path((user_id, device_id)): Path<(i64, i64)>,
) -> Result<Json<AnalysisResults>, ApiError> {
    metrics::counter!(ANALYSIS_REQUESTS, "scope" => "user_device").increment(1);

    if state.repository.get_user(user_id).await?.is_none() {
        return Err(ApiError::not_found("User", user_id));
    }
    analysis::aggregate_for_user_device(&state.repository, user_id, device_id)
        .await?
        .map(|summary| Json(summary.into()))
        .ok_or_else(|| ApiError::not_found("Device", device_id))
}

pub async fn all_devices_stats(
    State(state): State<SharedState>,
) -> Result<Json<Vec<DeviceAnalysis>>, ApiError> {
    metrics::counter!(ANALYSIS_REQUESTS, "scope" => "all").increment(1);

    Ok(Json(
        analysis::aggregate_for_all_devices(&state.repository).await?,
    ))
}
