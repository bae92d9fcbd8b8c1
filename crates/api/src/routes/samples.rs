//! Sample Routes

use axum::extract::State;
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use storage::{DeviceStat, NewDeviceStat};

use super::WindowQuery;
use crate::error::ApiError;
use crate::extract::{Json, Path, Query};
use crate::observability::SAMPLES_CREATED;
use crate::SharedState;

/// Body for recording one sample; `timestamp` defaults to now
#[derive(Debug, Deserialize)]
pub struct CreateSampleRequest {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SampleResponse {
    pub id: i64,
    pub device_id: i64,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub timestamp: DateTime<Utc>,
}

impl From<DeviceStat> for SampleResponse {
    fn from(stat: DeviceStat) -> Self {
        Self {
            id: stat.id,
            device_id: stat.device_id,
            x: stat.x,
            y: stat.y,
            z: stat.z,
            timestamp: stat.timestamp(),
        }
    }
}

async fn require_device(state: &SharedState, device_id: i64) -> Result<(), ApiError> {
    match state.repository.get_device(device_id).await? {
        Some(_) => Ok(()),
        None => Err(ApiError::not_found("Device", device_id)),
    }
}

pub async fn create_sample(
    State(state): State<SharedState>,
    Path(device_id): Path<i64>,
    Json(request): Json<CreateSampleRequest>,
) -> Result<(StatusCode, Json<SampleResponse>), ApiError> {
    let new_stat = NewDeviceStat {
        x: request.x,
        y: request.y,
        z: request.z,
        timestamp: request.timestamp,
    };
    let stat = state
        .repository
        .create_device_stat(device_id, &new_stat)
        .await?;
    metrics::counter!(SAMPLES_CREATED).increment(1);
    Ok((StatusCode::CREATED, Json(stat.into())))
}

pub async fn list_samples(
    State(state): State<SharedState>,
    Path(device_id): Path<i64>,
    Query(params): Query<WindowQuery>,
) -> Result<Json<Vec<SampleResponse>>, ApiError> {
    let window = params.to_window()?;
    require_device(&state, device_id).await?;

    let stats = state
        .repository
        .list_stats_for_device(device_id, window)
        .await?;
    Ok(Json(stats.into_iter().map(SampleResponse::from).collect()))
}

pub async fn delete_samples(
    State(state): State<SharedState>,
    Path(device_id): Path<i64>,
) -> Result<Json<Vec<SampleResponse>>, ApiError> {
    require_device(&state, device_id).await?;

    let removed = state.repository.delete_device_stats(device_id).await?;
    Ok(Json(removed.into_iter().map(SampleResponse::from).collect()))
}
