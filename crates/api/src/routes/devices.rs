//! Device Routes

use axum::extract::State;
use axum::http::StatusCode;
use serde::Deserialize;
use storage::Device;

use crate::error::ApiError;
use crate::extract::{Json, Path, Query};
use crate::observability::DEVICES_CREATED;
use crate::SharedState;

/// Pagination for the device listing
#[derive(Debug, Deserialize)]
pub struct DeviceListQuery {
    #[serde(default)]
    pub skip: i64,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    100
}

#[derive(Debug, Deserialize)]
pub struct CreateDeviceRequest {
    pub name: String,
    pub user_id: i64,
}

#[derive(Debug, Deserialize)]
pub struct UpdateDeviceRequest {
    pub name: String,
}

pub async fn create_device(
    State(state): State<SharedState>,
    Json(request): Json<CreateDeviceRequest>,
) -> Result<(StatusCode, Json<Device>), ApiError> {
    let device = state
        .repository
        .create_device(&request.name, request.user_id)
        .await?;
    metrics::counter!(DEVICES_CREATED).increment(1);
    Ok((StatusCode::CREATED, Json(device)))
}

pub async fn list_devices(
    State(state): State<SharedState>,
    Query(params): Query<DeviceListQuery>,
) -> Result<Json<Vec<Device>>, ApiError> {
    let limit = params.limit.clamp(0, 1000);
    Ok(Json(state.repository.list_devices(params.skip, limit).await?))
}

pub async fn get_device(
    State(state): State<SharedState>,
    Path(device_id): Path<i64>,
) -> Result<Json<Device>, ApiError> {
    state
        .repository
        .get_device(device_id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Device", device_id))
}

pub async fn update_device(
    State(state): State<SharedState>,
    Path(device_id): Path<i64>,
    Json(request): Json<UpdateDeviceRequest>,
) -> Result<Json<Device>, ApiError> {
    state
        .repository
        .update_device(device_id, &request.name)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Device", device_id))
}

pub async fn delete_device(
    State(state): State<SharedState>,
    Path(device_id): Path<i64>,
) -> Result<Json<Device>, ApiError> {
    state
        .repository
        .delete_device(device_id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Device", device_id))
}
