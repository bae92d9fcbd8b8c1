//! User Routes

use axum::extract::State;
use axum::http::StatusCode;
use serde::Deserialize;
use storage::{Device, User};

use crate::error::ApiError;
use crate::extract::{Json, Path};
use crate::observability::USERS_CREATED;
use crate::SharedState;

/// Body for creating or renaming a user
#[derive(Debug, Deserialize)]
pub struct UserRequest {
    pub username: String,
}

pub async fn create_user(
    State(state): State<SharedState>,
    Json(request): Json<UserRequest>,
) -> Result<(StatusCode, Json<User>), ApiError> {
    let user = state.repository.create_user(&request.username).await?;
    metrics::counter!(USERS_CREATED).increment(1);
    Ok((StatusCode::CREATED, Json(user)))
}

pub async fn list_users(State(state): State<SharedState>) -> Result<Json<Vec<User>>, ApiError> {
    Ok(Json(state.repository.list_users().await?))
}

pub async fn get_user(
    State(state): State<SharedState>,
    Path(user_id): Path<i64>,
) -> Result<Json<User>, ApiError> {
    state
        .repository
        .get_user(user_id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("User", user_id))
}

pub async fn get_user_by_username(
    State(state): State<SharedState>,
    Path(username): Path<String>,
) -> Result<Json<User>, ApiError> {
    state
        .repository
        .get_user_by_username(&username)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("User", username))
}

pub async fn update_user(
    State(state): State<SharedState>,
    Path(user_id): Path<i64>,
    Json(request): Json<UserRequest>,
) -> Result<Json<User>, ApiError> {
    state
        .repository
        .update_user(user_id, &request.username)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("User", user_id))
}

pub async fn delete_user(
    State(state): State<SharedState>,
    Path(user_id): Path<i64>,
) -> Result<Json<User>, ApiError> {
    state
        .repository
        .delete_user(user_id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("User", user_id))
}

pub async fn list_user_devices(
    State(state): State<SharedState>,
    Path(user_id): Path<i64>,
) -> Result<Json<Vec<Device>>, ApiError> {
    if state.repository.get_user(user_id).await?.is_none() {
        return Err(ApiError::not_found("User", user_id));
    }
    Ok(Json(state.repository.list_devices_for_user(user_id).await?))
}
