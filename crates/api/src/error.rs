//! API error type and its HTTP mapping

use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use storage::StorageError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    /// Requested resource not found
    #[error("{resource} with ID {id} not found")]
    NotFound { resource: &'static str, id: String },

    /// Invalid request data
    #[error("{message}")]
    BadRequest { message: String },

    /// Request could not be extracted (body, path or query)
    #[error("{message}")]
    Rejected { status: StatusCode, message: String },

    #[error(transparent)]
    Storage(#[from] StorageError),
}

macro_rules! impl_from_rejection {
    ($($rejection:ty),*) => {
        $(
            impl From<$rejection> for ApiError {
                fn from(rejection: $rejection) -> Self {
                    Self::Rejected {
                        status: rejection.status(),
                        message: rejection.body_text(),
                    }
                }
            }
        )*
    };
}

impl_from_rejection!(JsonRejection, PathRejection, QueryRejection);

impl ApiError {
    pub fn not_found(resource: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            resource,
            id: id.to_string(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest {
            message: message.into(),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::NotFound { .. } => StatusCode::NOT_FOUND,
            ApiError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            ApiError::Rejected { status, .. } => *status,
            ApiError::Storage(err) => match err {
                StorageError::NotFound { .. } => StatusCode::NOT_FOUND,
                StorageError::UniqueViolation(_) | StorageError::HasDependents { .. } => {
                    StatusCode::CONFLICT
                }
                StorageError::ForeignKeyViolation(_) | StorageError::InvalidInput(_) => {
                    StatusCode::BAD_REQUEST
                }
                StorageError::DatabaseError(_)
                | StorageError::SeedFile { .. }
                | StorageError::SerializationError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    /// Message safe to show to clients
    pub fn user_message(&self) -> String {
        match self {
            ApiError::NotFound { .. }
            | ApiError::BadRequest { .. }
            | ApiError::Rejected { .. } => self.to_string(),
            ApiError::Storage(err) => match err {
                StorageError::NotFound { .. }
                | StorageError::HasDependents { .. }
                | StorageError::InvalidInput(_) => err.to_string(),
                StorageError::UniqueViolation(_) => "Name is already taken".to_string(),
                StorageError::ForeignKeyViolation(_) => {
                    "Invalid reference to related resource".to_string()
                }
                _ => "Internal server error".to_string(),
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!("Internal service error: {:#}", self);
        } else if status == StatusCode::CONFLICT {
            tracing::warn!("Conflict: {}", self);
        } else {
            tracing::debug!("Client error: {}", self);
        }

        (status, Json(json!({ "message": self.user_message() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            ApiError::not_found("User", 3).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::from(StorageError::UniqueViolation("users.username".into())).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError::from(StorageError::HasDependents {
                entity: "user",
                id: 1,
                dependents: "devices",
                count: 2
            })
            .status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError::from(StorageError::InvalidInput("blank".into())).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(StorageError::DatabaseError("disk I/O".into())).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_internal_details_are_hidden() {
        let err = ApiError::from(StorageError::DatabaseError("secret path /var/db".into()));
        assert_eq!(err.user_message(), "Internal server error");
        assert_eq!(ApiError::not_found("Device", 9).user_message(), "Device with ID 9 not found");
    }
}
