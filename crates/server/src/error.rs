use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use db::{StorageError, models::validation::ValidationError};
use serde_json::json;
use services::services::{
    cloudinary::CloudinaryError, password::PasswordError, product_metadata::ProductMetadataError,
};
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("Not authenticated")]
    Unauthorized,
    #[error("Invalid email or password")]
    InvalidCredentials,
    #[error("Admin access required")]
    Forbidden,
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("{0}")]
    ServiceUnavailable(&'static str),
    #[error("{0}")]
    Internal(String),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Session(#[from] tower_sessions::session::Error),
    #[error(transparent)]
    Password(#[from] PasswordError),
    #[error(transparent)]
    ProductMetadata(#[from] ProductMetadataError),
    #[error(transparent)]
    Cloudinary(#[from] CloudinaryError),
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl ApiError {
    fn status_and_message(&self) -> (StatusCode, String) {
        match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ApiError::Validation(e) => (StatusCode::BAD_REQUEST, e.message.clone()),
            ApiError::Unauthorized | ApiError::InvalidCredentials => {
                (StatusCode::UNAUTHORIZED, self.to_string())
            }
            ApiError::Forbidden => (StatusCode::FORBIDDEN, self.to_string()),
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, self.to_string()),
            ApiError::ServiceUnavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg.to_string()),
            ApiError::Storage(StorageError::Conflict(msg)) => (StatusCode::CONFLICT, msg.clone()),
            ApiError::ProductMetadata(
                e @ (ProductMetadataError::InvalidUrl(_) | ProductMetadataError::InvalidAsin(_)),
            ) => (StatusCode::BAD_REQUEST, e.to_string()),
            ApiError::ProductMetadata(ProductMetadataError::Fetch(_)) => (
                StatusCode::BAD_GATEWAY,
                "Could not fetch the product page".to_string(),
            ),
            ApiError::Cloudinary(
                e @ (CloudinaryError::InvalidSource | CloudinaryError::InvalidFolder),
            ) => (StatusCode::BAD_REQUEST, e.to_string()),
            ApiError::Cloudinary(_) => (StatusCode::BAD_GATEWAY, "Image upload failed".to_string()),
            ApiError::Storage(_)
            | ApiError::Session(_)
            | ApiError::Password(_)
            | ApiError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            ),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = self.status_and_message();
        if status.is_server_error() {
            error!(status = status.as_u16(), error = %self, "Request failed");
        }
        (status, Json(json!({ "error": message }))).into_response()
    }
}
