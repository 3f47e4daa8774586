use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::error;

use crate::auth::repo::RepoError;
use crate::validation::ValidationErrors;

pub const EMAIL_TAKEN: &str = "Email already registered";

/// Every failure an API handler can surface.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Field path -> messages, for schema failures and business rules shaped like them.
    #[error(transparent)]
    Validation(#[from] ValidationErrors),
    /// A recognized failure whose message is safe to show.
    #[error("{0}")]
    Message(String),
    /// Anything else. The detail is logged, never returned.
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<RepoError> for ApiError {
    fn from(e: RepoError) -> Self {
        match e {
            RepoError::DuplicateEmail => ValidationErrors::single("email", EMAIL_TAKEN).into(),
            other => ApiError::Internal(other.into()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Validation(errors) => {
                (StatusCode::BAD_REQUEST, Json(json!({ "error": errors }))).into_response()
            }
            ApiError::Message(message) => {
                (StatusCode::BAD_REQUEST, Json(json!({ "error": message }))).into_response()
            }
            ApiError::Internal(e) => {
                error!(error = ?e, "unhandled error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": "Internal Server Error" })),
                )
                    .into_response()
            }
        }
    }
}
