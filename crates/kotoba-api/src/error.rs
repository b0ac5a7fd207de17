use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use kotoba_db::store::StoreError;
use kotoba_srs::SrsError;
use serde_json::json;
use thiserror::Error;

/// API-level errors, mapped onto HTTP responses.
#[derive(Error, Debug)]
pub enum ApiError {
    /// Request payload or query parameters failed validation.
    #[error("validation error: {0}")]
    Validation(String),
    /// The scheduler rejected the input (bad rating or malformed state).
    /// Nothing was persisted.
    #[error("invalid review input: {0}")]
    InvalidInput(#[from] SrsError),
    /// The guarded write kept losing against a concurrent submission.
    #[error("conflicting review submission: {0}")]
    Conflict(String),
    /// A stored record could not be decoded.
    #[error("corrupt stored state: {0}")]
    Corrupt(String),
    /// The database failed.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Database(e) => Self::Database(e),
            StoreError::Conflict { user_id, item_id } => {
                Self::Conflict(format!("user {user_id}, item {item_id}"))
            }
            StoreError::Corrupt(msg) => Self::Corrupt(msg),
        }
    }
}

impl ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::InvalidInput(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Corrupt(_) | Self::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // Server-side failures carry detail we log but do not leak.
        let body = if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
            json!({ "error": "internal server error" })
        } else {
            json!({ "error": self.to_string() })
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            ApiError::Validation("limit out of range".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::InvalidInput(SrsError::InvalidRating(7)).status_code(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            ApiError::Conflict("user, item".into()).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError::Corrupt("bad stage".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
