use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// Application-level errors
#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Cache error: {0}")]
    Cache(#[from] redis::RedisError),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("Computation cancelled: {0}")]
    Cancelled(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    /// True for failures of a collaborator rather than of the request itself
    pub fn is_upstream(&self) -> bool {
        matches!(
            self,
            AppError::Database(_) | AppError::Cache(_) | AppError::UpstreamUnavailable(_)
        )
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.is_upstream() {
            tracing::error!(error = %self, "Collaborator failure");
        }

        let (status, message) = match self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Database(_) | AppError::Cache(_) => {
                (StatusCode::SERVICE_UNAVAILABLE, self.to_string())
            }
            AppError::UpstreamUnavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg),
            AppError::Cancelled(msg) => (StatusCode::GATEWAY_TIMEOUT, msg),
            AppError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()),
        };

        let body = Json(json!({
            "error": message
        }));

        (status, body).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (AppError::NotFound("user 9".into()), StatusCode::NOT_FOUND),
            (AppError::InvalidInput("count".into()), StatusCode::BAD_REQUEST),
            (
                AppError::UpstreamUnavailable("catalog".into()),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (AppError::Cancelled("deadline".into()), StatusCode::GATEWAY_TIMEOUT),
            (AppError::Internal("boom".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];

        for (error, expected) in cases {
            assert_eq!(error.into_response().status(), expected);
        }
    }

    #[test]
    fn test_is_upstream() {
        assert!(AppError::UpstreamUnavailable("x".into()).is_upstream());
        assert_eq!(
            AppError::UpstreamUnavailable("x".into())
                .into_response()
                .status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert!(!AppError::NotFound("x".into()).is_upstream());
        assert!(!AppError::Cancelled("x".into()).is_upstream());
    }
}
