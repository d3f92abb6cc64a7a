use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("Storage error: {0}")]
    Storage(sqlx::Error),

    #[error("Partition handle is closed")]
    Closed,

    #[error("Service temporarily unavailable: {0}")]
    Unavailable(String),

    #[error("Reload failed: {0}")]
    Refresh(String),

    #[error("Configuration error: {0}")]
    Config(#[from] anyhow::Error),
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolClosed => AppError::Closed,
            other => AppError::Storage(other),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for AppError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        AppError::Storage(sqlx::Error::Migrate(Box::new(err)))
    }
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Storage(_) | AppError::Closed | AppError::Refresh(_) | AppError::Config(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let (error_code, message) = match &self {
            AppError::NotFound(msg) => ("not_found", msg.clone()),
            AppError::Validation(msg) => ("invalid_request", msg.clone()),
            AppError::Unavailable(msg) => {
                tracing::warn!("Request rejected: {}", msg);
                ("unavailable", "Service temporarily unavailable".to_string())
            }
            AppError::Storage(e) => {
                tracing::error!("Storage error: {:?}", e);
                ("internal_error", "Internal server error".to_string())
            }
            AppError::Closed => {
                tracing::error!("Operation on a closed partition handle");
                ("internal_error", "Internal server error".to_string())
            }
            AppError::Refresh(msg) => {
                tracing::error!("Reload failure surfaced to a request: {}", msg);
                ("internal_error", "Internal server error".to_string())
            }
            AppError::Config(e) => {
                tracing::error!("Configuration error: {:?}", e);
                ("internal_error", "Internal server error".to_string())
            }
        };

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_closed_maps_to_closed() {
        let err: AppError = sqlx::Error::PoolClosed.into();
        assert!(matches!(err, AppError::Closed));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_status_distinguishes_absent_invalid_and_failure() {
        assert_eq!(
            AppError::NotFound("x".into()).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::Validation("x".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::Storage(sqlx::Error::RowNotFound).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn test_storage_detail_not_leaked() {
        let response = AppError::Storage(sqlx::Error::Protocol("secret detail".into()))
            .into_response();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert!(!text.contains("secret detail"));
        assert!(text.contains("internal_error"));
    }
}
