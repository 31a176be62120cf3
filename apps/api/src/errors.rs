use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    /// A column the pipeline depends on is missing from the uploaded dataset.
    #[error("Schema error: {0}")]
    Schema(String),

    /// No matching record or no stored artifact. `suggestions` lists valid
    /// identifying names when the miss came from a record lookup.
    #[error("Not found: {message}")]
    NotFound {
        message: String,
        suggestions: Vec<String>,
    },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("No content: {0}")]
    NoContent(String),

    #[error("Precondition failed: {0}")]
    Precondition(String),

    #[error("Upstream error: {0}")]
    Upstream(String),

    #[error("IO error: {0}")]
    Io(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Not-found without a suggestion list (artifact misses).
    pub fn not_found(message: impl Into<String>) -> Self {
        AppError::NotFound {
            message: message.into(),
            suggestions: Vec::new(),
        }
    }

    /// Stable machine-readable category, also used as the JSON `code`.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Schema(_) => "SCHEMA_ERROR",
            AppError::NotFound { .. } => "NOT_FOUND",
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::NoContent(_) => "NO_CONTENT",
            AppError::Precondition(_) => "PRECONDITION_FAILED",
            AppError::Upstream(_) => "UPSTREAM_ERROR",
            AppError::Io(_) => "IO_ERROR",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Schema(_) | AppError::Validation(_) | AppError::NoContent(_) => {
                StatusCode::BAD_REQUEST
            }
            AppError::NotFound { .. } => StatusCode::NOT_FOUND,
            AppError::Precondition(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Upstream(_) => StatusCode::BAD_GATEWAY,
            AppError::Io(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<std::io::Error> for AppError {
    fn from(e: std::io::Error) -> Self {
        AppError::Io(e.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.code();

        let body = match &self {
            AppError::NotFound {
                message,
                suggestions,
            } if !suggestions.is_empty() => json!({
                "error": {
                    "code": code,
                    "message": message,
                    "available_businesses": suggestions,
                }
            }),
            AppError::NotFound { message, .. } => json!({
                "error": { "code": code, "message": message }
            }),
            AppError::Upstream(msg) => {
                tracing::error!("Upstream error: {msg}");
                json!({
                    "error": {
                        "code": code,
                        "message": format!("Text generation failed: {msg}"),
                    }
                })
            }
            AppError::Io(msg) => {
                tracing::error!("IO error: {msg}");
                json!({
                    "error": {
                        "code": code,
                        "message": format!("Document storage failed: {msg}"),
                    }
                })
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                json!({
                    "error": {
                        "code": code,
                        "message": "An internal server error occurred",
                    }
                })
            }
            AppError::Schema(msg)
            | AppError::Validation(msg)
            | AppError::NoContent(msg)
            | AppError::Precondition(msg) => json!({
                "error": { "code": code, "message": msg }
            }),
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes_per_category() {
        assert_eq!(
            AppError::Schema("x".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(AppError::not_found("x").status(), StatusCode::NOT_FOUND);
        assert_eq!(
            AppError::Precondition("x".into()).status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            AppError::Upstream("x".into()).status(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            AppError::Io("x".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn test_not_found_body_carries_suggestions() {
        let err = AppError::NotFound {
            message: "No responses found for business 'zeta'".to_string(),
            suggestions: vec!["Acme".to_string(), "Globex".to_string()],
        };
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value["error"]["code"], "NOT_FOUND");
        assert_eq!(value["error"]["available_businesses"][1], "Globex");
    }

    #[test]
    fn test_io_error_converts() {
        let err: AppError = std::io::Error::new(std::io::ErrorKind::Other, "disk full").into();
        assert_eq!(err.code(), "IO_ERROR");
    }
}
