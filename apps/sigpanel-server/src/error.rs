//! Error types for the signature panel server

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use sigpanel_core::StampError;
use thiserror::Error;

/// Server error types
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("{0}")]
    MissingAssets(String),

    #[error("Unknown variant: {0}")]
    UnknownVariant(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Invalid PDF: {0}")]
    InvalidPdf(String),

    #[error("Upload too large: {0}")]
    PayloadTooLarge(String),

    #[error("Processing timeout after {0}ms")]
    Timeout(u64),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Error response body
#[derive(Serialize)]
struct ErrorResponse {
    success: bool,
    error: String,
    code: String,
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            ServerError::MissingAssets(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "MISSING_ASSETS",
                msg.clone(),
            ),
            ServerError::UnknownVariant(name) => (
                StatusCode::NOT_FOUND,
                "UNKNOWN_VARIANT",
                format!("Variant '{}' not found", name),
            ),
            ServerError::InvalidRequest(msg) => {
                (StatusCode::BAD_REQUEST, "INVALID_REQUEST", msg.clone())
            }
            ServerError::InvalidPdf(msg) => {
                (StatusCode::UNPROCESSABLE_ENTITY, "INVALID_PDF", msg.clone())
            }
            ServerError::PayloadTooLarge(msg) => {
                (StatusCode::PAYLOAD_TOO_LARGE, "PAYLOAD_TOO_LARGE", msg.clone())
            }
            ServerError::Timeout(ms) => (
                StatusCode::REQUEST_TIMEOUT,
                "TIMEOUT",
                format!("Processing timeout after {}ms", ms),
            ),
            ServerError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    msg.clone(),
                )
            }
        };

        let body = ErrorResponse {
            success: false,
            error: message,
            code: code.to_string(),
        };

        (status, Json(body)).into_response()
    }
}

impl From<StampError> for ServerError {
    fn from(err: StampError) -> Self {
        if matches!(err, StampError::MissingAssets(_)) {
            return ServerError::MissingAssets(format!(
                "Error: {}. Please add them to the asset directory.",
                err
            ));
        }
        match err {
            StampError::ParseError(msg) => ServerError::InvalidPdf(msg),
            other => ServerError::Internal(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_missing_assets_message_names_files() {
        let err = ServerError::from(StampError::MissingAssets(vec![PathBuf::from("times.ttf")]));
        assert_eq!(
            err.to_string(),
            "Error: The following required files were not found: times.ttf. \
             Please add them to the asset directory."
        );
    }

    #[test]
    fn test_parse_errors_map_to_invalid_pdf() {
        let err = ServerError::from(StampError::ParseError("bad xref".into()));
        assert!(matches!(err, ServerError::InvalidPdf(_)));
        assert_eq!(
            err.into_response().status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
    }

    #[test]
    fn test_font_errors_are_internal() {
        let err = ServerError::from(StampError::FontError("no head table".into()));
        assert_eq!(
            err.into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
