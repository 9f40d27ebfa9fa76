use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};

use pdftext_core::ExtractError;

/// Query string shared by all extraction endpoints.
#[derive(Debug, Deserialize)]
pub struct UrlQuery {
    pub url: Option<String>,
    /// Result key for the extracted text (`/pdf/json` only).
    pub key: Option<String>,
}

impl UrlQuery {
    /// The `url` parameter, or a 400 if it is missing or blank.
    pub fn require_url(&self) -> Result<&str, ApiError> {
        match self.url.as_deref().map(str::trim) {
            Some(url) if !url.is_empty() => Ok(url),
            _ => Err(ApiError::BadRequest(
                "query parameter `url` is required".to_string(),
            )),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
}

/// Failure of a request, rendered as a JSON error body.
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Extract(ExtractError),
}

impl From<ExtractError> for ApiError {
    fn from(e: ExtractError) -> Self {
        Self::Extract(e)
    }
}

/// HTTP status for a failed pipeline run.
pub fn status_for(error: &ExtractError) -> StatusCode {
    match error {
        ExtractError::Transfer(_) | ExtractError::Process(_) => StatusCode::BAD_GATEWAY,
        ExtractError::Parse(_) | ExtractError::Extraction(_) => StatusCode::UNPROCESSABLE_ENTITY,
        ExtractError::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
        ExtractError::UseAfterRelease
        | ExtractError::Metadata(_)
        | ExtractError::Io(_)
        | ExtractError::Task(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            Self::BadRequest(message) => (
                StatusCode::BAD_REQUEST,
                ErrorBody {
                    error: "bad_request".to_string(),
                    message,
                },
            ),
            Self::Extract(e) => {
                let status = status_for(&e);
                if status.is_server_error() {
                    tracing::error!(kind = e.kind(), error = %e, "request failed");
                } else {
                    tracing::warn!(kind = e.kind(), error = %e, "request failed");
                }
                (
                    status,
                    ErrorBody {
                        error: e.kind().to_string(),
                        message: e.to_string(),
                    },
                )
            }
        };
        (status, Json(body)).into_response()
    }
}
