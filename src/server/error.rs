//! HTTP mapping for library errors.

use crate::error::Md2PdfError;
use axum::extract::multipart::MultipartError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

/// Error body: `{"error": …, "details": …}`.
#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

/// An error ready to be sent to the client.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    error: String,
    details: Option<String>,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// A multipart body that could not be read.
    pub fn multipart(e: MultipartError) -> Self {
        let status = e.status();
        let error = if status == StatusCode::PAYLOAD_TOO_LARGE {
            "Upload too large"
        } else {
            "Invalid request"
        };
        Self {
            status,
            error: error.to_string(),
            details: Some(e.body_text()),
        }
    }
}

impl From<Md2PdfError> for ApiError {
    fn from(e: Md2PdfError) -> Self {
        let (status, error, details) = match &e {
            Md2PdfError::Validation(msg) => {
                (StatusCode::BAD_REQUEST, "Invalid request", Some(msg.clone()))
            }
            Md2PdfError::NotFound { .. } => {
                (StatusCode::NOT_FOUND, "File not found or expired", None)
            }
            Md2PdfError::Timeout { .. } => (
                StatusCode::GATEWAY_TIMEOUT,
                "PDF conversion timed out",
                Some(e.to_string()),
            ),
            Md2PdfError::Io { .. }
            | Md2PdfError::Conversion { .. }
            | Md2PdfError::ConverterUnavailable { .. }
            | Md2PdfError::InvalidConfig(_)
            | Md2PdfError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "PDF conversion failed",
                Some(e.to_string()),
            ),
        };

        if e.is_client_error() {
            tracing::debug!("Rejected request: {}", e);
        } else {
            tracing::error!("{}", e);
        }

        Self {
            status,
            error: error.to_string(),
            details,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: self.error,
            details: self.details,
        };
        (self.status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_follow_error_kind() {
        let cases = [
            (Md2PdfError::Validation("No files provided".into()), 400),
            (Md2PdfError::NotFound { id: "x".into() }, 404),
            (Md2PdfError::Timeout { secs: 300 }, 504),
            (
                Md2PdfError::Conversion {
                    status: "exit code 43".into(),
                    diagnostics: "boom".into(),
                },
                500,
            ),
            (
                Md2PdfError::ConverterUnavailable {
                    program: "docker".into(),
                    reason: "No such file or directory".into(),
                },
                500,
            ),
            (Md2PdfError::Internal("x".into()), 500),
        ];
        for (err, expected) in cases {
            assert_eq!(ApiError::from(err).status().as_u16(), expected);
        }
    }

    #[test]
    fn not_found_has_no_details() {
        let api = ApiError::from(Md2PdfError::NotFound { id: "abc".into() });
        assert_eq!(api.error, "File not found or expired");
        assert!(api.details.is_none());
    }

    #[test]
    fn conversion_details_carry_diagnostics() {
        let api = ApiError::from(Md2PdfError::Conversion {
            status: "exit code 43".into(),
            diagnostics: "! LaTeX Error: File `x.sty' not found.".into(),
        });
        assert_eq!(api.error, "PDF conversion failed");
        assert!(api.details.unwrap().contains("x.sty"));
    }
}
