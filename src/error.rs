//! Error types for the paperjet-ml service.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`ServiceError`] is **fatal**: the request cannot be answered with a
//!   result (bad locator, download failed, page would not render, text
//!   extraction failed). Every variant maps to an HTTP status and is rendered
//!   as `{"error": "<message>"}` by its [`IntoResponse`] impl.
//!
//! * [`OcrError`] is **absorbed**: the OCR engine either declined to run
//!   because the document already carries a text layer, or failed. Neither
//!   case reaches the caller; the OCR pipeline turns both into an
//!   [`crate::pipeline::ocr::OcrOutcome`] and falls back to the original
//!   bytes.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;
use tracing::error;

/// All fatal errors surfaced by the service.
#[derive(Debug, Error)]
pub enum ServiceError {
    // ── Request errors ────────────────────────────────────────────────────
    /// A required form field is missing or a field value is malformed.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The locator is not an absolute HTTP/HTTPS URL.
    #[error("Invalid presigned_url '{locator}': not a valid HTTP/HTTPS URL")]
    InvalidLocator { locator: String },

    // ── Fetch errors ──────────────────────────────────────────────────────
    /// The remote document could not be retrieved.
    #[error("Failed to download document: {reason}")]
    DownloadFailed { reason: String },

    /// The download exceeded the configured timeout.
    #[error("Document download timed out after {secs}s")]
    DownloadTimeout { secs: u64 },

    /// The remote document is larger than the configured cap.
    #[error("Document is {size} bytes, larger than the {max} byte limit")]
    DocumentTooLarge { size: u64, max: u64 },

    // ── PDF errors ────────────────────────────────────────────────────────
    /// pdfium could not open the document.
    #[error("Document could not be opened as a PDF: {detail}")]
    CorruptPdf { detail: String },

    /// pdfium returned an error for a specific page.
    #[error("Rasterisation failed for page {page}: {detail}")]
    RasterisationFailed { page: usize, detail: String },

    /// Text extraction failed on the document selected by the OCR stage.
    #[error("Text extraction failed: {detail}")]
    ExtractionFailed { detail: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Pdfium binding errors ─────────────────────────────────────────────
    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\
Set PDFIUM_LIB_PATH=/path/to/libpdfium or install libpdfium system-wide."
    )]
    PdfiumBindingFailed(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ServiceError {
    /// HTTP status used when this error is returned to a caller.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::InvalidRequest(_) | ServiceError::InvalidLocator { .. } => {
                StatusCode::BAD_REQUEST
            }
            ServiceError::DownloadFailed { .. } => StatusCode::BAD_GATEWAY,
            ServiceError::DownloadTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            ServiceError::DocumentTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            ServiceError::CorruptPdf { .. }
            | ServiceError::RasterisationFailed { .. }
            | ServiceError::ExtractionFailed { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            ServiceError::InvalidConfig(_)
            | ServiceError::PdfiumBindingFailed(_)
            | ServiceError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Wire shape of every failed request.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = self.to_string();
        error!(status = status.as_u16(), "Request failed: {}", message);
        (status, Json(ErrorBody { error: message })).into_response()
    }
}

/// Outcome of an OCR engine run that did not produce an OCR'd document.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum OcrError {
    /// The document already contains a text layer; OCR was skipped.
    #[error("page already has text, OCR skipped")]
    PriorOcrFound,

    /// Any other engine failure (bad input, encrypted file, missing engine,
    /// timeout, I/O on the workspace).
    #[error("OCR failed: {0}")]
    Failed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rasterisation_display_names_page() {
        let e = ServiceError::RasterisationFailed {
            page: 3,
            detail: "bitmap alloc".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("page 3"), "got: {msg}");
        assert!(msg.contains("bitmap alloc"));
    }

    #[test]
    fn download_failure_is_bad_gateway() {
        let e = ServiceError::DownloadFailed {
            reason: "HTTP 404 Not Found".into(),
        };
        assert_eq!(e.status_code(), StatusCode::BAD_GATEWAY);
        assert!(e.to_string().contains("404"));
    }

    #[test]
    fn request_errors_are_client_errors() {
        assert!(ServiceError::InvalidRequest("missing".into())
            .status_code()
            .is_client_error());
        assert!(ServiceError::InvalidLocator {
            locator: "ftp://x".into()
        }
        .status_code()
        .is_client_error());
    }

    #[test]
    fn too_large_display() {
        let e = ServiceError::DocumentTooLarge { size: 20, max: 10 };
        assert_eq!(e.status_code(), StatusCode::PAYLOAD_TOO_LARGE);
        assert!(e.to_string().contains("20 bytes"));
    }

    #[tokio::test]
    async fn into_response_renders_error_body() {
        let response = ServiceError::ExtractionFailed {
            detail: "no pages".into(),
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        let json: serde_json::Value = serde_json::from_slice(&body).expect("json");
        assert_eq!(json["error"], "Text extraction failed: no pages");
        assert!(json.get("success").is_none());
    }

    #[test]
    fn ocr_error_display() {
        assert!(OcrError::PriorOcrFound.to_string().contains("already has text"));
        assert!(OcrError::Failed("exit status 2".into())
            .to_string()
            .contains("exit status 2"));
    }
}
