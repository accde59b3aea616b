//! # paperjet-ml
//!
//! Document-processing service behind PaperJet: turns a PDF behind a
//! presigned URL into page images or into Markdown.
//!
//! ## Endpoints
//!
//! ```text
//! GET  /           liveness check
//! POST /split-pdf  presigned_url[, dpi] → one base64 PNG per page
//! POST /ocr        presigned_url        → Markdown
//! ```
//!
//! ## Why OCR falls back
//!
//! Invoices arrive as scans, as born-digital PDFs, and as scans somebody
//! already ran through OCR. `ocrmypdf` refuses the last two kinds, and it
//! fails outright on the odd malformed file that pdfium still reads fine.
//! Neither case is worth failing the request over: the OCR stage always
//! yields a document (the OCR'd one or the original) and only text
//! extraction can fail `/ocr`. See [`pipeline::ocr::OcrOutcome`].
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use paperjet_ml::{router, AppState, ServiceConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let state = AppState::from_config(ServiceConfig::default())?;
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:8000").await?;
//!     axum::serve(listener, router(state)).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `paperjet-ml` server binary (clap + anyhow + tracing-subscriber) |
//!
//! ## External requirements
//!
//! - a pdfium shared library (see [`pdfium`] for the search order)
//! - `ocrmypdf` on `PATH` (or configured via [`config::OcrSettings::binary`])
//!   with the Tesseract language packs for the configured languages

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod pdfium;
pub mod pipeline;
pub mod service;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{OcrSettings, PageSeparator, Resolution, ServiceConfig, ServiceConfigBuilder};
pub use error::{OcrError, ServiceError};
pub use pipeline::extract::{extract_text, ExtractedText, MarkdownExtractor};
pub use pipeline::ocr::{OcrEngine, OcrOutcome, OcrOutcomeKind};
pub use pipeline::render::{PageImage, Rasterizer};
pub use service::{router, AppState, AppStateBuilder};
