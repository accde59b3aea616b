//! HTTP façade: routes, shared state and handlers.
//!
//! | Route | Handler |
//! |-------|---------|
//! | `GET /` | liveness message |
//! | `POST /split-pdf` | fetch → rasterise → base64 PNG per page |
//! | `POST /ocr` | fetch → OCR (with fallback) → Markdown |
//!
//! Handlers return `Result<Json<_>, ServiceError>`; the error's
//! `IntoResponse` impl turns every failure into `{"error": ...}`.

pub mod form;
pub mod response;

use crate::config::{Resolution, ServiceConfig};
use crate::error::ServiceError;
use crate::pdfium::shared_pdfium;
use crate::pipeline::extract::{extract_text, MarkdownExtractor, PdfiumMarkdownExtractor};
use crate::pipeline::fetch::{redact_locator, Fetcher};
use crate::pipeline::ocr::{OcrEngine, OcrMyPdf};
use crate::pipeline::render::{rasterize_document, PdfiumRasterizer, Rasterizer};
use axum::extract::{DefaultBodyLimit, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use pdfium_render::prelude::Pdfium;
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

pub use form::LocatorForm;
pub use response::{OcrResponse, PagePayload, SplitPdfResponse, StatusMessage};

/// Request bodies only carry form fields, never the document itself.
const MAX_FORM_BYTES: usize = 64 * 1024;

/// Shared, cheaply clonable handler state.
#[derive(Clone)]
pub struct AppState {
    config: Arc<ServiceConfig>,
    fetcher: Fetcher,
    rasterizer: Arc<dyn Rasterizer>,
    ocr: Arc<dyn OcrEngine>,
    extractor: Arc<dyn MarkdownExtractor>,
}

impl AppState {
    /// Wire the production collaborators: pdfium for rendering and text,
    /// `ocrmypdf` for OCR.
    pub fn from_config(config: ServiceConfig) -> Result<Self, ServiceError> {
        Self::builder(config).build()
    }

    /// Start a builder; any collaborator left unset gets its production
    /// implementation.
    pub fn builder(config: ServiceConfig) -> AppStateBuilder {
        AppStateBuilder {
            config,
            rasterizer: None,
            ocr: None,
            extractor: None,
        }
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }
}

/// Builder for [`AppState`].
pub struct AppStateBuilder {
    config: ServiceConfig,
    rasterizer: Option<Arc<dyn Rasterizer>>,
    ocr: Option<Arc<dyn OcrEngine>>,
    extractor: Option<Arc<dyn MarkdownExtractor>>,
}

impl AppStateBuilder {
    pub fn rasterizer(mut self, rasterizer: Arc<dyn Rasterizer>) -> Self {
        self.rasterizer = Some(rasterizer);
        self
    }

    pub fn ocr_engine(mut self, engine: Arc<dyn OcrEngine>) -> Self {
        self.ocr = Some(engine);
        self
    }

    pub fn extractor(mut self, extractor: Arc<dyn MarkdownExtractor>) -> Self {
        self.extractor = Some(extractor);
        self
    }

    /// Build the state. pdfium is bound only if a pdfium-backed
    /// collaborator is still needed.
    pub fn build(self) -> Result<AppState, ServiceError> {
        let config = self.config;
        let fetcher = Fetcher::new(&config)?;
        let mut pdfium: Option<Arc<Pdfium>> = None;

        let rasterizer: Arc<dyn Rasterizer> = match self.rasterizer {
            Some(r) => r,
            None => Arc::new(PdfiumRasterizer::new(
                bind_once(&mut pdfium, &config)?,
                config.max_rendered_pixels,
            )),
        };
        let extractor: Arc<dyn MarkdownExtractor> = match self.extractor {
            Some(e) => e,
            None => Arc::new(PdfiumMarkdownExtractor::new(
                bind_once(&mut pdfium, &config)?,
                config.page_separator.clone(),
            )),
        };
        let ocr: Arc<dyn OcrEngine> = match self.ocr {
            Some(o) => o,
            None => Arc::new(OcrMyPdf::new(config.ocr.binary.clone())),
        };

        Ok(AppState {
            config: Arc::new(config),
            fetcher,
            rasterizer,
            ocr,
            extractor,
        })
    }
}

fn bind_once(
    slot: &mut Option<Arc<Pdfium>>,
    config: &ServiceConfig,
) -> Result<Arc<Pdfium>, ServiceError> {
    if let Some(pdfium) = slot {
        return Ok(Arc::clone(pdfium));
    }
    let pdfium = shared_pdfium(config.pdfium_lib_path.as_deref())?;
    *slot = Some(Arc::clone(&pdfium));
    Ok(pdfium)
}

/// Build the application router.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(root))
        .route("/split-pdf", post(split_pdf))
        .route("/ocr", post(ocr_pdf))
        .layer(DefaultBodyLimit::max(MAX_FORM_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn root() -> Json<StatusMessage> {
    Json(StatusMessage::running())
}

async fn split_pdf(
    State(state): State<AppState>,
    form: LocatorForm,
) -> Result<Json<SplitPdfResponse>, ServiceError> {
    let start = Instant::now();
    let resolution = match form.dpi {
        Some(dpi) => Resolution::checked_dpi(dpi)?,
        None => state.config.resolution,
    };
    info!("split-pdf: {}", redact_locator(&form.presigned_url));

    let doc = state.fetcher.fetch(&form.presigned_url).await?;
    let pages = rasterize_document(Arc::clone(&state.rasterizer), doc, resolution).await?;

    info!(
        "split-pdf: {} pages in {}ms",
        pages.len(),
        start.elapsed().as_millis()
    );
    Ok(Json(SplitPdfResponse::from(pages)))
}

async fn ocr_pdf(
    State(state): State<AppState>,
    form: LocatorForm,
) -> Result<Json<OcrResponse>, ServiceError> {
    if let Some(dpi) = form.dpi {
        return Err(ServiceError::InvalidRequest(format!(
            "dpi is only accepted by /split-pdf, got dpi={dpi} on /ocr"
        )));
    }

    let start = Instant::now();
    info!("ocr: {}", redact_locator(&form.presigned_url));

    let doc = state.fetcher.fetch(&form.presigned_url).await?;
    let extracted = extract_text(
        doc,
        state.ocr.as_ref(),
        Arc::clone(&state.extractor),
        &state.config,
    )
    .await?;

    info!(
        "ocr: {} pages ({:?}) in {}ms",
        extracted.page_count,
        extracted.ocr,
        start.elapsed().as_millis()
    );
    Ok(Json(OcrResponse::new(extracted.markdown)))
}
