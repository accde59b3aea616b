//! PDF rasterisation: render every page to a PNG via pdfium.
//!
//! ## Why spawn_blocking?
//!
//! pdfium is a C++ library behind a global lock (`thread_safe` feature) and
//! rendering is CPU-bound. [`rasterize_document`] moves the work onto tokio's
//! blocking pool so the async workers keep serving other requests.
//!
//! ## Failure policy
//!
//! One bad page fails the whole document. A caller storing page images by
//! number would otherwise get silent holes in the sequence.

use crate::config::Resolution;
use crate::error::ServiceError;
use crate::pipeline::encode;
use pdfium_render::prelude::*;
use std::sync::Arc;
use tracing::{debug, info};

/// One rasterised page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageImage {
    /// 1-based page number.
    pub page_number: usize,
    /// Pixel width.
    pub width: u32,
    /// Pixel height.
    pub height: u32,
    /// PNG-encoded image bytes.
    pub png: Vec<u8>,
}

/// Turns document bytes into one image per page.
///
/// Implementations are blocking; call them through [`rasterize_document`].
pub trait Rasterizer: Send + Sync {
    fn rasterize(&self, doc: &[u8], resolution: Resolution)
        -> Result<Vec<PageImage>, ServiceError>;
}

/// Run `rasterizer` on the blocking pool.
pub async fn rasterize_document(
    rasterizer: Arc<dyn Rasterizer>,
    doc: Vec<u8>,
    resolution: Resolution,
) -> Result<Vec<PageImage>, ServiceError> {
    tokio::task::spawn_blocking(move || rasterizer.rasterize(&doc, resolution))
        .await
        .map_err(|e| ServiceError::Internal(format!("Render task panicked: {}", e)))?
}

/// pdfium-backed [`Rasterizer`].
pub struct PdfiumRasterizer {
    pdfium: Arc<Pdfium>,
    max_rendered_pixels: u32,
}

impl PdfiumRasterizer {
    pub fn new(pdfium: Arc<Pdfium>, max_rendered_pixels: u32) -> Self {
        Self {
            pdfium,
            max_rendered_pixels,
        }
    }
}

impl Rasterizer for PdfiumRasterizer {
    fn rasterize(
        &self,
        doc: &[u8],
        resolution: Resolution,
    ) -> Result<Vec<PageImage>, ServiceError> {
        let document = open_document(&self.pdfium, doc)?;

        let pages = document.pages();
        let total_pages = pages.len() as usize;
        info!(
            "PDF loaded: {} pages, rendering at {:?}",
            total_pages, resolution
        );

        let render_config = PdfRenderConfig::new()
            .scale_page_by_factor(resolution.scale())
            .set_maximum_width(self.max_rendered_pixels as i32)
            .set_maximum_height(self.max_rendered_pixels as i32);

        let mut results = Vec::with_capacity(total_pages);

        for idx in 0..total_pages {
            let page_number = idx + 1;
            let page = pages
                .get(idx as u16)
                .map_err(|e| ServiceError::RasterisationFailed {
                    page: page_number,
                    detail: format!("{:?}", e),
                })?;

            let bitmap = page.render_with_config(&render_config).map_err(|e| {
                ServiceError::RasterisationFailed {
                    page: page_number,
                    detail: format!("{:?}", e),
                }
            })?;

            let image = bitmap.as_image();
            let png =
                encode::encode_png(&image).map_err(|e| ServiceError::RasterisationFailed {
                    page: page_number,
                    detail: format!("PNG encoding failed: {}", e),
                })?;

            debug!(
                "Processed page {} - dimensions: {}x{}",
                page_number,
                image.width(),
                image.height()
            );

            results.push(PageImage {
                page_number,
                width: image.width(),
                height: image.height(),
                png,
            });
        }

        Ok(results)
    }
}

/// Open `doc` from memory, mapping pdfium's error into a caller-facing one.
pub(crate) fn open_document<'a>(
    pdfium: &'a Pdfium,
    doc: &'a [u8],
) -> Result<PdfDocument<'a>, ServiceError> {
    pdfium.load_pdf_from_byte_slice(doc, None).map_err(|e| {
        let err_str = format!("{:?}", e);
        if err_str.contains("Password") || err_str.contains("password") {
            ServiceError::CorruptPdf {
                detail: "document is password-protected".to_string(),
            }
        } else {
            ServiceError::CorruptPdf { detail: err_str }
        }
    })
}
