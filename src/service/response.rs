//! JSON bodies of successful responses.
//!
//! Failures use [`crate::error::ErrorBody`].

use crate::pipeline::encode::to_base64;
use crate::pipeline::render::PageImage;
use serde::{Deserialize, Serialize};

/// `GET /` body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusMessage {
    pub message: String,
}

impl StatusMessage {
    pub fn running() -> Self {
        Self {
            message: "PaperJet ML Service is running".to_string(),
        }
    }
}

/// One page in a `/split-pdf` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PagePayload {
    pub page_number: usize,
    /// Base64 PNG.
    pub image_data: String,
    pub width: u32,
    pub height: u32,
}

/// `POST /split-pdf` body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SplitPdfResponse {
    pub success: bool,
    pub total_pages: usize,
    pub pages: Vec<PagePayload>,
}

impl From<Vec<PageImage>> for SplitPdfResponse {
    fn from(pages: Vec<PageImage>) -> Self {
        let pages: Vec<PagePayload> = pages
            .into_iter()
            .map(|p| PagePayload {
                page_number: p.page_number,
                image_data: to_base64(&p.png),
                width: p.width,
                height: p.height,
            })
            .collect();
        Self {
            success: true,
            total_pages: pages.len(),
            pages,
        }
    }
}

/// `POST /ocr` body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OcrResponse {
    pub success: bool,
    pub markdown: String,
}

impl OcrResponse {
    pub fn new(markdown: String) -> Self {
        Self {
            success: true,
            markdown,
        }
    }
}
