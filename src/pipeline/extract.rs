//! OCR-then-extract: the `/ocr` pipeline.
//!
//! ```text
//! doc ──▶ run_ocr_stage ──▶ OcrOutcome ──▶ MarkdownExtractor ──▶ markdown
//!            (ocrmypdf)      (3 variants)     (pdfium text)
//! ```
//!
//! OCR never fails the request: whatever the engine does, the outcome carries
//! a document to extract from. Extraction failures are fatal.

use crate::config::{PageSeparator, ServiceConfig};
use crate::error::ServiceError;
use crate::pipeline::markdown;
use crate::pipeline::ocr::{self, OcrEngine, OcrOptions, OcrOutcomeKind};
use crate::pipeline::render::open_document;
use pdfium_render::prelude::*;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Output of a [`MarkdownExtractor`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedMarkdown {
    pub markdown: String,
    pub page_count: usize,
}

/// Result of the whole OCR-then-extract pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedText {
    pub markdown: String,
    pub page_count: usize,
    /// Which OCR outcome selected the bytes that were extracted.
    pub ocr: OcrOutcomeKind,
}

/// Extracts Markdown from document bytes. Blocking.
pub trait MarkdownExtractor: Send + Sync {
    fn extract(&self, doc: &[u8]) -> Result<ExtractedMarkdown, ServiceError>;
}

/// pdfium-backed [`MarkdownExtractor`].
pub struct PdfiumMarkdownExtractor {
    pdfium: Arc<Pdfium>,
    separator: PageSeparator,
}

impl PdfiumMarkdownExtractor {
    pub fn new(pdfium: Arc<Pdfium>, separator: PageSeparator) -> Self {
        Self { pdfium, separator }
    }
}

impl MarkdownExtractor for PdfiumMarkdownExtractor {
    fn extract(&self, doc: &[u8]) -> Result<ExtractedMarkdown, ServiceError> {
        let document = open_document(&self.pdfium, doc).map_err(|e| {
            ServiceError::ExtractionFailed {
                detail: e.to_string(),
            }
        })?;

        let pages = document.pages();
        let page_count = pages.len() as usize;
        let mut pieces = Vec::with_capacity(page_count);

        for (idx, page) in pages.iter().enumerate() {
            let text = page
                .text()
                .map_err(|e| ServiceError::ExtractionFailed {
                    detail: format!("page {}: {:?}", idx + 1, e),
                })?
                .all();
            debug!("Page {}: {} chars of text", idx + 1, text.len());
            pieces.push(markdown::page_to_markdown(&text));
        }

        Ok(ExtractedMarkdown {
            markdown: assemble_pages(&pieces, &self.separator),
            page_count,
        })
    }
}

/// Join per-page Markdown with `separator` and run the cleanup passes.
///
/// A document without any text yields an empty string.
pub fn assemble_pages(pages: &[String], separator: &PageSeparator) -> String {
    if pages.iter().all(|p| p.trim().is_empty()) {
        return String::new();
    }

    let mut out = String::new();
    for (idx, page) in pages.iter().enumerate() {
        if idx > 0 {
            out.push_str(&separator.render(idx + 1));
        }
        out.push_str(page);
    }
    markdown::clean_markdown(&out)
}

/// Run OCR on `doc`, then extract Markdown from whichever bytes the OCR
/// outcome selected.
///
/// The OCR workspace is removed once extraction has finished, on success
/// and on error alike.
pub async fn extract_text(
    doc: Vec<u8>,
    engine: &dyn OcrEngine,
    extractor: Arc<dyn MarkdownExtractor>,
    config: &ServiceConfig,
) -> Result<ExtractedText, ServiceError> {
    let start = Instant::now();
    let options = OcrOptions::from(&config.ocr);

    let (outcome, workspace) =
        ocr::run_ocr_stage(engine, config.temp_dir.as_deref(), doc, &options).await;
    let kind = outcome.kind();
    let document = outcome.into_document();

    let extracted = tokio::task::spawn_blocking(move || extractor.extract(&document))
        .await
        .map_err(|e| ServiceError::Internal(format!("Extraction task panicked: {}", e)));
    drop(workspace);
    let extracted = extracted??;

    info!(
        "Extracted {} chars from {} pages in {}ms (ocr: {:?})",
        extracted.markdown.len(),
        extracted.page_count,
        start.elapsed().as_millis(),
        kind
    );

    Ok(ExtractedText {
        markdown: extracted.markdown,
        page_count: extracted.page_count,
        ocr: kind,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::OcrError;
    use async_trait::async_trait;
    use std::path::Path;

    /// Engine that writes fixed bytes, or fails with a fixed error.
    struct FakeEngine(Result<&'static [u8], OcrError>);

    #[async_trait]
    impl OcrEngine for FakeEngine {
        fn name(&self) -> &str {
            "fake"
        }

        async fn run(&self, _input: &Path, output: &Path, _: &OcrOptions) -> Result<(), OcrError> {
            let bytes = self.0.clone()?;
            tokio::fs::write(output, bytes)
                .await
                .map_err(|e| OcrError::Failed(e.to_string()))
        }
    }

    /// Extractor that echoes the document bytes as Markdown.
    struct Echo;

    impl MarkdownExtractor for Echo {
        fn extract(&self, doc: &[u8]) -> Result<ExtractedMarkdown, ServiceError> {
            Ok(ExtractedMarkdown {
                markdown: String::from_utf8_lossy(doc).into_owned(),
                page_count: 1,
            })
        }
    }

    struct Broken;

    impl MarkdownExtractor for Broken {
        fn extract(&self, _: &[u8]) -> Result<ExtractedMarkdown, ServiceError> {
            Err(ServiceError::ExtractionFailed {
                detail: "no text layer".into(),
            })
        }
    }

    fn config_in(dir: &Path) -> ServiceConfig {
        ServiceConfig::builder().temp_dir(dir).build().unwrap()
    }

    fn is_empty_dir(dir: &Path) -> bool {
        std::fs::read_dir(dir).unwrap().next().is_none()
    }

    #[tokio::test]
    async fn succeeded_extracts_ocr_output() {
        let tmp = tempfile::tempdir().unwrap();
        let engine = FakeEngine(Ok(b"ocr text"));
        let out = extract_text(b"scan".to_vec(), &engine, Arc::new(Echo), &config_in(tmp.path()))
            .await
            .unwrap();
        assert_eq!(out.markdown, "ocr text");
        assert_eq!(out.ocr, OcrOutcomeKind::Succeeded);
        assert!(is_empty_dir(tmp.path()));
    }

    #[tokio::test]
    async fn prior_ocr_extracts_original() {
        let tmp = tempfile::tempdir().unwrap();
        let engine = FakeEngine(Err(OcrError::PriorOcrFound));
        let out = extract_text(b"digital".to_vec(), &engine, Arc::new(Echo), &config_in(tmp.path()))
            .await
            .unwrap();
        assert_eq!(out.markdown, "digital");
        assert_eq!(out.ocr, OcrOutcomeKind::SkippedAlreadyOcred);
    }

    #[tokio::test]
    async fn failed_ocr_falls_back_to_original() {
        let tmp = tempfile::tempdir().unwrap();
        let engine = FakeEngine(Err(OcrError::Failed("tesseract missing".into())));
        let out = extract_text(b"original".to_vec(), &engine, Arc::new(Echo), &config_in(tmp.path()))
            .await
            .unwrap();
        assert_eq!(out.markdown, "original");
        assert_eq!(out.ocr, OcrOutcomeKind::Failed);
        assert!(is_empty_dir(tmp.path()));
    }

    #[tokio::test]
    async fn extraction_failure_is_fatal_and_cleans_up() {
        let tmp = tempfile::tempdir().unwrap();
        let engine = FakeEngine(Ok(b"ocr text"));
        let err = extract_text(b"scan".to_vec(), &engine, Arc::new(Broken), &config_in(tmp.path()))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::ExtractionFailed { .. }), "got: {err:?}");
        assert!(is_empty_dir(tmp.path()));
    }

    #[tokio::test]
    async fn missing_temp_root_still_extracts_original() {
        let tmp = tempfile::tempdir().unwrap();
        let config = config_in(&tmp.path().join("does-not-exist"));
        let engine = FakeEngine(Ok(b"ocr text"));
        let out = extract_text(b"original".to_vec(), &engine, Arc::new(Echo), &config)
            .await
            .unwrap();
        assert_eq!(out.markdown, "original");
        assert_eq!(out.ocr, OcrOutcomeKind::Failed);
    }

    #[test]
    fn assemble_joins_with_separator() {
        let pages = vec!["# One".to_string(), "Two".to_string()];
        assert_eq!(
            assemble_pages(&pages, &PageSeparator::Comment),
            "# One\n\n<!-- page 2 -->\n\nTwo\n"
        );
        assert_eq!(assemble_pages(&pages, &PageSeparator::None), "# One\n\nTwo\n");
    }

    #[test]
    fn assemble_textless_document_is_empty() {
        let pages = vec![String::new(), "  ".to_string()];
        assert_eq!(assemble_pages(&pages, &PageSeparator::HorizontalRule), "");
        assert_eq!(assemble_pages(&[], &PageSeparator::None), "");
    }

    #[test]
    fn pdfium_extractor_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<PdfiumMarkdownExtractor>();
    }
}
