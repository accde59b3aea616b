//! Configuration types for the PaperJet ML service.
//!
//! All service behaviour is controlled through [`ServiceConfig`], built via
//! its [`ServiceConfigBuilder`]. The binary maps CLI flags and environment
//! variables onto the builder; tests build configs directly.
//!
//! The config is shared read-only across requests behind an `Arc`, so nothing
//! here is mutated after start-up.

use crate::error::ServiceError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Lowest accepted rendering DPI.
pub const MIN_DPI: u32 = 72;
/// Highest accepted rendering DPI.
pub const MAX_DPI: u32 = 600;

/// Configuration for the service.
///
/// # Example
/// ```rust
/// use paperjet_ml::{Resolution, ServiceConfig};
///
/// let config = ServiceConfig::builder()
///     .resolution(Resolution::Dpi(150))
///     .ocr_languages(["eng", "deu"])
///     .build()
///     .unwrap();
/// assert_eq!(config.ocr.language_arg(), "eng+deu");
/// ```
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Default resolution for `/split-pdf`. Default: [`Resolution::Native`].
    ///
    /// Native rendering maps one PDF point to one pixel, so an A4 page comes
    /// out at 595 × 842 px. Callers may override per request with `dpi`.
    pub resolution: Resolution,

    /// Maximum rendered image dimension (width or height) in pixels. Default: 10000.
    ///
    /// A safety cap independent of DPI: a 600-DPI render of an A0 poster would
    /// otherwise allocate hundreds of megabytes for a single bitmap.
    pub max_rendered_pixels: u32,

    /// Download timeout for the presigned URL in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Largest accepted document in bytes. `None` disables the cap. Default: 100 MiB.
    pub max_document_bytes: Option<u64>,

    /// OCR engine settings.
    pub ocr: OcrSettings,

    /// Root directory for per-request OCR workspaces. `None` uses the system
    /// temp dir.
    pub temp_dir: Option<PathBuf>,

    /// Explicit pdfium shared library path. `None` falls back to the usual
    /// search order (see [`crate::pdfium::bind_pdfium`]).
    pub pdfium_lib_path: Option<PathBuf>,

    /// Separator between pages in extracted Markdown. Default: [`PageSeparator::None`].
    pub page_separator: PageSeparator,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            resolution: Resolution::Native,
            max_rendered_pixels: 10_000,
            download_timeout_secs: 120,
            max_document_bytes: Some(100 * 1024 * 1024),
            ocr: OcrSettings::default(),
            temp_dir: None,
            pdfium_lib_path: None,
            page_separator: PageSeparator::default(),
        }
    }
}

impl ServiceConfig {
    /// Create a new builder for `ServiceConfig`.
    pub fn builder() -> ServiceConfigBuilder {
        ServiceConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ServiceConfig`].
#[derive(Debug)]
pub struct ServiceConfigBuilder {
    config: ServiceConfig,
}

impl ServiceConfigBuilder {
    pub fn resolution(mut self, resolution: Resolution) -> Self {
        self.config.resolution = resolution;
        self
    }

    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.max_rendered_pixels = px.max(100);
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn max_document_bytes(mut self, max: Option<u64>) -> Self {
        self.config.max_document_bytes = max;
        self
    }

    pub fn ocr_binary(mut self, binary: impl Into<PathBuf>) -> Self {
        self.config.ocr.binary = binary.into();
        self
    }

    pub fn ocr_languages<I, S>(mut self, languages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.ocr.languages = languages.into_iter().map(Into::into).collect();
        self
    }

    pub fn ocr_deskew(mut self, v: bool) -> Self {
        self.config.ocr.deskew = v;
        self
    }

    pub fn ocr_clean(mut self, v: bool) -> Self {
        self.config.ocr.clean = v;
        self
    }

    pub fn ocr_jobs(mut self, jobs: Option<usize>) -> Self {
        self.config.ocr.jobs = jobs.map(|n| n.max(1));
        self
    }

    pub fn ocr_timeout_secs(mut self, secs: Option<u64>) -> Self {
        self.config.ocr.timeout_secs = secs;
        self
    }

    pub fn temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.temp_dir = Some(dir.into());
        self
    }

    pub fn pdfium_lib_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pdfium_lib_path = Some(path.into());
        self
    }

    pub fn page_separator(mut self, sep: PageSeparator) -> Self {
        self.config.page_separator = sep;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ServiceConfig, ServiceError> {
        let c = &self.config;
        if let Resolution::Dpi(dpi) = c.resolution {
            Resolution::checked_dpi(dpi)?;
        }
        if c.ocr.languages.is_empty() {
            return Err(ServiceError::InvalidConfig(
                "At least one OCR language is required".into(),
            ));
        }
        if let Some(bad) = c
            .ocr
            .languages
            .iter()
            .find(|l| l.is_empty() || !l.chars().all(|ch| ch.is_ascii_alphanumeric() || ch == '_'))
        {
            return Err(ServiceError::InvalidConfig(format!(
                "Invalid OCR language code '{bad}'"
            )));
        }
        if c.download_timeout_secs == 0 {
            return Err(ServiceError::InvalidConfig(
                "Download timeout must be ≥ 1 second".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Resolution ───────────────────────────────────────────────────────────

/// Rendering resolution for page rasterisation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Resolution {
    /// One pixel per PDF point (72 DPI, no scaling). (default)
    #[default]
    Native,
    /// Scale the page by `dpi / 72`.
    Dpi(u32),
}

impl Resolution {
    /// Validate a caller-supplied DPI value.
    pub fn checked_dpi(dpi: u32) -> Result<Resolution, ServiceError> {
        if !(MIN_DPI..=MAX_DPI).contains(&dpi) {
            return Err(ServiceError::InvalidRequest(format!(
                "dpi must be {MIN_DPI}–{MAX_DPI}, got {dpi}"
            )));
        }
        Ok(Resolution::Dpi(dpi))
    }

    /// Scale factor applied to the page's size in points.
    pub fn scale(&self) -> f32 {
        match self {
            Resolution::Native => 1.0,
            Resolution::Dpi(dpi) => *dpi as f32 / 72.0,
        }
    }
}

// ── OCR settings ─────────────────────────────────────────────────────────

/// Settings passed to the OCR engine on every run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OcrSettings {
    /// Engine executable. Default: `ocrmypdf` (resolved via `PATH`).
    pub binary: PathBuf,
    /// Tesseract language codes. Default: `eng`, `nld`.
    pub languages: Vec<String>,
    /// Straighten skewed scans before recognition. Default: true.
    pub deskew: bool,
    /// Clean page images before recognition (does not alter the output images). Default: true.
    pub clean: bool,
    /// Worker count handed to the engine. `None` lets the engine decide.
    pub jobs: Option<usize>,
    /// Wall-clock limit for one engine run. Default: 300 s. `None` disables it.
    pub timeout_secs: Option<u64>,
}

impl Default for OcrSettings {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("ocrmypdf"),
            languages: vec!["eng".to_string(), "nld".to_string()],
            deskew: true,
            clean: true,
            jobs: None,
            timeout_secs: Some(300),
        }
    }
}

impl OcrSettings {
    /// Languages in the `-l` argument form, e.g. `eng+nld`.
    pub fn language_arg(&self) -> String {
        self.languages.join("+")
    }
}

// ── Page separator ───────────────────────────────────────────────────────

/// How to separate pages in the extracted Markdown.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PageSeparator {
    /// No separator; pages joined with "\n\n". (default)
    #[default]
    None,
    /// Horizontal rule: "\n\n---\n\n"
    HorizontalRule,
    /// HTML comment with page number: "<!-- page N -->"
    Comment,
    /// Custom string inserted between pages.
    Custom(String),
}

impl PageSeparator {
    /// Render the separator string placed before the given page (1-indexed).
    pub fn render(&self, page_num: usize) -> String {
        match self {
            PageSeparator::None => "\n\n".to_string(),
            PageSeparator::HorizontalRule => "\n\n---\n\n".to_string(),
            PageSeparator::Comment => format!("\n\n<!-- page {} -->\n\n", page_num),
            PageSeparator::Custom(s) => format!("\n\n{}\n\n", s),
        }
    }

    /// Parse the CLI/env form: `none`, `hr`, `comment`, or a custom string.
    pub fn parse(s: &str) -> PageSeparator {
        match s.to_lowercase().as_str() {
            "none" | "" => PageSeparator::None,
            "hr" | "---" => PageSeparator::HorizontalRule,
            "comment" => PageSeparator::Comment,
            _ => PageSeparator::Custom(s.to_string()),
        }
    }
}
