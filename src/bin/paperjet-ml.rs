//! Server binary for paperjet-ml.
//!
//! A thin shim over the library crate that maps CLI flags and environment
//! variables to `ServiceConfig`, binds pdfium, and serves the router.

use anyhow::{Context, Result};
use clap::Parser;
use paperjet_ml::{router, AppState, PageSeparator, Resolution, ServiceConfig};
use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;
use tokio::signal;
use tracing::info;
use tracing_subscriber::EnvFilter;

const AFTER_HELP: &str = r#"EXAMPLES:
  # Serve on the default port (8000)
  paperjet-ml

  # Render pages at 150 DPI, OCR in English and German
  paperjet-ml --dpi 150 --ocr-languages eng+deu

  # JSON logs for the log collector
  paperjet-ml --log-json

ENDPOINTS:
  GET  /            liveness check
  POST /split-pdf   presigned_url[, dpi]  → base64 PNG per page
  POST /ocr         presigned_url         → Markdown

ENVIRONMENT VARIABLES:
  HOST, PORT              Listen address
  PAPERJET_*              Any flag below (see each flag's [env: ...])
  PDFIUM_LIB_PATH         Path to libpdfium (file or directory)
  RUST_LOG                Log filter; overrides --verbose

REQUIREMENTS:
  pdfium     searched in --pdfium-lib, PDFIUM_LIB_PATH, ~/.cache/paperjet-ml/pdfium/,
             the working directory, then the system library path
  ocrmypdf   with Tesseract language packs for every --ocr-languages entry
"#;

/// PDF page rendering and OCR service for PaperJet.
#[derive(Parser, Debug)]
#[command(
    name = "paperjet-ml",
    version,
    about = "PDF page rendering and OCR-to-Markdown service",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Address to listen on.
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    host: String,

    /// Port to listen on.
    #[arg(long, env = "PORT", default_value_t = 8000)]
    port: u16,

    /// Default rendering DPI (72–600). Omit to render at native page size.
    #[arg(long, env = "PAPERJET_DPI",
          value_parser = clap::value_parser!(u32).range(72..=600))]
    dpi: Option<u32>,

    /// Cap on the rendered width and height of a page, in pixels.
    #[arg(long, env = "PAPERJET_MAX_PIXELS", default_value_t = 10_000)]
    max_pixels: u32,

    /// Document download timeout in seconds.
    #[arg(long, env = "PAPERJET_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Largest accepted document in MiB (0 = unlimited).
    #[arg(long, env = "PAPERJET_MAX_DOCUMENT_MB", default_value_t = 100)]
    max_document_mb: u64,

    /// OCR executable.
    #[arg(long, env = "PAPERJET_OCR_BINARY", default_value = "ocrmypdf")]
    ocr_binary: PathBuf,

    /// OCR languages, `+` or `,` separated Tesseract codes.
    #[arg(long, env = "PAPERJET_OCR_LANGUAGES", default_value = "eng+nld")]
    ocr_languages: String,

    /// Do not deskew pages before OCR.
    #[arg(long, env = "PAPERJET_OCR_NO_DESKEW")]
    ocr_no_deskew: bool,

    /// Do not clean pages before OCR.
    #[arg(long, env = "PAPERJET_OCR_NO_CLEAN")]
    ocr_no_clean: bool,

    /// Worker processes per OCR run (engine default when unset).
    #[arg(long, env = "PAPERJET_OCR_JOBS")]
    ocr_jobs: Option<usize>,

    /// OCR timeout in seconds (0 = no timeout).
    #[arg(long, env = "PAPERJET_OCR_TIMEOUT", default_value_t = 300)]
    ocr_timeout: u64,

    /// Directory for per-request OCR scratch files (system temp dir if unset).
    #[arg(long, env = "PAPERJET_TEMP_DIR")]
    temp_dir: Option<PathBuf>,

    /// Path to libpdfium, or the directory containing it.
    #[arg(long, env = "PAPERJET_PDFIUM_LIB")]
    pdfium_lib: Option<PathBuf>,

    /// Page separator in OCR Markdown: none, hr, comment, or custom string.
    #[arg(long, env = "PAPERJET_SEPARATOR", default_value = "none")]
    separator: String,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "PAPERJET_VERBOSE")]
    verbose: bool,

    /// Emit logs as JSON lines.
    #[arg(long, env = "PAPERJET_LOG_JSON")]
    log_json: bool,
}

impl Cli {
    fn service_config(&self) -> Result<ServiceConfig> {
        let resolution = match self.dpi {
            Some(dpi) => Resolution::Dpi(dpi),
            None => Resolution::Native,
        };
        let languages = self
            .ocr_languages
            .split(['+', ','])
            .map(str::trim)
            .filter(|l| !l.is_empty());

        let mut builder = ServiceConfig::builder()
            .resolution(resolution)
            .max_rendered_pixels(self.max_pixels)
            .download_timeout_secs(self.download_timeout)
            .max_document_bytes((self.max_document_mb > 0).then(|| self.max_document_mb * 1024 * 1024))
            .ocr_binary(&self.ocr_binary)
            .ocr_languages(languages)
            .ocr_deskew(!self.ocr_no_deskew)
            .ocr_clean(!self.ocr_no_clean)
            .ocr_jobs(self.ocr_jobs)
            .ocr_timeout_secs((self.ocr_timeout > 0).then_some(self.ocr_timeout))
            .page_separator(PageSeparator::parse(&self.separator));
        if let Some(dir) = &self.temp_dir {
            builder = builder.temp_dir(dir);
        }
        if let Some(lib) = &self.pdfium_lib {
            builder = builder.pdfium_lib_path(lib);
        }

        builder.build().context("Invalid configuration")
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let default_filter = if cli.verbose {
        "paperjet_ml=debug,tower_http=debug,info"
    } else {
        "info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr);
    if cli.log_json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    // ── Wiring ───────────────────────────────────────────────────────────
    // Binding pdfium here means a missing library stops start-up instead of
    // failing the first request.
    let config = cli.service_config()?;
    info!(
        "Starting paperjet-ml v{} ({:?}, OCR languages {})",
        env!("CARGO_PKG_VERSION"),
        config.resolution,
        config.ocr.language_arg()
    );
    let state = AppState::from_config(config).context("Failed to initialise service")?;

    // ── Serve ────────────────────────────────────────────────────────────
    let addr: SocketAddr = format!("{}:{}", cli.host, cli.port)
        .parse()
        .with_context(|| format!("Invalid listen address {}:{}", cli.host, cli.port))?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Cannot listen on {addr}"))?;
    info!("paperjet-ml listening on {}", addr);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::warn!("Cannot listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::warn!("Cannot listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
