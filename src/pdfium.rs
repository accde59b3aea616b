//! Locating and binding the pdfium shared library.
//!
//! The service binds pdfium once at start-up and shares the handle between
//! the rasteriser and the text extractor. A missing library is a start-up
//! failure, not a per-request one.
//!
//! Search order (first hit wins):
//!
//! 1. explicit path from [`crate::ServiceConfig::pdfium_lib_path`]
//! 2. `PDFIUM_LIB_PATH`
//! 3. `{cache_dir}/paperjet-ml/pdfium/` (`~/.cache/...` on Linux)
//! 4. the current working directory
//! 5. the system library search path
//!
//! Entries 1 and 2 may name either the library file or the directory holding it.

use crate::error::ServiceError;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Per-user directory checked for a provisioned pdfium library.
pub fn library_cache_dir() -> PathBuf {
    let base = dirs::cache_dir()
        .or_else(|| dirs::home_dir().map(|h| h.join(".cache")))
        .unwrap_or_else(std::env::temp_dir);

    base.join("paperjet-ml").join("pdfium")
}

/// Resolve a configured location to the platform library file.
fn library_file(location: &Path) -> PathBuf {
    if location.is_dir() {
        Pdfium::pdfium_platform_library_name_at_path(location)
    } else {
        location.to_path_buf()
    }
}

/// Candidate library files, in search order, excluding the system path.
pub fn candidate_library_paths(explicit: Option<&Path>) -> Vec<PathBuf> {
    let mut candidates = Vec::new();
    if let Some(p) = explicit {
        candidates.push(library_file(p));
    }
    if let Ok(p) = std::env::var("PDFIUM_LIB_PATH") {
        if !p.is_empty() {
            candidates.push(library_file(Path::new(&p)));
        }
    }
    candidates.push(Pdfium::pdfium_platform_library_name_at_path(
        &library_cache_dir(),
    ));
    candidates.push(Pdfium::pdfium_platform_library_name_at_path("./"));
    candidates
}

/// Bind to pdfium using the search order described in the module docs.
pub fn bind_pdfium(explicit: Option<&Path>) -> Result<Pdfium, ServiceError> {
    let mut tried = Vec::new();

    for candidate in candidate_library_paths(explicit) {
        if !candidate.exists() {
            debug!("pdfium not at {}", candidate.display());
            tried.push(candidate.display().to_string());
            continue;
        }
        let bindings = Pdfium::bind_to_library(&candidate).map_err(|e| {
            ServiceError::PdfiumBindingFailed(format!("{}: {:?}", candidate.display(), e))
        })?;
        info!("Bound pdfium from {}", candidate.display());
        return Ok(Pdfium::new(bindings));
    }

    let bindings = Pdfium::bind_to_system_library().map_err(|e| {
        ServiceError::PdfiumBindingFailed(format!(
            "not found in [{}] nor on the system library path: {:?}",
            tried.join(", "),
            e
        ))
    })?;
    info!("Bound pdfium from the system library path");
    Ok(Pdfium::new(bindings))
}

/// Bind pdfium once for sharing across request handlers.
pub fn shared_pdfium(explicit: Option<&Path>) -> Result<Arc<Pdfium>, ServiceError> {
    bind_pdfium(explicit).map(Arc::new)
}
