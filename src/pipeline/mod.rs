//! Pipeline stages behind the two document endpoints.
//!
//! Each submodule implements exactly one transformation step, so each is
//! independently testable and the pdfium/ocrmypdf backends sit behind traits
//! the service can replace.
//!
//! ## Data Flow
//!
//! ```text
//!                     ┌──▶ render ──▶ encode                 (/split-pdf)
//! locator ──▶ fetch ──┤    (pdfium)   (PNG, base64)
//!                     └──▶ ocr ──▶ extract ──▶ markdown       (/ocr)
//!                         (ocrmypdf) (pdfium text) (structuring)
//! ```
//!
//! 1. [`fetch`]: download the document behind a presigned URL
//! 2. [`render`]: rasterise every page; runs in `spawn_blocking` because
//!    pdfium is not async-safe
//! 3. [`encode`]: PNG-encode each page and base64-wrap it for the JSON body
//! 4. [`ocr`]: add a text layer with an external engine, falling back to
//!    the original bytes when it declines or fails
//! 5. [`extract`]: pull page text out with pdfium
//! 6. [`markdown`]: deterministic structuring and cleanup of that text

pub mod encode;
pub mod extract;
pub mod fetch;
pub mod markdown;
pub mod ocr;
pub mod render;
