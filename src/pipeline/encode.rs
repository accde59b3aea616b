//! Image encoding: `DynamicImage` → PNG bytes → base64 for the JSON body.
//!
//! PNG is lossless, so the page images keep crisp text for whatever the
//! caller runs on them next (a vision model, in PaperJet's case).

use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::DynamicImage;
use std::io::Cursor;
use tracing::debug;

/// Encode a rasterised page as PNG bytes.
pub fn encode_png(img: &DynamicImage) -> Result<Vec<u8>, image::ImageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;
    debug!(
        "Encoded {}x{} image → {} PNG bytes",
        img.width(),
        img.height(),
        buf.len()
    );
    Ok(buf)
}

/// Standard (padded) base64 of `bytes`.
pub fn to_base64(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    #[test]
    fn encode_small_image() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(10, 6, Rgba([255, 0, 0, 255])));
        let png = encode_png(&img).expect("encode should succeed");
        assert_eq!(&png[..8], b"\x89PNG\r\n\x1a\n");

        let decoded = image::load_from_memory(&png).expect("valid png");
        assert_eq!((decoded.width(), decoded.height()), (10, 6));
    }

    #[test]
    fn base64_is_standard_padded() {
        assert_eq!(to_base64(b"pdf"), "cGRm");
        assert_eq!(to_base64(b"pd"), "cGQ=");
        let round = STANDARD.decode(to_base64(b"\x89PNG")).unwrap();
        assert_eq!(round, b"\x89PNG");
    }
}
