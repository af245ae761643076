//! Rendering of login challenges into displayable images.

use std::io::Cursor;

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use image::{ImageBuffer, ImageFormat, Luma};
use qrcode::{Color, EcLevel, QrCode};
use thiserror::Error;

/// Pixels per QR module.
const MODULE_SIZE: u32 = 10;
/// Light border, in modules.
const QUIET_ZONE: u32 = 2;

/// QR rendering error.
#[derive(Debug, Error)]
pub enum QrError {
    #[error("QR generation failed: {0}")]
    Encode(#[from] qrcode::types::QrError),
    #[error("PNG encoding failed: {0}")]
    Png(#[from] image::ImageError),
}

/// Render `token` as a PNG QR code.
///
/// # Errors
/// Returns error if the token does not fit in a QR code or PNG encoding fails.
pub fn render_png(token: &str) -> Result<Vec<u8>, QrError> {
    let code = QrCode::with_error_correction_level(token.as_bytes(), EcLevel::L)?;

    let modules = u32::try_from(code.width()).unwrap_or(u32::MAX);
    let size = (modules + QUIET_ZONE * 2) * MODULE_SIZE;

    let img = ImageBuffer::from_fn(size, size, |x, y| {
        let (mx, my) = (x / MODULE_SIZE, y / MODULE_SIZE);
        if mx < QUIET_ZONE || my < QUIET_ZONE {
            return Luma([255u8]);
        }
        let (mx, my) = (mx - QUIET_ZONE, my - QUIET_ZONE);
        if mx >= modules || my >= modules {
            return Luma([255u8]);
        }
        match code[(mx as usize, my as usize)] {
            Color::Dark => Luma([0u8]),
            Color::Light => Luma([255u8]),
        }
    });

    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, ImageFormat::Png)?;
    Ok(buf.into_inner())
}

/// Render `token` as a `data:image/png;base64,...` URI.
///
/// # Errors
/// See [`render_png`].
pub fn render_data_uri(token: &str) -> Result<String, QrError> {
    let png = render_png(token)?;
    Ok(format!("data:image/png;base64,{}", BASE64.encode(png)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_renders_png() {
        let png = render_png("ABC123").unwrap();
        assert!(png.starts_with(b"\x89PNG\r\n\x1a\n"));
    }

    #[test]
    fn test_data_uri_is_deterministic() {
        let a = render_data_uri("ABC123").unwrap();
        let b = render_data_uri("ABC123").unwrap();
        assert!(a.starts_with("data:image/png;base64,"));
        assert_eq!(a, b);
        assert_ne!(a, render_data_uri("XYZ789").unwrap());
    }

    #[test]
    fn test_dimensions_include_quiet_zone() {
        let png = render_png("ABC123").unwrap();
        let img = image::load_from_memory_with_format(&png, ImageFormat::Png)
            .unwrap()
            .to_luma8();
        // Version 1 code: 21 modules plus a two-module border on each side.
        assert_eq!(img.width(), (21 + 4) * MODULE_SIZE);
        assert_eq!(img.get_pixel(0, 0), &Luma([255u8]));
        // Top-left finder pattern starts dark.
        let corner = QUIET_ZONE * MODULE_SIZE;
        assert_eq!(img.get_pixel(corner, corner), &Luma([0u8]));
    }

    #[test]
    fn test_oversized_token_rejected() {
        let token = "x".repeat(8000);
        assert!(matches!(render_data_uri(&token), Err(QrError::Encode(_))));
    }
}
