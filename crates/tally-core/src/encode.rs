//! Frame-to-wire encoding — JPEG compression and base64 data-URI framing.
//!
//! The recognition service accepts frames as `data:image/jpeg;base64,...`
//! payloads inside a JSON body, so the encoded output stays printable.

use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;
use image::codecs::jpeg::JpegEncoder;
use thiserror::Error;

/// Prefix of every encoded frame payload.
pub const DATA_URI_PREFIX: &str = "data:image/jpeg;base64,";

#[derive(Error, Debug)]
pub enum EncodeError {
    #[error("frame has zero dimensions ({width}x{height})")]
    EmptyFrame { width: u32, height: u32 },
    #[error("frame buffer too short: expected {expected} bytes, got {actual}")]
    BufferTooShort { expected: usize, actual: usize },
    #[error("jpeg encoding failed: {0}")]
    Jpeg(#[from] image::ImageError),
}

/// Encode packed RGB888 pixels as a base64 JPEG data URI.
///
/// An uninitialized raster (zero dimensions, short buffer) is a typed
/// error so the caller can skip the cycle without submitting anything.
pub fn rgb_to_jpeg_data_uri(
    rgb: &[u8],
    width: u32,
    height: u32,
    quality: u8,
) -> Result<String, EncodeError> {
    if width == 0 || height == 0 {
        return Err(EncodeError::EmptyFrame { width, height });
    }
    let expected = (width as usize) * (height as usize) * 3;
    if rgb.len() < expected {
        return Err(EncodeError::BufferTooShort {
            expected,
            actual: rgb.len(),
        });
    }

    let mut jpeg = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut jpeg, quality);
    encoder.encode(
        &rgb[..expected],
        width,
        height,
        image::ExtendedColorType::Rgb8,
    )?;

    let mut out = String::with_capacity(DATA_URI_PREFIX.len() + jpeg.len() * 4 / 3 + 4);
    out.push_str(DATA_URI_PREFIX);
    BASE64_STANDARD.encode_string(&jpeg, &mut out);
    Ok(out)
}
