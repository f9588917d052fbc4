//! Raster decoding: encoded payload → fixed-size RGB grid.
//!
//! The source image is scaled (not cropped or letterboxed) to a square of
//! [`RASTER_SIZE`] samples so that extraction does not depend on the
//! capture resolution.

use crate::types::RawImage;
use base64::{engine::general_purpose, Engine as _};
use image::imageops::FilterType;
use image::GenericImageView;
use thiserror::Error;

/// Side length of the normalized raster.
pub const RASTER_SIZE: u32 = 128;

const DATA_URL_PREFIX: &[u8] = b"data:";
const BASE64_MARKER: &[u8] = b";base64";

#[derive(Error, Debug)]
pub enum DecodeFailure {
    #[error("empty image payload")]
    Empty,
    #[error("data URL is not base64 encoded")]
    UnsupportedDataUrl,
    #[error("invalid base64 body: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("image decode failed: {0}")]
    Image(#[from] image::ImageError),
    #[error("decoded image has zero dimension ({width}x{height})")]
    ZeroDimension { width: u32, height: u32 },
    #[error("decode worker failed: {0}")]
    Worker(String),
}

/// Interleaved 8-bit RGB samples, row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct Raster {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl Raster {
    pub fn from_rgb(width: u32, height: u32, pixels: Vec<u8>) -> Self {
        Self {
            width,
            height,
            pixels,
        }
    }

    /// RGB triple at (x, y), or `None` if the buffer is short.
    pub fn sample(&self, x: u32, y: u32) -> Option<[u8; 3]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = (y as usize * self.width as usize + x as usize) * 3;
        self.pixels
            .get(idx..idx + 3)
            .map(|px| [px[0], px[1], px[2]])
    }
}

/// Decode an encoded payload into a [`RASTER_SIZE`]² RGB raster.
///
/// Any malformed input yields `Err`; this function never panics on data.
pub fn decode(image: &RawImage) -> Result<Raster, DecodeFailure> {
    if image.is_empty() {
        return Err(DecodeFailure::Empty);
    }

    let body = payload_bytes(image.as_bytes())?;
    let decoded = image::load_from_memory(&body)?;

    let (width, height) = GenericImageView::dimensions(&decoded);
    if width == 0 || height == 0 {
        return Err(DecodeFailure::ZeroDimension { width, height });
    }

    let rgb = decoded
        .resize_exact(RASTER_SIZE, RASTER_SIZE, FilterType::Triangle)
        .to_rgb8();

    tracing::trace!(
        src_width = width,
        src_height = height,
        size = RASTER_SIZE,
        "decoded raster"
    );

    Ok(Raster::from_rgb(rgb.width(), rgb.height(), rgb.into_raw()))
}

/// Unwrap a `data:<mime>;base64,<body>` URL; other payloads pass through.
fn payload_bytes(raw: &[u8]) -> Result<Vec<u8>, DecodeFailure> {
    if !raw.starts_with(DATA_URL_PREFIX) {
        return Ok(raw.to_vec());
    }

    let comma = raw
        .iter()
        .position(|&b| b == b',')
        .ok_or(DecodeFailure::UnsupportedDataUrl)?;
    let header = &raw[..comma];
    if !header.ends_with(BASE64_MARKER) {
        return Err(DecodeFailure::UnsupportedDataUrl);
    }

    let body: Vec<u8> = raw[comma + 1..]
        .iter()
        .copied()
        .filter(|b| !b.is_ascii_whitespace())
        .collect();
    Ok(general_purpose::STANDARD.decode(body)?)
}
