//! Pure Rust codec backend built on the `image` crate.
//!
//! Everything is statically linked into the binary.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Identify | `ImageReader::into_dimensions` (header only) |
//! | Decode (JPEG, PNG, GIF, WebP, BMP) | `image` crate (pure Rust decoders) |
//! | EXIF orientation | `ImageDecoder::orientation` + `DynamicImage::apply_orientation` |
//! | Resize | `DynamicImage::resize_exact` with `Lanczos3` filter |
//! | Encode → JPEG | `image::codecs::jpeg::JpegEncoder` |

use super::backend::{BackendError, Dimensions, ImageBackend};
use super::params::Quality;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::metadata::Orientation;
use image::{ColorType, DynamicImage, ImageDecoder, ImageReader};
use std::io::Cursor;

/// Pure Rust backend using the `image` crate ecosystem.
///
/// See the [module docs](self) for the crate-to-operation mapping.
#[derive(Debug, Default, Clone, Copy)]
pub struct RustBackend;

impl RustBackend {
    pub fn new() -> Self {
        Self
    }
}

fn reader(data: &[u8]) -> Result<ImageReader<Cursor<&[u8]>>, BackendError> {
    Ok(ImageReader::new(Cursor::new(data)).with_guessed_format()?)
}

/// The JPEG encoder only accepts 8-bit gray or RGB; everything else
/// (alpha, 16-bit, float) is flattened to RGB8 first.
fn jpeg_compatible(image: &DynamicImage) -> Option<DynamicImage> {
    match image.color() {
        ColorType::L8 | ColorType::Rgb8 => None,
        _ => Some(DynamicImage::ImageRgb8(image.to_rgb8())),
    }
}

impl ImageBackend for RustBackend {
    type Image = DynamicImage;

    fn identify(&self, data: &[u8]) -> Result<Dimensions, BackendError> {
        let (width, height) = reader(data)?
            .into_dimensions()
            .map_err(|e| BackendError::Decode(format!("Failed to read dimensions: {e}")))?;
        Ok(Dimensions { width, height })
    }

    fn decode(&self, data: &[u8]) -> Result<DynamicImage, BackendError> {
        let mut decoder = reader(data)?
            .into_decoder()
            .map_err(|e| BackendError::Decode(e.to_string()))?;
        // A broken EXIF block is not worth failing the page over.
        let orientation = decoder
            .orientation()
            .unwrap_or(Orientation::NoTransforms);
        let mut image =
            DynamicImage::from_decoder(decoder).map_err(|e| BackendError::Decode(e.to_string()))?;
        image.apply_orientation(orientation);
        Ok(image)
    }

    fn dimensions(&self, image: &DynamicImage) -> Dimensions {
        Dimensions {
            width: image.width(),
            height: image.height(),
        }
    }

    fn resize(&self, image: DynamicImage, width: u32, height: u32) -> DynamicImage {
        image.resize_exact(width, height, FilterType::Lanczos3)
    }

    fn encode_jpeg(&self, image: &DynamicImage, quality: Quality) -> Result<Vec<u8>, BackendError> {
        let flattened = jpeg_compatible(image);
        let source = flattened.as_ref().unwrap_or(image);

        let mut buf = Vec::new();
        let encoder = JpegEncoder::new_with_quality(&mut buf, quality.value() as u8);
        source
            .write_with_encoder(encoder)
            .map_err(|e| BackendError::Encode(format!("JPEG encode failed: {e}")))?;
        Ok(buf)
    }
}
