//! Per-page transformation.
//!
//! [`ImageProcessor::process`] combines the pure calculations with backend
//! execution: decode, fit-resize when oversized, convert non-JPEG pages to
//! JPEG, and re-encode with an adaptive quality ladder so a page never grows
//! without a reason.

use super::backend::{BackendError, ImageBackend};
use super::calculations::fit_within;
use super::params::Quality;
use crate::archive::{ImageEntry, is_jpeg_entry};

/// Result type for image operations.
pub type Result<T> = std::result::Result<T, BackendError>;

/// Outcome of transforming one page.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessedImage {
    /// Entry path to write; `.jpg` when the page was converted.
    pub new_path: String,
    pub data: Vec<u8>,
    pub was_resized: bool,
    pub was_converted: bool,
    pub original_size: u64,
    pub new_size: u64,
}

/// Resizes and re-encodes pages with fixed settings.
#[derive(Debug, Clone, Copy)]
pub struct ImageProcessor {
    pub max_dimension: u32,
    pub quality: Quality,
}

/// Replace the extension of the final path component with `.jpg`.
///
/// `ch1/page.png` → `ch1/page.jpg`; a name without an extension gets one
/// appended.
pub fn jpg_path(path: &str) -> String {
    let base_start = path.rfind('/').map_or(0, |i| i + 1);
    match path[base_start..].rfind('.') {
        Some(dot) if dot > 0 => format!("{}.jpg", &path[..base_start + dot]),
        _ => format!("{path}.jpg"),
    }
}

impl ImageProcessor {
    pub fn new(max_dimension: u32, quality: Quality) -> Self {
        Self {
            max_dimension,
            quality,
        }
    }

    /// Transform one page.
    ///
    /// If the first encode is larger than the source, lower qualities from
    /// [`Quality::retry_ladder`] are tried until one comes out smaller; the
    /// smallest encode seen is kept either way. A JPEG that was not resized
    /// and could not be shrunk is returned untouched. Converted pages are always
    /// written as JPEG, even when that makes them larger.
    pub fn process<B: ImageBackend>(&self, backend: &B, entry: &ImageEntry) -> Result<ProcessedImage> {
        let image = backend.decode(&entry.data)?;

        let is_jpeg = is_jpeg_entry(&entry.path);
        let (new_path, was_converted) = if is_jpeg {
            (entry.path.clone(), false)
        } else {
            (jpg_path(&entry.path), true)
        };

        let source = backend.dimensions(&image);
        let target = fit_within(source, self.max_dimension);
        let was_resized = target != source;
        let image = if was_resized {
            backend.resize(image, target.width, target.height)
        } else {
            image
        };

        let mut data = backend.encode_jpeg(&image, self.quality)?;

        if data.len() as u64 > entry.original_size {
            for quality in self.quality.retry_ladder() {
                let Ok(attempt) = backend.encode_jpeg(&image, quality) else {
                    break;
                };
                if attempt.len() < data.len() {
                    data = attempt;
                }
                if (data.len() as u64) < entry.original_size {
                    break;
                }
            }
        }

        let new_size = data.len() as u64;
        if new_size >= entry.original_size && is_jpeg && !was_resized {
            return Ok(ProcessedImage {
                new_path: entry.path.clone(),
                data: entry.data.clone(),
                was_resized: false,
                was_converted: false,
                original_size: entry.original_size,
                new_size: entry.original_size,
            });
        }

        Ok(ProcessedImage {
            new_path,
            data,
            was_resized,
            was_converted,
            original_size: entry.original_size,
            new_size,
        })
    }
}
