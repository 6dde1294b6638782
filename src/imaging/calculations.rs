//! Pure calculation functions for image dimensions.
//!
//! All functions here are pure and testable without any I/O or images.

use super::backend::Dimensions;

/// Calculate "fit into box" dimensions for a square `max` x `max` box.
///
/// Preserves aspect ratio and never upscales: images already within the box
/// are returned unchanged. The long edge lands exactly on `max`; the short
/// edge is rounded and never drops below 1 pixel.
///
/// # Examples
/// ```
/// # use cbz_compress::imaging::{Dimensions, fit_within};
/// // 4000x3000 landscape into 1800 → 1800x1350
/// assert_eq!(fit_within(Dimensions::new(4000, 3000), 1800), Dimensions::new(1800, 1350));
/// ```
pub fn fit_within(source: Dimensions, max: u32) -> Dimensions {
    if !source.exceeds(max) || source.width == 0 || source.height == 0 {
        return source;
    }

    let scaled = |edge: u32, long: u32| -> u32 {
        ((edge as f64 * max as f64 / long as f64).round() as u32).max(1)
    };

    if source.width >= source.height {
        Dimensions::new(max, scaled(source.height, source.width))
    } else {
        Dimensions::new(scaled(source.width, source.height), max)
    }
}
