//! Page image processing in pure Rust.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Identify** | `ImageReader::into_dimensions` (header only) |
//! | **Decode** | `image` crate, EXIF orientation applied |
//! | **Resize** | Lanczos3 fit into a square box |
//! | **Encode** | `JpegEncoder` with adaptive quality retry |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for dimension math (unit testable)
//! - **Parameters**: [`Quality`] and the retry ladder
//! - **Backend**: [`ImageBackend`] trait + [`RustBackend`]
//! - **Operations**: [`ImageProcessor`], combining calculations + backend

pub mod backend;
mod calculations;
pub mod operations;
mod params;
pub mod rust_backend;

pub use backend::{BackendError, Dimensions, ImageBackend};
pub use calculations::fit_within;
pub use operations::{ImageProcessor, ProcessedImage, jpg_path};
pub use params::{QUALITY_FLOOR, QUALITY_STEP, Quality};
pub use rust_backend::RustBackend;
