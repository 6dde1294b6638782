//! Image codec backend trait and shared types.
//!
//! The [`ImageBackend`] trait is the whole contract the pipeline needs from an
//! image codec: read dimensions from a header, decode (orientation applied),
//! resize, and encode JPEG at a given quality. Everything works on in-memory
//! bytes because pages live inside archives, never as loose files.
//!
//! The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend). Tests use the
//! [`MockBackend`](tests::MockBackend), whose decoded "image" is just its
//! dimensions, so encode sizes and resize decisions can be scripted exactly.

use super::params::Quality;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Decode failed: {0}")]
    Decode(String),
    #[error("Encode failed: {0}")]
    Encode(String),
}

/// Pixel dimensions of an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// The longer of the two edges.
    pub fn long_edge(self) -> u32 {
        self.width.max(self.height)
    }

    /// Whether either edge is larger than `max`.
    pub fn exceeds(self, max: u32) -> bool {
        self.width > max || self.height > max
    }
}

/// Trait for image codec backends.
///
/// `Sync` because one backend instance is shared by every batch worker.
pub trait ImageBackend: Sync {
    /// Decoded image representation.
    type Image;

    /// Read width/height from the image header without decoding pixels.
    fn identify(&self, data: &[u8]) -> Result<Dimensions, BackendError>;

    /// Fully decode an image, applying any EXIF orientation.
    fn decode(&self, data: &[u8]) -> Result<Self::Image, BackendError>;

    /// Dimensions of a decoded image.
    fn dimensions(&self, image: &Self::Image) -> Dimensions;

    /// Resize to exactly `width` x `height`.
    fn resize(&self, image: Self::Image, width: u32, height: u32) -> Self::Image;

    /// Encode as baseline JPEG.
    fn encode_jpeg(&self, image: &Self::Image, quality: Quality) -> Result<Vec<u8>, BackendError>;
}
