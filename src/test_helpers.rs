//! Shared test utilities for the cbz-compress test suite.
//!
//! Builds synthetic page images with the `image` crate and raw archives with
//! the `zip` crate, so unit tests never depend on checked-in binary fixtures.
//!
//! # Usage
//!
//! ```ignore
//! use crate::test_helpers::*;
//!
//! let tmp = TempDir::new().unwrap();
//! let cbz = tmp.path().join("book.cbz");
//! write_raw_zip(&cbz, &[
//!     ("page1.png", encode_png_bytes(4000, 3000).as_slice()),
//!     ("ComicInfo.xml", b"<ComicInfo/>".as_slice()),
//! ]);
//! ```

use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use std::io::{Cursor, Write};
use std::path::Path;

// =========================================================================
// Synthetic pages
// =========================================================================

/// A deterministic RGB pattern with enough detail that JPEG sizes respond to
/// quality changes.
pub fn pattern_image(width: u32, height: u32) -> DynamicImage {
    let img = RgbImage::from_fn(width, height, |x, y| {
        let r = (x * 7 + y * 3) % 256;
        let g = (x ^ y) % 256;
        let b = (x * y / 5) % 256;
        Rgb([r as u8, g as u8, b as u8])
    });
    DynamicImage::ImageRgb8(img)
}

/// Encode the test pattern as PNG.
pub fn encode_png_bytes(width: u32, height: u32) -> Vec<u8> {
    let mut buf = Cursor::new(Vec::new());
    pattern_image(width, height)
        .write_to(&mut buf, ImageFormat::Png)
        .unwrap();
    buf.into_inner()
}

/// Encode the test pattern as JPEG at `quality`.
pub fn encode_jpeg_bytes(width: u32, height: u32, quality: u8) -> Vec<u8> {
    let mut buf = Vec::new();
    let encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buf, quality);
    pattern_image(width, height)
        .write_with_encoder(encoder)
        .unwrap();
    buf
}

// =========================================================================
// Archives
// =========================================================================

/// Write a zip with the given `(name, bytes)` entries, stored uncompressed.
///
/// Deliberately bypasses [`crate::archive::Writer`] so reader and analyzer
/// tests do not depend on it.
pub fn write_raw_zip(path: &Path, entries: &[(&str, &[u8])]) {
    let file = std::fs::File::create(path).unwrap();
    let mut zip = zip::ZipWriter::new(file);
    let options =
        zip::write::SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);
    for (name, data) in entries {
        zip.start_file(*name, options).unwrap();
        zip.write_all(data).unwrap();
    }
    zip.finish().unwrap();
}

/// List entry names of an archive in stored order.
pub fn zip_entry_names(path: &Path) -> Vec<String> {
    let archive = zip::ZipArchive::new(std::fs::File::open(path).unwrap()).unwrap();
    archive.file_names().map(str::to_string).collect::<Vec<_>>()
}
