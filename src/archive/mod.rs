//! CBZ archive I/O.
//!
//! A CBZ is a plain zip file whose entries are page images plus optional
//! metadata (`ComicInfo.xml` and friends). This module owns both directions:
//!
//! - [`reader`]: extract every entry into memory, split into pages and
//!   pass-through files, pages in natural order.
//! - [`writer`]: serialize entries into a new archive via a temp file and an
//!   atomic rename.
//!
//! Entry classification is shared with the header analyzer so both agree on
//! what counts as a page.

pub mod reader;
pub mod writer;

pub use reader::{ArchiveContents, ImageEntry, OtherEntry, Reader};
pub use writer::{COMPRESSED_TEMP_SUFFIX, WriteEntry, Writer};

use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to open archive {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: zip::result::ZipError,
    },
    #[error("failed to read entry {entry}: {source}")]
    Entry {
        entry: String,
        #[source]
        source: zip::result::ZipError,
    },
    #[error("failed to write entry {entry}: {source}")]
    Write {
        entry: String,
        #[source]
        source: zip::result::ZipError,
    },
}

impl ArchiveError {
    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.display().to_string(),
            source,
        }
    }
}

/// Page image extensions, lowercase, without the dot.
pub const SUPPORTED_IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp", "bmp"];

/// Marker directory macOS Archive Utility adds for resource forks.
const MACOS_RESOURCE_FORK: &str = "__MACOSX";

fn extension_lowercase(entry_name: &str) -> Option<String> {
    Path::new(entry_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
}

/// Whether an entry name has a supported page image extension (case-insensitive).
pub fn is_image_entry(entry_name: &str) -> bool {
    extension_lowercase(entry_name)
        .is_some_and(|ext| SUPPORTED_IMAGE_EXTENSIONS.contains(&ext.as_str()))
}

/// Whether an entry name has a `.jpg`/`.jpeg` extension (case-insensitive).
pub fn is_jpeg_entry(entry_name: &str) -> bool {
    extension_lowercase(entry_name).is_some_and(|ext| ext == "jpg" || ext == "jpeg")
}

/// Hidden files and macOS resource forks are dropped from archives entirely.
pub fn is_junk_entry(entry_name: &str) -> bool {
    let base = entry_name.rsplit('/').next().unwrap_or(entry_name);
    base.starts_with('.') || entry_name.contains(MACOS_RESOURCE_FORK)
}
