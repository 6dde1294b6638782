//! Atomic CBZ creation.
//!
//! Archives are never written in place. [`Writer::create`] streams into a
//! sibling `<output>.tmp` file (same directory, so the final rename stays on
//! one filesystem and is atomic) and renames it over `output` only after the
//! zip central directory has been written and the file closed. Any failure
//! along the way removes the partial temp file before the error is returned,
//! so callers never see half-written archives or stray `.tmp` files.
//!
//! Every entry is deflate-compressed with fixed `0644` permission bits.

use super::ArchiveError;
use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use zip::write::SimpleFileOptions;

/// Suffix of the scratch file [`Writer::create`] writes before renaming.
const TEMP_SUFFIX: &str = ".tmp";

/// Suffix [`Writer::create_temp`] appends to the base path. The directory
/// scan recognises it and ignores leftovers from interrupted runs.
pub const COMPRESSED_TEMP_SUFFIX: &str = ".compressed.tmp.cbz";

/// Fixed permission bits for every written entry.
const ENTRY_MODE: u32 = 0o644;

/// A file to write into an archive.
#[derive(Debug, Clone, PartialEq)]
pub struct WriteEntry {
    pub path: String,
    pub data: Vec<u8>,
    /// Entry timestamp; `None` lets the zip writer stamp the default time.
    pub modified: Option<zip::DateTime>,
}

impl WriteEntry {
    pub fn new(path: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            path: path.into(),
            data,
            modified: None,
        }
    }
}

/// Stateless CBZ writer.
#[derive(Debug, Default, Clone, Copy)]
pub struct Writer;

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}

impl Writer {
    pub fn new() -> Self {
        Self
    }

    /// Write `entries` to `output` atomically.
    pub fn create(&self, output: &Path, entries: &[WriteEntry]) -> Result<(), ArchiveError> {
        if let Some(dir) = output.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).map_err(|e| ArchiveError::io(dir, e))?;
        }

        let temp = with_suffix(output, TEMP_SUFFIX);
        if let Err(e) = write_archive(&temp, entries) {
            let _ = fs::remove_file(&temp);
            return Err(e);
        }
        if let Err(e) = fs::rename(&temp, output) {
            let _ = fs::remove_file(&temp);
            return Err(ArchiveError::io(output, e));
        }
        Ok(())
    }

    /// Write `entries` next to `base` under a temp name, returning that path.
    ///
    /// Used to build and verify a replacement before the original is touched.
    pub fn create_temp(&self, base: &Path, entries: &[WriteEntry]) -> Result<PathBuf, ArchiveError> {
        let temp = with_suffix(base, COMPRESSED_TEMP_SUFFIX);
        self.create(&temp, entries)?;
        Ok(temp)
    }
}

fn write_archive(path: &Path, entries: &[WriteEntry]) -> Result<(), ArchiveError> {
    let file = File::create(path).map_err(|e| ArchiveError::io(path, e))?;
    let mut zip = zip::ZipWriter::new(BufWriter::new(file));

    for entry in entries {
        let mut options = SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Deflated)
            .unix_permissions(ENTRY_MODE);
        if let Some(modified) = entry.modified {
            options = options.last_modified_time(modified);
        }

        zip.start_file(entry.path.as_str(), options)
            .map_err(|source| ArchiveError::Write {
                entry: entry.path.clone(),
                source,
            })?;
        zip.write_all(&entry.data)
            .map_err(|e| ArchiveError::io(Path::new(&entry.path), e))?;
    }

    let mut buffered = zip.finish().map_err(|source| ArchiveError::Write {
        entry: "<central directory>".to_string(),
        source,
    })?;
    buffered.flush().map_err(|e| ArchiveError::io(path, e))?;
    Ok(())
}
