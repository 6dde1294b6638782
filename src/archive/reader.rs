//! Full extraction of a CBZ into memory.
//!
//! Every non-junk entry is read completely. Entries with a page image
//! extension become [`ImageEntry`]s sorted by [`natural_cmp`]; everything else
//! becomes an [`OtherEntry`] that is written back byte-for-byte. Any error
//! aborts the whole extraction: a partially read archive is never returned.

use super::{ArchiveError, is_image_entry, is_junk_entry};
use crate::naming::natural_cmp;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

/// A page image inside an archive.
#[derive(Debug, Clone)]
pub struct ImageEntry {
    /// Full path within the archive, e.g. `chapter1/page01.png`.
    pub path: String,
    pub data: Vec<u8>,
    /// Byte length of `data` as stored in the source archive.
    pub original_size: u64,
    pub modified: Option<zip::DateTime>,
}

/// A non-image entry preserved verbatim (e.g. `ComicInfo.xml`).
#[derive(Debug, Clone)]
pub struct OtherEntry {
    pub path: String,
    pub data: Vec<u8>,
    pub modified: Option<zip::DateTime>,
}

/// Everything extracted from one archive.
#[derive(Debug, Clone)]
pub struct ArchiveContents {
    pub source_path: PathBuf,
    /// Pages in natural order of their paths.
    pub images: Vec<ImageEntry>,
    /// Pass-through entries in archive order.
    pub other_files: Vec<OtherEntry>,
}

/// Stateless CBZ extractor.
#[derive(Debug, Default, Clone, Copy)]
pub struct Reader;

impl Reader {
    pub fn new() -> Self {
        Self
    }

    /// Open `path` and read every entry into memory.
    pub fn extract(&self, path: &Path) -> Result<ArchiveContents, ArchiveError> {
        let file = File::open(path).map_err(|e| ArchiveError::io(path, e))?;
        let mut archive = zip::ZipArchive::new(file).map_err(|source| ArchiveError::Open {
            path: path.display().to_string(),
            source,
        })?;

        let mut images = Vec::new();
        let mut other_files = Vec::new();

        for i in 0..archive.len() {
            let mut entry = archive.by_index(i).map_err(|source| ArchiveError::Entry {
                entry: format!("#{i} in {}", path.display()),
                source,
            })?;
            if entry.is_dir() {
                continue;
            }
            let name = entry.name().to_string();
            if is_junk_entry(&name) {
                continue;
            }

            let mut data = Vec::with_capacity(entry.size() as usize);
            entry.read_to_end(&mut data).map_err(|source| ArchiveError::Io {
                path: format!("{}:{name}", path.display()),
                source,
            })?;
            let modified: Option<zip::DateTime> = entry.last_modified().into();

            if is_image_entry(&name) {
                images.push(ImageEntry {
                    path: name,
                    original_size: data.len() as u64,
                    data,
                    modified,
                });
            } else {
                other_files.push(OtherEntry {
                    path: name,
                    data,
                    modified,
                });
            }
        }

        images.sort_by(|a, b| natural_cmp(&a.path, &b.path));
        log::debug!(
            "extracted {}: {} pages, {} other entries",
            path.display(),
            images.len(),
            other_files.len()
        );

        Ok(ArchiveContents {
            source_path: path.to_path_buf(),
            images,
            other_files,
        })
    }
}
