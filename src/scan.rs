//! Directory scan for candidate archives.
//!
//! Walks the input directory with `walkdir` in sorted file-name order and
//! collects every `*.cbz` file (extension matched case-insensitively), except:
//!
//! - anything inside the backup directory, which is pruned from the walk so a
//!   second run never reprocesses backups;
//! - file names matching a configured skip pattern (`._*`, `.DS_Store`, …);
//! - `*.compressed.tmp.cbz` leftovers from an interrupted run.
//!
//! Without `recursive`, only the top level is considered.

use crate::archive::COMPRESSED_TEMP_SUFFIX;
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to scan directory: {0}")]
    Walk(#[from] walkdir::Error),
    #[error("invalid skip pattern: {0}")]
    Pattern(#[from] globset::Error),
}

/// Options for [`scan`].
#[derive(Debug, Clone)]
pub struct ScanOptions<'a> {
    pub recursive: bool,
    pub backup_dir: &'a Path,
    pub skip_patterns: &'a [String],
}

/// Compile skip patterns into one matcher.
pub fn build_skip_set(patterns: &[String]) -> Result<GlobSet, ScanError> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}

fn is_cbz(name: &str) -> bool {
    Path::new(name)
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("cbz"))
}

/// Find all candidate archives under `root`.
pub fn scan(root: &Path, options: &ScanOptions<'_>) -> Result<Vec<PathBuf>, ScanError> {
    let skip = build_skip_set(options.skip_patterns)?;
    let backup_abs = std::path::absolute(options.backup_dir)?;

    let mut walker = WalkDir::new(root).sort_by_file_name();
    if !options.recursive {
        walker = walker.max_depth(1);
    }

    let mut found = Vec::new();
    let mut it = walker.into_iter();
    while let Some(entry) = it.next() {
        let entry = entry?;

        if entry.file_type().is_dir() {
            if std::path::absolute(entry.path())? == backup_abs {
                log::debug!("skipping backup directory {}", entry.path().display());
                it.skip_current_dir();
            }
            continue;
        }

        let name = entry.file_name().to_string_lossy();
        if skip.is_match(&*name) || name.ends_with(COMPRESSED_TEMP_SUFFIX) {
            continue;
        }
        if is_cbz(&name) {
            found.push(entry.path().to_path_buf());
        }
    }

    log::debug!("found {} archives under {}", found.len(), root.display());
    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn defaults() -> Vec<String> {
        vec!["._*".to_string(), ".DS_Store".to_string()]
    }

    fn touch(root: &Path, rel: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"x").unwrap();
    }

    fn names(root: &Path, found: &[PathBuf]) -> Vec<String> {
        found
            .iter()
            .map(|p| p.strip_prefix(root).unwrap().to_string_lossy().replace('\\', "/"))
            .collect()
    }

    #[test]
    fn finds_cbz_files_recursively_in_sorted_order() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "b.cbz");
        touch(tmp.path(), "a.CBZ");
        touch(tmp.path(), "series/vol1.cbz");
        touch(tmp.path(), "notes.txt");
        touch(tmp.path(), "book.cbr");

        let patterns = defaults();
        let options = ScanOptions {
            recursive: true,
            backup_dir: &tmp.path().join("originals_backup"),
            skip_patterns: &patterns,
        };
        let found = scan(tmp.path(), &options).unwrap();

        assert_eq!(names(tmp.path(), &found), vec!["a.CBZ", "b.cbz", "series/vol1.cbz"]);
    }

    #[test]
    fn non_recursive_stays_at_top_level() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "top.cbz");
        touch(tmp.path(), "series/vol1.cbz");

        let patterns = defaults();
        let options = ScanOptions {
            recursive: false,
            backup_dir: &tmp.path().join("originals_backup"),
            skip_patterns: &patterns,
        };
        let found = scan(tmp.path(), &options).unwrap();

        assert_eq!(names(tmp.path(), &found), vec!["top.cbz"]);
    }

    #[test]
    fn backup_directory_is_pruned() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "book.cbz");
        touch(tmp.path(), "originals_backup/book.cbz");
        touch(tmp.path(), "originals_backup/nested/other.cbz");

        let patterns = defaults();
        let options = ScanOptions {
            recursive: true,
            backup_dir: &tmp.path().join("originals_backup"),
            skip_patterns: &patterns,
        };
        let found = scan(tmp.path(), &options).unwrap();

        assert_eq!(names(tmp.path(), &found), vec!["book.cbz"]);
    }

    #[test]
    fn skip_patterns_and_temp_leftovers_are_ignored() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "book.cbz");
        touch(tmp.path(), "._book.cbz");
        touch(tmp.path(), "book.cbz.compressed.tmp.cbz");
        touch(tmp.path(), "draft-book.cbz");

        let patterns = vec!["._*".to_string(), "draft-*".to_string()];
        let options = ScanOptions {
            recursive: true,
            backup_dir: &tmp.path().join("originals_backup"),
            skip_patterns: &patterns,
        };
        let found = scan(tmp.path(), &options).unwrap();

        assert_eq!(names(tmp.path(), &found), vec!["book.cbz"]);
    }

    #[test]
    fn missing_root_is_walk_error() {
        let tmp = TempDir::new().unwrap();
        let patterns = defaults();
        let options = ScanOptions {
            recursive: true,
            backup_dir: Path::new("originals_backup"),
            skip_patterns: &patterns,
        };
        let result = scan(&tmp.path().join("missing"), &options);
        assert!(matches!(result, Err(ScanError::Walk(_))));
    }

    #[test]
    fn invalid_pattern_is_error() {
        let result = build_skip_set(&["[unclosed".to_string()]);
        assert!(matches!(result, Err(ScanError::Pattern(_))));
    }
}
