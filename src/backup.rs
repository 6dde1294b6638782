//! Backup of original archives before they are replaced.
//!
//! Originals are moved (not copied) into a flat backup directory under their
//! base name. When that name is taken, `_1`, `_2`, … is inserted before the
//! extension: `book.cbz` → `book_1.cbz`.
//!
//! Workers share one [`BackupManager`]. The mutex is held across directory
//! creation, unique-name selection and the rename, so two workers backing up
//! same-named files from different folders can never pick the same target.
//! The manager also remembers where each original went, so
//! [`BackupManager::restore_from_backup`] puts back the file that was actually
//! moved even when it received a suffix.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackupError {
    #[error("failed to create backup dir {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to move {from} to {to}: {source}")]
    Move {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("backup file not found: {0}")]
    NotFound(PathBuf),
}

#[derive(Debug)]
pub struct BackupManager {
    dir: PathBuf,
    /// original path → where it was moved.
    moved: Mutex<HashMap<PathBuf, PathBuf>>,
}

impl BackupManager {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            moved: Mutex::new(HashMap::new()),
        }
    }

    pub fn backup_dir(&self) -> &Path {
        &self.dir
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<PathBuf, PathBuf>> {
        // The map is only ever mutated by complete inserts/removes.
        self.moved.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn base_target(&self, original: &Path) -> PathBuf {
        match original.file_name() {
            Some(name) => self.dir.join(name),
            None => self.dir.join(original),
        }
    }

    /// Where `original` would be backed up right now.
    pub fn backup_path(&self, original: &Path) -> PathBuf {
        let _guard = self.lock();
        unique_path(&self.base_target(original))
    }

    /// Move `original` into the backup directory, returning the path used.
    pub fn move_to_backup(&self, original: &Path) -> Result<PathBuf, BackupError> {
        let mut moved = self.lock();

        fs::create_dir_all(&self.dir).map_err(|source| BackupError::CreateDir {
            path: self.dir.clone(),
            source,
        })?;

        let target = unique_path(&self.base_target(original));
        move_file(original, &target).map_err(|source| BackupError::Move {
            from: original.to_path_buf(),
            to: target.clone(),
            source,
        })?;

        log::debug!("backed up {} → {}", original.display(), target.display());
        moved.insert(original.to_path_buf(), target.clone());
        Ok(target)
    }

    /// Move the backup of `original` back into place.
    ///
    /// Uses the location recorded by [`move_to_backup`](Self::move_to_backup),
    /// falling back to the un-suffixed name in the backup directory.
    pub fn restore_from_backup(&self, original: &Path) -> Result<(), BackupError> {
        let mut moved = self.lock();
        let source = moved
            .get(original)
            .cloned()
            .unwrap_or_else(|| self.base_target(original));

        if !source.exists() {
            return Err(BackupError::NotFound(source));
        }
        move_file(&source, original).map_err(|e| BackupError::Move {
            from: source.clone(),
            to: original.to_path_buf(),
            source: e,
        })?;

        moved.remove(original);
        log::debug!("restored {} from {}", original.display(), source.display());
        Ok(())
    }

    /// Drop the remembered location of `original` once it no longer needs a
    /// restore.
    pub fn forget(&self, original: &Path) {
        self.lock().remove(original);
    }

    #[cfg(test)]
    pub(crate) fn remembered(&self) -> usize {
        self.lock().len()
    }
}

/// `path` itself if free, else the first free `<stem>_<n><.ext>`.
fn unique_path(path: &Path) -> PathBuf {
    if !path.exists() {
        return path.to_path_buf();
    }

    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();

    (1u64..)
        .map(|n| path.with_file_name(format!("{stem}_{n}{ext}")))
        .find(|candidate| !candidate.exists())
        .unwrap_or_else(|| path.to_path_buf())
}

/// Rename, falling back to copy + remove when the backup directory is on a
/// different filesystem.
fn move_file(from: &Path, to: &Path) -> io::Result<()> {
    match fs::rename(from, to) {
        Err(e) if e.kind() == io::ErrorKind::CrossesDevices => {
            fs::copy(from, to)?;
            fs::remove_file(from)
        }
        other => other,
    }
}
