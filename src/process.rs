//! Per-archive state machine.
//!
//! A [`Pipeline`] owns one instance of every collaborator (reader, writer,
//! analyzer, page processor, backup manager, codec backend, progress sink)
//! and drives each archive through:
//!
//! ```text
//! stat → analyze ─┬─ dry-run ─→ report analysis, done
//!                 ├─ skip ────→ report skip, done
//!                 └─ process ─→ extract → transform pages → write temp
//!                               → verify temp → back up original
//!                               → rename temp over original
//! ```
//!
//! `force` jumps straight from stat to extract (a forced dry run still
//! analyzes, since a dry run never writes anything).
//!
//! ## Failure handling
//!
//! - A page that fails to decode or encode is kept byte-for-byte; the error
//!   is recorded on the [`FileResult`] and the archive is still rewritten.
//! - Until the backup step, the original is never touched: write,
//!   verification, and backup failures remove the temp archive and fail the
//!   file.
//! - If the final rename fails after the original was moved to the backup
//!   directory, the original is moved back ([`ProcessError::RenameRestored`]).
//!   If that also fails the temp archive is left in place so no data is lost
//!   ([`ProcessError::Critical`]).
//!
//! The pipeline is `Sync`: the batch orchestrator in [`crate::batch`] shares
//! one instance between all workers.

use crate::analyze::Analyzer;
use crate::archive::{ArchiveContents, ArchiveError, Reader, WriteEntry, Writer};
use crate::backup::{BackupError, BackupManager};
use crate::config::Config;
use crate::imaging::{ImageBackend, ImageProcessor, Quality, RustBackend};
use crate::report::{ProgressSink, SyncSink};
use crate::types::FileResult;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Instant;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("failed to stat {path}: {source}")]
    Stat { path: PathBuf, source: io::Error },
    #[error("analysis failed: {0}")]
    Analysis(#[source] ArchiveError),
    #[error("extraction failed: {0}")]
    Extract(#[source] ArchiveError),
    #[error("failed to create compressed CBZ: {0}")]
    Write(#[source] ArchiveError),
    #[error("verification failed: {0}")]
    Verification(String),
    #[error("backup failed: {0}")]
    Backup(#[from] BackupError),
    #[error("rename failed (original restored): {0}")]
    RenameRestored(#[source] io::Error),
    #[error("CRITICAL: rename failed and restore failed: {rename} (restore: {restore})")]
    Critical { rename: io::Error, restore: BackupError },
}

/// Orchestrates analysis, transformation and replacement of archives.
#[derive(Debug)]
pub struct Pipeline<B: ImageBackend = RustBackend> {
    pub(crate) config: Config,
    pub(crate) reader: Reader,
    pub(crate) writer: Writer,
    pub(crate) analyzer: Analyzer,
    pub(crate) processor: ImageProcessor,
    pub(crate) backup: BackupManager,
    pub(crate) backend: B,
    pub(crate) sink: SyncSink,
}

impl Pipeline<RustBackend> {
    /// Pipeline with the production codec backend.
    pub fn new(config: Config, sink: impl ProgressSink + 'static) -> Self {
        Self::with_backend(config, RustBackend::new(), sink)
    }
}

impl<B: ImageBackend> Pipeline<B> {
    pub fn with_backend(config: Config, backend: B, sink: impl ProgressSink + 'static) -> Self {
        Self {
            reader: Reader::new(),
            writer: Writer::new(),
            analyzer: Analyzer::new(
                config.images.max_dimension,
                config.analysis.threshold_mb_per_page,
            ),
            processor: ImageProcessor::new(
                config.images.max_dimension,
                Quality::new(config.images.quality),
            ),
            backup: BackupManager::new(config.backup.dir.clone()),
            backend,
            sink: SyncSink::new(sink),
            config,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn backup(&self) -> &BackupManager {
        &self.backup
    }

    /// Run one archive through the state machine.
    ///
    /// `Ok` covers processed, skipped and dry-run outcomes; `Err` means the
    /// archive was not replaced.
    pub fn process_file(&self, path: &Path) -> Result<FileResult, ProcessError> {
        let start = Instant::now();
        let mut result = FileResult::new(path);
        result.original_size = fs::metadata(path)
            .map_err(|source| ProcessError::Stat {
                path: path.to_path_buf(),
                source,
            })?
            .len();

        if !self.config.force || self.config.dry_run {
            let mut analysis = self
                .analyzer
                .analyze(&self.backend, path)
                .map_err(ProcessError::Analysis)?;

            if self.config.dry_run {
                self.analyzer.estimate_savings(&mut analysis);
                if !analysis.needs_processing {
                    result.skipped = true;
                    result.skip_reason = analysis.skip_reason.clone();
                }
                log::debug!("{}", self.analyzer.format_analysis(&analysis));
                self.sink.dry_run_file(&analysis);
                result.analysis = Some(analysis);
                result.duration = start.elapsed();
                return Ok(result);
            }

            if !analysis.needs_processing {
                let reason = analysis.skip_reason.unwrap_or_default();
                log::debug!("skip {}: {reason}", path.display());
                self.sink.file_skipped(path, &reason);
                result.skipped = true;
                result.skip_reason = Some(reason);
                result.duration = start.elapsed();
                return Ok(result);
            }
        }

        let contents = self.reader.extract(path).map_err(ProcessError::Extract)?;
        let entries = self.transform(contents, &mut result);

        let temp = self
            .writer
            .create_temp(path, &entries)
            .map_err(ProcessError::Write)?;
        drop(entries);

        result.compressed_size = match fs::metadata(&temp) {
            Ok(meta) => meta.len(),
            Err(source) => {
                let _ = fs::remove_file(&temp);
                return Err(ProcessError::Stat { path: temp, source });
            }
        };

        if let Err(e) = self.verify(&temp) {
            let _ = fs::remove_file(&temp);
            return Err(e);
        }

        self.commit(&temp, path)?;

        log::info!(
            "{}: {} → {} bytes",
            path.display(),
            result.original_size,
            result.compressed_size
        );
        result.output_path = Some(path.to_path_buf());
        result.duration = start.elapsed();
        Ok(result)
    }

    /// Transform every page; pass other entries through.
    fn transform(&self, contents: ArchiveContents, result: &mut FileResult) -> Vec<WriteEntry> {
        let mut entries = Vec::with_capacity(contents.images.len() + contents.other_files.len());

        for image in contents.images {
            match self.processor.process(&self.backend, &image) {
                Ok(processed) => {
                    if processed.was_resized || processed.was_converted {
                        result.images_processed += 1;
                    } else {
                        result.images_skipped += 1;
                    }
                    if processed.was_converted {
                        result.images_converted += 1;
                    }
                    if self.config.verbose {
                        self.sink.image_processed(
                            &image.path,
                            processed.original_size,
                            processed.new_size,
                        );
                    }
                    entries.push(WriteEntry {
                        path: processed.new_path,
                        data: processed.data,
                        modified: image.modified,
                    });
                }
                Err(e) => {
                    log::warn!(
                        "{}: keeping original {}: {e}",
                        contents.source_path.display(),
                        image.path
                    );
                    result.errors.push(format!("{}: {e}", image.path));
                    entries.push(WriteEntry {
                        path: image.path,
                        data: image.data,
                        modified: image.modified,
                    });
                }
            }
        }

        entries.extend(contents.other_files.into_iter().map(|other| WriteEntry {
            path: other.path,
            data: other.data,
            modified: other.modified,
        }));
        entries
    }

    /// The replacement must read back and contain at least one page.
    fn verify(&self, temp: &Path) -> Result<(), ProcessError> {
        let contents = self
            .reader
            .extract(temp)
            .map_err(|e| ProcessError::Verification(format!("cannot read compressed CBZ: {e}")))?;
        if contents.images.is_empty() {
            return Err(ProcessError::Verification(
                "compressed CBZ has no images".into(),
            ));
        }
        Ok(())
    }

    fn commit(&self, temp: &Path, original: &Path) -> Result<(), ProcessError> {
        self.commit_with(temp, original, |from, to| fs::rename(from, to))
    }

    /// Back up `original`, then move `temp` into its place with `rename`.
    pub(crate) fn commit_with(
        &self,
        temp: &Path,
        original: &Path,
        rename: impl FnOnce(&Path, &Path) -> io::Result<()>,
    ) -> Result<(), ProcessError> {
        if let Err(e) = self.backup.move_to_backup(original) {
            let _ = fs::remove_file(temp);
            return Err(ProcessError::Backup(e));
        }

        let Err(rename_err) = rename(temp, original) else {
            self.backup.forget(original);
            return Ok(());
        };

        match self.backup.restore_from_backup(original) {
            Ok(()) => {
                log::error!(
                    "{}: rename failed, original restored: {rename_err}",
                    original.display()
                );
                let _ = fs::remove_file(temp);
                Err(ProcessError::RenameRestored(rename_err))
            }
            Err(restore) => {
                log::error!(
                    "{}: rename failed ({rename_err}) and restore failed ({restore}); \
                     compressed copy kept at {}",
                    original.display(),
                    temp.display()
                );
                Err(ProcessError::Critical {
                    rename: rename_err,
                    restore,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::backend::tests::{MockBackend, mock_page};
    use crate::report::NullSink;
    use crate::report::tests::{Event, RecordingSink};
    use crate::test_helpers::{write_raw_zip, zip_entry_names};
    use tempfile::TempDir;

    struct Fixture {
        tmp: TempDir,
        recorder: RecordingSink,
        pipeline: Pipeline<MockBackend>,
    }

    impl Fixture {
        fn new(encoded_size: usize, tweak: impl FnOnce(&mut Config)) -> Self {
            let tmp = TempDir::new().unwrap();
            let mut config = Config::default();
            config.backup.dir = tmp.path().join("originals_backup");
            tweak(&mut config);
            let recorder = RecordingSink::default();
            let pipeline = Pipeline::with_backend(
                config,
                MockBackend::with_constant_size(encoded_size),
                recorder.clone(),
            );
            Self {
                tmp,
                recorder,
                pipeline,
            }
        }

        fn cbz(&self, name: &str, entries: &[(&str, &[u8])]) -> PathBuf {
            let path = self.tmp.path().join(name);
            write_raw_zip(&path, entries);
            path
        }

        fn backup_of(&self, name: &str) -> PathBuf {
            self.tmp.path().join("originals_backup").join(name)
        }

        fn listing(&self) -> Vec<String> {
            let mut names: Vec<String> = fs::read_dir(self.tmp.path())
                .unwrap()
                .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
                .collect();
            names.sort();
            names
        }
    }

    fn optimized_pages() -> Vec<(&'static str, Vec<u8>)> {
        vec![
            ("p1.jpg", mock_page(1200, 1800, 200)),
            ("p2.jpg", mock_page(1200, 1800, 200)),
        ]
    }

    fn as_entries<'a>(pages: &'a [(&'a str, Vec<u8>)]) -> Vec<(&'a str, &'a [u8])> {
        pages.iter().map(|(n, d)| (*n, d.as_slice())).collect()
    }

    // =========================================================================
    // Skip and dry-run
    // =========================================================================

    #[test]
    fn optimized_archive_is_skipped_untouched() {
        let fx = Fixture::new(100, |_| {});
        let pages = optimized_pages();
        let cbz = fx.cbz("book.cbz", &as_entries(&pages));
        let before = fs::read(&cbz).unwrap();

        let result = fx.pipeline.process_file(&cbz).unwrap();

        assert!(result.skipped);
        assert!(
            result
                .skip_reason
                .as_deref()
                .unwrap()
                .starts_with("already optimized")
        );
        assert_eq!(fs::read(&cbz).unwrap(), before);
        assert!(!fx.backup_of("book.cbz").exists());
        assert!(matches!(
            fx.recorder.events().as_slice(),
            [Event::FileSkipped { path, .. }] if path == "book.cbz"
        ));
    }

    #[test]
    fn dry_run_reports_without_writing() {
        let fx = Fixture::new(100, |c| c.dry_run = true);
        let big = mock_page(4000, 3000, 200);
        let cbz = fx.cbz("big.cbz", &[("p1.png", big.as_slice())]);
        let before = fs::read(&cbz).unwrap();

        let result = fx.pipeline.process_file(&cbz).unwrap();

        let analysis = result.analysis.as_ref().unwrap();
        assert!(analysis.needs_processing);
        assert!(analysis.estimate.is_some());
        assert!(!result.skipped);
        assert!(result.output_path.is_none());
        assert_eq!(fs::read(&cbz).unwrap(), before);
        assert_eq!(fx.listing(), vec!["big.cbz"]);
        assert_eq!(
            fx.recorder.events(),
            vec![Event::DryRunFile {
                path: "big.cbz".into(),
                needs_processing: true
            }]
        );
    }

    #[test]
    fn dry_run_marks_optimized_files_skipped() {
        let fx = Fixture::new(100, |c| c.dry_run = true);
        let pages = optimized_pages();
        let cbz = fx.cbz("book.cbz", &as_entries(&pages));

        let result = fx.pipeline.process_file(&cbz).unwrap();

        assert!(result.skipped);
        assert!(result.skip_reason.is_some());
        assert!(result.analysis.as_ref().unwrap().estimate.is_none());
    }

    #[test]
    fn forced_dry_run_still_never_writes() {
        let fx = Fixture::new(100, |c| {
            c.dry_run = true;
            c.force = true;
        });
        let pages = optimized_pages();
        let cbz = fx.cbz("book.cbz", &as_entries(&pages));

        let result = fx.pipeline.process_file(&cbz).unwrap();

        assert!(result.analysis.is_some());
        assert_eq!(fx.listing(), vec!["book.cbz"]);
    }

    // =========================================================================
    // Processing
    // =========================================================================

    #[test]
    fn oversized_archive_is_replaced_and_backed_up() {
        let fx = Fixture::new(100, |_| {});
        let big = mock_page(4000, 3000, 5000);
        let small = mock_page(1200, 1800, 5000);
        let cbz = fx.cbz(
            "book.cbz",
            &[
                ("p1.jpg", big.as_slice()),
                ("p2.jpg", small.as_slice()),
                ("ComicInfo.xml", b"<ComicInfo/>".as_slice()),
            ],
        );
        let before = fs::read(&cbz).unwrap();

        let result = fx.pipeline.process_file(&cbz).unwrap();

        assert!(!result.skipped);
        assert_eq!(result.output_path.as_deref(), Some(cbz.as_path()));
        assert_eq!(result.images_processed, 1);
        assert_eq!(result.images_skipped, 1);
        assert_eq!(result.images_converted, 0);
        assert!(result.errors.is_empty());
        assert_eq!(result.original_size, before.len() as u64);
        assert_eq!(result.compressed_size, fs::metadata(&cbz).unwrap().len());

        assert_eq!(fs::read(fx.backup_of("book.cbz")).unwrap(), before);
        let mut names = zip_entry_names(&cbz);
        names.sort();
        assert_eq!(names, vec!["ComicInfo.xml", "p1.jpg", "p2.jpg"]);

        let contents = Reader::new().extract(&cbz).unwrap();
        assert_eq!(contents.images[0].data, vec![0xAB; 100]);
        assert_eq!(contents.other_files[0].data, b"<ComicInfo/>");
        assert_eq!(fx.listing(), vec!["book.cbz", "originals_backup"]);
    }

    #[test]
    fn non_jpeg_pages_are_converted_and_renamed() {
        let fx = Fixture::new(100, |_| {});
        let page = mock_page(800, 1200, 500);
        let cbz = fx.cbz("book.cbz", &[("ch1/p1.png", page.as_slice())]);

        let result = fx.pipeline.process_file(&cbz).unwrap();

        assert_eq!(result.images_converted, 1);
        assert_eq!(result.images_processed, 1);
        assert_eq!(zip_entry_names(&cbz), vec!["ch1/p1.jpg"]);
    }

    #[test]
    fn broken_page_is_kept_and_recorded() {
        let fx = Fixture::new(100, |_| {});
        let big = mock_page(4000, 3000, 500);
        let cbz = fx.cbz(
            "book.cbz",
            &[("p1.jpg", big.as_slice()), ("p2.jpg", b"corrupt".as_slice())],
        );

        let result = fx.pipeline.process_file(&cbz).unwrap();

        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].starts_with("p2.jpg: "));
        assert!(result.output_path.is_some());
        let contents = Reader::new().extract(&cbz).unwrap();
        assert_eq!(contents.images[1].data, b"corrupt");
    }

    #[test]
    fn force_processes_optimized_archive() {
        let fx = Fixture::new(1000, |c| c.force = true);
        let pages = optimized_pages();
        let cbz = fx.cbz("book.cbz", &as_entries(&pages));

        let result = fx.pipeline.process_file(&cbz).unwrap();

        assert!(!result.skipped);
        // Re-encodes came out larger, so the original pages are kept.
        assert_eq!(result.images_skipped, 2);
        let contents = Reader::new().extract(&cbz).unwrap();
        assert_eq!(contents.images[0].data, pages[0].1);
        assert!(fx.backup_of("book.cbz").exists());
    }

    #[test]
    fn verbose_reports_each_page() {
        let fx = Fixture::new(100, |c| c.verbose = true);
        let a = mock_page(4000, 3000, 500);
        let b = mock_page(800, 600, 500);
        let cbz = fx.cbz("book.cbz", &[("p1.jpg", a.as_slice()), ("p2.png", b.as_slice())]);

        fx.pipeline.process_file(&cbz).unwrap();

        assert_eq!(
            fx.recorder.events(),
            vec![
                Event::ImageProcessed {
                    image: "p1.jpg".into()
                },
                Event::ImageProcessed {
                    image: "p2.png".into()
                },
            ]
        );
    }

    // =========================================================================
    // Failures
    // =========================================================================

    #[test]
    fn missing_file_is_stat_error() {
        let fx = Fixture::new(100, |_| {});
        let result = fx.pipeline.process_file(&fx.tmp.path().join("missing.cbz"));
        assert!(matches!(result, Err(ProcessError::Stat { .. })));
    }

    #[test]
    fn corrupt_archive_fails_analysis() {
        let fx = Fixture::new(100, |_| {});
        let cbz = fx.tmp.path().join("broken.cbz");
        fs::write(&cbz, b"not a zip").unwrap();

        let result = fx.pipeline.process_file(&cbz);
        assert!(matches!(result, Err(ProcessError::Analysis(_))));
    }

    #[test]
    fn archive_without_pages_fails_verification() {
        let fx = Fixture::new(100, |c| c.force = true);
        let cbz = fx.cbz("empty.cbz", &[("ComicInfo.xml", b"<ComicInfo/>".as_slice())]);
        let before = fs::read(&cbz).unwrap();

        let result = fx.pipeline.process_file(&cbz);

        assert!(matches!(result, Err(ProcessError::Verification(_))));
        assert_eq!(fs::read(&cbz).unwrap(), before);
        assert_eq!(fx.listing(), vec!["empty.cbz"]);
    }

    #[test]
    fn backup_failure_keeps_original_and_removes_temp() {
        let fx = Fixture::new(100, |_| {});
        // A regular file where the backup directory should be.
        fs::write(fx.tmp.path().join("originals_backup"), b"in the way").unwrap();
        let big = mock_page(4000, 3000, 500);
        let cbz = fx.cbz("book.cbz", &[("p1.jpg", big.as_slice())]);
        let before = fs::read(&cbz).unwrap();

        let result = fx.pipeline.process_file(&cbz);

        assert!(matches!(result, Err(ProcessError::Backup(_))));
        assert_eq!(fs::read(&cbz).unwrap(), before);
        assert_eq!(fx.listing(), vec!["book.cbz", "originals_backup"]);
    }

    #[test]
    fn rename_failure_restores_original() {
        let fx = Fixture::new(100, |_| {});
        let original = fx.tmp.path().join("book.cbz");
        fs::write(&original, b"original").unwrap();
        let temp = fx.tmp.path().join("book.cbz.compressed.tmp.cbz");
        fs::write(&temp, b"compressed").unwrap();

        let result = fx.pipeline.commit_with(&temp, &original, |_, _| {
            Err(io::Error::other("disk full"))
        });

        assert!(matches!(result, Err(ProcessError::RenameRestored(_))));
        assert_eq!(fs::read(&original).unwrap(), b"original");
        assert!(!temp.exists());
        assert!(!fx.backup_of("book.cbz").exists());
    }

    #[test]
    fn rename_and_restore_failure_is_critical() {
        let fx = Fixture::new(100, |_| {});
        let original = fx.tmp.path().join("book.cbz");
        fs::write(&original, b"original").unwrap();
        let temp = fx.tmp.path().join("book.cbz.compressed.tmp.cbz");
        fs::write(&temp, b"compressed").unwrap();
        let backup = fx.backup_of("book.cbz");

        let result = fx.pipeline.commit_with(&temp, &original, |_, _| {
            fs::remove_file(&backup).unwrap();
            Err(io::Error::other("disk full"))
        });

        let err = result.unwrap_err();
        assert!(matches!(err, ProcessError::Critical { .. }));
        assert!(err.to_string().starts_with("CRITICAL: "));
        assert_eq!(fs::read(&temp).unwrap(), b"compressed");
    }

    #[test]
    fn commit_moves_temp_into_place() {
        let tmp = TempDir::new().unwrap();
        let mut config = Config::default();
        config.backup.dir = tmp.path().join("bak");
        let pipeline = Pipeline::with_backend(config, MockBackend::with_constant_size(1), NullSink);
        let original = tmp.path().join("book.cbz");
        fs::write(&original, b"original").unwrap();
        let temp = tmp.path().join("book.cbz.compressed.tmp.cbz");
        fs::write(&temp, b"compressed").unwrap();

        pipeline.commit(&temp, &original).unwrap();

        assert_eq!(fs::read(&original).unwrap(), b"compressed");
        assert_eq!(fs::read(tmp.path().join("bak/book.cbz")).unwrap(), b"original");
        assert!(!temp.exists());
        assert_eq!(pipeline.backup.remembered(), 0);
    }

    #[test]
    fn commits_leave_no_backup_records_behind() {
        let tmp = TempDir::new().unwrap();
        let mut config = Config::default();
        config.backup.dir = tmp.path().join("bak");
        let pipeline = Pipeline::with_backend(config, MockBackend::with_constant_size(1), NullSink);

        for i in 0..5 {
            let original = tmp.path().join(format!("book{i}.cbz"));
            fs::write(&original, b"original").unwrap();
            let temp = tmp.path().join(format!("book{i}.compressed.tmp.cbz"));
            fs::write(&temp, b"compressed").unwrap();
            pipeline.commit(&temp, &original).unwrap();
        }

        assert_eq!(pipeline.backup.remembered(), 0);
        assert_eq!(fs::read_dir(tmp.path().join("bak")).unwrap().count(), 5);
    }
}
