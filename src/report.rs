//! Progress reporting seam.
//!
//! The pipeline never prints. Everything a user might want to see goes
//! through a [`ProgressSink`]; every callback has a no-op default, so a sink
//! implements only what it cares about and [`NullSink`] is empty.
//!
//! Sinks take `&mut self` and only need to be `Send`. The pipeline owns its
//! sink inside a [`SyncSink`], one mutex that serializes every callback, so
//! concurrent workers never interleave output and sinks never need their own
//! locking.

use crate::analyze::{AnalysisResult, DryRunSummary};
use crate::types::{BatchResult, FileResult};
use std::path::Path;
use std::sync::{Mutex, PoisonError};

/// Callbacks fired while a run progresses.
pub trait ProgressSink: Send {
    /// A file is about to be processed (1-based `index` of `total`).
    fn on_file_start(&mut self, _path: &Path, _index: usize, _total: usize) {}

    /// Analysis decided the file needs no work.
    fn on_file_skipped(&mut self, _path: &Path, _reason: &str) {}

    /// One page was transformed. Only fired in verbose mode.
    fn on_image_processed(&mut self, _image_path: &str, _original_size: u64, _new_size: u64) {}

    /// A file finished: processed, skipped or failed.
    fn on_file_complete(&mut self, _result: &FileResult) {}

    /// A non-dry-run batch finished.
    fn on_batch_complete(&mut self, _result: &BatchResult) {}

    /// Dry-run analysis of one file is ready.
    fn on_dry_run_file(&mut self, _analysis: &AnalysisResult) {}

    /// A dry-run batch finished.
    fn on_dry_run_complete(&mut self, _summary: &DryRunSummary) {}
}

/// Sink that ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl ProgressSink for NullSink {}

/// Mutex adapter that makes any sink shareable between workers.
pub struct SyncSink {
    inner: Mutex<Box<dyn ProgressSink>>,
}

impl SyncSink {
    pub fn new(sink: impl ProgressSink + 'static) -> Self {
        Self::from_box(Box::new(sink))
    }

    pub fn from_box(sink: Box<dyn ProgressSink>) -> Self {
        Self {
            inner: Mutex::new(sink),
        }
    }

    /// Run `f` with exclusive access to the wrapped sink.
    pub fn with<R>(&self, f: impl FnOnce(&mut dyn ProgressSink) -> R) -> R {
        // A sink that panicked mid-callback is still usable for later lines.
        let mut guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        f(guard.as_mut())
    }

    pub fn file_start(&self, path: &Path, index: usize, total: usize) {
        self.with(|s| s.on_file_start(path, index, total));
    }

    pub fn file_skipped(&self, path: &Path, reason: &str) {
        self.with(|s| s.on_file_skipped(path, reason));
    }

    pub fn image_processed(&self, image_path: &str, original_size: u64, new_size: u64) {
        self.with(|s| s.on_image_processed(image_path, original_size, new_size));
    }

    pub fn file_complete(&self, result: &FileResult) {
        self.with(|s| s.on_file_complete(result));
    }

    pub fn batch_complete(&self, result: &BatchResult) {
        self.with(|s| s.on_batch_complete(result));
    }

    pub fn dry_run_file(&self, analysis: &AnalysisResult) {
        self.with(|s| s.on_dry_run_file(analysis));
    }

    pub fn dry_run_complete(&self, summary: &DryRunSummary) {
        self.with(|s| s.on_dry_run_complete(summary));
    }
}

impl Default for SyncSink {
    fn default() -> Self {
        Self::new(NullSink)
    }
}

impl std::fmt::Debug for SyncSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncSink").finish_non_exhaustive()
    }
}
