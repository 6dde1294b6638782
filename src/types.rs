//! Result types shared by the per-file pipeline, the batch orchestrator and
//! the reporters.
//!
//! Both serialize to JSON so a run can leave a machine-readable report
//! (`--report <FILE>`).

use crate::analyze::AnalysisResult;
use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;

/// Outcome of one archive.
#[derive(Debug, Clone, Default, Serialize)]
pub struct FileResult {
    pub source_path: PathBuf,
    /// Set once the compressed archive has replaced the original.
    pub output_path: Option<PathBuf>,
    pub original_size: u64,
    pub compressed_size: u64,
    /// Pages that were resized or converted.
    pub images_processed: usize,
    /// Pages written back unchanged in dimensions and format.
    pub images_skipped: usize,
    /// Pages converted to JPEG from another format.
    pub images_converted: usize,
    pub skipped: bool,
    pub skip_reason: Option<String>,
    /// Non-fatal per-page errors, or the single fatal error of a failed file.
    pub errors: Vec<String>,
    pub duration: Duration,
    /// Present in dry-run mode.
    pub analysis: Option<AnalysisResult>,
    /// 1-based position in the batch.
    pub index: usize,
    pub total: usize,
}

impl FileResult {
    pub fn new(source_path: impl Into<PathBuf>) -> Self {
        Self {
            source_path: source_path.into(),
            ..Self::default()
        }
    }

    /// Result for a file whose processing failed outright.
    pub fn failed(source_path: impl Into<PathBuf>, error: impl ToString) -> Self {
        Self {
            errors: vec![error.to_string()],
            ..Self::new(source_path)
        }
    }

    pub fn file_name(&self) -> String {
        self.source_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.source_path.display().to_string())
    }
}

/// Outcome of a whole run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchResult {
    /// In completion order.
    pub results: Vec<FileResult>,
    pub total_files: usize,
    /// Sum over processed files only.
    pub total_original: u64,
    /// Sum over processed files only.
    pub total_compressed: u64,
    pub processed_files: usize,
    pub skipped_files: usize,
    pub failed_files: usize,
    pub total_duration: Duration,
}

impl BatchResult {
    pub fn new(total_files: usize) -> Self {
        Self {
            results: Vec::with_capacity(total_files),
            total_files,
            ..Self::default()
        }
    }

    /// Fold one file outcome into the totals. `failed` means the file's
    /// pipeline returned an error rather than a result.
    pub fn record(&mut self, result: FileResult, failed: bool) {
        if failed {
            self.failed_files += 1;
        } else if result.skipped {
            self.skipped_files += 1;
        } else {
            self.processed_files += 1;
            self.total_original += result.original_size;
            self.total_compressed += result.compressed_size;
        }
        self.results.push(result);
    }

    pub fn total_saved(&self) -> u64 {
        self.total_original.saturating_sub(self.total_compressed)
    }

    pub fn has_failures(&self) -> bool {
        self.failed_files > 0
    }

    /// Analyses embedded by dry-run processing, in result order.
    pub fn analyses(&self) -> impl Iterator<Item = &AnalysisResult> {
        self.results.iter().filter_map(|r| r.analysis.as_ref())
    }
}
