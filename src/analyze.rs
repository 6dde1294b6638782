//! Quick header scan of an archive: does it need processing at all?
//!
//! The analyzer never decodes pixels. It reads each page's bytes and asks the
//! backend for header dimensions only, so even large archives are judged in a
//! fraction of the time a full transform would take. The verdict is:
//!
//! - **process** if any page exceeds the max dimension, any page is not a
//!   JPEG, or the archive averages more than the MB-per-page threshold;
//! - **skip** otherwise, with a reason like
//!   `already optimized (0.42 MB/page, max 1800x2700)`.
//!
//! [`Analyzer::estimate_savings`] then projects how much a processed file
//! would shrink using fixed heuristics; only dry-run reporting consumes it.

use crate::archive::{ArchiveError, is_image_entry, is_jpeg_entry, is_junk_entry};
use crate::imaging::{Dimensions, ImageBackend};
use serde::Serialize;
use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Estimated size multiplier after downscaling, on top of the area ratio.
const RESIZE_OVERHEAD: f64 = 1.2;
/// Estimated size multiplier for PNG/GIF/WebP/BMP → JPEG.
const CONVERSION_RATIO: f64 = 0.65;
/// Estimated size multiplier for re-encoding high-bitrate JPEGs.
const REENCODE_RATIO: f64 = 0.75;

/// Projected savings for a file that needs processing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SavingsEstimate {
    pub savings_bytes: u64,
    /// 0–100.
    pub savings_pct: f64,
    /// Human-readable triggers, e.g. `oversized (4000x3000)`.
    pub reasons: Vec<String>,
}

/// Result of a header scan.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisResult {
    pub file_path: PathBuf,
    pub file_size: u64,
    pub page_count: usize,
    pub max_width: u32,
    pub max_height: u32,
    pub mb_per_page: f64,
    pub has_oversized: bool,
    pub has_non_jpeg: bool,
    pub needs_processing: bool,
    /// Set exactly when `needs_processing` is false.
    pub skip_reason: Option<String>,
    /// Set by [`Analyzer::estimate_savings`], only when `needs_processing`.
    pub estimate: Option<SavingsEstimate>,
}

impl AnalysisResult {
    pub fn file_name(&self) -> String {
        self.file_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.file_path.display().to_string())
    }

    pub fn estimated_savings(&self) -> u64 {
        self.estimate.as_ref().map_or(0, |e| e.savings_bytes)
    }
}

/// Header analyzer with fixed thresholds.
#[derive(Debug, Clone, Copy)]
pub struct Analyzer {
    pub max_dimension: u32,
    pub threshold_mb_per_page: f64,
}

impl Analyzer {
    pub fn new(max_dimension: u32, threshold_mb_per_page: f64) -> Self {
        Self {
            max_dimension,
            threshold_mb_per_page,
        }
    }

    /// Scan `path` and compute the process/skip verdict.
    ///
    /// Pages that cannot be read or whose header does not decode still count
    /// toward the page total but contribute no dimensions.
    pub fn analyze(
        &self,
        backend: &impl ImageBackend,
        path: &Path,
    ) -> Result<AnalysisResult, ArchiveError> {
        let file_size = fs::metadata(path)
            .map_err(|e| ArchiveError::io(path, e))?
            .len();
        let file = File::open(path).map_err(|e| ArchiveError::io(path, e))?;
        let mut archive = zip::ZipArchive::new(file).map_err(|source| ArchiveError::Open {
            path: path.display().to_string(),
            source,
        })?;

        let mut result = AnalysisResult {
            file_path: path.to_path_buf(),
            file_size,
            page_count: 0,
            max_width: 0,
            max_height: 0,
            mb_per_page: 0.0,
            has_oversized: false,
            has_non_jpeg: false,
            needs_processing: false,
            skip_reason: None,
            estimate: None,
        };

        for i in 0..archive.len() {
            let Ok(mut entry) = archive.by_index(i) else {
                continue;
            };
            let name = entry.name().to_string();
            if entry.is_dir() || is_junk_entry(&name) || !is_image_entry(&name) {
                continue;
            }

            result.page_count += 1;
            if !is_jpeg_entry(&name) {
                result.has_non_jpeg = true;
            }

            let mut data = Vec::new();
            if entry.read_to_end(&mut data).is_err() {
                continue;
            }
            let Ok(dims) = backend.identify(&data) else {
                log::debug!("{}: unreadable header for {name}", path.display());
                continue;
            };

            result.max_width = result.max_width.max(dims.width);
            result.max_height = result.max_height.max(dims.height);
            if dims.exceeds(self.max_dimension) {
                result.has_oversized = true;
            }
        }

        if result.page_count > 0 {
            result.mb_per_page = file_size as f64 / result.page_count as f64 / BYTES_PER_MB;
        }

        result.needs_processing = result.has_oversized
            || result.has_non_jpeg
            || result.mb_per_page > self.threshold_mb_per_page;
        if !result.needs_processing {
            result.skip_reason = Some(format!(
                "already optimized ({:.2} MB/page, max {}x{})",
                result.mb_per_page, result.max_width, result.max_height
            ));
        }

        Ok(result)
    }

    /// Fill in the savings projection. No-op for files that will be skipped.
    ///
    /// Multipliers apply in order: downscale (area ratio plus 20% overhead),
    /// format conversion, and plain re-encode only when neither of the first
    /// two triggered.
    pub fn estimate_savings(&self, result: &mut AnalysisResult) {
        if !result.needs_processing {
            return;
        }

        let current = result.file_size as f64;
        let mut estimated = current;
        let mut reasons = Vec::new();

        if result.has_oversized {
            let largest = Dimensions::new(result.max_width, result.max_height);
            let scale = self.max_dimension as f64 / largest.long_edge() as f64;
            if scale < 1.0 {
                estimated *= scale * scale * RESIZE_OVERHEAD;
            }
            reasons.push(format!(
                "oversized ({}x{})",
                result.max_width, result.max_height
            ));
        }

        if result.has_non_jpeg {
            estimated *= CONVERSION_RATIO;
            reasons.push("non-JPEG conversion".to_string());
        }

        if result.mb_per_page > self.threshold_mb_per_page
            && !result.has_oversized
            && !result.has_non_jpeg
        {
            estimated *= REENCODE_RATIO;
            reasons.push(format!("high quality ({:.1} MB/page)", result.mb_per_page));
        }

        let savings = (current - estimated).max(0.0);
        let savings_pct = if current > 0.0 {
            savings / current * 100.0
        } else {
            0.0
        };

        result.estimate = Some(SavingsEstimate {
            savings_bytes: savings as u64,
            savings_pct,
            reasons,
        });
    }

    /// One-line verdict, e.g. `[PROCESS] book.cbz - non-JPEG images`.
    pub fn format_analysis(&self, result: &AnalysisResult) -> String {
        let name = result.file_name();
        if !result.needs_processing {
            let reason = result.skip_reason.as_deref().unwrap_or_default();
            return format!("[SKIP] {name} - {reason}");
        }

        let mut reasons = Vec::new();
        if result.has_oversized {
            reasons.push(format!(
                "oversized images (max {}x{})",
                result.max_width, result.max_height
            ));
        }
        if result.has_non_jpeg {
            reasons.push("non-JPEG images".to_string());
        }
        if result.mb_per_page > self.threshold_mb_per_page {
            reasons.push(format!(
                "{:.2} MB/page > {:.2} threshold",
                result.mb_per_page, self.threshold_mb_per_page
            ));
        }

        if reasons.is_empty() {
            format!("[PROCESS] {name}")
        } else {
            format!("[PROCESS] {name} - {}", reasons.join(", "))
        }
    }
}

/// Aggregated dry-run projection over many analyses.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DryRunSummary {
    pub files_to_process: Vec<AnalysisResult>,
    pub files_to_skip: Vec<AnalysisResult>,
    pub total_current_size: u64,
    pub total_savings: u64,
    pub total_estimated_new: u64,
    pub savings_pct: f64,
}

impl DryRunSummary {
    pub fn from_results<'a>(results: impl IntoIterator<Item = &'a AnalysisResult>) -> Self {
        let mut summary = Self::default();
        for result in results {
            if result.needs_processing {
                summary.total_current_size += result.file_size;
                summary.total_savings += result.estimated_savings();
                summary.files_to_process.push(result.clone());
            } else {
                summary.files_to_skip.push(result.clone());
            }
        }

        summary.total_estimated_new = summary
            .total_current_size
            .saturating_sub(summary.total_savings);
        if summary.total_current_size > 0 {
            summary.savings_pct =
                summary.total_savings as f64 / summary.total_current_size as f64 * 100.0;
        }
        summary
    }
}
