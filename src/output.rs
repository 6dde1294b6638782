//! Console output for a run.
//!
//! One line per archive, written when the archive completes so that lines
//! from concurrent workers never interleave:
//!
//! ```text
//! [1/3] Saga Vol 01.cbz                            182.4 MB ->   61.0 MB  (66.6% saved, 212 images, 4.2s)
//! [2/3] Saga Vol 02.cbz                             [SKIP] already optimized (0.41 MB/page, max 1200x1800)
//! [3/3] broken.cbz                                  [FAIL] analysis failed: invalid Zip archive
//!
//! === Summary ===
//! Total files:    3
//! ...
//! ```
//!
//! Dry runs print the analysis verdict and estimate instead, followed by a
//! `=== DRY RUN SUMMARY ===` block.
//!
//! # Architecture
//!
//! Each line or block has a `format_*` function that returns strings and
//! does no I/O. [`ConsoleReporter`] is the [`ProgressSink`] that writes them
//! to any `io::Write` (stdout in the CLI, a `Vec<u8>` in tests).

use crate::analyze::DryRunSummary;
use crate::report::ProgressSink;
use crate::types::{BatchResult, FileResult};
use std::io::Write;
use std::path::Path;
use std::time::Duration;

/// Width of the file-name column.
const NAME_WIDTH: usize = 42;

// ============================================================================
// Helpers
// ============================================================================

/// Binary-prefixed size: `512 B`, `1.5 KB`, `3.2 MB`.
pub fn format_bytes(bytes: u64) -> String {
    const UNIT: u64 = 1024;
    if bytes < UNIT {
        return format!("{bytes} B");
    }
    let mut div = UNIT;
    let mut exp = 0;
    let mut n = bytes / UNIT;
    while n >= UNIT {
        div *= UNIT;
        exp += 1;
        n /= UNIT;
    }
    let prefix = ['K', 'M', 'G', 'T', 'P', 'E'][exp];
    format!("{:.1} {prefix}B", bytes as f64 / div as f64)
}

/// Cut `s` to at most `max` characters, ending in `...` when shortened.
fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let kept: String = s.chars().take(max.saturating_sub(3)).collect();
    format!("{kept}...")
}

fn savings_pct(original: u64, new: u64) -> f64 {
    if original == 0 {
        return 0.0;
    }
    (original as f64 - new as f64) / original as f64 * 100.0
}

fn format_duration(d: Duration) -> String {
    format!("{:.1}s", d.as_secs_f64())
}

fn file_name(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

// ============================================================================
// Lines and blocks
// ============================================================================

/// Completion line for one archive.
pub fn format_file_result(result: &FileResult) -> String {
    let progress = format!("[{}/{}]", result.index, result.total);
    let name = truncate(&result.file_name(), NAME_WIDTH);

    if let Some(analysis) = &result.analysis {
        let size = format_bytes(analysis.file_size);
        return match &analysis.estimate {
            Some(estimate) if analysis.needs_processing => {
                let savings = format!(
                    "~{} ({:.0}%)",
                    format_bytes(estimate.savings_bytes),
                    estimate.savings_pct
                );
                format!(
                    "{progress} {name:<NAME_WIDTH$} {size:>10}  {savings:>15}  {}",
                    estimate.reasons.join(", ")
                )
            }
            _ => format!(
                "{progress} {name:<NAME_WIDTH$} {size:>10}  {:>15}  [SKIP] {}",
                "-",
                analysis.skip_reason.as_deref().unwrap_or_default()
            ),
        };
    }

    if result.skipped {
        return format!(
            "{progress} {name:<NAME_WIDTH$}  [SKIP] {}",
            result.skip_reason.as_deref().unwrap_or_default()
        );
    }

    if result.output_path.is_none() {
        let error = result.errors.first().map(String::as_str).unwrap_or("unknown error");
        return format!("{progress} {name:<NAME_WIDTH$}  [FAIL] {error}");
    }

    let mut line = format!(
        "{progress} {name:<NAME_WIDTH$} {:>10} -> {:>10}  ({:.1}% saved, {} images, {})",
        format_bytes(result.original_size),
        format_bytes(result.compressed_size),
        savings_pct(result.original_size, result.compressed_size),
        result.images_processed,
        format_duration(result.duration),
    );
    if !result.errors.is_empty() {
        line.push_str(&format!(" [{} page errors]", result.errors.len()));
    }
    line
}

/// Verbose per-page line.
pub fn format_image_line(image_path: &str, original_size: u64, new_size: u64) -> String {
    format!(
        "    {}: {} -> {} ({:.1}% saved)",
        file_name(image_path),
        format_bytes(original_size),
        format_bytes(new_size),
        savings_pct(original_size, new_size)
    )
}

pub fn format_batch_summary(batch: &BatchResult) -> Vec<String> {
    let mut lines = vec![
        String::new(),
        "=== Summary ===".to_string(),
        format!("Total files:    {}", batch.total_files),
        format!("Processed:      {}", batch.processed_files),
        format!("Skipped:        {}", batch.skipped_files),
        format!("Failed:         {}", batch.failed_files),
    ];
    if batch.total_original > 0 {
        lines.push(format!("Original size:  {}", format_bytes(batch.total_original)));
        lines.push(format!("Compressed:     {}", format_bytes(batch.total_compressed)));
        lines.push(format!(
            "Savings:        {} ({:.1}%)",
            format_bytes(batch.total_saved()),
            savings_pct(batch.total_original, batch.total_compressed)
        ));
    }
    lines.push(format!("Duration:       {}", format_duration(batch.total_duration)));
    lines
}

pub fn format_dry_run_summary(summary: &DryRunSummary) -> Vec<String> {
    let mut lines = vec![
        String::new(),
        "=== DRY RUN SUMMARY ===".to_string(),
        format!("Files to process: {}", summary.files_to_process.len()),
        format!("Files to skip:    {}", summary.files_to_skip.len()),
    ];
    if !summary.files_to_process.is_empty() {
        lines.extend([
            String::new(),
            "ESTIMATED TOTALS:".to_string(),
            format!("  Current size:      {}", format_bytes(summary.total_current_size)),
            format!("  Estimated after:   ~{}", format_bytes(summary.total_estimated_new)),
            format!(
                "  Estimated savings: ~{} ({:.1}%)",
                format_bytes(summary.total_savings),
                summary.savings_pct
            ),
            String::new(),
            "Note: Estimates are approximate. Actual savings may vary.".to_string(),
        ]);
    }
    lines
}

// ============================================================================
// Sink
// ============================================================================

/// Progress sink printing the lines above.
///
/// Write errors (a closed pipe, say) are ignored: losing console output must
/// never fail a run.
pub struct ConsoleReporter<W: Write + Send> {
    verbose: bool,
    out: W,
}

impl<W: Write + Send> ConsoleReporter<W> {
    pub fn new(verbose: bool, out: W) -> Self {
        Self { verbose, out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn line(&mut self, line: &str) {
        let _ = writeln!(self.out, "{line}");
    }
}

impl<W: Write + Send> ProgressSink for ConsoleReporter<W> {
    fn on_file_start(&mut self, path: &Path, index: usize, total: usize) {
        log::debug!("[{index}/{total}] start {}", path.display());
    }

    fn on_image_processed(&mut self, image_path: &str, original_size: u64, new_size: u64) {
        if self.verbose {
            self.line(&format_image_line(image_path, original_size, new_size));
        }
    }

    fn on_file_complete(&mut self, result: &FileResult) {
        self.line(&format_file_result(result));
        let _ = self.out.flush();
    }

    fn on_batch_complete(&mut self, result: &BatchResult) {
        for line in format_batch_summary(result) {
            self.line(&line);
        }
        let _ = self.out.flush();
    }

    fn on_dry_run_complete(&mut self, summary: &DryRunSummary) {
        for line in format_dry_run_summary(summary) {
            self.line(&line);
        }
        let _ = self.out.flush();
    }
}
