//! Batch orchestration: scan a directory and run every archive through the
//! [`Pipeline`], sequentially or on a worker pool.
//!
//! ```text
//!              jobs (bounded)            results (bounded)
//! producer ──────────────────→ worker 1 ─┐
//!                         ├──→ worker 2 ─┼──────────────→ orchestrator
//!                         └──→ worker N ─┘                 (records, reports)
//! ```
//!
//! Both channels hold at most N items, so memory stays flat however many
//! archives are queued. A coordinator joins the workers before the last
//! result sender is dropped; the orchestrator's receive loop ends exactly
//! when every job has been answered. All threads are scoped, so the pipeline
//! is borrowed rather than reference-counted.
//!
//! Results are folded into the [`BatchResult`] in completion order; with one
//! worker that is also scan order.

use crate::analyze::DryRunSummary;
use crate::imaging::ImageBackend;
use crate::process::{Pipeline, ProcessError};
use crate::scan::{ScanError, ScanOptions, scan};
use crate::types::{BatchResult, FileResult};
use crossbeam_channel::bounded;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Instant;

/// One queued archive. `index` is 1-based.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileJob {
    pub path: PathBuf,
    pub index: usize,
    pub total: usize,
}

struct JobOutcome {
    job: FileJob,
    result: Result<FileResult, ProcessError>,
}

impl<B: ImageBackend> Pipeline<B> {
    /// Process a directory tree, or a single archive if `path` is a file.
    pub fn process_path(&self, path: &Path) -> Result<BatchResult, ScanError> {
        if path.is_dir() {
            self.process_directory(path)
        } else {
            Ok(self.run_batch(vec![path.to_path_buf()]))
        }
    }

    /// Scan `dir` for archives and process all of them.
    pub fn process_directory(&self, dir: &Path) -> Result<BatchResult, ScanError> {
        let options = ScanOptions {
            recursive: self.config.scan.recursive,
            backup_dir: &self.config.backup.dir,
            skip_patterns: &self.config.scan.skip_patterns,
        };
        let files = scan(dir, &options)?;
        log::info!("{} archives found under {}", files.len(), dir.display());
        Ok(self.run_batch(files))
    }

    /// Process `files` in order. Never fails as a whole: per-file errors
    /// are counted and reported.
    pub fn run_batch(&self, files: Vec<PathBuf>) -> BatchResult {
        let start = Instant::now();
        let total = files.len();
        let jobs: Vec<FileJob> = files
            .into_iter()
            .enumerate()
            .map(|(i, path)| FileJob {
                path,
                index: i + 1,
                total,
            })
            .collect();

        let mut batch = BatchResult::new(total);
        let workers = self.config.effective_workers().min(total).max(1);
        log::debug!("processing {total} archives with {workers} workers");

        if workers == 1 {
            for job in jobs {
                let outcome = self.run_job(job);
                self.collect(&mut batch, outcome);
            }
        } else {
            self.run_pool(jobs, workers, &mut batch);
        }

        batch.total_duration = start.elapsed();
        if self.config.dry_run {
            let summary = DryRunSummary::from_results(batch.analyses());
            self.sink.dry_run_complete(&summary);
        } else {
            self.sink.batch_complete(&batch);
        }
        batch
    }

    fn run_pool(&self, jobs: Vec<FileJob>, workers: usize, batch: &mut BatchResult) {
        let (job_tx, job_rx) = bounded::<FileJob>(workers);
        let (result_tx, result_rx) = bounded::<JobOutcome>(workers);

        thread::scope(|s| {
            s.spawn(move || {
                for job in jobs {
                    if job_tx.send(job).is_err() {
                        break;
                    }
                }
            });

            let handles: Vec<_> = (0..workers)
                .map(|_| {
                    let job_rx = job_rx.clone();
                    let result_tx = result_tx.clone();
                    s.spawn(move || {
                        for job in job_rx {
                            if result_tx.send(self.run_job(job)).is_err() {
                                break;
                            }
                        }
                    })
                })
                .collect();
            drop(job_rx);

            s.spawn(move || {
                for handle in handles {
                    if handle.join().is_err() {
                        log::error!("worker thread panicked");
                    }
                }
                drop(result_tx);
            });

            for outcome in result_rx {
                self.collect(batch, outcome);
            }
        });
    }

    fn run_job(&self, job: FileJob) -> JobOutcome {
        self.sink.file_start(&job.path, job.index, job.total);
        let result = self.process_file(&job.path).map(|mut result| {
            result.index = job.index;
            result.total = job.total;
            result
        });
        JobOutcome { job, result }
    }

    fn collect(&self, batch: &mut BatchResult, outcome: JobOutcome) {
        let JobOutcome { job, result } = outcome;
        match result {
            Ok(result) => {
                self.sink.file_complete(&result);
                batch.record(result, false);
            }
            Err(e) => {
                log::error!("{}: {e}", job.path.display());
                let mut failed = FileResult::failed(job.path, &e);
                failed.index = job.index;
                failed.total = job.total;
                self.sink.file_complete(&failed);
                batch.record(failed, true);
            }
        }
    }
}
