//! # cbz-compress
//!
//! Batch compressor for CBZ comic archives. Pages are downscaled to fit a
//! maximum edge, non-JPEG pages are converted to JPEG, and the compressed
//! archive replaces the original only after it has been verified, with the
//! original kept in a backup directory.
//!
//! # Architecture
//!
//! Every archive goes through the same per-file state machine
//! ([`process::Pipeline::process_file`]):
//!
//! ```text
//! analyze → skip | extract → transform pages → write temp → verify
//!         → back up original → rename temp over original
//! ```
//!
//! A directory run ([`batch`]) scans for archives and fans them out over a
//! bounded worker pool. The pipeline never prints; it reports through a
//! [`report::ProgressSink`], and the CLI plugs in the console reporter from
//! [`output`].
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`archive`] | Zip reading (junk filtering, natural page order) and atomic writing |
//! | [`analyze`] | Header-only verdict (process or skip) and savings estimate |
//! | [`imaging`] | Codec backend trait, fit-resize math, per-page transform with quality retry |
//! | [`backup`] | Collision-safe move to the backup directory and restore |
//! | [`process`] | The per-file state machine |
//! | [`batch`] | Directory scan plus worker pool |
//! | [`scan`] | Candidate archive discovery |
//! | [`report`] | Progress sink trait and its mutex adapter |
//! | [`output`] | Console formatting |
//! | [`config`] | Layered `cbz-compress.toml` loading and validation |
//! | [`types`] | Per-file and batch results |
//! | [`naming`] | Natural sort |
//!
//! # Design Decisions
//!
//! ## The Original Is Never Touched Until the Copy Is Proven
//!
//! The compressed archive is written next to the original under a temporary
//! name and read back before anything else happens. Only then is the
//! original moved to the backup directory and the copy renamed into place.
//! A failed rename moves the original back.
//!
//! ## Never Make a Page Worse
//!
//! A JPEG page that needed no resize and could not be re-encoded smaller is
//! written back byte-for-byte. Pages that fail to decode are also kept as
//! they were; the archive is still processed and the error is reported.
//!
//! ## One Lock Around the Sink
//!
//! Workers report concurrently, but sinks are plain `&mut self` objects. The
//! pipeline wraps its sink in [`report::SyncSink`], so callbacks run one at a
//! time and console lines never interleave.

pub mod analyze;
pub mod archive;
pub mod backup;
pub mod batch;
pub mod config;
pub mod imaging;
pub mod naming;
pub mod output;
pub mod process;
pub mod report;
pub mod scan;
pub mod types;

#[cfg(test)]
pub(crate) mod test_helpers;
