//! Run configuration.
//!
//! Handles loading, validating, and merging `cbz-compress.toml` files.
//! Resolution happens once, before the pipeline is built, in layers:
//!
//! 1. stock defaults ([`Config::default`]);
//! 2. a config file: `--config <FILE>`, or `cbz-compress.toml` in the current
//!    directory when present;
//! 3. command-line overrides.
//!
//! Each layer is a sparse TOML table merged with [`merge_toml`], so a file
//! only needs the keys it wants to change.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [images]
//! max_dimension = 1800        # Longest allowed page edge in pixels
//! quality = 90                # JPEG quality (1-100)
//!
//! [analysis]
//! threshold_mb_per_page = 1.5 # Re-encode archives heavier than this
//!
//! [backup]
//! dir = "originals_backup"    # Where replaced originals are moved
//!
//! [scan]
//! recursive = true
//! skip_patterns = ["._*", ".DS_Store"]
//!
//! [processing]
//! workers = 4                 # Parallel archives (omit for auto = CPU cores)
//! ```
//!
//! Unknown keys are rejected to catch typos early. The per-invocation flags
//! (`force`, `dry_run`, `verbose`) are command-line only.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// File looked up in the current directory when no `--config` is given.
pub const CONFIG_FILE_NAME: &str = "cbz-compress.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Fully resolved configuration handed to the pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub images: ImagesConfig,
    pub analysis: AnalysisConfig,
    pub backup: BackupConfig,
    pub scan: ScanConfig,
    pub processing: ProcessingConfig,
    /// Skip analysis and process every archive.
    #[serde(skip)]
    pub force: bool,
    /// Analyze and report only; never write.
    #[serde(skip)]
    pub dry_run: bool,
    /// Report every page.
    #[serde(skip)]
    pub verbose: bool,
}

impl Config {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=100).contains(&self.images.quality) {
            return Err(ConfigError::Validation(
                "images.quality must be 1-100".into(),
            ));
        }
        if self.images.max_dimension == 0 {
            return Err(ConfigError::Validation(
                "images.max_dimension must be at least 1".into(),
            ));
        }
        let threshold = self.analysis.threshold_mb_per_page;
        if threshold.is_nan() || threshold < 0.0 {
            return Err(ConfigError::Validation(
                "analysis.threshold_mb_per_page must be non-negative".into(),
            ));
        }
        if self.processing.workers == Some(0) {
            return Err(ConfigError::Validation(
                "processing.workers must be at least 1".into(),
            ));
        }
        if self.backup.dir.as_os_str().is_empty() {
            return Err(ConfigError::Validation("backup.dir must not be empty".into()));
        }
        for pattern in &self.scan.skip_patterns {
            globset::Glob::new(pattern).map_err(|e| {
                ConfigError::Validation(format!("scan.skip_patterns: invalid pattern {pattern:?}: {e}"))
            })?;
        }
        Ok(())
    }

    /// Worker count actually used: the configured value, or all cores.
    pub fn effective_workers(&self) -> usize {
        effective_workers(&self.processing)
    }
}

/// Page transform settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ImagesConfig {
    /// Pages with either edge above this are fit-resized.
    pub max_dimension: u32,
    /// JPEG quality (1-100) of the first encode attempt.
    pub quality: u32,
}

impl Default for ImagesConfig {
    fn default() -> Self {
        Self {
            max_dimension: 1800,
            quality: 90,
        }
    }
}

/// Skip/process verdict settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AnalysisConfig {
    /// Archives averaging more than this many MB per page are re-encoded.
    pub threshold_mb_per_page: f64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            threshold_mb_per_page: 1.5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BackupConfig {
    pub dir: PathBuf,
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("originals_backup"),
        }
    }
}

/// Directory walk settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScanConfig {
    pub recursive: bool,
    /// Glob patterns matched against file names; matches are never processed.
    pub skip_patterns: Vec<String>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            recursive: true,
            skip_patterns: vec!["._*".to_string(), ".DS_Store".to_string()],
        }
    }
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Number of archives processed concurrently.
    /// When absent, defaults to the number of CPU cores.
    pub workers: Option<usize>,
}

/// Resolve the effective worker count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `n` as given
pub fn effective_workers(config: &ProcessingConfig) -> usize {
    config.workers.unwrap_or_else(|| {
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
    })
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the canonical representation of all default values, used as the
/// base layer for merging user overrides on top.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    Ok(toml::Value::try_from(Config::default())?)
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Read a TOML file as a raw value.
pub fn load_raw_config(path: &Path) -> Result<toml::Value, ConfigError> {
    let content = fs::read_to_string(path)?;
    Ok(toml::from_str(&content)?)
}

/// Find the runtime config layer.
///
/// An explicit path must exist. Without one, `cbz-compress.toml` in `cwd` is
/// used when present and silently ignored otherwise.
pub fn find_config_layer(
    explicit: Option<&Path>,
    cwd: &Path,
) -> Result<Option<toml::Value>, ConfigError> {
    match explicit {
        Some(path) => load_raw_config(path).map(Some),
        None => {
            let implicit = cwd.join(CONFIG_FILE_NAME);
            if implicit.is_file() {
                load_raw_config(&implicit).map(Some)
            } else {
                Ok(None)
            }
        }
    }
}

/// Merge overlays onto the stock defaults in order, then deserialize and
/// validate.
pub fn resolve_config(
    overlays: impl IntoIterator<Item = toml::Value>,
) -> Result<Config, ConfigError> {
    let merged = overlays
        .into_iter()
        .fold(stock_defaults_value()?, merge_toml);
    let config: Config = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from an explicit file or `cbz-compress.toml` in `cwd`, with
/// `overrides` (a sparse table shaped like the file) applied last.
pub fn load_config(
    explicit: Option<&Path>,
    cwd: &Path,
    overrides: toml::Value,
) -> Result<Config, ConfigError> {
    let file_layer = find_config_layer(explicit, cwd)?;
    resolve_config(file_layer.into_iter().chain([overrides]))
}

/// Returns a fully-commented stock `cbz-compress.toml` with all keys and
/// explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# cbz-compress Configuration
# ==========================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults.
#
# The file is read from --config <FILE>, or from cbz-compress.toml in the
# current directory. Command-line flags override anything set here.
# Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Page transform
# ---------------------------------------------------------------------------
[images]
# Pages whose width or height exceeds this are resized to fit a
# max_dimension x max_dimension box, keeping aspect ratio.
max_dimension = 1800

# JPEG quality (1-100) for re-encoded pages. When a page comes out larger
# than the original, lower qualities are tried in steps of 5 down to 60.
quality = 90

# ---------------------------------------------------------------------------
# Skip/process verdict
# ---------------------------------------------------------------------------
[analysis]
# Archives made only of in-bounds JPEG pages are still re-encoded when they
# average more than this many megabytes per page.
threshold_mb_per_page = 1.5

# ---------------------------------------------------------------------------
# Backups
# ---------------------------------------------------------------------------
[backup]
# Originals are moved here (flat, collision-safe names) before replacement.
# Relative paths resolve against the current directory.
dir = "originals_backup"

# ---------------------------------------------------------------------------
# Directory scan
# ---------------------------------------------------------------------------
[scan]
# Descend into subdirectories.
recursive = true

# File names matching any of these globs are never processed.
skip_patterns = ["._*", ".DS_Store"]

# ---------------------------------------------------------------------------
# Parallel processing
# ---------------------------------------------------------------------------
[processing]
# Number of archives processed at once. Omit for auto (= number of CPU cores).
# workers = 4
"##
}
