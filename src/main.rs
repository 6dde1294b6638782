use cbz_compress::config::{self, Config};
use cbz_compress::output::ConsoleReporter;
use cbz_compress::process::Pipeline;
use clap::{CommandFactory, Parser, Subcommand};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "cbz-compress")]
#[command(about = "Compress CBZ comic archives for tablet reading")]
#[command(long_about = "\
Compress CBZ comic archives for tablet reading

Every archive is analyzed first; archives that are already small enough are
left alone. The rest have their pages downscaled to fit the max dimension and
re-encoded as JPEG. The original archive is moved to the backup directory
before the compressed one takes its place.

Examples:

  cbz-compress comic.cbz
  cbz-compress ./comics --dry-run --verbose
  cbz-compress ./comics -q 85 --max-dim 1600
  cbz-compress ./comics --force -w 4

Settings are read from cbz-compress.toml in the current directory (or
--config <FILE>); flags override the file. Run 'cbz-compress gen-config' to
print a documented config file.")]
#[command(version)]
#[command(args_conflicts_with_subcommands = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// CBZ file or directory of CBZ files
    input: Option<PathBuf>,

    /// Directory that receives the original archives
    #[arg(short, long, value_name = "DIR")]
    backup: Option<PathBuf>,

    /// Longest allowed page edge in pixels
    #[arg(long, value_name = "PX")]
    max_dim: Option<u32>,

    /// JPEG quality (1-100)
    #[arg(short, long)]
    quality: Option<u32>,

    /// Process archives averaging more than this many MB per page
    #[arg(short, long, value_name = "MB")]
    threshold: Option<f64>,

    /// Only look at the top level of the input directory
    #[arg(long)]
    no_recursive: bool,

    /// Process every archive, skipping analysis
    #[arg(short, long)]
    force: bool,

    /// Analyze and estimate savings without modifying anything
    #[arg(long)]
    dry_run: bool,

    /// Print a line per page and info-level logs
    #[arg(short, long)]
    verbose: bool,

    /// Number of archives processed in parallel (default: CPU count)
    #[arg(short, long)]
    workers: Option<usize>,

    /// File-name glob to ignore; repeat for several
    #[arg(long, value_name = "PATTERN")]
    skip: Vec<String>,

    /// Config file to use instead of ./cbz-compress.toml
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Write the batch result as JSON
    #[arg(long, value_name = "FILE")]
    report: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Print a stock cbz-compress.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if let Some(Command::GenConfig) = cli.command {
        print!("{}", config::stock_config_toml());
        return Ok(());
    }

    env_logger::Builder::new()
        .filter_level(if cli.verbose {
            log::LevelFilter::Info
        } else {
            log::LevelFilter::Warn
        })
        .parse_default_env()
        .format_timestamp(None)
        .init();

    let Some(input) = cli.input.as_deref() else {
        Cli::command()
            .error(
                clap::error::ErrorKind::MissingRequiredArgument,
                "an input file or directory is required",
            )
            .exit();
    };

    let config = resolve_config(&cli)?;
    let verbose = config.verbose;
    let dry_run = config.dry_run;

    if !input.exists() {
        return Err(format!("cannot access {}", input.display()).into());
    }

    if dry_run {
        println!("=== DRY RUN MODE - No files will be modified ===");
        println!();
    }

    let pipeline = Pipeline::new(config, ConsoleReporter::new(verbose, std::io::stdout()));
    let batch = pipeline.process_path(input)?;

    if !input.is_dir() {
        for result in batch.results.iter().filter(|r| r.output_path.is_some()) {
            for error in &result.errors {
                eprintln!("Warning: {error}");
            }
        }
    }

    if let Some(report) = &cli.report {
        std::fs::write(report, serde_json::to_string_pretty(&batch)?)?;
    }

    if batch.has_failures() {
        std::process::exit(1);
    }
    Ok(())
}

/// Stock defaults, then the config file, then command-line flags.
fn resolve_config(cli: &Cli) -> Result<Config, config::ConfigError> {
    let cwd = std::env::current_dir()?;
    let mut config = config::load_config(cli.config.as_deref(), &cwd, cli_overlay(cli))?;
    config.force = cli.force;
    config.dry_run = cli.dry_run;
    config.verbose = cli.verbose;
    Ok(config)
}

/// Flags that were given, as a TOML layer shaped like the config file.
fn cli_overlay(cli: &Cli) -> toml::Value {
    let mut root = toml::Table::new();
    if let Some(dir) = &cli.backup {
        set(&mut root, "backup", "dir", path_value(dir));
    }
    if let Some(max_dim) = cli.max_dim {
        set(&mut root, "images", "max_dimension", i64::from(max_dim));
    }
    if let Some(quality) = cli.quality {
        set(&mut root, "images", "quality", i64::from(quality));
    }
    if let Some(threshold) = cli.threshold {
        set(&mut root, "analysis", "threshold_mb_per_page", threshold);
    }
    if cli.no_recursive {
        set(&mut root, "scan", "recursive", false);
    }
    if !cli.skip.is_empty() {
        set(&mut root, "scan", "skip_patterns", cli.skip.clone());
    }
    if let Some(workers) = cli.workers {
        set(
            &mut root,
            "processing",
            "workers",
            i64::try_from(workers).unwrap_or(i64::MAX),
        );
    }
    toml::Value::Table(root)
}

fn set(root: &mut toml::Table, section: &str, key: &str, value: impl Into<toml::Value>) {
    if let toml::Value::Table(table) = root
        .entry(section)
        .or_insert(toml::Value::Table(toml::Table::new()))
    {
        table.insert(key.to_string(), value.into());
    }
}

fn path_value(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}
