//! Format Identifier CLI
//!
//! Command-line tool for identifying executable containers and text
//! encodings across files and directory trees.

use anyhow::{bail, Context};
use clap::{Parser, ValueEnum};
use format_identifier::formatter::{
    format_histogram, HumanFormatter, JsonFormatter, ReportFormatter, ShortFormatter,
};
use format_identifier::{CancellationToken, DetectorOptions, Registry, ScanOptions, Scanner};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// Identify executable containers (ELF, PE, Mach-O) and text encodings.
///
/// Directories are scanned in parallel; each file is reported with its
/// detected format and the facts extracted from it.
#[derive(Parser, Debug)]
#[command(name = "format-identify")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Files or directories to scan
    #[arg(required = true)]
    paths: Vec<PathBuf>,

    /// Descend into subdirectories
    #[arg(short, long)]
    recursive: bool,

    /// Follow symbolic links
    #[arg(short = 'L', long)]
    follow_links: bool,

    /// Number of files processed concurrently (defaults to the CPU count)
    #[arg(short, long, env = "FORMAT_IDENTIFY_WORKERS")]
    workers: Option<usize>,

    /// Output format
    #[arg(short, long, default_value = "human")]
    format: OutputFormat,

    /// Detection mode
    #[arg(short, long, default_value = "normal")]
    mode: DetectionMode,

    /// Maximum bytes of each file the text detectors inspect
    #[arg(long)]
    scan_limit: Option<u64>,

    /// Print a count per distinct format instead of per-file results
    #[arg(long)]
    histogram: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Quiet mode (one line per file)
    #[arg(short, long)]
    quiet: bool,
}

/// Output format options.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    /// Human-readable output
    Human,
    /// JSON output
    Json,
    /// Compact tab-separated output
    Short,
}

/// Detection mode options.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum DetectionMode {
    /// Default chunk size, whole files
    Normal,
    /// Inspect only the start of text files
    Fast,
    /// Large chunks, deeper fat nesting
    Thorough,
}

fn main() -> ExitCode {
    let args = Args::parse();

    let filter = if args.verbose {
        EnvFilter::new("format_identifier=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match run(&args) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

/// Returns whether every requested path existed.
fn run(args: &Args) -> anyhow::Result<bool> {
    let detector_options = detector_options(args)?;
    let mut scan_options = ScanOptions {
        recursive: args.recursive,
        follow_links: args.follow_links,
        ..ScanOptions::default()
    };
    if let Some(workers) = args.workers {
        scan_options.workers = workers;
    }

    let mut all_found = true;
    let mut roots = Vec::with_capacity(args.paths.len());
    for path in &args.paths {
        if path.exists() {
            roots.push(path.clone());
        } else {
            if !args.quiet {
                eprintln!("Error: {}: no such file or directory", path.display());
            }
            all_found = false;
        }
    }

    let scanner = Scanner::new(Registry::default(), detector_options, scan_options);
    let mut report = scanner
        .scan(&roots, &CancellationToken::new())
        .context("scan failed")?;
    report.sort_by_path();

    if args.histogram {
        print!("{}", format_histogram(&report.histogram()));
        return Ok(all_found);
    }

    let output = match args.format {
        OutputFormat::Human => HumanFormatter {
            verbose: args.verbose,
            quiet: args.quiet,
        }
        .format_report(&report),
        OutputFormat::Json => JsonFormatter::new().format_report(&report),
        OutputFormat::Short => ShortFormatter::new().format_report(&report),
    };
    print!("{}", output);

    Ok(all_found)
}

fn detector_options(args: &Args) -> anyhow::Result<DetectorOptions> {
    let mut options = match args.mode {
        DetectionMode::Normal => DetectorOptions::new(),
        DetectionMode::Fast => DetectorOptions::fast(),
        DetectionMode::Thorough => DetectorOptions::thorough(),
    };
    if let Some(limit) = args.scan_limit {
        options.scan_limit = Some(limit);
    }
    if let Err(e) = options.validate() {
        bail!("invalid options: {}", e);
    }
    Ok(options)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_parsing() {
        let args = Args::try_parse_from(["format-identify", "some/dir"]).unwrap();
        assert_eq!(args.paths.len(), 1);
        assert!(!args.recursive);
        assert!(!args.histogram);
        assert!(matches!(args.format, OutputFormat::Human));
    }

    #[test]
    fn test_multiple_paths_and_flags() {
        let args = Args::try_parse_from([
            "format-identify",
            "-r",
            "-w",
            "3",
            "--histogram",
            "a",
            "b",
        ])
        .unwrap();
        assert_eq!(args.paths.len(), 2);
        assert!(args.recursive);
        assert_eq!(args.workers, Some(3));
        assert!(args.histogram);
    }

    #[test]
    fn test_format_options() {
        let args = Args::try_parse_from(["format-identify", "-f", "json", "x"]).unwrap();
        assert!(matches!(args.format, OutputFormat::Json));
    }

    #[test]
    fn test_paths_required() {
        assert!(Args::try_parse_from(["format-identify"]).is_err());
    }

    #[test]
    fn test_bad_scan_limit_rejected() {
        let args = Args::try_parse_from(["format-identify", "--scan-limit", "10", "x"]).unwrap();
        assert!(detector_options(&args).is_err());

        let args = Args::try_parse_from(["format-identify", "-m", "fast", "x"]).unwrap();
        assert_eq!(detector_options(&args).unwrap().scan_limit, Some(64 * 1024));
    }
}
