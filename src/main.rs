//! dmarc-align - DMARC Aggregate Report Alignment Analyzer
//!
//! This tool scans a directory of DMARC aggregate (RUA) XML reports and shows,
//! for every record, whether the message would have passed DMARC under relaxed
//! and strict identifier alignment (RFC 7489).
//!
//! Results are shown as a table (or CSV/JSON on stdout) and exported to a
//! timestamped CSV file.

use anyhow::{Context, Result};
use clap::Parser;
use colored::*;
use dmarc_align::error::DmarcError;
use dmarc_align::models::EvaluatedRecord;
use dmarc_align::output::{export_csv, render_table, write_csv, write_json};
use dmarc_align::{analyze_directory, extract_archives, Config};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;

/// CLI arguments for dmarc-align.
#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "DMARC aggregate report alignment analyzer",
    long_about = "dmarc-align reads DMARC aggregate (RUA) XML reports from a directory and \
                  evaluates every record under relaxed and strict alignment.\n\n\
                  USAGE:\n  dmarc-align [DIR] [--output <table|csv|json>] [--csv-dir <DIR>] [--no-csv]"
)]
struct Cli {
    /// Directory searched recursively for XML reports (default: $DMARC_REPORT_DIR or dmarc_reports)
    #[arg(value_parser)]
    dir: Option<PathBuf>,

    /// Output format on stdout: table, csv, json
    #[arg(short, long, default_value = "table")]
    output: OutputFormat,

    /// Directory for the exported CSV file
    #[arg(long)]
    csv_dir: Option<PathBuf>,

    /// Do not write the CSV export
    #[arg(long)]
    no_csv: bool,

    /// Unpack .zip/.gz/.tgz archives in the directory before analysis
    #[arg(short = 'x', long)]
    extract: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

/// Supported output formats.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
enum OutputFormat {
    Table,
    Csv,
    Json,
}

impl FromStr for OutputFormat {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "table" => Ok(OutputFormat::Table),
            "csv" => Ok(OutputFormat::Csv),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("Invalid output format: {}", s)),
        }
    }
}

fn render(format: &OutputFormat, rows: &[EvaluatedRecord]) -> Result<()> {
    match format {
        OutputFormat::Table => {
            render_table(rows).printstd();
        }
        OutputFormat::Csv => write_csv(std::io::stdout(), rows)?,
        OutputFormat::Json => {
            write_json(std::io::stdout(), rows)?;
            println!();
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity.
    env_logger::Builder::from_env(env_logger::Env::default())
        .filter_level(if cli.verbose { log::LevelFilter::Debug } else { log::LevelFilter::Info })
        .init();

    let mut config = Config::new().context("Failed to load configuration")?;
    if let Some(dir) = cli.dir {
        config.report_dir = dir;
    }
    if let Some(dir) = cli.csv_dir {
        config.csv_dir = dir;
    }

    eprintln!(
        "{}\n{}\n",
        "dmarc-align - DMARC Alignment Analyzer".bold().green(),
        "Parsing aggregate reports & evaluating alignment".dimmed()
    );

    if cli.extract {
        log::info!("Unpacking archives in {}", config.report_dir.display());
        match extract_archives(&config.report_dir, &config) {
            Ok(summary) => log::info!("{} archive(s) unpacked", summary.extracted.len()),
            Err(DmarcError::MissingInput(dir)) => {
                eprintln!("{}", format!("No report directory at '{}'", dir.display()).yellow());
                return Ok(());
            }
            Err(e) => return Err(e).context("Failed to unpack archives"),
        }
    }

    log::info!("Scanning {}", config.report_dir.display());
    let report = match analyze_directory(&config.report_dir, &config) {
        Ok(report) => report,
        Err(DmarcError::MissingInput(dir)) => {
            eprintln!("{}", format!("No report directory at '{}'", dir.display()).yellow());
            return Ok(());
        }
        Err(e) => return Err(e).context("Failed to analyze reports"),
    };

    if report.files_scanned == 0 {
        eprintln!(
            "{}",
            format!("No XML files found in '{}'", config.report_dir.display()).yellow()
        );
        return Ok(());
    }

    for (path, e) in &report.failures {
        eprintln!("{} {}: {}", "Skipped".red(), path.display(), e);
    }

    if report.rows.is_empty() {
        eprintln!("{}", "No DMARC records found in any XML files.".yellow());
        return Ok(());
    }

    render(&cli.output, &report.rows)?;

    if !cli.no_csv {
        let path = export_csv(&config.csv_dir, &report.rows).context("Failed to write CSV export")?;
        eprintln!("\n{} {}", "CSV export saved to:".bold(), path.display());
    }

    log::info!(
        "{}",
        format!(
            "Analysis complete: {} record(s) from {} file(s), {} skipped",
            report.rows.len(),
            report.files_scanned - report.failures.len(),
            report.failures.len()
        )
        .bold()
        .cyan()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_format_parsing() {
        assert!(matches!(OutputFormat::from_str("table"), Ok(OutputFormat::Table)));
        assert!(matches!(OutputFormat::from_str("CSV"), Ok(OutputFormat::Csv)));
        assert!(matches!(OutputFormat::from_str("json"), Ok(OutputFormat::Json)));
        assert!(OutputFormat::from_str("invalid").is_err());
    }

    #[test]
    fn test_cli_parsing() {
        let cli = Cli::parse_from(["dmarc-align", "reports", "--output", "json", "--no-csv", "-x"]);
        assert_eq!(cli.dir, Some(PathBuf::from("reports")));
        assert!(matches!(cli.output, OutputFormat::Json));
        assert!(cli.no_csv);
        assert!(cli.extract);
        assert!(cli.csv_dir.is_none());
    }
}
