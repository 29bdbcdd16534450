//! dmarc-unpack - Report Archive Extraction
//!
//! Walks the report directory and unpacks every `.zip`, `.gz` and `.tgz`
//! archive in place, so `dmarc-align` can pick up the XML inside. A corrupt
//! archive is reported and skipped.

use anyhow::{Context, Result};
use clap::Parser;
use colored::*;
use dmarc_align::error::DmarcError;
use dmarc_align::{extract_archives, Config};
use std::path::PathBuf;

/// CLI arguments for dmarc-unpack.
#[derive(Parser, Debug)]
#[command(author, version, about = "Unpack DMARC report archives in place")]
struct Cli {
    /// Directory searched recursively for archives (default: $DMARC_REPORT_DIR or dmarc_reports)
    #[arg(value_parser)]
    dir: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    env_logger::Builder::from_env(env_logger::Env::default())
        .filter_level(if cli.verbose { log::LevelFilter::Debug } else { log::LevelFilter::Info })
        .init();

    let mut config = Config::new().context("Failed to load configuration")?;
    if let Some(dir) = cli.dir {
        config.report_dir = dir;
    }

    let summary = match extract_archives(&config.report_dir, &config) {
        Ok(summary) => summary,
        Err(DmarcError::MissingInput(dir)) => {
            eprintln!("{}", format!("No report directory at '{}'", dir.display()).yellow());
            return Ok(());
        }
        Err(e) => return Err(e).context("Failed to unpack archives"),
    };

    for (path, e) in &summary.failures {
        eprintln!("{} {}: {}", "Failed".red(), path.display(), e);
    }
    println!(
        "\n{} {} archive(s) processed.",
        "Extraction complete.".bold().green(),
        summary.extracted.len()
    );
    Ok(())
}
