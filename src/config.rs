//! Configuration Module
//!
//! This module reads configuration values from environment variables, provides
//! sensible defaults, and validates the limits applied to report files and
//! archives. The report directory is a plain value here so both binaries can
//! override it from the command line.

use anyhow::Result;
use std::env;
use std::path::PathBuf;

pub const DEFAULT_REPORT_DIR: &str = "dmarc_reports";

#[derive(Debug, Clone)]
pub struct Config {
    pub report_dir: PathBuf,
    pub csv_dir: PathBuf,
    pub max_file_size: usize,
    pub max_decompressed_size: usize,
    pub max_files_in_zip: usize,
    pub max_compression_ratio: f64,
    pub max_filename_length: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            report_dir: PathBuf::from(DEFAULT_REPORT_DIR),
            csv_dir: PathBuf::from("."),
            max_file_size: 10 * 1024 * 1024,
            max_decompressed_size: 100 * 1024 * 1024,
            max_files_in_zip: 1000,
            max_compression_ratio: 1000.0,
            max_filename_length: 256,
        }
    }
}

impl Config {
    /// Creates a new configuration by reading environment variables.
    /// If a variable is missing or empty, a default value is used.
    pub fn new() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds a configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();
        let var = |key: &str| {
            lookup(key)
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
        };

        let max_file_size = var("DMARC_MAX_FILE_SIZE")
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.max_file_size);

        if max_file_size > 500_000_000 {
            return Err(anyhow::anyhow!("Max file size too large (500MB limit)"));
        }

        let max_decompressed_size = var("DMARC_MAX_DECOMPRESSED_SIZE")
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.max_decompressed_size);

        let max_files_in_zip = var("DMARC_MAX_FILES_IN_ZIP")
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.max_files_in_zip);

        let max_compression_ratio = var("DMARC_MAX_COMPRESSION_RATIO")
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.max_compression_ratio);

        let max_filename_length = var("DMARC_MAX_FILENAME_LENGTH")
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.max_filename_length);

        let report_dir = var("DMARC_REPORT_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.report_dir);

        let csv_dir = var("DMARC_CSV_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.csv_dir);

        Ok(Config {
            report_dir,
            csv_dir,
            max_file_size,
            max_decompressed_size,
            max_files_in_zip,
            max_compression_ratio,
            max_filename_length,
        })
    }
}
