//! Pipeline Module
//!
//! Drives one analysis run: discover report files, parse each into records,
//! evaluate every record in both alignment modes, and collect the rows.
//! Each file yields its own [`FileOutcome`]; a bad file is logged and skipped.

use crate::config::Config;
use crate::discovery::find_files;
use crate::error::{DmarcError, Result};
use crate::evaluator::evaluate_record;
use crate::models::{EvaluatedRecord, ReportRecord};
use crate::xml_parser::parse_report_file;
use log::{debug, warn};
use std::path::{Path, PathBuf};

pub const REPORT_EXTENSIONS: &[&str] = &["xml"];

/// Extraction result for a single report file.
#[derive(Debug)]
pub struct FileOutcome {
    pub path: PathBuf,
    pub result: Result<Vec<ReportRecord>>,
}

/// Everything produced by one run over a report directory.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub files_scanned: usize,
    /// Rows in file-processing order, then document order.
    pub rows: Vec<EvaluatedRecord>,
    pub failures: Vec<(PathBuf, DmarcError)>,
}

impl BatchReport {
    fn absorb(&mut self, outcome: FileOutcome) {
        self.files_scanned += 1;
        match outcome.result {
            Ok(records) => {
                debug!(
                    "{}: {} record(s)",
                    outcome.path.display(),
                    records.len()
                );
                self.rows.extend(records.into_iter().map(evaluate_record));
            }
            Err(e) => {
                warn!("Error parsing {}: {}", outcome.path.display(), e);
                self.failures.push((outcome.path, e));
            }
        }
    }
}

/// Parses one report file.
pub fn process_file(path: &Path, config: &Config) -> FileOutcome {
    FileOutcome {
        path: path.to_path_buf(),
        result: parse_report_file(path, config),
    }
}

/// Analyzes every `.xml` report below `dir`.
///
/// # Errors
///
/// Returns [`DmarcError::MissingInput`] if `dir` does not exist; nothing else
/// aborts the run.
pub fn analyze_directory(dir: &Path, config: &Config) -> Result<BatchReport> {
    let files = find_files(dir, REPORT_EXTENSIONS)?;
    let mut report = BatchReport::default();
    for file in &files {
        report.absorb(process_file(file, config));
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AlignmentVerdict;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_oversized_file_is_skipped() -> Result<()> {
        let dir = tempdir()?;
        fs::write(dir.path().join("big.xml"), "A".repeat(2048))?;
        fs::write(
            dir.path().join("ok.xml"),
            "<feedback><record><identifiers><header_from>a.com</header_from></identifiers>\
             <auth_results><spf><domain>a.com</domain><result>pass</result></spf></auth_results></record></feedback>",
        )?;
        let config = Config {
            max_file_size: 1024,
            ..Config::default()
        };

        let report = analyze_directory(dir.path(), &config)?;
        assert_eq!(report.files_scanned, 2);
        assert_eq!(report.rows.len(), 1);
        assert_eq!(report.rows[0].relaxed, AlignmentVerdict::Pass);
        assert_eq!(report.failures.len(), 1);
        assert!(matches!(report.failures[0].1, DmarcError::FileTooLarge(_)));
        Ok(())
    }

    #[test]
    fn test_empty_directory() -> Result<()> {
        let dir = tempdir()?;
        let report = analyze_directory(dir.path(), &Config::default())?;
        assert_eq!(report.files_scanned, 0);
        assert!(report.rows.is_empty());
        Ok(())
    }
}
