//! Output Module
//!
//! Renders evaluated records as a terminal table, CSV, or JSON. Colour is
//! applied only here, as a mapping from plain tokens to cell styles; CSV and
//! JSON always carry the plain tokens.

use crate::error::Result;
use crate::models::{AlignmentVerdict, EvaluatedRecord};
use chrono::Local;
use prettytable::{format, Cell, Row, Table};
use serde::Serialize;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

pub const COLUMNS: [&str; 11] = [
    "Reporter",
    "Source IP",
    "Count",
    "Disposition",
    "Header From",
    "SPF Domain",
    "SPF",
    "DKIM Domain",
    "DKIM",
    "DMARC Relaxed",
    "DMARC Strict",
];

/// One exported line, with the column headers as field names.
#[derive(Debug, Serialize)]
struct CsvRow<'a> {
    #[serde(rename = "Reporter")]
    reporter: &'a str,
    #[serde(rename = "Source IP")]
    source_ip: &'a str,
    #[serde(rename = "Count")]
    count: &'a str,
    #[serde(rename = "Disposition")]
    disposition: &'a str,
    #[serde(rename = "Header From")]
    header_from: &'a str,
    #[serde(rename = "SPF Domain")]
    spf_domain: String,
    #[serde(rename = "SPF")]
    spf: &'static str,
    #[serde(rename = "DKIM Domain")]
    dkim_domain: String,
    #[serde(rename = "DKIM")]
    dkim: &'static str,
    #[serde(rename = "DMARC Relaxed")]
    relaxed: &'static str,
    #[serde(rename = "DMARC Strict")]
    strict: &'static str,
}

impl<'a> From<&'a EvaluatedRecord> for CsvRow<'a> {
    fn from(row: &'a EvaluatedRecord) -> Self {
        let record = &row.record;
        // An absent SPF element exports as empty cells; absent DKIM reads as none.
        let (spf_domain, spf) = match &record.spf {
            Some(spf) => (spf.domain.clone(), spf.result.as_str()),
            None => (String::new(), ""),
        };
        let dkim = record.dkim_or_default();
        CsvRow {
            reporter: &record.reporter_org,
            source_ip: &record.source_ip,
            count: &record.count,
            disposition: &record.disposition,
            header_from: &record.header_from_domain,
            spf_domain,
            spf,
            dkim_domain: dkim.domain,
            dkim: dkim.result.as_str(),
            relaxed: row.relaxed.as_str(),
            strict: row.strict.as_str(),
        }
    }
}

/// Table style for a result or verdict token: pass green, none yellow,
/// fail red, none-temp cyan. Other tokens stay unstyled.
pub fn token_style(token: &str) -> Option<&'static str> {
    match token {
        "pass" => Some("Fg"),
        "none" => Some("Fy"),
        "fail" => Some("Fr"),
        "none-temp" => Some("Fc"),
        _ => None,
    }
}

/// Text shown in the table for a verdict.
pub fn verdict_label(verdict: AlignmentVerdict) -> &'static str {
    match verdict {
        AlignmentVerdict::NoneTemp => "none (override)",
        other => other.as_str(),
    }
}

fn styled(text: &str, token: &str) -> Cell {
    let cell = Cell::new(text);
    match token_style(token) {
        Some(spec) => cell.style_spec(spec),
        None => cell,
    }
}

/// Builds the result table, one row per record.
pub fn render_table(rows: &[EvaluatedRecord]) -> Table {
    let mut table = Table::new();
    table.set_format(*format::consts::FORMAT_BOX_CHARS);
    table.set_titles(Row::new(
        COLUMNS.iter().map(|c| Cell::new(c).style_spec("b")).collect(),
    ));

    for row in rows {
        let line = CsvRow::from(row);
        table.add_row(Row::new(vec![
            Cell::new(line.reporter),
            Cell::new(line.source_ip),
            Cell::new(line.count),
            Cell::new(line.disposition),
            Cell::new(line.header_from),
            Cell::new(&line.spf_domain),
            styled(line.spf, line.spf),
            Cell::new(&line.dkim_domain),
            styled(line.dkim, line.dkim),
            styled(verdict_label(row.relaxed), line.relaxed),
            styled(verdict_label(row.strict), line.strict),
        ]));
    }
    table
}

/// Writes rows as CSV with a header line.
pub fn write_csv<W: Write>(writer: W, rows: &[EvaluatedRecord]) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    for row in rows {
        wtr.serialize(CsvRow::from(row))?;
    }
    wtr.flush()?;
    Ok(())
}

/// Writes rows as pretty-printed JSON.
pub fn write_json<W: Write>(writer: W, rows: &[EvaluatedRecord]) -> Result<()> {
    serde_json::to_writer_pretty(writer, rows)?;
    Ok(())
}

/// Exports rows to `dmarc_report_<timestamp>.csv` inside `dir` and returns
/// the file path.
pub fn export_csv(dir: &Path, rows: &[EvaluatedRecord]) -> Result<PathBuf> {
    fs::create_dir_all(dir)?;
    let file_name = Local::now()
        .format("dmarc_report_%Y%m%d_%H%M%S.csv")
        .to_string();
    let path = dir.join(file_name);
    write_csv(fs::File::create(&path)?, rows)?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluator::evaluate_record;
    use crate::models::{AuthResult, AuthVerdict, ReportRecord};

    fn rows() -> Vec<EvaluatedRecord> {
        vec![
            evaluate_record(ReportRecord {
                reporter_org: "google.com".into(),
                source_ip: "192.0.2.1".into(),
                count: "4".into(),
                disposition: "none".into(),
                header_from_domain: "mail.example.com".into(),
                spf: Some(AuthResult::new(AuthVerdict::Pass, "example.com")),
                dkim: None,
            }),
            evaluate_record(ReportRecord {
                reporter_org: "Unknown".into(),
                source_ip: "198.51.100.2".into(),
                count: String::new(),
                disposition: String::new(),
                header_from_domain: "x.com".into(),
                spf: Some(AuthResult::new(AuthVerdict::TempError, "")),
                dkim: Some(AuthResult::new(AuthVerdict::Fail, "x.com")),
            }),
        ]
    }

    #[test]
    fn test_csv_has_plain_tokens() -> Result<()> {
        let mut buf = Vec::new();
        write_csv(&mut buf, &rows())?;
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], COLUMNS.join(","));
        assert_eq!(
            lines[1],
            "google.com,192.0.2.1,4,none,mail.example.com,example.com,pass,,none,pass,fail"
        );
        assert_eq!(
            lines[2],
            "Unknown,198.51.100.2,,,x.com,,temperror,x.com,fail,none-temp,none-temp"
        );
        assert!(!text.contains('\u{1b}'));
        Ok(())
    }

    #[test]
    fn test_absent_spf_exports_empty_cells() -> Result<()> {
        let row = evaluate_record(ReportRecord {
            reporter_org: "yahoo.com".into(),
            source_ip: "203.0.113.9".into(),
            count: "1,234".into(),
            disposition: "reject".into(),
            header_from_domain: "example.com".into(),
            spf: None,
            dkim: Some(AuthResult::new(AuthVerdict::Pass, "example.com")),
        });
        let mut buf = Vec::new();
        write_csv(&mut buf, &[row])?;
        let text = String::from_utf8(buf).unwrap();
        assert_eq!(
            text.lines().nth(1),
            Some("yahoo.com,203.0.113.9,\"1,234\",reject,example.com,,,example.com,pass,pass,pass")
        );
        Ok(())
    }

    #[test]
    fn test_json_output() -> Result<()> {
        let mut buf = Vec::new();
        write_json(&mut buf, &rows())?;
        let value: serde_json::Value = serde_json::from_slice(&buf)?;
        assert_eq!(value[0]["relaxed"], "pass");
        assert_eq!(value[1]["strict"], "none-temp");
        assert_eq!(value[1]["record"]["spf"]["result"], "temperror");
        assert!(value[0]["record"]["dkim"].is_null());
        Ok(())
    }

    #[test]
    fn test_table_rows_and_labels() {
        let table = render_table(&rows());
        assert_eq!(table.len(), 2);
        let cell = |r: usize, c: usize| {
            table
                .get_row(r)
                .and_then(|row| row.get_cell(c))
                .map(|cell| cell.get_content())
                .unwrap_or_default()
        };
        assert_eq!(cell(0, 8), "none");
        assert_eq!(cell(0, 9), "pass");
        assert_eq!(cell(1, 9), "none (override)");
    }

    #[test]
    fn test_styles() {
        assert_eq!(token_style("pass"), Some("Fg"));
        assert_eq!(token_style("none-temp"), Some("Fc"));
        assert_eq!(token_style("softfail"), None);
    }

    #[test]
    fn test_export_writes_timestamped_file() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = export_csv(&dir.path().join("out"), &rows())?;
        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("dmarc_report_") && name.ends_with(".csv"));
        assert_eq!(std::fs::read_to_string(&path)?.lines().count(), 3);
        Ok(())
    }
}
