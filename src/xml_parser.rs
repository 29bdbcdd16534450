//! XML Parser Module
//!
//! This module parses DMARC aggregate (RUA) XML reports and extracts one
//! [`ReportRecord`] per `<record>` element. Records are located structurally, at
//! any depth, because reporters nest the schema differently. Fields are
//! resolved by their path relative to the enclosing record.
//!
//! The parser enforces a nesting depth limit to protect against pathological
//! input, and never processes DOCTYPE declarations: a DOCTYPE block is removed
//! before parsing, and a DOCTYPE with two or more entity definitions (the
//! Billion Laughs shape) rejects the document.

use crate::config::Config;
use crate::error::{DmarcError, Result};
use crate::models::{AuthResult, AuthVerdict, ReportRecord};
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use std::fs;
use std::path::Path;

const MAX_DEPTH: usize = 32;
const UNKNOWN_REPORTER: &str = "Unknown";

/// Which `auth_results` child is currently open inside a record.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Mechanism {
    Spf,
    Dkim,
}

#[derive(Debug, Default)]
struct AuthFields {
    domain: String,
    result: String,
}

impl AuthFields {
    fn into_result(self) -> AuthResult {
        AuthResult {
            result: AuthVerdict::normalize(&self.result),
            domain: self.domain.trim().to_string(),
        }
    }
}

/// Accumulates the fields of one `<record>` while its subtree is read.
#[derive(Debug)]
struct RecordBuilder {
    /// Stack depth at which the `record` element was opened.
    depth: usize,
    source_ip: String,
    count: String,
    disposition: String,
    header_from: String,
    spf: Option<AuthFields>,
    dkim: Option<AuthFields>,
    active: Option<Mechanism>,
}

impl RecordBuilder {
    fn new(depth: usize) -> Self {
        Self {
            depth,
            source_ip: String::new(),
            count: String::new(),
            disposition: String::new(),
            header_from: String::new(),
            spf: None,
            dkim: None,
            active: None,
        }
    }

    /// Called when an element opens at `path` (relative to the record).
    /// Only the first `spf` and `dkim` under `auth_results` are kept.
    fn open(&mut self, path: &[String]) {
        let mechanism = match path {
            [a, m] if a == "auth_results" && m == "spf" => Mechanism::Spf,
            [a, m] if a == "auth_results" && m == "dkim" => Mechanism::Dkim,
            _ => return,
        };
        let slot = match mechanism {
            Mechanism::Spf => &mut self.spf,
            Mechanism::Dkim => &mut self.dkim,
        };
        if slot.is_none() {
            *slot = Some(AuthFields::default());
            self.active = Some(mechanism);
        } else {
            self.active = None;
        }
    }

    /// Called when an element closes at `path` (relative to the record).
    fn close(&mut self, path: &[String]) {
        if path.len() == 2 && path[0] == "auth_results" {
            self.active = None;
        }
    }

    fn text(&mut self, path: &[String], text: &str) {
        let p: Vec<&str> = path.iter().map(String::as_str).collect();
        let target = match p.as_slice() {
            ["row", "source_ip"] => &mut self.source_ip,
            ["row", "count"] => &mut self.count,
            ["row", "policy_evaluated", "disposition"] => &mut self.disposition,
            ["identifiers", "header_from"] => &mut self.header_from,
            ["auth_results", "spf", field] if self.active == Some(Mechanism::Spf) => {
                match self.spf.as_mut() {
                    Some(spf) => match *field {
                        "domain" => &mut spf.domain,
                        "result" => &mut spf.result,
                        _ => return,
                    },
                    None => return,
                }
            }
            ["auth_results", "dkim", field] if self.active == Some(Mechanism::Dkim) => {
                match self.dkim.as_mut() {
                    Some(dkim) => match *field {
                        "domain" => &mut dkim.domain,
                        "result" => &mut dkim.result,
                        _ => return,
                    },
                    None => return,
                }
            }
            _ => return,
        };
        target.push_str(text);
    }

    fn finish(self, reporter_org: &str) -> ReportRecord {
        ReportRecord {
            reporter_org: reporter_org.to_string(),
            source_ip: self.source_ip.trim().to_string(),
            count: self.count.trim().to_string(),
            disposition: self.disposition.trim().to_string(),
            header_from_domain: self.header_from.trim().to_string(),
            spf: self.spf.map(AuthFields::into_result),
            dkim: self.dkim.map(AuthFields::into_result),
        }
    }
}

/// Removes a DOCTYPE block, rejecting one that declares multiple entities.
fn strip_doctype(xml_content: &str) -> Result<String> {
    let Some(start) = xml_content.find("<!DOCTYPE") else {
        return Ok(xml_content.to_string());
    };
    let rest = &xml_content[start..];
    // An internal subset ends with "]>", a bare declaration with the first ">".
    let end = match (rest.find('['), rest.find('>')) {
        (Some(open), Some(close)) if open < close => rest.find("]>").map(|e| e + 2),
        (_, Some(close)) => Some(close + 1),
        _ => None,
    };
    let Some(end) = end else {
        return Err(DmarcError::Format("Unterminated DOCTYPE declaration".into()));
    };
    let doctype = &rest[..end];
    if doctype.matches("<!ENTITY").count() >= 2 {
        return Err(DmarcError::Format("Recursive entities detected".into()));
    }
    Ok(format!("{}{}", &xml_content[..start], &rest[end..]))
}

fn local_name(e: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(e.local_name().as_ref()).into_owned()
}

/// Parses the content of one aggregate report.
///
/// Records are returned in document order. `reporter_org` comes from
/// `report_metadata/org_name` wherever it appears in the document.
///
/// # Errors
///
/// Returns an error if the document is not well-formed XML, has no root
/// element, nests deeper than the limit, or carries an entity-bomb DOCTYPE.
pub fn parse_report(xml_content: &str) -> Result<Vec<ReportRecord>> {
    let cleaned_xml = strip_doctype(xml_content)?;
    let mut reader = Reader::from_str(&cleaned_xml);
    reader.config_mut().trim_text(true);

    let mut path: Vec<String> = Vec::new();
    let mut builders: Vec<RecordBuilder> = Vec::new();
    let mut finished: Vec<RecordBuilder> = Vec::new();
    let mut org_name: Option<String> = None;
    let mut org_text = String::new();
    let mut saw_root = false;
    let mut root_closed = false;

    loop {
        match reader.read_event()? {
            Event::Start(ref e) => {
                ensure_single_root(root_closed)?;
                saw_root = true;
                let name = local_name(e);
                path.push(name);
                if path.len() > MAX_DEPTH {
                    return Err(DmarcError::Format("XML nesting depth limit exceeded".into()));
                }
                if path.last().is_some_and(|n| n == "record") {
                    builders.push(RecordBuilder::new(path.len()));
                } else if let Some(builder) = builders.last_mut() {
                    builder.open(&path[builder.depth..]);
                }
            }
            Event::Empty(ref e) => {
                ensure_single_root(root_closed)?;
                saw_root = true;
                path.push(local_name(e));
                if path.last().is_some_and(|n| n == "record") {
                    finished.push(RecordBuilder::new(path.len()));
                } else if let Some(builder) = builders.last_mut() {
                    builder.open(&path[builder.depth..]);
                    builder.close(&path[builder.depth..]);
                }
                path.pop();
                root_closed = path.is_empty();
            }
            Event::End(_) => {
                if path.last().is_some_and(|n| n == "record")
                    && builders.last().is_some_and(|b| b.depth == path.len())
                {
                    if let Some(builder) = builders.pop() {
                        finished.push(builder);
                    }
                } else if let Some(builder) = builders.last_mut() {
                    builder.close(&path[builder.depth..]);
                }
                if at_org_name(&path) && org_name.is_none() {
                    let org = org_text.trim();
                    if !org.is_empty() {
                        org_name = Some(org.to_string());
                    }
                }
                org_text.clear();
                path.pop();
                root_closed = path.is_empty();
            }
            Event::Text(ref t) => {
                let text = t.unescape()?;
                ensure_inside_root(&path, &text)?;
                append_text(&path, &mut builders, &mut org_text, &text);
            }
            Event::CData(ref c) => {
                let text = String::from_utf8_lossy(c).into_owned();
                ensure_inside_root(&path, &text)?;
                append_text(&path, &mut builders, &mut org_text, &text);
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !saw_root {
        return Err(DmarcError::Format("Document has no root element".into()));
    }
    if !path.is_empty() {
        return Err(DmarcError::Format(format!(
            "Unexpected end of document inside <{}>",
            path.join("/")
        )));
    }

    let reporter_org = org_name.as_deref().unwrap_or(UNKNOWN_REPORTER);
    Ok(finished
        .into_iter()
        .map(|builder| builder.finish(reporter_org))
        .collect())
}

/// A document has exactly one root element.
fn ensure_single_root(root_closed: bool) -> Result<()> {
    if root_closed {
        return Err(DmarcError::Format("Content after the root element".into()));
    }
    Ok(())
}

/// Character data is only allowed inside the root element.
fn ensure_inside_root(path: &[String], text: &str) -> Result<()> {
    if path.is_empty() && !text.trim().is_empty() {
        return Err(DmarcError::Format("Text outside the root element".into()));
    }
    Ok(())
}

fn at_org_name(path: &[String]) -> bool {
    matches!(path, [.., parent, name] if parent == "report_metadata" && name == "org_name")
}

fn append_text(path: &[String], builders: &mut [RecordBuilder], org_text: &mut String, text: &str) {
    if at_org_name(path) {
        org_text.push_str(text);
    }
    if let Some(builder) = builders.last_mut() {
        builder.text(&path[builder.depth..], text);
    }
}

/// Reads and parses a report file, enforcing the configured size limit.
pub fn parse_report_file(path: &Path, config: &Config) -> Result<Vec<ReportRecord>> {
    let metadata = fs::metadata(path)?;
    if metadata.len() > config.max_file_size as u64 {
        return Err(DmarcError::FileTooLarge(format!(
            "File size {} bytes exceeds limit of {} bytes",
            metadata.len(),
            config.max_file_size
        )));
    }
    let contents = fs::read_to_string(path)?;
    parse_report(&contents)
}
