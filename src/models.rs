//! Data Models Module
//!
//! This module defines the core data structures used by dmarc-align to represent
//! records from DMARC aggregate reports, the authentication results they carry,
//! and the alignment verdicts computed for them. Values here are plain tokens;
//! any colouring belongs to the output layer.
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Outcome of an SPF or DKIM check as reported by the receiver.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum AuthVerdict {
    #[default]
    None,
    Pass,
    Fail,
    TempError,
    SoftFail,
    Neutral,
    PermError,
    Policy,
    Unknown,
}

impl AuthVerdict {
    /// Maps a raw report token onto the closed set. Anything unrecognized
    /// becomes [`AuthVerdict::Unknown`], which never counts as a pass.
    pub fn normalize(token: &str) -> Self {
        token.parse().unwrap_or(AuthVerdict::Unknown)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AuthVerdict::None => "none",
            AuthVerdict::Pass => "pass",
            AuthVerdict::Fail => "fail",
            AuthVerdict::TempError => "temperror",
            AuthVerdict::SoftFail => "softfail",
            AuthVerdict::Neutral => "neutral",
            AuthVerdict::PermError => "permerror",
            AuthVerdict::Policy => "policy",
            AuthVerdict::Unknown => "unknown",
        }
    }
}

/// One authentication result (SPF or DKIM) from `auth_results`.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, Default)]
pub struct AuthResult {
    pub result: AuthVerdict,
    pub domain: String,
}

impl AuthResult {
    pub fn new(result: AuthVerdict, domain: impl Into<String>) -> Self {
        Self {
            result,
            domain: domain.into(),
        }
    }
}

/// A single `<record>` of an aggregate report.
///
/// `spf` and `dkim` are `None` when the record carried no such element at
/// all, which is kept apart from a present element reporting `none`. `count`
/// is the reported text, verbatim.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ReportRecord {
    pub reporter_org: String,
    pub source_ip: String,
    pub count: String,
    pub disposition: String,
    pub header_from_domain: String,
    pub spf: Option<AuthResult>,
    pub dkim: Option<AuthResult>,
}

impl ReportRecord {
    /// The reported message count, if it is a number.
    pub fn message_count(&self) -> Option<u64> {
        self.count.trim().parse().ok()
    }

    /// The SPF result as seen by evaluation: an absent element reads as
    /// `none` with an empty domain.
    pub fn spf_or_default(&self) -> AuthResult {
        self.spf.clone().unwrap_or_default()
    }

    /// The DKIM result as seen by evaluation and export: an absent element
    /// reads as `none` with an empty domain.
    pub fn dkim_or_default(&self) -> AuthResult {
        self.dkim.clone().unwrap_or_default()
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum AlignmentMode {
    #[default]
    Relaxed,
    Strict,
}

/// DMARC outcome for one record under one alignment mode.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum AlignmentVerdict {
    #[serde(rename = "pass")]
    Pass,
    #[serde(rename = "fail")]
    Fail,
    /// RFC 7489 section 6.6.2 temporary-error override.
    #[serde(rename = "none-temp")]
    NoneTemp,
}

impl AlignmentVerdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlignmentVerdict::Pass => "pass",
            AlignmentVerdict::Fail => "fail",
            AlignmentVerdict::NoneTemp => "none-temp",
        }
    }
}

/// A record together with its verdicts in both alignment modes.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct EvaluatedRecord {
    pub record: ReportRecord,
    pub relaxed: AlignmentVerdict,
    pub strict: AlignmentVerdict,
}

impl fmt::Display for AuthVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
impl fmt::Display for AlignmentMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlignmentMode::Relaxed => write!(f, "relaxed"),
            AlignmentMode::Strict => write!(f, "strict"),
        }
    }
}
impl fmt::Display for AlignmentVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
impl FromStr for AuthVerdict {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "" | "none" => Ok(AuthVerdict::None),
            "pass" => Ok(AuthVerdict::Pass),
            "fail" => Ok(AuthVerdict::Fail),
            "temperror" => Ok(AuthVerdict::TempError),
            "softfail" => Ok(AuthVerdict::SoftFail),
            "neutral" => Ok(AuthVerdict::Neutral),
            "permerror" => Ok(AuthVerdict::PermError),
            "policy" => Ok(AuthVerdict::Policy),
            "unknown" => Ok(AuthVerdict::Unknown),
            _ => Err(format!("Invalid authentication result: {}", s)),
        }
    }
}
