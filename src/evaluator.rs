//! DMARC Verdict Module
//!
//! Combines the SPF and DKIM results of a record with identifier alignment to
//! decide what DMARC would have concluded (RFC 7489 sections 4.2 and 6.6.2).
//! The evaluation is total: malformed or missing input yields `Fail` or
//! `NoneTemp`, never an error.

use crate::alignment::aligned;
use crate::models::{
    AlignmentMode, AlignmentVerdict, AuthResult, AuthVerdict, EvaluatedRecord, ReportRecord,
};

/// Evaluates one record's authentication results under `mode`.
///
/// `dkim` is `None` when the record carried no DKIM result.
pub fn evaluate(
    spf: &AuthResult,
    dkim: Option<&AuthResult>,
    from_domain: &str,
    mode: AlignmentMode,
) -> AlignmentVerdict {
    let passes = |auth: &AuthResult| {
        auth.result == AuthVerdict::Pass && aligned(mode, &auth.domain, from_domain)
    };

    let spf_aligned = passes(spf);
    let dkim_aligned = dkim.is_some_and(passes);

    if spf_aligned || dkim_aligned {
        return AlignmentVerdict::Pass;
    }

    let temperror = spf.result == AuthVerdict::TempError
        || dkim.is_some_and(|d| d.result == AuthVerdict::TempError);
    if temperror {
        AlignmentVerdict::NoneTemp
    } else {
        AlignmentVerdict::Fail
    }
}

/// Evaluates a record in both alignment modes.
pub fn evaluate_record(record: ReportRecord) -> EvaluatedRecord {
    let spf = record.spf_or_default();
    let relaxed = evaluate(
        &spf,
        record.dkim.as_ref(),
        &record.header_from_domain,
        AlignmentMode::Relaxed,
    );
    let strict = evaluate(
        &spf,
        record.dkim.as_ref(),
        &record.header_from_domain,
        AlignmentMode::Strict,
    );
    EvaluatedRecord {
        record,
        relaxed,
        strict,
    }
}
