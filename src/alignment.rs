//! Domain Alignment Module
//!
//! Identifier alignment between an authenticated domain and the RFC 5322
//! From domain (RFC 7489 section 3.1). Relaxed and strict checks are kept as
//! separate functions.

use crate::models::AlignmentMode;

/// Lowercases and trims a domain, dropping a trailing root dot.
fn normalize(domain: &str) -> String {
    let d = domain.trim().to_ascii_lowercase();
    d.strip_suffix('.').unwrap_or(&d).to_string()
}

/// Relaxed alignment: equal domains, or one is a subdomain of the other.
///
/// Empty domains never align.
pub fn is_relaxed_aligned(auth_domain: &str, from_domain: &str) -> bool {
    let auth = normalize(auth_domain);
    let from = normalize(from_domain);
    if auth.is_empty() || from.is_empty() {
        return false;
    }
    auth == from
        || from.ends_with(&format!(".{}", auth))
        || auth.ends_with(&format!(".{}", from))
}

/// Strict alignment: exact case-insensitive match only.
pub fn is_strict_aligned(auth_domain: &str, from_domain: &str) -> bool {
    let auth = normalize(auth_domain);
    !auth.is_empty() && auth == normalize(from_domain)
}

/// Dispatches to the check for `mode`.
pub fn aligned(mode: AlignmentMode, auth_domain: &str, from_domain: &str) -> bool {
    match mode {
        AlignmentMode::Relaxed => is_relaxed_aligned(auth_domain, from_domain),
        AlignmentMode::Strict => is_strict_aligned(auth_domain, from_domain),
    }
}
