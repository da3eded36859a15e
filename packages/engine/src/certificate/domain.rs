//! Hostname coverage checks against a certificate's name set

use serde::Serialize;

/// Outcome of matching one requested domain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DomainMatch {
    Ok,
    DomainMismatch,
}

/// Which certificate name covered a requested domain
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoveredBy {
    San(String),
    CommonName(String),
}

/// Check a requested domain against a certificate's CN and SAN entries
///
/// A non-empty SAN list is authoritative and the CN is ignored. The CN is only
/// consulted when the certificate carries no DNS SAN entries at all.
#[must_use]
pub fn match_domain(requested: &str, subject_cn: Option<&str>, san_entries: &[String]) -> DomainMatch {
    if covering_name(requested, subject_cn, san_entries).is_some() {
        DomainMatch::Ok
    } else {
        DomainMatch::DomainMismatch
    }
}

/// Same as [`match_domain`] but reports which name matched
#[must_use]
pub fn covering_name(
    requested: &str,
    subject_cn: Option<&str>,
    san_entries: &[String],
) -> Option<CoveredBy> {
    if !san_entries.is_empty() {
        return san_entries
            .iter()
            .find(|pattern| match_hostname(requested, pattern))
            .map(|pattern| CoveredBy::San(pattern.clone()));
    }

    subject_cn
        .filter(|cn| match_hostname(requested, cn))
        .map(|cn| {
            tracing::warn!(
                domain = requested,
                "certificate has no SAN entries, matched legacy Common Name"
            );
            CoveredBy::CommonName(cn.to_string())
        })
}

/// Match hostname against a DNS name pattern
///
/// `*.suffix` covers exactly one additional non-empty label and never the
/// bare suffix. A requested wildcard is covered by the identical wildcard
/// entry. Partial-label wildcards never match.
pub(crate) fn match_hostname(hostname: &str, pattern: &str) -> bool {
    let hostname = normalize(hostname);
    let pattern = normalize(pattern);

    if hostname.is_empty() || pattern.is_empty() {
        return false;
    }

    if let Some(suffix) = pattern.strip_prefix("*.") {
        if suffix.is_empty() || suffix.contains('*') {
            return false;
        }
        if hostname == pattern {
            return true;
        }
        return match hostname.split_once('.') {
            Some((label, rest)) => !label.is_empty() && label != "*" && rest == suffix,
            None => false,
        };
    }

    !pattern.contains('*') && hostname == pattern
}

fn normalize(name: &str) -> String {
    let name = name.trim();
    name.strip_suffix('.').unwrap_or(name).to_ascii_lowercase()
}
