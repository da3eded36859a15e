//! Structured results of a validation pass

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::certificate::expiry::ExpiryAssessment;
use crate::config::ValidationPolicy;
use crate::types::{CertificateRecord, CertificateSource, PublicKeyAlgorithm};

/// Overall outcome of validating one certificate/key pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValidationStatus {
    Ok,
    ExpiringSoon,
    DomainMismatch,
    MismatchedKey,
    Expired,
    InvalidFormat,
    PermissionDenied,
    NotFound,
}

impl ValidationStatus {
    /// Higher is more severe; the aggregate status is the maximum
    #[must_use]
    pub fn rank(self) -> u8 {
        match self {
            Self::Ok => 0,
            Self::ExpiringSoon => 1,
            Self::DomainMismatch => 2,
            Self::MismatchedKey => 3,
            Self::Expired => 4,
            Self::InvalidFormat | Self::PermissionDenied | Self::NotFound => 5,
        }
    }

    /// Failures that stop the pipeline before later checks run
    #[must_use]
    pub fn is_hard_failure(self) -> bool {
        matches!(
            self,
            Self::InvalidFormat | Self::PermissionDenied | Self::NotFound
        )
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::ExpiringSoon => "EXPIRING_SOON",
            Self::DomainMismatch => "DOMAIN_MISMATCH",
            Self::MismatchedKey => "MISMATCHED_KEY",
            Self::Expired => "EXPIRED",
            Self::InvalidFormat => "INVALID_FORMAT",
            Self::PermissionDenied => "PERMISSION_DENIED",
            Self::NotFound => "NOT_FOUND",
        }
    }
}

impl std::fmt::Display for ValidationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueSeverity {
    Error,
    Warning,
    Info,
}

/// One finding recorded during a pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationIssue {
    pub status: ValidationStatus,
    pub severity: IssueSeverity,
    pub message: String,
    pub suggestion: Option<String>,
}

impl ValidationIssue {
    pub fn error(status: ValidationStatus, message: impl Into<String>) -> Self {
        Self {
            status,
            severity: IssueSeverity::Error,
            message: message.into(),
            suggestion: None,
        }
    }

    pub fn warning(status: ValidationStatus, message: impl Into<String>) -> Self {
        Self {
            status,
            severity: IssueSeverity::Warning,
            message: message.into(),
            suggestion: None,
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self {
            status: ValidationStatus::Ok,
            severity: IssueSeverity::Info,
            message: message.into(),
            suggestion: None,
        }
    }

    #[must_use]
    pub fn with_suggestion(self, suggestion: impl Into<String>) -> Self {
        Self {
            suggestion: Some(suggestion.into()),
            ..self
        }
    }
}

/// Certificate facts carried in a result
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CertificateSummary {
    pub subject_cn: Option<String>,
    pub san_entries: Vec<String>,
    pub not_before: DateTime<Utc>,
    pub not_after: DateTime<Utc>,
    pub fingerprint: String,
    pub key_algorithm: PublicKeyAlgorithm,
    pub signature_algorithm: &'static str,
    pub serial_number: String,
    pub source: CertificateSource,
}

impl From<&CertificateRecord> for CertificateSummary {
    fn from(record: &CertificateRecord) -> Self {
        Self {
            subject_cn: record.subject_cn().map(ToString::to_string),
            san_entries: record.san_entries().to_vec(),
            not_before: record.not_before(),
            not_after: record.not_after(),
            fingerprint: record.public_key_fingerprint().to_hex(),
            key_algorithm: record.key_algorithm(),
            signature_algorithm: record.signature_algorithm().name,
            serial_number: record.serial_number().to_string(),
            source: record.source(),
        }
    }
}

impl CertificateSummary {
    /// Same key, serial and expiry; used to decide whether the live pair changed
    #[must_use]
    pub fn is_same_material(&self, other: &CertificateSummary) -> bool {
        self.fingerprint == other.fingerprint
            && self.serial_number == other.serial_number
            && self.not_after == other.not_after
    }
}

/// Output of one validation pass
#[derive(Debug, Clone, Serialize)]
pub struct ValidationResult {
    pub status: ValidationStatus,
    pub issues: Vec<ValidationIssue>,
    pub checked_domains: Vec<String>,
    pub checked_at: DateTime<Utc>,
    pub certificate: Option<CertificateSummary>,
    pub expiry: Option<ExpiryAssessment>,
    pub policy: ValidationPolicy,
}

impl ValidationResult {
    /// Whether the pair may be served under the active policy
    ///
    /// `OK` is always usable. `EXPIRING_SOON` is usable unless the policy is
    /// strict and the remaining validity is inside the critical window.
    #[must_use]
    pub fn is_usable(&self) -> bool {
        match self.status {
            ValidationStatus::Ok => true,
            ValidationStatus::ExpiringSoon => {
                self.policy == ValidationPolicy::Lenient
                    || !self.expiry.is_some_and(|e| e.critical)
            }
            _ => false,
        }
    }

    /// Whether a consumer may reload onto this pair
    ///
    /// Never true on a hard failure, so a broken pair is never picked up.
    #[must_use]
    pub fn permits_reload(&self) -> bool {
        matches!(
            self.status,
            ValidationStatus::Ok | ValidationStatus::ExpiringSoon
        )
    }

    /// Process exit code: 0 when usable, 1 otherwise
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        i32::from(!self.is_usable())
    }

    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.issues
            .iter()
            .any(|i| matches!(i.severity, IssueSeverity::Error))
    }

    #[must_use]
    pub fn has_warnings(&self) -> bool {
        self.issues
            .iter()
            .any(|i| matches!(i.severity, IssueSeverity::Warning))
    }

    /// Issues carrying `status`
    pub fn issues_with(&self, status: ValidationStatus) -> impl Iterator<Item = &ValidationIssue> {
        self.issues.iter().filter(move |i| i.status == status)
    }

    /// Semicolon separated error messages
    #[must_use]
    pub fn error_summary(&self) -> String {
        self.issues
            .iter()
            .filter(|i| matches!(i.severity, IssueSeverity::Error))
            .map(|i| i.message.as_str())
            .collect::<Vec<_>>()
            .join("; ")
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::certificate::expiry::ExpiryState;

    fn result(status: ValidationStatus, policy: ValidationPolicy, critical: bool) -> ValidationResult {
        ValidationResult {
            status,
            issues: Vec::new(),
            checked_domains: vec!["example.com".to_string()],
            checked_at: Utc::now(),
            certificate: None,
            expiry: Some(ExpiryAssessment {
                state: ExpiryState::ExpiringSoon,
                remaining: Duration::days(if critical { 3 } else { 20 }),
                critical,
                not_yet_valid: false,
            }),
            policy,
        }
    }

    #[test]
    fn hard_failures_outrank_everything() {
        let ordered = [
            ValidationStatus::Ok,
            ValidationStatus::ExpiringSoon,
            ValidationStatus::DomainMismatch,
            ValidationStatus::MismatchedKey,
            ValidationStatus::Expired,
            ValidationStatus::InvalidFormat,
        ];
        for pair in ordered.windows(2) {
            assert!(pair[0].rank() < pair[1].rank(), "{} < {}", pair[0], pair[1]);
        }
        assert_eq!(
            ValidationStatus::NotFound.rank(),
            ValidationStatus::PermissionDenied.rank()
        );
        assert!(ValidationStatus::NotFound.is_hard_failure());
        assert!(!ValidationStatus::Expired.is_hard_failure());
    }

    #[test]
    fn exit_codes_follow_usability() {
        let lenient = ValidationPolicy::Lenient;
        assert_eq!(result(ValidationStatus::Ok, lenient, false).exit_code(), 0);
        assert_eq!(result(ValidationStatus::ExpiringSoon, lenient, true).exit_code(), 0);
        assert_eq!(result(ValidationStatus::Expired, lenient, false).exit_code(), 1);
        assert_eq!(result(ValidationStatus::NotFound, lenient, false).exit_code(), 1);
    }

    #[test]
    fn strict_policy_rejects_critical_expiry() {
        let strict = ValidationPolicy::Strict;
        let critical = result(ValidationStatus::ExpiringSoon, strict, true);
        assert!(!critical.is_usable());
        assert!(critical.permits_reload());
        assert!(result(ValidationStatus::ExpiringSoon, strict, false).is_usable());
    }

    #[test]
    fn reload_is_never_permitted_on_failure() {
        for status in [
            ValidationStatus::DomainMismatch,
            ValidationStatus::MismatchedKey,
            ValidationStatus::Expired,
            ValidationStatus::InvalidFormat,
            ValidationStatus::PermissionDenied,
            ValidationStatus::NotFound,
        ] {
            assert!(!result(status, ValidationPolicy::Lenient, false).permits_reload());
        }
    }

    #[test]
    fn status_serializes_screaming_snake_case() {
        let json = serde_json::to_string(&ValidationStatus::ExpiringSoon).expect("json");
        assert_eq!(json, "\"EXPIRING_SOON\"");
    }
}
