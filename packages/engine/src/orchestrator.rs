//! One validation pass over a certificate/key pair
//!
//! The pass moves through fixed states. Hard failures (unreadable, absent or
//! undecodable material) end the pass early in [`ValidationState::Failed`],
//! entered from `Loaded` when loading fails and from `Parsed` when decoding does;
//! every other finding is recorded as an issue and the pass continues so the
//! caller sees all problems at once.

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::certificate::domain::{CoveredBy, covering_name};
use crate::certificate::expiry::{ExpirationMonitor, ExpiryAssessment, ExpiryState};
use crate::certificate::keypair::{KeyMatch, match_key_pair, parse_private_key_pem};
use crate::certificate::parser::parse_certificate_pem;
use crate::config::{ValidationConfig, ValidationPolicy};
use crate::error::{CertError, ErrorKind};
use crate::responses::{
    CertificateSummary, IssueSeverity, ValidationIssue, ValidationResult, ValidationStatus,
};
use crate::store::{CertificatePaths, CertificateStore, OsFs, StoreFs};
use crate::types::{CertificateRecord, CertificateSource, KeyMaterial};

/// Pipeline position of a pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationState {
    Pending,
    Loaded,
    Parsed,
    KeyChecked,
    DomainChecked,
    ExpiryChecked,
    Done,
    Failed(ValidationStatus),
}

/// Material to validate
#[derive(Debug, Clone)]
pub enum Candidate {
    /// Pair read through the store
    Files {
        paths: CertificatePaths,
        source: CertificateSource,
    },
    /// Pair already in memory
    Pem {
        cert: Vec<u8>,
        key: Vec<u8>,
        source: CertificateSource,
    },
}

impl Candidate {
    pub fn files(paths: CertificatePaths, source: CertificateSource) -> Self {
        Self::Files { paths, source }
    }

    pub fn pem(cert: impl Into<Vec<u8>>, key: impl Into<Vec<u8>>, source: CertificateSource) -> Self {
        Self::Pem {
            cert: cert.into(),
            key: key.into(),
            source,
        }
    }

    fn source(&self) -> CertificateSource {
        match self {
            Self::Files { source, .. } | Self::Pem { source, .. } => *source,
        }
    }
}

/// Runs the load, parse, key, domain and expiry checks in order
#[derive(Debug, Clone)]
pub struct ValidationOrchestrator<F: StoreFs = OsFs> {
    config: ValidationConfig,
    monitor: ExpirationMonitor,
    store: CertificateStore<F>,
}

impl ValidationOrchestrator<OsFs> {
    #[must_use]
    pub fn new(config: ValidationConfig) -> Self {
        Self::with_store(config, CertificateStore::new())
    }
}

impl<F: StoreFs> ValidationOrchestrator<F> {
    pub fn with_store(config: ValidationConfig, store: CertificateStore<F>) -> Self {
        Self {
            config,
            monitor: ExpirationMonitor::new(config.thresholds),
            store,
        }
    }

    #[must_use]
    pub fn config(&self) -> &ValidationConfig {
        &self.config
    }

    #[must_use]
    pub fn store(&self) -> &CertificateStore<F> {
        &self.store
    }

    /// Validate `candidate` for `domains` at the current time
    pub fn validate(&self, candidate: &Candidate, domains: &[String]) -> ValidationResult {
        self.validate_at(candidate, domains, Utc::now())
    }

    /// Validate `candidate` for `domains` as of `now`
    pub fn validate_at(
        &self,
        candidate: &Candidate,
        domains: &[String],
        now: DateTime<Utc>,
    ) -> ValidationResult {
        self.run(candidate, domains, now).finish()
    }

    fn run(&self, candidate: &Candidate, domains: &[String], now: DateTime<Utc>) -> Pass {
        let mut pass = Pass::new(self.config.policy, domains, now);

        pass.advance(ValidationState::Loaded);
        let Some((cert_bytes, key_bytes)) = self.load(candidate, &mut pass) else {
            return pass;
        };

        pass.advance(ValidationState::Parsed);
        let Some((record, key)) = parse(&cert_bytes, &key_bytes, candidate.source(), &mut pass) else {
            return pass;
        };
        pass.certificate = Some(CertificateSummary::from(&record));

        self.check_key(&record, &key, &mut pass);
        pass.advance(ValidationState::KeyChecked);

        check_domains(&record, domains, &mut pass);
        pass.advance(ValidationState::DomainChecked);

        self.check_expiry(&record, now, &mut pass);
        pass.advance(ValidationState::ExpiryChecked);

        pass
    }

    fn load(&self, candidate: &Candidate, pass: &mut Pass) -> Option<(Vec<u8>, Vec<u8>)> {
        match candidate {
            Candidate::Pem { cert, key, .. } => Some((cert.clone(), key.clone())),
            Candidate::Files { paths, .. } => {
                let pair = match self.store.read_pair(paths) {
                    Ok(pair) => pair,
                    Err(e) => {
                        pass.fail(load_issue(&e));
                        return None;
                    }
                };
                match (pair.cert, pair.key) {
                    (Some(cert), Some(key)) => Some((cert, key)),
                    (cert, key) => {
                        let mut issues = Vec::new();
                        if cert.is_none() {
                            issues.push(missing_issue("certificate", &paths.cert));
                        }
                        if key.is_none() {
                            issues.push(missing_issue("private key", &paths.key));
                        }
                        pass.fail_all(issues);
                        None
                    }
                }
            }
        }
    }

    fn check_key(&self, record: &CertificateRecord, key: &KeyMaterial, pass: &mut Pass) {
        if match_key_pair(record, key) == KeyMatch::MismatchedKey {
            pass.record(
                ValidationIssue::error(
                    ValidationStatus::MismatchedKey,
                    format!(
                        "private key ({} {}) does not belong to the certificate ({})",
                        key.algorithm(),
                        key.public_key_fingerprint(),
                        record.public_key_fingerprint()
                    ),
                )
                .with_suggestion("Install the key the certificate was issued for, or regenerate both"),
            );
        }
    }

    fn check_expiry(&self, record: &CertificateRecord, now: DateTime<Utc>, pass: &mut Pass) {
        let assessment = self
            .monitor
            .assess(record.not_before(), record.not_after(), now);
        pass.expiry = Some(assessment);
        let strict = self.config.policy == ValidationPolicy::Strict;

        if assessment.not_yet_valid {
            let message = format!("certificate is not valid before {}", record.not_before());
            if strict {
                pass.record(
                    ValidationIssue::error(ValidationStatus::Expired, message)
                        .with_suggestion("Check the system clock or regenerate the certificate"),
                );
            } else {
                pass.record(ValidationIssue::warning(ValidationStatus::Ok, message));
            }
        }

        match assessment.state {
            ExpiryState::Ok => {}
            ExpiryState::Expired => pass.record(
                ValidationIssue::error(
                    ValidationStatus::Expired,
                    format!(
                        "certificate expired {} day(s) ago on {}",
                        -assessment.remaining_days(),
                        record.not_after()
                    ),
                )
                .with_suggestion("Renew or regenerate the certificate"),
            ),
            ExpiryState::ExpiringSoon => pass.record(expiring_issue(record, &assessment, strict)),
        }
    }
}

fn parse(
    cert_bytes: &[u8],
    key_bytes: &[u8],
    source: CertificateSource,
    pass: &mut Pass,
) -> Option<(CertificateRecord, KeyMaterial)> {
    let record = parse_certificate_pem(cert_bytes, source);
    let key = parse_private_key_pem(key_bytes);

    let mut issues = Vec::new();
    if let Err(e) = &record {
        issues.push(
            ValidationIssue::error(ValidationStatus::InvalidFormat, format!("certificate: {e}"))
                .with_suggestion("Provide a PEM encoded X.509 certificate"),
        );
    }
    if let Err(e) = &key {
        issues.push(
            ValidationIssue::error(ValidationStatus::InvalidFormat, format!("private key: {e}"))
                .with_suggestion("Provide an unencrypted PEM private key (PKCS#8, PKCS#1 or SEC1)"),
        );
    }
    if record.as_ref().is_ok_and(|r| r.san_entries().is_empty()) {
        issues.push(
            ValidationIssue::error(
                ValidationStatus::InvalidFormat,
                "certificate has no DNS subject alternative names",
            )
            .with_suggestion("Reissue the certificate with a SAN extension listing every domain"),
        );
    }

    match (record, key) {
        (Ok(record), Ok(key)) if issues.is_empty() => Some((record, key)),
        _ => {
            pass.fail_all(issues);
            None
        }
    }
}

fn check_domains(record: &CertificateRecord, domains: &[String], pass: &mut Pass) {
    if domains.is_empty() {
        debug!("no domains requested, skipping domain coverage");
        return;
    }
    for domain in domains {
        match covering_name(domain, record.subject_cn(), record.san_entries()) {
            Some(CoveredBy::San(name)) => debug!(domain = %domain, san = %name, "domain covered"),
            Some(CoveredBy::CommonName(cn)) => pass.record(ValidationIssue::info(format!(
                "{domain} matched only the legacy common name {cn}"
            ))),
            None => pass.record(
                ValidationIssue::error(
                    ValidationStatus::DomainMismatch,
                    format!(
                        "{domain} is not covered by [{}]",
                        record.san_entries().join(", ")
                    ),
                )
                .with_suggestion(format!("Regenerate the certificate including {domain}")),
            ),
        }
    }
}

fn expiring_issue(
    record: &CertificateRecord,
    assessment: &ExpiryAssessment,
    strict: bool,
) -> ValidationIssue {
    let message = format!(
        "certificate expires in {} day(s) on {}",
        assessment.remaining_days(),
        record.not_after()
    );
    let issue = if strict && assessment.critical {
        ValidationIssue::error(ValidationStatus::ExpiringSoon, message)
    } else {
        ValidationIssue::warning(ValidationStatus::ExpiringSoon, message)
    };
    issue.with_suggestion("Renew the certificate before it expires")
}

fn load_issue(error: &CertError) -> ValidationIssue {
    match error.kind() {
        ErrorKind::PermissionDenied => {
            ValidationIssue::error(ValidationStatus::PermissionDenied, error.to_string())
                .with_suggestion("Grant the deploying user read access to the certificate and key")
        }
        ErrorKind::NotFound => ValidationIssue::error(ValidationStatus::NotFound, error.to_string()),
        _ => ValidationIssue::error(ValidationStatus::InvalidFormat, error.to_string())
            .with_suggestion("Check that the paths point at PEM files"),
    }
}

fn missing_issue(what: &str, path: &std::path::Path) -> ValidationIssue {
    ValidationIssue::error(
        ValidationStatus::NotFound,
        format!("{what} not found at {}", path.display()),
    )
    .with_suggestion("Provide the file or set SSL_MODE=generate")
}

/// Mutable state of one pass
struct Pass {
    state: ValidationState,
    /// States left behind, oldest first
    history: Vec<ValidationState>,
    issues: Vec<ValidationIssue>,
    policy: ValidationPolicy,
    domains: Vec<String>,
    now: DateTime<Utc>,
    certificate: Option<CertificateSummary>,
    expiry: Option<ExpiryAssessment>,
}

impl Pass {
    fn new(policy: ValidationPolicy, domains: &[String], now: DateTime<Utc>) -> Self {
        Self {
            state: ValidationState::Pending,
            history: Vec::new(),
            issues: Vec::new(),
            policy,
            domains: domains.to_vec(),
            now,
            certificate: None,
            expiry: None,
        }
    }

    fn advance(&mut self, next: ValidationState) {
        debug!(from = ?self.state, to = ?next, "validation state transition");
        self.history.push(self.state);
        self.state = next;
    }

    fn record(&mut self, issue: ValidationIssue) {
        match issue.severity {
            IssueSeverity::Error => debug!(status = %issue.status, "{}", issue.message),
            IssueSeverity::Warning => warn!(status = %issue.status, "{}", issue.message),
            IssueSeverity::Info => debug!("{}", issue.message),
        }
        self.issues.push(issue);
    }

    fn fail(&mut self, issue: ValidationIssue) {
        self.fail_all(vec![issue]);
    }

    fn fail_all(&mut self, issues: Vec<ValidationIssue>) {
        let status = issues
            .iter()
            .map(|i| i.status)
            .max_by_key(|s| s.rank())
            .unwrap_or(ValidationStatus::InvalidFormat);
        for issue in issues {
            self.record(issue);
        }
        self.advance(ValidationState::Failed(status));
    }

    fn finish(mut self) -> ValidationResult {
        let status = self
            .issues
            .iter()
            .map(|i| i.status)
            .max_by_key(|s| s.rank())
            .unwrap_or(ValidationStatus::Ok);
        if !matches!(self.state, ValidationState::Failed(_)) {
            self.advance(ValidationState::Done);
        }
        info!(status = %status, issues = self.issues.len(), "validation finished");
        debug!(path = ?self.history, "validation path");

        ValidationResult {
            status,
            issues: self.issues,
            checked_domains: self.domains,
            checked_at: self.now,
            certificate: self.certificate,
            expiry: self.expiry,
            policy: self.policy,
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn ec_pair(domains: &[&str]) -> (String, String) {
        let key = rcgen::KeyPair::generate_for(&rcgen::PKCS_ECDSA_P256_SHA256).expect("key");
        let names = domains.iter().map(ToString::to_string).collect::<Vec<_>>();
        let params = rcgen::CertificateParams::new(names).expect("params");
        let cert = params.self_signed(&key).expect("cert");
        (cert.pem(), key.serialize_pem())
    }

    fn domains(names: &[&str]) -> Vec<String> {
        names.iter().map(ToString::to_string).collect()
    }

    fn lenient() -> ValidationOrchestrator {
        ValidationOrchestrator::new(ValidationConfig::default())
    }

    #[test]
    fn load_failure_is_entered_from_loaded() {
        let dir = tempfile::tempdir().expect("tempdir");
        let candidate = Candidate::files(
            CertificatePaths::from_stem(dir.path(), "absent"),
            CertificateSource::OperatorSupplied,
        );
        let pass = lenient().run(&candidate, &domains(&["example.com"]), Utc::now());
        assert_eq!(pass.state, ValidationState::Failed(ValidationStatus::NotFound));
        assert_eq!(pass.history, [ValidationState::Pending, ValidationState::Loaded]);
    }

    #[test]
    fn parse_failure_is_entered_from_parsed() {
        let candidate = Candidate::pem("garbage", "garbage", CertificateSource::OperatorSupplied);
        let pass = lenient().run(&candidate, &domains(&["example.com"]), Utc::now());
        assert_eq!(pass.state, ValidationState::Failed(ValidationStatus::InvalidFormat));
        assert_eq!(pass.history.last(), Some(&ValidationState::Parsed));
    }

    #[test]
    fn clean_pass_walks_every_state() {
        let (cert, key) = ec_pair(&["example.com"]);
        let candidate = Candidate::pem(cert, key, CertificateSource::OperatorSupplied);
        let pass = lenient().run(&candidate, &domains(&["example.com"]), Utc::now());
        assert_eq!(pass.state, ValidationState::ExpiryChecked);
        assert_eq!(
            pass.history,
            [
                ValidationState::Pending,
                ValidationState::Loaded,
                ValidationState::Parsed,
                ValidationState::KeyChecked,
                ValidationState::DomainChecked,
            ]
        );
    }

    #[test]
    fn matching_pair_is_ok() {
        let (cert, key) = ec_pair(&["example.com", "*.example.com"]);
        let result = lenient().validate(
            &Candidate::pem(cert, key, CertificateSource::OperatorSupplied),
            &domains(&["example.com", "api.example.com"]),
        );
        assert_eq!(result.status, ValidationStatus::Ok, "{:?}", result.issues);
        assert!(result.is_usable());
        assert_eq!(result.exit_code(), 0);
        let summary = result.certificate.expect("summary");
        assert_eq!(summary.source, CertificateSource::OperatorSupplied);
    }

    #[test]
    fn soft_failures_accumulate_and_most_severe_wins() {
        let (cert, _) = ec_pair(&["example.com"]);
        let (_, other_key) = ec_pair(&["example.com"]);
        // rcgen's default validity is 1975..4096, so look from far in the future
        let far_future = Utc::now() + Duration::days(365 * 3000);
        let result = lenient().validate_at(
            &Candidate::pem(cert, other_key, CertificateSource::Unknown),
            &domains(&["other.org"]),
            far_future,
        );
        assert_eq!(result.status, ValidationStatus::Expired);
        assert_eq!(result.issues_with(ValidationStatus::MismatchedKey).count(), 1);
        assert_eq!(result.issues_with(ValidationStatus::DomainMismatch).count(), 1);
        assert!(!result.permits_reload());
    }

    #[test]
    fn one_issue_per_uncovered_domain() {
        let (cert, key) = ec_pair(&["a.example.com"]);
        let result = lenient().validate(
            &Candidate::pem(cert, key, CertificateSource::Unknown),
            &domains(&["a.example.com", "b.example.com", "c.example.com"]),
        );
        assert_eq!(result.status, ValidationStatus::DomainMismatch);
        assert_eq!(result.issues_with(ValidationStatus::DomainMismatch).count(), 2);
    }

    #[test]
    fn garbage_is_invalid_format_without_later_checks() {
        let result = lenient().validate(
            &Candidate::pem(&b"not a certificate"[..], &b"not a key"[..], CertificateSource::Unknown),
            &domains(&["example.com"]),
        );
        assert_eq!(result.status, ValidationStatus::InvalidFormat);
        assert_eq!(result.issues.len(), 2);
        assert!(result.certificate.is_none());
        assert!(result.expiry.is_none());
    }

    #[test]
    fn absent_files_are_not_found() {
        let dir = tempfile::tempdir().expect("tempdir");
        let paths = CertificatePaths::from_stem(dir.path(), "server");
        let result = lenient().validate(
            &Candidate::files(paths, CertificateSource::Unknown),
            &domains(&["example.com"]),
        );
        assert_eq!(result.status, ValidationStatus::NotFound);
        assert_eq!(result.issues.len(), 2);
        assert_eq!(result.exit_code(), 1);
    }

    #[test]
    fn not_yet_valid_warns_when_lenient_and_expires_when_strict() {
        let (cert, key) = ec_pair(&["example.com"]);
        let before_issue = chrono::DateTime::parse_from_rfc3339("1970-06-01T00:00:00Z")
            .expect("date")
            .with_timezone(&Utc);
        let candidate = Candidate::pem(cert, key, CertificateSource::Unknown);
        let names = domains(&["example.com"]);

        let lenient_result = lenient().validate_at(&candidate, &names, before_issue);
        assert_eq!(lenient_result.status, ValidationStatus::Ok);
        assert!(lenient_result.has_warnings());

        let strict = ValidationOrchestrator::new(ValidationConfig::strict());
        let strict_result = strict.validate_at(&candidate, &names, before_issue);
        assert_eq!(strict_result.status, ValidationStatus::Expired);
        assert!(!strict_result.is_usable());
    }
}
