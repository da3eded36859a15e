//! End-to-end validation scenarios over generated and hand-built material

use chrono::{Duration, Utc};
use sslward_engine::certificate::{parse_certificate_pem, parse_private_key_pem};
use sslward_engine::{
    Candidate, CertificatePaths, CertificateSource, ExpiryThresholds, KeyAlgorithm, Ssl,
    ValidationConfig, ValidationOrchestrator, ValidationStatus,
};

fn domains(names: &[&str]) -> Vec<String> {
    names.iter().map(ToString::to_string).collect()
}

fn generate(names: &[&str], validity_days: u32, not_before_days_ago: i64) -> (String, String) {
    let pair = Ssl::certificate()
        .generator()
        .domains(names)
        .algorithm(KeyAlgorithm::EcP256)
        .valid_for_days(validity_days)
        .not_before(Utc::now() - Duration::days(not_before_days_ago))
        .generate()
        .expect("generate");
    let dir = tempfile::tempdir().expect("tempdir");
    let paths = CertificatePaths::from_stem(dir.path(), "pair");
    sslward_engine::CertificateStore::new()
        .write(&paths, pair.cert_pem.as_bytes(), &pair.key)
        .expect("store");
    let key_pem = String::from_utf8(std::fs::read(&paths.key).expect("read key")).expect("utf8");
    (pair.cert_pem, key_pem)
}

#[test]
fn wildcard_certificate_covers_one_label_only() {
    let (cert, key) = generate(&["a.example.com", "*.example.com"], 365, 0);
    let orchestrator = ValidationOrchestrator::new(ValidationConfig::default());
    let candidate = Candidate::pem(cert, key, CertificateSource::Generated);

    let sub = orchestrator.validate(&candidate, &domains(&["sub.example.com"]));
    assert_eq!(sub.status, ValidationStatus::Ok, "{:?}", sub.issues);

    let apex = orchestrator.validate(&candidate, &domains(&["example.com"]));
    assert_eq!(apex.status, ValidationStatus::DomainMismatch);

    let deep = orchestrator.validate(&candidate, &domains(&["x.y.example.com"]));
    assert_eq!(deep.status, ValidationStatus::DomainMismatch);
}

#[test]
fn every_generated_name_validates_including_the_wildcard() {
    let names = ["example.com", "www.example.com", "*.example.com"];
    let (cert, key) = generate(&names, 365, 0);
    let result = ValidationOrchestrator::new(ValidationConfig::default()).validate(
        &Candidate::pem(cert, key, CertificateSource::Generated),
        &domains(&names),
    );
    assert_eq!(result.status, ValidationStatus::Ok, "{:?}", result.issues);
    assert!(result.permits_reload());
}

#[test]
fn oversized_validity_is_a_generation_failure() {
    let err = Ssl::certificate()
        .generator()
        .domain("long.example.com")
        .algorithm(KeyAlgorithm::EcP256)
        .valid_for_days(4_000_000)
        .generate()
        .expect_err("validity beyond year 9999");
    assert_eq!(err.kind(), sslward_engine::ErrorKind::GenerationFailed);
}

#[test]
fn expired_yesterday_is_expired() {
    let (cert, key) = generate(&["old.example.com"], 30, 31);
    let result = ValidationOrchestrator::new(ValidationConfig::default()).validate(
        &Candidate::pem(cert, key, CertificateSource::Generated),
        &domains(&["old.example.com"]),
    );
    assert_eq!(result.status, ValidationStatus::Expired);
    let expiry = result.expiry.expect("expiry assessed");
    assert!(expiry.remaining_days() < 0);
    assert_eq!(result.exit_code(), 1);
    assert!(!result.permits_reload());
}

#[test]
fn five_days_left_is_expiring_soon_and_policy_decides_usability() {
    let (cert, key) = generate(&["soon.example.com"], 30, 25);
    let candidate = Candidate::pem(cert, key, CertificateSource::Generated);
    let names = domains(&["soon.example.com"]);

    let lenient = ValidationOrchestrator::new(ValidationConfig::default()).validate(&candidate, &names);
    assert_eq!(lenient.status, ValidationStatus::ExpiringSoon);
    let expiry = lenient.expiry.expect("expiry assessed");
    assert!(expiry.remaining_days() > 0 && expiry.remaining_days() <= 5);
    assert!(lenient.is_usable());
    assert_eq!(lenient.exit_code(), 0);

    let strict = ValidationOrchestrator::new(ValidationConfig::strict()).validate(&candidate, &names);
    assert_eq!(strict.status, ValidationStatus::ExpiringSoon);
    assert!(!strict.is_usable());
    assert!(strict.permits_reload());
}

#[test]
fn custom_thresholds_change_classification() {
    let (cert, key) = generate(&["t.example.com"], 60, 0);
    let candidate = Candidate::pem(cert, key, CertificateSource::Generated);
    let names = domains(&["t.example.com"]);

    let default = ValidationOrchestrator::new(ValidationConfig::default()).validate(&candidate, &names);
    assert_eq!(default.status, ValidationStatus::Ok);

    let wide = ValidationConfig::default().with_thresholds(ExpiryThresholds::new(90, 14).expect("thresholds"));
    let warned = ValidationOrchestrator::new(wide).validate(&candidate, &names);
    assert_eq!(warned.status, ValidationStatus::ExpiringSoon);
}

#[test]
fn swapped_keys_are_detected() {
    let (cert_a, _) = generate(&["a.example.com"], 365, 0);
    let (_, key_b) = generate(&["a.example.com"], 365, 0);
    let result = ValidationOrchestrator::new(ValidationConfig::default()).validate(
        &Candidate::pem(cert_a, key_b, CertificateSource::OperatorSupplied),
        &domains(&["a.example.com"]),
    );
    assert_eq!(result.status, ValidationStatus::MismatchedKey);
}

#[test]
fn truncated_and_corrupted_input_never_panics() {
    let (cert, key) = generate(&["trunc.example.com"], 365, 0);
    let orchestrator = ValidationOrchestrator::new(ValidationConfig::default());

    for cut in [0, 10, cert.len() / 3, cert.len() / 2, cert.len() - 40] {
        let truncated = &cert.as_bytes()[..cut];
        assert!(parse_certificate_pem(truncated, CertificateSource::Unknown).is_err());
        let result = orchestrator.validate(
            &Candidate::pem(truncated, key.as_bytes(), CertificateSource::Unknown),
            &domains(&["trunc.example.com"]),
        );
        assert_eq!(result.status, ValidationStatus::InvalidFormat, "cut at {cut}");
    }

    let corrupted = cert.replacen("MII", "AAA", 1);
    assert!(parse_certificate_pem(corrupted.as_bytes(), CertificateSource::Unknown).is_err());
    assert!(parse_private_key_pem(&key.as_bytes()[..key.len() / 2]).is_err());
}
