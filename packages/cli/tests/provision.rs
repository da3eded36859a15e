//! Provisioning workflow across SSL_MODE values

use std::collections::HashMap;
use std::path::Path;

use chrono::{Duration, Utc};
use sslward::engine::{
    CertificatePaths, CertificateStore, KeyAlgorithm, Ssl, SslSettings, ValidationStatus,
};
use sslward::{EXIT_GENERATION_FAILED, EXIT_INVALID, ProvisionAction, ProvisionError, Provisioner};

fn settings(dir: &Path, vars: &[(&str, &str)]) -> SslSettings {
    let mut map: HashMap<String, String> = HashMap::from([
        ("SSL_BASE_DIR".to_string(), dir.display().to_string()),
        ("SSL_KEY_ALGORITHM".to_string(), "ec".to_string()),
    ]);
    for (key, value) in vars {
        map.insert((*key).to_string(), (*value).to_string());
    }
    SslSettings::from_lookup(|key| map.get(key).cloned()).expect("settings")
}

fn install_pair(paths: &CertificatePaths, domain: &str, validity_days: u32, age_days: i64) {
    let pair = Ssl::certificate()
        .generator()
        .domain(domain)
        .algorithm(KeyAlgorithm::EcP256)
        .valid_for_days(validity_days)
        .not_before(Utc::now() - Duration::days(age_days))
        .generate()
        .expect("generate");
    CertificateStore::new()
        .write(paths, pair.cert_pem.as_bytes(), &pair.key)
        .expect("store");
}

#[test]
fn generate_mode_creates_pair_then_leaves_it_alone() {
    let dir = tempfile::tempdir().expect("tempdir");
    let settings = settings(
        dir.path(),
        &[("DOMAIN", "example.com"), ("ADDITIONAL_DOMAINS", "*.example.com")],
    );
    let mut provisioner = Provisioner::new(settings);

    let first = provisioner.ensure().expect("ensure");
    assert_eq!(first.action, ProvisionAction::Generated);
    assert!(first.changed);
    assert!(first.reload_due());
    assert_eq!(first.exit_code(), 0);
    let result = first.result.as_ref().expect("validated");
    assert_eq!(result.status, ValidationStatus::Ok, "{:?}", result.issues);
    assert!(dir.path().join("server.crt").exists());
    assert!(dir.path().join("server.key").exists());

    let second = provisioner.ensure().expect("ensure");
    assert_eq!(second.action, ProvisionAction::Validated);
    assert!(!second.changed);
    assert!(!second.reload_due());
}

#[test]
fn expired_pair_is_replaced() {
    let dir = tempfile::tempdir().expect("tempdir");
    let settings = settings(dir.path(), &[("DOMAIN", "example.com")]);
    install_pair(&settings.paths(), "example.com", 10, 20);

    let mut provisioner = Provisioner::new(settings);
    assert_eq!(
        provisioner.validate().expect("validate").status,
        ValidationStatus::Expired
    );

    let report = provisioner.ensure().expect("ensure");
    assert_eq!(report.action, ProvisionAction::Generated);
    assert!(report.changed);
    assert_eq!(report.result.expect("validated").status, ValidationStatus::Ok);
}

#[test]
fn pair_for_other_domain_is_replaced_in_generate_mode() {
    let dir = tempfile::tempdir().expect("tempdir");
    let settings = settings(dir.path(), &[("DOMAIN", "example.com")]);
    install_pair(&settings.paths(), "other.org", 365, 0);

    let report = Provisioner::new(settings).ensure().expect("ensure");
    assert_eq!(report.action, ProvisionAction::Generated);
    let result = report.result.expect("validated");
    assert_eq!(result.status, ValidationStatus::Ok);
    assert_eq!(result.certificate.expect("summary").san_entries, ["example.com"]);
}

#[test]
fn existing_mode_never_generates() {
    let dir = tempfile::tempdir().expect("tempdir");
    let settings = settings(dir.path(), &[("DOMAIN", "example.com"), ("SSL_MODE", "existing")]);

    let report = Provisioner::new(settings).ensure().expect("ensure");
    assert_eq!(report.action, ProvisionAction::Validated);
    assert_eq!(report.exit_code(), EXIT_INVALID);
    assert_eq!(report.result.expect("validated").status, ValidationStatus::NotFound);
    assert!(!dir.path().join("server.crt").exists());
}

#[test]
fn none_mode_skips_everything() {
    let dir = tempfile::tempdir().expect("tempdir");
    let settings = settings(dir.path(), &[("SSL_MODE", "none")]);

    let report = Provisioner::new(settings).ensure().expect("ensure");
    assert_eq!(report.action, ProvisionAction::Skipped);
    assert!(report.result.is_none());
    assert_eq!(report.exit_code(), 0);
}

#[test]
fn missing_domain_is_a_configuration_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let err = Provisioner::new(settings(dir.path(), &[]))
        .ensure()
        .expect_err("no domain");
    assert!(matches!(err, ProvisionError::Config(_)));
    assert_eq!(err.exit_code(), EXIT_INVALID);
}

#[test]
fn invalid_domain_is_a_generation_failure() {
    let dir = tempfile::tempdir().expect("tempdir");
    let err = Provisioner::new(settings(dir.path(), &[("DOMAIN", "bad domain")]))
        .ensure()
        .expect_err("invalid domain");
    assert!(matches!(err, ProvisionError::Generation(_)));
    assert_eq!(err.exit_code(), EXIT_GENERATION_FAILED);
}

#[test]
fn explicit_generate_always_replaces() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut provisioner = Provisioner::new(settings(dir.path(), &[("DOMAIN", "example.com")]));

    let first = provisioner.generate().expect("generate");
    let second = provisioner.generate().expect("generate");
    assert!(first.changed);
    assert!(second.changed);
    assert_eq!(second.action, ProvisionAction::Generated);
    let first_fp = first.result.and_then(|r| r.certificate).expect("summary").fingerprint;
    let second_fp = second.result.and_then(|r| r.certificate).expect("summary").fingerprint;
    assert_ne!(first_fp, second_fp);
}
