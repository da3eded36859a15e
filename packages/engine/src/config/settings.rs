//! Deployment settings consumed from the environment
//!
//! Variables: `SSL_MODE`, `SSL_BASE_DIR`, `SSL_PATH`, `SSL_CERT_PATH`,
//! `SSL_KEY_PATH`, `DOMAIN`, `ADDITIONAL_DOMAINS`, `SSL_WARN_DAYS`,
//! `SSL_CRITICAL_DAYS`, `SSL_POLICY`, `SSL_KEY_ALGORITHM`, `SSL_RSA_BITS`,
//! `SSL_VALIDITY_DAYS`.

use std::path::PathBuf;
use std::str::FromStr;

use serde::Serialize;

use super::{ExpiryThresholds, ValidationConfig, ValidationPolicy};
use crate::certificate::generation::{GenerationParams, KeyAlgorithm};
use crate::error::{CertError, Result};
use crate::store::CertificatePaths;

/// How the deployment obtains its certificate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SslMode {
    /// Generate self-signed material when none is usable
    #[default]
    Generate,
    /// Only validate operator-supplied material
    Existing,
    /// TLS disabled, nothing to validate
    None,
}

impl FromStr for SslMode {
    type Err = CertError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "generate" => Ok(Self::Generate),
            "existing" => Ok(Self::Existing),
            "none" | "" => Ok(Self::None),
            other => Err(CertError::Config(format!(
                "unknown SSL_MODE '{other}' (expected generate, existing or none)"
            ))),
        }
    }
}

/// Resolved SSL settings
#[derive(Debug, Clone)]
pub struct SslSettings {
    pub mode: SslMode,
    pub base_dir: PathBuf,
    pub ssl_path: String,
    pub cert_path: Option<PathBuf>,
    pub key_path: Option<PathBuf>,
    pub domain: Option<String>,
    pub additional_domains: Vec<String>,
    pub validation: ValidationConfig,
    pub generation: GenerationParams,
}

impl Default for SslSettings {
    fn default() -> Self {
        Self {
            mode: SslMode::default(),
            base_dir: PathBuf::from("./ssl"),
            ssl_path: "server".to_string(),
            cert_path: None,
            key_path: None,
            domain: None,
            additional_domains: Vec::new(),
            validation: ValidationConfig::default(),
            generation: GenerationParams::default(),
        }
    }
}

impl SslSettings {
    /// Load settings from process environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load settings through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut settings = Self::default();

        if let Some(mode) = get("SSL_MODE") {
            settings.mode = mode.parse()?;
        }
        if let Some(dir) = get("SSL_BASE_DIR") {
            settings.base_dir = PathBuf::from(dir);
        }
        if let Some(stem) = get("SSL_PATH") {
            settings.ssl_path = stem;
        }
        settings.cert_path = get("SSL_CERT_PATH").map(PathBuf::from);
        settings.key_path = get("SSL_KEY_PATH").map(PathBuf::from);
        settings.domain = get("DOMAIN").map(|d| d.trim().to_string());
        if let Some(list) = get("ADDITIONAL_DOMAINS") {
            settings.additional_domains = split_domain_list(&list);
        }

        let warn_days = parse_number(get("SSL_WARN_DAYS"), "SSL_WARN_DAYS")?
            .unwrap_or(ExpiryThresholds::DEFAULT_WARN_DAYS);
        let critical_days = parse_number(get("SSL_CRITICAL_DAYS"), "SSL_CRITICAL_DAYS")?
            .unwrap_or(ExpiryThresholds::DEFAULT_CRITICAL_DAYS);
        settings.validation.thresholds = ExpiryThresholds::new(warn_days, critical_days)?;
        if let Some(policy) = get("SSL_POLICY") {
            settings.validation.policy = policy.parse::<ValidationPolicy>()?;
        }

        let rsa_bits = parse_number(get("SSL_RSA_BITS"), "SSL_RSA_BITS")?;
        if let Some(alg) = get("SSL_KEY_ALGORITHM") {
            settings.generation.algorithm = KeyAlgorithm::parse(&alg, rsa_bits)?;
        } else if let Some(bits) = rsa_bits {
            settings.generation.algorithm = KeyAlgorithm::rsa(bits)?;
        }
        if let Some(days) = parse_number(get("SSL_VALIDITY_DAYS"), "SSL_VALIDITY_DAYS")? {
            settings.generation.validity_days = days;
        }

        Ok(settings)
    }

    /// Primary domain first, then additional domains, without duplicates
    #[must_use]
    pub fn domains(&self) -> Vec<String> {
        let mut domains: Vec<String> = Vec::new();
        for domain in self.domain.iter().chain(self.additional_domains.iter()) {
            if !domains.iter().any(|d| d.eq_ignore_ascii_case(domain)) {
                domains.push(domain.clone());
            }
        }
        domains
    }

    /// Certificate and key locations; explicit paths win over the stem convention
    #[must_use]
    pub fn paths(&self) -> CertificatePaths {
        let conventional = CertificatePaths::from_stem(&self.base_dir, &self.ssl_path);
        CertificatePaths::new(
            self.cert_path.clone().unwrap_or(conventional.cert),
            self.key_path.clone().unwrap_or(conventional.key),
        )
    }
}

/// Split a comma or whitespace separated domain list
pub fn split_domain_list(raw: &str) -> Vec<String> {
    raw.split(|c: char| c == ',' || c.is_whitespace())
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .map(ToString::to_string)
        .collect()
}

fn parse_number(raw: Option<String>, name: &str) -> Result<Option<u32>> {
    raw.map(|value| {
        value
            .trim()
            .parse::<u32>()
            .map_err(|e| CertError::Config(format!("{name}='{value}' is not a number: {e}")))
    })
    .transpose()
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn settings_from(vars: &[(&str, &str)]) -> Result<SslSettings> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        SslSettings::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn empty_environment_yields_defaults() {
        let settings = settings_from(&[]).expect("defaults");
        assert_eq!(settings.mode, SslMode::Generate);
        assert_eq!(settings.paths().cert, PathBuf::from("./ssl/server.crt"));
        assert_eq!(settings.paths().key, PathBuf::from("./ssl/server.key"));
        assert_eq!(settings.generation.validity_days, 365);
        assert!(settings.domains().is_empty());
    }

    #[test]
    fn reads_full_variable_set() {
        let settings = settings_from(&[
            ("SSL_MODE", "existing"),
            ("SSL_CERT_PATH", "/etc/ssl/site.pem"),
            ("SSL_KEY_PATH", "/etc/ssl/private/site.key"),
            ("DOMAIN", "example.com"),
            ("ADDITIONAL_DOMAINS", "www.example.com, *.example.com,EXAMPLE.com"),
            ("SSL_WARN_DAYS", "45"),
            ("SSL_CRITICAL_DAYS", "10"),
            ("SSL_POLICY", "strict"),
            ("SSL_KEY_ALGORITHM", "ec"),
        ])
        .expect("settings");

        assert_eq!(settings.mode, SslMode::Existing);
        assert_eq!(settings.paths().cert, PathBuf::from("/etc/ssl/site.pem"));
        assert_eq!(settings.paths().key, PathBuf::from("/etc/ssl/private/site.key"));
        assert_eq!(
            settings.domains(),
            vec!["example.com", "www.example.com", "*.example.com"]
        );
        assert_eq!(settings.validation.thresholds.warn_days(), 45);
        assert_eq!(settings.validation.thresholds.critical_days(), 10);
        assert_eq!(settings.validation.policy, ValidationPolicy::Strict);
        assert_eq!(settings.generation.algorithm, KeyAlgorithm::EcP256);
    }

    #[test]
    fn rejects_malformed_values() {
        assert!(settings_from(&[("SSL_MODE", "acme")]).is_err());
        assert!(settings_from(&[("SSL_WARN_DAYS", "soon")]).is_err());
        assert!(settings_from(&[("SSL_WARN_DAYS", "5"), ("SSL_CRITICAL_DAYS", "9")]).is_err());
        assert!(settings_from(&[("SSL_RSA_BITS", "1024")]).is_err());
    }
}
