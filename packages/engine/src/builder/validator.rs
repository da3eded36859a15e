//! Validator builder

use std::path::Path;

use chrono::{DateTime, Utc};

use crate::config::{ExpiryThresholds, ValidationConfig, ValidationPolicy};
use crate::orchestrator::{Candidate, ValidationOrchestrator};
use crate::responses::ValidationResult;
use crate::store::CertificatePaths;
use crate::types::CertificateSource;

#[derive(Debug, Clone, Default)]
pub struct ValidatorBuilder;

impl ValidatorBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Validate a pair stored on disk
    pub fn from_files<C: AsRef<Path>, K: AsRef<Path>>(self, cert: C, key: K) -> ValidatorWithInput {
        self.from_paths(CertificatePaths::new(cert.as_ref(), key.as_ref()))
    }

    #[must_use]
    pub fn from_paths(self, paths: CertificatePaths) -> ValidatorWithInput {
        ValidatorWithInput::new(Candidate::files(paths, CertificateSource::OperatorSupplied))
    }

    /// Validate a pair held in memory
    #[must_use]
    pub fn from_pem(self, cert_pem: &str, key_pem: &str) -> ValidatorWithInput {
        ValidatorWithInput::new(Candidate::pem(
            cert_pem.as_bytes(),
            key_pem.as_bytes(),
            CertificateSource::OperatorSupplied,
        ))
    }
}

/// Validator with its input configured
#[derive(Debug, Clone)]
pub struct ValidatorWithInput {
    candidate: Candidate,
    domains: Vec<String>,
    config: ValidationConfig,
    now: Option<DateTime<Utc>>,
}

impl ValidatorWithInput {
    fn new(candidate: Candidate) -> Self {
        Self {
            candidate,
            domains: Vec::new(),
            config: ValidationConfig::default(),
            now: None,
        }
    }

    /// Require coverage of `domain`
    #[must_use]
    pub fn domain(mut self, domain: &str) -> Self {
        self.domains.push(domain.to_string());
        self
    }

    #[must_use = "Validator builder methods return a new validator and should be used"]
    pub fn domains(mut self, domains: &[&str]) -> Self {
        self.domains.extend(domains.iter().map(ToString::to_string));
        self
    }

    /// Tag the material's origin for reporting
    #[must_use]
    pub fn source(self, source: CertificateSource) -> Self {
        let candidate = match self.candidate {
            Candidate::Files { paths, .. } => Candidate::Files { paths, source },
            Candidate::Pem { cert, key, .. } => Candidate::Pem { cert, key, source },
        };
        Self { candidate, ..self }
    }

    #[must_use]
    pub fn config(self, config: ValidationConfig) -> Self {
        Self { config, ..self }
    }

    #[must_use]
    pub fn thresholds(self, thresholds: ExpiryThresholds) -> Self {
        Self {
            config: self.config.with_thresholds(thresholds),
            ..self
        }
    }

    #[must_use]
    pub fn policy(self, policy: ValidationPolicy) -> Self {
        Self {
            config: self.config.with_policy(policy),
            ..self
        }
    }

    /// Evaluate as of `now` instead of the wall clock
    #[must_use]
    pub fn at(self, now: DateTime<Utc>) -> Self {
        Self {
            now: Some(now),
            ..self
        }
    }

    /// Run the validation pass
    #[must_use]
    pub fn validate(self) -> ValidationResult {
        let orchestrator = ValidationOrchestrator::new(self.config);
        let now = self.now.unwrap_or_else(Utc::now);
        orchestrator.validate_at(&self.candidate, &self.domains, now)
    }
}
