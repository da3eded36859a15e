//! Generator builder

use chrono::{DateTime, Utc};

use crate::certificate::generation::{
    CertificateGenerator, GeneratedPair, GenerationParams, KeyAlgorithm,
};
use crate::error::{CertError, Result};
use crate::retry::RetryPolicy;
use crate::store::{CertificatePaths, CertificateStore};
use crate::types::CertificateRecord;

#[derive(Debug, Clone, Default)]
pub struct GeneratorBuilder;

impl GeneratorBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Generate for a single domain, which becomes the subject CN
    #[must_use]
    pub fn domain(self, domain: &str) -> GeneratorWithDomain {
        GeneratorWithDomain::new(vec![domain.to_string()])
    }

    /// Generate for several domains; the first becomes the subject CN
    pub fn domains(self, domains: &[&str]) -> GeneratorWithDomain {
        GeneratorWithDomain::new(domains.iter().map(ToString::to_string).collect())
    }

    /// Generate `*.domain` together with the apex
    #[must_use]
    pub fn wildcard(self, domain: &str) -> GeneratorWithDomain {
        GeneratorWithDomain::new(vec![domain.to_string(), format!("*.{domain}")])
    }
}

/// Generator with its domain set configured
#[derive(Debug, Clone)]
pub struct GeneratorWithDomain {
    domains: Vec<String>,
    params: GenerationParams,
    retry: RetryPolicy,
}

impl GeneratorWithDomain {
    fn new(domains: Vec<String>) -> Self {
        Self {
            domains,
            params: GenerationParams::default(),
            retry: RetryPolicy::default(),
        }
    }

    #[must_use]
    pub fn algorithm(mut self, algorithm: KeyAlgorithm) -> Self {
        self.params.algorithm = algorithm;
        self
    }

    #[must_use]
    pub fn valid_for_days(mut self, days: u32) -> Self {
        self.params.validity_days = days;
        self
    }

    #[must_use]
    pub fn not_before(mut self, not_before: DateTime<Utc>) -> Self {
        self.params.not_before = Some(not_before);
        self
    }

    #[must_use]
    pub fn params(self, params: GenerationParams) -> Self {
        Self { params, ..self }
    }

    #[must_use]
    pub fn retry_policy(self, retry: RetryPolicy) -> Self {
        Self { retry, ..self }
    }

    /// Generate the pair in memory
    pub fn generate(self) -> Result<GeneratedPair> {
        let (primary, additional) = self.split_domains()?;
        CertificateGenerator::new()
            .with_retry_policy(self.retry)
            .generate(primary, additional, &self.params)
    }

    /// Generate the pair and store it at `paths`
    pub fn generate_into(self, paths: &CertificatePaths) -> Result<CertificateRecord> {
        let (primary, additional) = self.split_domains()?;
        CertificateGenerator::new()
            .with_retry_policy(self.retry)
            .generate_into(&CertificateStore::new(), paths, primary, additional, &self.params)
    }

    fn split_domains(&self) -> Result<(&str, &[String])> {
        match self.domains.split_first() {
            Some((primary, additional)) => Ok((primary.as_str(), additional)),
            None => Err(CertError::GenerationFailed(
                "at least one domain is required".to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::Ssl;
    use crate::certificate::keypair::{KeyMatch, match_key_pair};
    use crate::responses::ValidationStatus;
    use crate::types::CertificateSource;

    #[test]
    fn wildcard_builder_covers_apex_and_subdomain() {
        let pair = Ssl::certificate()
            .generator()
            .wildcard("example.com")
            .algorithm(KeyAlgorithm::EcP256)
            .valid_for_days(90)
            .generate()
            .expect("generate");
        assert_eq!(pair.record.san_entries(), ["example.com", "*.example.com"]);
        assert_eq!(match_key_pair(&pair.record, &pair.key), KeyMatch::Match);
    }

    #[test]
    fn generate_into_round_trips_through_validator() {
        let dir = tempfile::tempdir().expect("tempdir");
        let paths = CertificatePaths::from_stem(dir.path(), "server");
        let record = Ssl::certificate()
            .generator()
            .domains(&["example.com", "www.example.com"])
            .algorithm(KeyAlgorithm::EcP256)
            .generate_into(&paths)
            .expect("generate");
        assert_eq!(record.source(), CertificateSource::Generated);

        let result = Ssl::certificate()
            .validator()
            .from_paths(paths)
            .domains(&["example.com", "www.example.com"])
            .validate();
        assert_eq!(result.status, ValidationStatus::Ok, "{:?}", result.issues);
    }

    #[test]
    fn empty_domain_list_is_rejected() {
        let err = Ssl::certificate()
            .generator()
            .domains(&[])
            .generate()
            .expect_err("no domains");
        assert!(err.to_string().contains("at least one domain"));
    }
}
