//! Validate-or-generate workflow driven by [`SslSettings`]

use std::time::Duration;

use serde::Serialize;
use sslward_engine::retry::RetryPolicy;
use sslward_engine::{
    Candidate, CertError, CertificateGenerator, CertificatePaths, CertificateSource, SslMode,
    SslSettings, ValidationOrchestrator, ValidationResult, ValidationStatus,
};
use tracing::{info, warn};

use crate::{EXIT_GENERATION_FAILED, EXIT_INVALID, EXIT_OK};

/// Staging files older than this are assumed abandoned
const ORPHAN_AGE: Duration = Duration::from_secs(60 * 60);

/// What the workflow did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProvisionAction {
    /// TLS disabled, nothing checked
    Skipped,
    /// Existing pair validated and left in place
    Validated,
    /// A new pair was generated, stored and re-validated
    Generated,
}

#[derive(Debug, thiserror::Error)]
pub enum ProvisionError {
    #[error("{0}")]
    Config(String),
    #[error(transparent)]
    Generation(CertError),
}

impl ProvisionError {
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) => EXIT_INVALID,
            Self::Generation(_) => EXIT_GENERATION_FAILED,
        }
    }
}

/// Outcome of one workflow run
#[derive(Debug, Clone, Serialize)]
pub struct ProvisionReport {
    pub action: ProvisionAction,
    pub result: Option<ValidationResult>,
    /// The live pair differs from the one found at start
    pub changed: bool,
}

impl ProvisionReport {
    /// Reload only onto a changed pair that is safe to serve
    #[must_use]
    pub fn reload_due(&self) -> bool {
        self.changed && self.result.as_ref().is_some_and(ValidationResult::permits_reload)
    }

    #[must_use]
    pub fn exit_code(&self) -> i32 {
        self.result.as_ref().map_or(EXIT_OK, ValidationResult::exit_code)
    }
}

/// Runs validation and, when allowed, generation for one deployment
#[derive(Debug)]
pub struct Provisioner {
    settings: SslSettings,
    orchestrator: ValidationOrchestrator,
    generator: CertificateGenerator,
}

impl Provisioner {
    #[must_use]
    pub fn new(settings: SslSettings) -> Self {
        Self {
            orchestrator: ValidationOrchestrator::new(settings.validation),
            generator: CertificateGenerator::new(),
            settings,
        }
    }

    #[must_use]
    pub fn with_retry_policy(self, retry: RetryPolicy) -> Self {
        Self {
            generator: self.generator.with_retry_policy(retry),
            ..self
        }
    }

    #[must_use]
    pub fn settings(&self) -> &SslSettings {
        &self.settings
    }

    #[must_use]
    pub fn paths(&self) -> CertificatePaths {
        self.settings.paths()
    }

    /// One validation pass over the configured pair
    pub fn validate(&self) -> Result<ValidationResult, ProvisionError> {
        let domains = self.require_domains()?;
        Ok(self.validate_as(&domains, self.configured_source()))
    }

    /// Generate and store a new pair unconditionally, then re-validate it
    pub fn generate(&mut self) -> Result<ProvisionReport, ProvisionError> {
        let domains = self.require_domains()?;
        let before = self.validate_as(&domains, self.configured_source());
        self.replace(&domains, &before)
    }

    /// Full workflow according to `SSL_MODE`
    ///
    /// - `none`: nothing is checked
    /// - `existing`: the pair is validated and never replaced
    /// - `generate`: an unusable pair is replaced by a generated one, unless it
    ///   could not be read for lack of permission
    pub fn ensure(&mut self) -> Result<ProvisionReport, ProvisionError> {
        if self.settings.mode == SslMode::None {
            info!("SSL_MODE=none, skipping certificate checks");
            return Ok(ProvisionReport {
                action: ProvisionAction::Skipped,
                result: None,
                changed: false,
            });
        }

        let domains = self.require_domains()?;
        let before = self.validate_as(&domains, self.configured_source());
        let keep = before.is_usable()
            || self.settings.mode == SslMode::Existing
            || before.status == ValidationStatus::PermissionDenied;
        if keep {
            if !before.is_usable() {
                warn!(status = %before.status, "certificate is not usable and will not be replaced");
            }
            return Ok(ProvisionReport {
                action: ProvisionAction::Validated,
                result: Some(before),
                changed: false,
            });
        }

        info!(status = %before.status, "certificate unusable, generating a self-signed replacement");
        self.replace(&domains, &before)
    }

    fn replace(
        &mut self,
        domains: &[String],
        before: &ValidationResult,
    ) -> Result<ProvisionReport, ProvisionError> {
        let paths = self.paths();
        let store = self.orchestrator.store();
        if let Err(e) = store.sweep_orphans(&paths, ORPHAN_AGE) {
            warn!("could not sweep orphaned staging files: {e}");
        }

        let (primary, additional) = domains
            .split_first()
            .ok_or_else(|| ProvisionError::Config("no domains configured".to_string()))?;
        self.generator
            .generate_into(store, &paths, primary, additional, &self.settings.generation)
            .map_err(ProvisionError::Generation)?;

        // New material goes through the same pipeline as anything else
        let after = self.validate_as(domains, CertificateSource::Generated);
        let changed = match (&before.certificate, &after.certificate) {
            (Some(old), Some(new)) => !old.is_same_material(new),
            (None, Some(_)) => true,
            (_, None) => false,
        };
        if changed {
            info!(status = %after.status, "certificate pair replaced");
        }

        Ok(ProvisionReport {
            action: ProvisionAction::Generated,
            result: Some(after),
            changed,
        })
    }

    fn validate_as(&self, domains: &[String], source: CertificateSource) -> ValidationResult {
        self.orchestrator
            .validate(&Candidate::files(self.paths(), source), domains)
    }

    fn configured_source(&self) -> CertificateSource {
        match self.settings.mode {
            SslMode::Existing => CertificateSource::OperatorSupplied,
            SslMode::Generate | SslMode::None => CertificateSource::Unknown,
        }
    }

    fn require_domains(&self) -> Result<Vec<String>, ProvisionError> {
        let domains = self.settings.domains();
        if domains.is_empty() {
            return Err(ProvisionError::Config(
                "DOMAIN must be set to validate or generate a certificate".to_string(),
            ));
        }
        Ok(domains)
    }
}
