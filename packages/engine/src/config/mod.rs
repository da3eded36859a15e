//! Validation configuration
//!
//! Thresholds and policy are passed explicitly to the orchestrator at
//! construction; nothing here is read from ambient process state except
//! through [`SslSettings::from_env`].

pub mod settings;

use serde::Serialize;

use crate::error::{CertError, Result};

pub use settings::{SslMode, SslSettings};

/// How strictly soft findings affect usability
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationPolicy {
    /// Expiring-soon certificates stay usable until they expire
    #[default]
    Lenient,
    /// Certificates inside the critical window, or not yet valid, are unusable
    Strict,
}

impl std::str::FromStr for ValidationPolicy {
    type Err = CertError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "lenient" => Ok(Self::Lenient),
            "strict" => Ok(Self::Strict),
            other => Err(CertError::Config(format!(
                "unknown validation policy '{other}' (expected strict or lenient)"
            ))),
        }
    }
}

/// Expiry warning thresholds in days
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ExpiryThresholds {
    warn_days: u32,
    critical_days: u32,
}

impl ExpiryThresholds {
    pub const DEFAULT_WARN_DAYS: u32 = 30;
    pub const DEFAULT_CRITICAL_DAYS: u32 = 7;

    /// Create thresholds, rejecting a critical window wider than the warning one
    pub fn new(warn_days: u32, critical_days: u32) -> Result<Self> {
        if critical_days > warn_days {
            return Err(CertError::Config(format!(
                "critical_days ({critical_days}) must not exceed warn_days ({warn_days})"
            )));
        }
        Ok(Self {
            warn_days,
            critical_days,
        })
    }

    #[must_use]
    pub fn warn_days(&self) -> u32 {
        self.warn_days
    }

    #[must_use]
    pub fn critical_days(&self) -> u32 {
        self.critical_days
    }
}

impl Default for ExpiryThresholds {
    fn default() -> Self {
        Self {
            warn_days: Self::DEFAULT_WARN_DAYS,
            critical_days: Self::DEFAULT_CRITICAL_DAYS,
        }
    }
}

/// Configuration for one validation pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ValidationConfig {
    pub thresholds: ExpiryThresholds,
    pub policy: ValidationPolicy,
}

impl ValidationConfig {
    /// Strict configuration with default thresholds
    #[must_use]
    pub fn strict() -> Self {
        Self {
            policy: ValidationPolicy::Strict,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_thresholds(self, thresholds: ExpiryThresholds) -> Self {
        Self { thresholds, ..self }
    }

    #[must_use]
    pub fn with_policy(self, policy: ValidationPolicy) -> Self {
        Self { policy, ..self }
    }
}
