//! # sslward engine
//!
//! TLS certificate lifecycle and validation for deployment tooling.
//!
//! ## Features
//!
//! - **PEM parsing** of X.509 certificates and RSA / P-256 private keys
//! - **Key pairing** by SHA-256 public key fingerprint, compared in constant time
//! - **Domain coverage** with single-label wildcard semantics
//! - **Expiry classification** against configurable warn/critical thresholds
//! - **Self-signed generation** with bounded retry on entropy failure
//! - **Atomic pair storage** with journal based crash recovery
//!
//! ## Usage
//!
//! ```no_run
//! use sslward_engine::{Candidate, CertificateSource, ValidationConfig, ValidationOrchestrator};
//! use sslward_engine::store::CertificatePaths;
//!
//! let orchestrator = ValidationOrchestrator::new(ValidationConfig::default());
//! let candidate = Candidate::files(
//!     CertificatePaths::from_stem("./ssl", "server"),
//!     CertificateSource::OperatorSupplied,
//! );
//! let result = orchestrator.validate(&candidate, &["example.com".to_string()]);
//! std::process::exit(result.exit_code());
//! ```

#![deny(unsafe_code)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]

pub mod builder;
pub mod certificate;
pub mod config;
pub mod error;
pub mod orchestrator;
pub mod responses;
pub mod retry;
pub mod store;
pub mod types;

pub use builder::Ssl;
pub use certificate::{
    CertificateGenerator, DomainMatch, ExpirationMonitor, ExpiryAssessment, ExpiryState,
    GeneratedPair, GenerationParams, KeyAlgorithm, KeyMatch,
};
pub use config::{ExpiryThresholds, SslMode, SslSettings, ValidationConfig, ValidationPolicy};
pub use error::{CertError, ErrorKind, Result};
pub use orchestrator::{Candidate, ValidationOrchestrator, ValidationState};
pub use responses::{
    CertificateSummary, IssueSeverity, ValidationIssue, ValidationResult, ValidationStatus,
};
pub use store::{CertificatePaths, CertificateStore};
pub use types::{CertificateRecord, CertificateSource, Fingerprint, KeyMaterial, PublicKeyAlgorithm};
