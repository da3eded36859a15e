//! Certificate parsing, key pairing, domain matching, expiry and generation

pub mod domain;
pub mod expiry;
pub mod generation;
pub mod keypair;
pub mod parser;

pub use domain::{CoveredBy, DomainMatch, covering_name, match_domain};
pub use expiry::{ExpirationMonitor, ExpiryAssessment, ExpiryState};
pub use generation::{CertificateGenerator, GeneratedPair, GenerationParams, KeyAlgorithm};
pub use keypair::{KeyMatch, match_key_pair, parse_private_key_pem};
pub use parser::{parse_certificate_der, parse_certificate_pem};
