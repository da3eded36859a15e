//! Self-signed certificate and key pair generation

use std::time::SystemTime;

use chrono::{DateTime, Datelike, Duration, Utc};
use rand_core::{CryptoRng, OsRng, RngCore};
use rcgen::{CertificateParams, DistinguishedName, DnType, KeyPair, SerialNumber};
use rsa::pkcs8::{EncodePrivateKey, LineEnding};
use serde::Serialize;
use tracing::{debug, info};
use zeroize::Zeroizing;

use super::keypair::{KeyMatch, match_key_pair, parse_private_key_pem};
use super::parser::parse_certificate_pem;
use crate::error::{CertError, Result};
use crate::retry::{RetryPolicy, execute_with_retry};
use crate::store::{CertificatePaths, CertificateStore, StoreFs};
use crate::types::{CertificateRecord, CertificateSource, KeyMaterial};

/// Last year a generated certificate may be valid in (GeneralizedTime limit)
const MAX_VALIDITY_YEAR: i32 = 9999;

/// Key algorithm for generated pairs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyAlgorithm {
    Rsa { bits: u32 },
    EcP256,
}

impl KeyAlgorithm {
    pub const SUPPORTED_RSA_BITS: [u32; 3] = [2048, 3072, 4096];

    /// RSA with a supported modulus size
    pub fn rsa(bits: u32) -> Result<Self> {
        if Self::SUPPORTED_RSA_BITS.contains(&bits) {
            Ok(Self::Rsa { bits })
        } else {
            Err(CertError::Config(format!(
                "unsupported RSA key size {bits} (expected 2048, 3072 or 4096)"
            )))
        }
    }

    /// Parse `rsa` or `ec`, with an optional RSA modulus size
    pub fn parse(name: &str, rsa_bits: Option<u32>) -> Result<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "rsa" => Self::rsa(rsa_bits.unwrap_or(2048)),
            "ec" | "ecdsa" | "p256" | "ec-p256" => Ok(Self::EcP256),
            other => Err(CertError::Config(format!(
                "unknown key algorithm '{other}' (expected rsa or ec)"
            ))),
        }
    }
}

impl Default for KeyAlgorithm {
    fn default() -> Self {
        Self::Rsa { bits: 2048 }
    }
}

/// Parameters for one generation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GenerationParams {
    pub algorithm: KeyAlgorithm,
    pub validity_days: u32,
    /// Start of validity, defaults to the moment of generation
    pub not_before: Option<DateTime<Utc>>,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            algorithm: KeyAlgorithm::default(),
            validity_days: 365,
            not_before: None,
        }
    }
}

/// Freshly generated material, not yet persisted
#[derive(Debug)]
pub struct GeneratedPair {
    pub cert_pem: String,
    pub key: KeyMaterial,
    pub record: CertificateRecord,
}

/// Produces self-signed pairs from an injectable randomness source
///
/// Entropy failures are retried according to the retry policy; every other
/// failure is returned immediately.
#[derive(Debug)]
pub struct CertificateGenerator<R = OsRng> {
    rng: R,
    retry: RetryPolicy,
}

impl CertificateGenerator<OsRng> {
    #[must_use]
    pub fn new() -> Self {
        Self::with_rng(OsRng)
    }
}

impl Default for CertificateGenerator<OsRng> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: RngCore + CryptoRng> CertificateGenerator<R> {
    pub fn with_rng(rng: R) -> Self {
        Self {
            rng,
            retry: RetryPolicy::default(),
        }
    }

    #[must_use]
    pub fn with_retry_policy(self, retry: RetryPolicy) -> Self {
        Self { retry, ..self }
    }

    /// Generate a pair covering `primary` and `additional` domains
    ///
    /// The primary domain becomes the subject CN; the de-duplicated domain list
    /// becomes the SAN extension, wildcards included verbatim.
    pub fn generate(
        &mut self,
        primary: &str,
        additional: &[String],
        params: &GenerationParams,
    ) -> Result<GeneratedPair> {
        let domains = collect_domains(primary, additional)?;
        if params.validity_days == 0 {
            return Err(CertError::GenerationFailed(
                "validity must be at least one day".to_string(),
            ));
        }

        let not_before = params.not_before.unwrap_or_else(Utc::now);
        let not_after = validity_end(not_before, params.validity_days)?;

        let Self { rng, retry } = self;
        let (serial, key_pem) = execute_with_retry(retry, |attempt| {
            debug!(attempt, algorithm = ?params.algorithm, "generating serial and private key");
            let serial = random_serial(rng)?;
            Ok((serial, generate_key_pem(rng, params.algorithm)?))
        })?;

        let key_pair = KeyPair::from_pem(&key_pem)
            .map_err(|e| CertError::GenerationFailed(format!("cannot load generated key: {e}")))?;

        let mut cert_params = CertificateParams::new(domains.clone())
            .map_err(|e| CertError::GenerationFailed(format!("invalid domain list: {e}")))?;
        let mut distinguished_name = DistinguishedName::new();
        distinguished_name.push(DnType::CommonName, domains[0].as_str());
        cert_params.distinguished_name = distinguished_name;
        cert_params.serial_number = Some(serial);

        cert_params.not_before = SystemTime::from(not_before).into();
        cert_params.not_after = SystemTime::from(not_after).into();

        let cert = cert_params
            .self_signed(&key_pair)
            .map_err(|e| CertError::GenerationFailed(format!("signing failed: {e}")))?;
        let cert_pem = cert.pem();

        // Re-read both halves the same way operator material is read
        let record = parse_certificate_pem(cert_pem.as_bytes(), CertificateSource::Generated)
            .map_err(|e| CertError::GenerationFailed(format!("generated certificate unreadable: {e}")))?;
        let key = parse_private_key_pem(key_pem.as_bytes())
            .map_err(|e| CertError::GenerationFailed(format!("generated key unreadable: {e}")))?;
        if match_key_pair(&record, &key) != KeyMatch::Match {
            return Err(CertError::GenerationFailed(
                "generated certificate does not match its key".to_string(),
            ));
        }

        info!(
            domains = ?domains,
            fingerprint = %record.public_key_fingerprint(),
            not_after = %record.not_after(),
            "generated self-signed certificate"
        );
        Ok(GeneratedPair {
            cert_pem,
            key,
            record,
        })
    }

    /// Generate a pair and persist it through `store`
    pub fn generate_into<F: StoreFs>(
        &mut self,
        store: &CertificateStore<F>,
        paths: &CertificatePaths,
        primary: &str,
        additional: &[String],
        params: &GenerationParams,
    ) -> Result<CertificateRecord> {
        let pair = self.generate(primary, additional, params)?;
        store.write(paths, pair.cert_pem.as_bytes(), &pair.key)?;
        Ok(pair.record)
    }
}

fn generate_key_pem<R: RngCore + CryptoRng>(
    rng: &mut R,
    algorithm: KeyAlgorithm,
) -> Result<Zeroizing<String>> {
    // Key generation itself panics on RNG failure, so probe the source first
    let mut probe = Zeroizing::new([0u8; 32]);
    rng.try_fill_bytes(&mut probe[..])
        .map_err(|e| CertError::EntropyUnavailable(e.to_string()))?;

    let encoded = match algorithm {
        KeyAlgorithm::Rsa { bits } => {
            let bits = usize::try_from(bits)
                .map_err(|_| CertError::GenerationFailed(format!("invalid RSA size {bits}")))?;
            rsa::RsaPrivateKey::new(rng, bits)
                .map_err(|e| CertError::GenerationFailed(format!("RSA key generation failed: {e}")))?
                .to_pkcs8_pem(LineEnding::LF)
        }
        KeyAlgorithm::EcP256 => p256::SecretKey::random(rng).to_pkcs8_pem(LineEnding::LF),
    };
    encoded.map_err(|e| CertError::GenerationFailed(format!("cannot encode private key: {e}")))
}

/// End of validity, kept inside the range X.509 and the encoder can represent
fn validity_end(not_before: DateTime<Utc>, validity_days: u32) -> Result<DateTime<Utc>> {
    let out_of_range = || {
        CertError::GenerationFailed(format!(
            "validity of {validity_days} days from {not_before} ends outside years 0 to {MAX_VALIDITY_YEAR}"
        ))
    };
    if !(0..=MAX_VALIDITY_YEAR).contains(&not_before.year()) {
        return Err(out_of_range());
    }
    let not_after = Duration::try_days(i64::from(validity_days))
        .and_then(|days| not_before.checked_add_signed(days))
        .ok_or_else(out_of_range)?;
    if not_after.year() > MAX_VALIDITY_YEAR {
        return Err(out_of_range());
    }
    Ok(not_after)
}

fn random_serial<R: RngCore + CryptoRng>(rng: &mut R) -> Result<SerialNumber> {
    let mut bytes = [0u8; 16];
    rng.try_fill_bytes(&mut bytes)
        .map_err(|e| CertError::EntropyUnavailable(e.to_string()))?;
    // Positive and non-zero as DER INTEGER
    bytes[0] = (bytes[0] & 0x7f) | 0x01;
    Ok(SerialNumber::from_slice(&bytes))
}

/// Primary first, duplicates removed case-insensitively, syntax checked
fn collect_domains(primary: &str, additional: &[String]) -> Result<Vec<String>> {
    let mut domains: Vec<String> = Vec::with_capacity(additional.len() + 1);
    for raw in std::iter::once(primary).chain(additional.iter().map(String::as_str)) {
        let domain = raw.trim().trim_end_matches('.').to_ascii_lowercase();
        validate_domain(&domain)?;
        if !domains.contains(&domain) {
            domains.push(domain);
        }
    }
    Ok(domains)
}

fn validate_domain(domain: &str) -> Result<()> {
    let invalid = |reason: &str| {
        Err(CertError::GenerationFailed(format!(
            "invalid domain '{domain}': {reason}"
        )))
    };

    if domain.is_empty() {
        return invalid("empty name");
    }
    if domain.len() > 253 {
        return invalid("longer than 253 characters");
    }

    let labels: Vec<&str> = domain.split('.').collect();
    for (index, label) in labels.iter().enumerate() {
        if *label == "*" {
            if index != 0 || labels.len() < 2 {
                return invalid("wildcard must be the whole leftmost label of a longer name");
            }
            continue;
        }
        if label.is_empty() || label.len() > 63 {
            return invalid("labels must be 1 to 63 characters");
        }
        if !label.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-') {
            return invalid("only letters, digits and hyphens are allowed");
        }
        if label.starts_with('-') || label.ends_with('-') {
            return invalid("labels cannot start or end with a hyphen");
        }
    }
    Ok(())
}
