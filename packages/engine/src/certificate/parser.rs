//! PEM certificate decoding into [`CertificateRecord`]

use chrono::{DateTime, Utc};
use x509_parser::prelude::{FromDer, GeneralName, X509Certificate};

use crate::error::{CertError, Result};
use crate::types::{
    CertificateRecord, CertificateSource, Fingerprint, PublicKeyAlgorithm, SignatureAlgorithm,
};

const OID_RSA_ENCRYPTION: &str = "1.2.840.113549.1.1.1";
const OID_EC_PUBLIC_KEY: &str = "1.2.840.10045.2.1";

/// Signature algorithms accepted on parsed certificates
const SUPPORTED_SIGNATURES: &[(&str, &str)] = &[
    ("1.2.840.113549.1.1.11", "sha256WithRSAEncryption"),
    ("1.2.840.113549.1.1.12", "sha384WithRSAEncryption"),
    ("1.2.840.113549.1.1.13", "sha512WithRSAEncryption"),
    ("1.2.840.113549.1.1.10", "rsassaPss"),
    ("1.2.840.10045.4.3.2", "ecdsa-with-SHA256"),
    ("1.2.840.10045.4.3.3", "ecdsa-with-SHA384"),
    ("1.2.840.10045.4.3.4", "ecdsa-with-SHA512"),
    ("1.3.101.112", "Ed25519"),
];

/// Parse the first CERTIFICATE block of a PEM document
///
/// Any failure (bad PEM armour, truncated DER, unsupported algorithms) is
/// reported as [`CertError::InvalidFormat`].
pub fn parse_certificate_pem(pem_data: &[u8], source: CertificateSource) -> Result<CertificateRecord> {
    let blocks = pem::parse_many(pem_data)
        .map_err(|e| CertError::InvalidFormat(format!("malformed PEM: {e}")))?;

    let block = blocks
        .iter()
        .find(|b| b.tag() == "CERTIFICATE")
        .ok_or_else(|| CertError::InvalidFormat("no CERTIFICATE block found".to_string()))?;

    if blocks.len() > 1 {
        tracing::debug!("PEM contains {} blocks, using the first certificate", blocks.len());
    }

    parse_certificate_der(block.contents(), source)
}

/// Parse a DER encoded X.509 certificate
pub fn parse_certificate_der(der: &[u8], source: CertificateSource) -> Result<CertificateRecord> {
    let (remaining, cert) = X509Certificate::from_der(der)
        .map_err(|e| CertError::InvalidFormat(format!("failed to decode certificate: {e}")))?;

    if !remaining.is_empty() {
        tracing::warn!("{} trailing bytes after certificate DER ignored", remaining.len());
    }

    let signature_algorithm = signature_algorithm(&cert)?;
    let subject_cn = extract_common_name(&cert);
    let san_entries = extract_dns_names(&cert)?;
    let (key_algorithm, public_key_fingerprint) = public_key_fingerprint(&cert)?;

    let validity = cert.validity();
    let not_before = epoch_to_utc(validity.not_before.timestamp(), "notBefore")?;
    let not_after = epoch_to_utc(validity.not_after.timestamp(), "notAfter")?;

    Ok(CertificateRecord::new(
        subject_cn,
        san_entries,
        not_before,
        not_after,
        public_key_fingerprint,
        key_algorithm,
        signature_algorithm,
        hex::encode(cert.tbs_certificate.raw_serial()),
        source,
    ))
}

fn signature_algorithm(cert: &X509Certificate<'_>) -> Result<SignatureAlgorithm> {
    let oid = cert.signature_algorithm.algorithm.to_id_string();
    SUPPORTED_SIGNATURES
        .iter()
        .find(|(known, _)| *known == oid)
        .map(|&(_, name)| SignatureAlgorithm {
            oid: oid.clone(),
            name,
        })
        .ok_or_else(|| CertError::InvalidFormat(format!("unsupported signature algorithm {oid}")))
}

fn extract_common_name(cert: &X509Certificate<'_>) -> Option<String> {
    cert.subject()
        .iter_common_name()
        .next()
        .and_then(|attr| attr.as_str().ok())
        .map(ToString::to_string)
}

/// DNS entries of the SAN extension, order preserved, case-insensitive duplicates dropped
fn extract_dns_names(cert: &X509Certificate<'_>) -> Result<Vec<String>> {
    let san = cert
        .subject_alternative_name()
        .map_err(|e| CertError::InvalidFormat(format!("invalid subjectAltName extension: {e}")))?;

    let mut names: Vec<String> = Vec::new();
    if let Some(ext) = san {
        for general_name in &ext.value.general_names {
            // IP, email and URI entries are not DNS names and are skipped
            if let GeneralName::DNSName(dns) = general_name {
                if !names.iter().any(|n| n.eq_ignore_ascii_case(dns)) {
                    names.push((*dns).to_string());
                }
            }
        }
    }
    Ok(names)
}

fn public_key_fingerprint(cert: &X509Certificate<'_>) -> Result<(PublicKeyAlgorithm, Fingerprint)> {
    let spki = cert.public_key();
    let key_bytes: &[u8] = &spki.subject_public_key.data;

    match spki.algorithm.algorithm.to_id_string().as_str() {
        OID_RSA_ENCRYPTION => Ok((
            PublicKeyAlgorithm::Rsa,
            Fingerprint::of_public_key_bytes(key_bytes),
        )),
        OID_EC_PUBLIC_KEY => {
            // Compressed P-256 points are expanded so both sides hash the same form
            let canonical = match key_bytes.first() {
                Some(0x02 | 0x03) => p256::PublicKey::from_sec1_bytes(key_bytes)
                    .map(|pk| pk.to_sec1_bytes().to_vec())
                    .unwrap_or_else(|_| key_bytes.to_vec()),
                _ => key_bytes.to_vec(),
            };
            Ok((PublicKeyAlgorithm::Ec, Fingerprint::of_public_key_bytes(&canonical)))
        }
        other => Err(CertError::InvalidFormat(format!(
            "unsupported public key algorithm {other}"
        ))),
    }
}

fn epoch_to_utc(seconds: i64, field: &str) -> Result<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp(seconds, 0)
        .ok_or_else(|| CertError::InvalidFormat(format!("{field} out of range: {seconds}")))
}
