//! Private key decoding and certificate/key correspondence

use rsa::pkcs1::{DecodeRsaPrivateKey, EncodeRsaPublicKey};
use rsa::pkcs8::DecodePrivateKey;
use rsa::traits::PublicKeyParts;
use serde::Serialize;

use crate::error::{CertError, Result};
use crate::types::{
    CertificateRecord, Fingerprint, KeyMaterial, PublicKeyAlgorithm, SecureKeyMaterial,
};

/// Outcome of pairing a certificate with a private key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum KeyMatch {
    Match,
    MismatchedKey,
}

/// Decode a PEM private key (PKCS#8, PKCS#1 RSA or SEC1 P-256)
pub fn parse_private_key_pem(pem_data: &[u8]) -> Result<KeyMaterial> {
    let blocks = pem::parse_many(pem_data)
        .map_err(|_| CertError::InvalidFormat("malformed private key PEM".to_string()))?;

    let block = blocks
        .iter()
        .find(|b| b.tag().ends_with("PRIVATE KEY"))
        .ok_or_else(|| CertError::InvalidFormat("no PRIVATE KEY block found".to_string()))?;

    let der = block.contents();
    let (algorithm, key_size, public_bytes) = match block.tag() {
        "PRIVATE KEY" => decode_pkcs8(der)?,
        "RSA PRIVATE KEY" => rsa_public_bytes(
            rsa::RsaPrivateKey::from_pkcs1_der(der)
                .map_err(|_| CertError::InvalidFormat("invalid PKCS#1 RSA key".to_string()))?,
        )?,
        "EC PRIVATE KEY" => ec_public_bytes(
            &p256::SecretKey::from_sec1_der(der)
                .map_err(|_| CertError::InvalidFormat("invalid or non P-256 SEC1 key".to_string()))?,
        ),
        "ENCRYPTED PRIVATE KEY" => {
            return Err(CertError::InvalidFormat(
                "encrypted private keys are not supported".to_string(),
            ));
        }
        other => {
            return Err(CertError::InvalidFormat(format!("unsupported key type '{other}'")));
        }
    };

    Ok(KeyMaterial::new(
        Fingerprint::of_public_key_bytes(&public_bytes),
        algorithm,
        key_size,
        SecureKeyMaterial::new(pem_data.to_vec()),
    ))
}

/// Compare the fingerprints derived independently from certificate and key
#[must_use]
pub fn match_key_pair(record: &CertificateRecord, key: &KeyMaterial) -> KeyMatch {
    if record.public_key_fingerprint() == key.public_key_fingerprint() {
        KeyMatch::Match
    } else {
        tracing::debug!(
            cert_fingerprint = %record.public_key_fingerprint(),
            key_fingerprint = %key.public_key_fingerprint(),
            "certificate and key fingerprints differ"
        );
        KeyMatch::MismatchedKey
    }
}

type PublicComponent = (PublicKeyAlgorithm, Option<u32>, Vec<u8>);

fn decode_pkcs8(der: &[u8]) -> Result<PublicComponent> {
    if let Ok(key) = rsa::RsaPrivateKey::from_pkcs8_der(der) {
        return rsa_public_bytes(key);
    }
    if let Ok(key) = p256::SecretKey::from_pkcs8_der(der) {
        return Ok(ec_public_bytes(&key));
    }
    Err(CertError::InvalidFormat(
        "PKCS#8 key is neither RSA nor EC P-256".to_string(),
    ))
}

fn rsa_public_bytes(key: rsa::RsaPrivateKey) -> Result<PublicComponent> {
    let public = key.to_public_key();
    let bits = u32::try_from(public.n().bits()).ok();
    let der = public
        .to_pkcs1_der()
        .map_err(|_| CertError::InvalidFormat("cannot encode RSA public key".to_string()))?;
    Ok((PublicKeyAlgorithm::Rsa, bits, der.as_bytes().to_vec()))
}

fn ec_public_bytes(key: &p256::SecretKey) -> PublicComponent {
    let point = key.public_key().to_sec1_bytes();
    (PublicKeyAlgorithm::Ec, Some(256), point.to_vec())
}
