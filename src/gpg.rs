//! GPG key parsing and detached-signature verification.
//!
//! Keys are supplied ASCII-armored; the key id and fingerprint recorded on
//! the row are derived here rather than trusted from the caller. Detached
//! signatures over SHA256SUMS documents are verified at provider-version
//! index time.

use pgp::types::PublicKeyTrait;
use pgp::{Deserializable, SignedPublicKey, StandaloneSignature};
use thiserror::Error;

/// Errors raised while handling GPG material.
#[derive(Debug, Error)]
pub enum GpgError {
    #[error("failed to parse public key: {0}")]
    ParseKey(String),
    #[error("failed to parse signature: {0}")]
    ParseSignature(String),
    #[error("signature verification failed: {0}")]
    Verification(String),
}

/// Identity of a parsed public key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedGpgKey {
    /// Short key id, upper-case hex.
    pub key_id: String,
    /// Full fingerprint, upper-case hex.
    pub fingerprint: String,
}

/// Parse an ASCII-armored public key and derive its key id and fingerprint.
pub fn parse_public_key(armor: &str) -> Result<ParsedGpgKey, GpgError> {
    let (key, _headers) =
        SignedPublicKey::from_string(armor).map_err(|e| GpgError::ParseKey(e.to_string()))?;

    let key_id = hex::encode_upper(key.key_id().as_ref());
    let fingerprint = hex::encode_upper(key.fingerprint().as_bytes());

    Ok(ParsedGpgKey {
        key_id,
        fingerprint,
    })
}

/// Verify a detached signature (armored or binary) over `data` against the
/// armored public key, accepting signatures made by the primary key or any
/// signing subkey.
pub fn verify_detached_signature(
    armor: &str,
    signature: &[u8],
    data: &[u8],
) -> Result<(), GpgError> {
    let (key, _headers) =
        SignedPublicKey::from_string(armor).map_err(|e| GpgError::ParseKey(e.to_string()))?;

    let signature = parse_signature(signature)?;

    if signature.verify(&key, data).is_ok() {
        return Ok(());
    }

    for subkey in &key.public_subkeys {
        if signature.verify(subkey, data).is_ok() {
            return Ok(());
        }
    }

    Err(GpgError::Verification(
        "signature does not match key or any subkey".to_string(),
    ))
}

fn parse_signature(bytes: &[u8]) -> Result<StandaloneSignature, GpgError> {
    if bytes.starts_with(b"-----BEGIN") {
        let text =
            std::str::from_utf8(bytes).map_err(|e| GpgError::ParseSignature(e.to_string()))?;
        let (sig, _headers) = StandaloneSignature::from_string(text)
            .map_err(|e| GpgError::ParseSignature(e.to_string()))?;
        Ok(sig)
    } else {
        let sig = StandaloneSignature::from_bytes(bytes)
            .map_err(|e| GpgError::ParseSignature(e.to_string()))?;
        Ok(sig)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_garbage_key() {
        assert!(matches!(
            parse_public_key("not a key"),
            Err(GpgError::ParseKey(_))
        ));
    }

    #[test]
    fn rejects_garbage_signature() {
        assert!(matches!(
            parse_signature(b"\x00\x01\x02"),
            Err(GpgError::ParseSignature(_))
        ));
    }
}
