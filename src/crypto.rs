//! Token and secret handling primitives.
//!
//! Opaque tokens are random bytes encoded base64url without padding and are
//! stored only as SHA-256 hashes. Session provider-auth blobs are sealed with
//! AES-256-GCM, AAD-bound to the session id. All secret comparisons are
//! constant time.

use aes_gcm::{
    Aes256Gcm, Key, Nonce,
    aead::{Aead, AeadCore, KeyInit, OsRng as AeadOsRng, Payload},
};
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop};

type HmacSha256 = Hmac<Sha256>;

const VERSION_SEALED: u8 = 0x01;
const VERSION_FIELD_LEN: usize = 1;
const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;
const MIN_SEALED_LEN: usize = VERSION_FIELD_LEN + NONCE_LEN + TAG_LEN;

/// Crypto error types
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("sealing failed: {0}")]
    SealFailed(String),
    #[error("opening failed: {0}")]
    OpenFailed(String),
    #[error("invalid ciphertext format")]
    InvalidFormat,
    #[error("secret key is not configured")]
    MissingSecretKey,
}

/// Secure wrapper for symmetric keys with zeroization
#[derive(Debug, Clone, Zeroize, ZeroizeOnDrop)]
pub struct SecretKey([u8; 32]);

impl SecretKey {
    /// Derive a key from the configured secret string.
    pub fn derive(secret: &str) -> Self {
        let digest = Sha256::digest(secret.as_bytes());
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&digest);
        Self(bytes)
    }

    fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

/// Generate an opaque 32-byte token, base64url-encoded without padding.
pub fn generate_token() -> String {
    let mut bytes = [0u8; 32];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    base64_url::encode(&bytes)
}

/// Generate a 128-bit token for the Terraform IdP surfaces.
pub fn generate_short_token() -> String {
    let mut bytes = [0u8; 16];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    base64_url::encode(&bytes)
}

/// SHA-256 hash of a token, hex-encoded; the only form persisted.
pub fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

/// Constant-time equality over byte strings of possibly differing length.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    ConstantTimeEq::ct_eq(a, b).into()
}

/// PKCE `S256` check: `BASE64URL-NOPAD(SHA256(verifier)) == challenge`,
/// compared in constant time.
pub fn verify_code_challenge(code_verifier: &str, code_challenge: &str) -> bool {
    let digest = Sha256::digest(code_verifier.as_bytes());
    let computed = base64_url::encode(&digest);
    constant_time_eq(computed.as_bytes(), code_challenge.as_bytes())
}

/// Seal bytes with AES-256-GCM, binding them to `aad`.
pub fn seal_bytes(key: &SecretKey, aad: &[u8], plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let cipher_key = Key::<Aes256Gcm>::from_slice(key.as_bytes());
    let cipher = Aes256Gcm::new(cipher_key);

    let nonce = Aes256Gcm::generate_nonce(&mut AeadOsRng);

    let mut ciphertext = cipher
        .encrypt(
            &nonce,
            Payload {
                msg: plaintext,
                aad,
            },
        )
        .map_err(|e| CryptoError::SealFailed(e.to_string()))?;

    let mut result = Vec::with_capacity(VERSION_FIELD_LEN + NONCE_LEN + ciphertext.len());
    result.push(VERSION_SEALED);
    result.extend_from_slice(&nonce);
    result.append(&mut ciphertext);

    Ok(result)
}

/// Open bytes sealed by [`seal_bytes`] under the same key and AAD.
pub fn open_bytes(key: &SecretKey, aad: &[u8], sealed: &[u8]) -> Result<Vec<u8>, CryptoError> {
    if sealed.len() < MIN_SEALED_LEN || sealed[0] != VERSION_SEALED {
        return Err(CryptoError::InvalidFormat);
    }

    let nonce = Nonce::from_slice(&sealed[VERSION_FIELD_LEN..VERSION_FIELD_LEN + NONCE_LEN]);
    let ciphertext = &sealed[VERSION_FIELD_LEN + NONCE_LEN..];

    let cipher_key = Key::<Aes256Gcm>::from_slice(key.as_bytes());
    let cipher = Aes256Gcm::new(cipher_key);

    cipher
        .decrypt(
            nonce,
            Payload {
                msg: ciphertext,
                aad,
            },
        )
        .map_err(|e| CryptoError::OpenFailed(e.to_string()))
}

/// HMAC-SHA256 signature over a URL path plus expiry, base64url-encoded.
/// Used for expiring hosted-archive download links.
pub fn sign_url(key: &SecretKey, path: &str, expires_at: i64) -> String {
    let mut mac = <HmacSha256 as Mac>::new_from_slice(key.as_bytes())
        .expect("HMAC accepts any key length");
    mac.update(path.as_bytes());
    mac.update(b"\n");
    mac.update(expires_at.to_string().as_bytes());
    base64_url::encode(&mac.finalize().into_bytes())
}

/// Verify a signature produced by [`sign_url`].
pub fn verify_url_signature(key: &SecretKey, path: &str, expires_at: i64, signature: &str) -> bool {
    let expected = sign_url(key, path, expires_at);
    constant_time_eq(expected.as_bytes(), signature.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_are_unique_and_url_safe() {
        let a = generate_token();
        let b = generate_token();
        assert_ne!(a, b);
        assert!(!a.contains('+') && !a.contains('/') && !a.contains('='));
    }

    #[test]
    fn token_hash_is_deterministic() {
        assert_eq!(hash_token("abc"), hash_token("abc"));
        assert_ne!(hash_token("abc"), hash_token("abd"));
    }

    #[test]
    fn pkce_s256_round_trip() {
        // RFC 7636 appendix B test vector.
        let verifier = "dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk";
        let challenge = "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM";
        assert!(verify_code_challenge(verifier, challenge));
        assert!(!verify_code_challenge(verifier, "wrong-challenge"));
    }

    #[test]
    fn seal_open_round_trip() {
        let key = SecretKey::derive("test-secret");
        let sealed = seal_bytes(&key, b"session-1", b"payload").unwrap();
        let opened = open_bytes(&key, b"session-1", &sealed).unwrap();
        assert_eq!(opened, b"payload");
    }

    #[test]
    fn open_rejects_wrong_aad() {
        let key = SecretKey::derive("test-secret");
        let sealed = seal_bytes(&key, b"session-1", b"payload").unwrap();
        assert!(open_bytes(&key, b"session-2", &sealed).is_err());
    }

    #[test]
    fn open_rejects_truncated_input() {
        let key = SecretKey::derive("test-secret");
        assert!(matches!(
            open_bytes(&key, b"aad", &[VERSION_SEALED, 1, 2]),
            Err(CryptoError::InvalidFormat)
        ));
    }

    #[test]
    fn url_signature_round_trip() {
        let key = SecretKey::derive("test-secret");
        let sig = sign_url(&key, "/v1/terrareg/modules/1/archive.tar.gz", 1_900_000_000);
        assert!(verify_url_signature(
            &key,
            "/v1/terrareg/modules/1/archive.tar.gz",
            1_900_000_000,
            &sig
        ));
        assert!(!verify_url_signature(
            &key,
            "/v1/terrareg/modules/2/archive.tar.gz",
            1_900_000_000,
            &sig
        ));
    }
}
