//! Encryption of integration API keys at rest.
//!
//! Keys are sealed with AES-256-GCM before they reach the backend. The
//! integration type is bound as associated data, so a ciphertext copied from
//! one integration's record into another's fails to open.

use crate::integration::IntegrationType;
use aes_gcm::{
    aead::{Aead, KeyInit, Payload},
    Aes256Gcm, Key, Nonce,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use rand::RngCore;
use std::sync::Arc;
use thiserror::Error;

/// Environment variable holding the base64-encoded 32-byte key.
pub const ENCRYPTION_KEY_ENV: &str = "SOCGUARD_ENCRYPTION_KEY";

const KEY_LEN: usize = 32;
const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;

/// Errors that can occur during cryptographic operations.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// The encryption key is invalid (wrong size or format).
    #[error("Invalid encryption key: {0}")]
    InvalidKey(String),

    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    /// Corrupted, tampered, or sealed for a different integration.
    #[error("Decryption failed: {0}")]
    DecryptionFailed(String),
}

/// Seals and opens API keys for a given integration.
pub trait ApiKeyCipher: Send + Sync {
    /// Encrypts `api_key`, returning an opaque printable string.
    fn seal(&self, integration: IntegrationType, api_key: &str) -> Result<String, CryptoError>;

    /// Reverses [`ApiKeyCipher::seal`] for the same integration.
    fn open(&self, integration: IntegrationType, sealed: &str) -> Result<String, CryptoError>;
}

/// AES-256-GCM cipher.
///
/// Output format: `base64(nonce || ciphertext || tag)` with a random 96-bit
/// nonce per call.
pub struct AeadApiKeyCipher {
    cipher: Aes256Gcm,
}

impl AeadApiKeyCipher {
    /// Creates a cipher from a raw 32-byte key.
    pub fn new(key: &[u8; KEY_LEN]) -> Self {
        Self {
            cipher: Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key)),
        }
    }

    /// Creates a cipher from a base64-encoded 32-byte key.
    pub fn from_base64_key(key_base64: &str) -> Result<Self, CryptoError> {
        let bytes = BASE64
            .decode(key_base64.trim())
            .map_err(|e| CryptoError::InvalidKey(format!("Invalid base64: {}", e)))?;

        let key: [u8; KEY_LEN] = bytes.as_slice().try_into().map_err(|_| {
            CryptoError::InvalidKey(format!(
                "Key must be {} bytes, got {} bytes",
                KEY_LEN,
                bytes.len()
            ))
        })?;

        Ok(Self::new(&key))
    }
}

impl ApiKeyCipher for AeadApiKeyCipher {
    fn seal(&self, integration: IntegrationType, api_key: &str) -> Result<String, CryptoError> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);

        let payload = Payload {
            msg: api_key.as_bytes(),
            aad: integration.as_db_str().as_bytes(),
        };
        let ciphertext = self
            .cipher
            .encrypt(Nonce::from_slice(&nonce_bytes), payload)
            .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;

        let mut sealed = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        sealed.extend_from_slice(&nonce_bytes);
        sealed.extend_from_slice(&ciphertext);
        Ok(BASE64.encode(sealed))
    }

    fn open(&self, integration: IntegrationType, sealed: &str) -> Result<String, CryptoError> {
        let bytes = BASE64
            .decode(sealed)
            .map_err(|e| CryptoError::DecryptionFailed(format!("Invalid base64: {}", e)))?;

        if bytes.len() < NONCE_LEN + TAG_LEN {
            return Err(CryptoError::DecryptionFailed(
                "Ciphertext too short".to_string(),
            ));
        }

        let (nonce_bytes, ciphertext) = bytes.split_at(NONCE_LEN);
        let payload = Payload {
            msg: ciphertext,
            aad: integration.as_db_str().as_bytes(),
        };
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce_bytes), payload)
            .map_err(|_| CryptoError::DecryptionFailed("Authentication failed".to_string()))?;

        String::from_utf8(plaintext)
            .map_err(|e| CryptoError::DecryptionFailed(format!("Invalid UTF-8: {}", e)))
    }
}

/// Stores keys unchanged. Development only.
pub struct PlaintextApiKeyCipher;

impl ApiKeyCipher for PlaintextApiKeyCipher {
    fn seal(&self, _integration: IntegrationType, api_key: &str) -> Result<String, CryptoError> {
        Ok(api_key.to_string())
    }

    fn open(&self, _integration: IntegrationType, sealed: &str) -> Result<String, CryptoError> {
        Ok(sealed.to_string())
    }
}

/// Builds the cipher configured by [`ENCRYPTION_KEY_ENV`].
///
/// Falls back to [`PlaintextApiKeyCipher`] with a warning when the variable
/// is unset, and with an error log when it is malformed.
pub fn cipher_from_env() -> Arc<dyn ApiKeyCipher> {
    match std::env::var(ENCRYPTION_KEY_ENV) {
        Ok(key) => match AeadApiKeyCipher::from_base64_key(&key) {
            Ok(cipher) => {
                tracing::info!("API key encryption enabled with AES-256-GCM");
                Arc::new(cipher)
            }
            Err(e) => {
                tracing::error!(
                    "Invalid {}: {}. API keys will be stored in plaintext!",
                    ENCRYPTION_KEY_ENV,
                    e
                );
                Arc::new(PlaintextApiKeyCipher)
            }
        },
        Err(_) => {
            tracing::warn!(
                "{} not set. API keys will be stored in PLAINTEXT. \
                 Generate a key with: socguard gen-key",
                ENCRYPTION_KEY_ENV
            );
            Arc::new(PlaintextApiKeyCipher)
        }
    }
}

/// Generates a random 32-byte key, base64 encoded.
pub fn generate_key() -> String {
    let mut key = [0u8; KEY_LEN];
    rand::thread_rng().fill_bytes(&mut key);
    BASE64.encode(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cipher() -> AeadApiKeyCipher {
        AeadApiKeyCipher::new(&[7u8; KEY_LEN])
    }

    #[test]
    fn test_seal_open() {
        let c = cipher();
        let sealed = c.seal(IntegrationType::VirusTotal, "vt-1234567890").unwrap();
        assert_ne!(sealed, "vt-1234567890");
        assert_eq!(
            c.open(IntegrationType::VirusTotal, &sealed).unwrap(),
            "vt-1234567890"
        );
    }

    #[test]
    fn test_nonce_is_random() {
        let c = cipher();
        let a = c.seal(IntegrationType::Splunk, "same").unwrap();
        let b = c.seal(IntegrationType::Splunk, "same").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_wrong_integration_fails() {
        let c = cipher();
        let sealed = c.seal(IntegrationType::Splunk, "hec-token").unwrap();
        assert!(matches!(
            c.open(IntegrationType::CloudWatch, &sealed),
            Err(CryptoError::DecryptionFailed(_))
        ));
    }

    #[test]
    fn test_tampered_ciphertext_fails() {
        let c = cipher();
        let sealed = c.seal(IntegrationType::Slack, "secret").unwrap();
        let mut bytes = BASE64.decode(&sealed).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0x01;

        assert!(c
            .open(IntegrationType::Slack, &BASE64.encode(&bytes))
            .is_err());
    }

    #[test]
    fn test_short_or_garbage_input_fails() {
        let c = cipher();
        assert!(c
            .open(IntegrationType::Slack, &BASE64.encode([0u8; 20]))
            .is_err());
        assert!(c.open(IntegrationType::Slack, "%%%not-base64").is_err());
    }

    #[test]
    fn test_different_keys_are_incompatible() {
        let sealed = cipher().seal(IntegrationType::Splunk, "k").unwrap();
        let other = AeadApiKeyCipher::new(&[8u8; KEY_LEN]);
        assert!(other.open(IntegrationType::Splunk, &sealed).is_err());
    }

    #[test]
    fn test_from_base64_key() {
        assert!(AeadApiKeyCipher::from_base64_key(&generate_key()).is_ok());
        assert!(matches!(
            AeadApiKeyCipher::from_base64_key(&BASE64.encode([1u8; 16])),
            Err(CryptoError::InvalidKey(_))
        ));
        assert!(matches!(
            AeadApiKeyCipher::from_base64_key("!!!"),
            Err(CryptoError::InvalidKey(_))
        ));
    }

    #[test]
    fn test_plaintext_cipher_is_identity() {
        let c = PlaintextApiKeyCipher;
        let sealed = c.seal(IntegrationType::Slack, "abc").unwrap();
        assert_eq!(sealed, "abc");
        assert_eq!(c.open(IntegrationType::Slack, &sealed).unwrap(), "abc");
    }
}
