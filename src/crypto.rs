//! Envelope encryption for stored gateway/email secrets, plus token hashing.
//!
//! Each secret is encrypted with AES-256-GCM under a key derived from the
//! master key via HKDF, using a per-record context string (e.g.
//! `gateway:stripe:sandbox`). The same context is bound as associated data,
//! so a ciphertext copied to another row fails to decrypt.
//!
//! Stored layout: `nonce (12 bytes) || ciphertext+tag`.

use std::fmt;

use aes_gcm::{
    Aes256Gcm, Nonce,
    aead::{Aead, KeyInit, Payload},
};
use base64::{Engine, engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD}};
use hkdf::Hkdf;
use rand::{RngCore, rngs::OsRng};
use sha2::{Digest, Sha256};

use crate::error::{AppError, Result};

const NONCE_LEN: usize = 12;
const KEY_LEN: usize = 32;

#[derive(Clone)]
pub struct MasterKey([u8; KEY_LEN]);

impl fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("MasterKey(..)")
    }
}

impl MasterKey {
    pub fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self(bytes)
    }

    pub fn from_base64(encoded: &str) -> Result<Self> {
        let bytes = STANDARD
            .decode(encoded.trim())
            .map_err(|_| AppError::Internal("MASTER_KEY is not valid base64".into()))?;
        let key: [u8; KEY_LEN] = bytes
            .try_into()
            .map_err(|_| AppError::Internal("MASTER_KEY must decode to 32 bytes".into()))?;
        Ok(Self(key))
    }

    pub fn generate() -> Self {
        let mut key = [0u8; KEY_LEN];
        OsRng.fill_bytes(&mut key);
        Self(key)
    }

    fn derive_key(&self, context: &str) -> Result<[u8; KEY_LEN]> {
        let hk = Hkdf::<Sha256>::new(Some(b"prizewheel-envelope-v1"), &self.0);
        let mut okm = [0u8; KEY_LEN];
        hk.expand(context.as_bytes(), &mut okm)
            .map_err(|_| AppError::Internal("Key derivation failed".into()))?;
        Ok(okm)
    }

    pub fn encrypt(&self, context: &str, plaintext: &[u8]) -> Result<Vec<u8>> {
        let key = self.derive_key(context)?;
        let cipher = Aes256Gcm::new_from_slice(&key)
            .map_err(|_| AppError::Internal("Invalid encryption key".into()))?;

        let mut nonce_bytes = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = cipher
            .encrypt(
                nonce,
                Payload {
                    msg: plaintext,
                    aad: context.as_bytes(),
                },
            )
            .map_err(|_| AppError::Internal("Encryption failed".into()))?;

        let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        out.extend_from_slice(&nonce_bytes);
        out.extend_from_slice(&ciphertext);
        Ok(out)
    }

    pub fn decrypt(&self, context: &str, data: &[u8]) -> Result<Vec<u8>> {
        if data.len() <= NONCE_LEN {
            return Err(AppError::Internal("Encrypted value is truncated".into()));
        }
        let (nonce_bytes, ciphertext) = data.split_at(NONCE_LEN);
        let key = self.derive_key(context)?;
        let cipher = Aes256Gcm::new_from_slice(&key)
            .map_err(|_| AppError::Internal("Invalid encryption key".into()))?;

        cipher
            .decrypt(
                Nonce::from_slice(nonce_bytes),
                Payload {
                    msg: ciphertext,
                    aad: context.as_bytes(),
                },
            )
            .map_err(|_| AppError::Internal("Decryption failed".into()))
    }

    pub fn encrypt_str(&self, context: &str, plaintext: &str) -> Result<Vec<u8>> {
        self.encrypt(context, plaintext.as_bytes())
    }

    pub fn decrypt_str(&self, context: &str, data: &[u8]) -> Result<String> {
        let bytes = self.decrypt(context, data)?;
        String::from_utf8(bytes)
            .map_err(|_| AppError::Internal("Decrypted value is not UTF-8".into()))
    }
}

/// SHA-256 hex digest used to store API tokens (never stored in plaintext).
pub fn hash_secret(secret: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(b"prizewheel-token-v1:");
    hasher.update(secret.as_bytes());
    hex::encode(hasher.finalize())
}

/// Random bearer token with a recognizable prefix, e.g. `pw_3q2...`.
pub fn generate_token(prefix: &str) -> String {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    format!("{}_{}", prefix, URL_SAFE_NO_PAD.encode(bytes))
}

/// Mask a secret for display: keep a short prefix and suffix.
/// Secrets too short to mask meaningfully are fully replaced.
pub fn mask_secret(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() < 12 {
        return "*".repeat(chars.len().max(4));
    }
    let prefix: String = chars[..8].iter().collect();
    let suffix: String = chars[chars.len() - 4..].iter().collect();
    format!("{}...{}", prefix, suffix)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let key = MasterKey::generate();
        let sealed = key.encrypt_str("gateway:stripe:sandbox", "sk_test_123").unwrap();
        assert_ne!(&sealed[NONCE_LEN..], b"sk_test_123");
        let opened = key.decrypt_str("gateway:stripe:sandbox", &sealed).unwrap();
        assert_eq!(opened, "sk_test_123");
    }

    #[test]
    fn test_decrypt_with_wrong_context_fails() {
        let key = MasterKey::generate();
        let sealed = key.encrypt_str("gateway:stripe:sandbox", "sk_test_123").unwrap();
        assert!(key.decrypt_str("gateway:stripe:live", &sealed).is_err());
    }

    #[test]
    fn test_decrypt_with_other_key_fails() {
        let sealed = MasterKey::generate()
            .encrypt_str("ctx", "secret")
            .unwrap();
        assert!(MasterKey::generate().decrypt_str("ctx", &sealed).is_err());
    }

    #[test]
    fn test_from_base64_requires_32_bytes() {
        assert!(MasterKey::from_base64(&STANDARD.encode([7u8; 32])).is_ok());
        assert!(MasterKey::from_base64(&STANDARD.encode([7u8; 16])).is_err());
        assert!(MasterKey::from_base64("not base64!!").is_err());
    }

    #[test]
    fn test_hash_secret_is_stable() {
        assert_eq!(hash_secret("pw_abc"), hash_secret("pw_abc"));
        assert_ne!(hash_secret("pw_abc"), hash_secret("pw_abd"));
    }

    #[test]
    fn test_generate_token_prefix() {
        let token = generate_token("pw");
        assert!(token.starts_with("pw_"));
        assert!(token.len() > 40);
    }

    #[test]
    fn test_mask_secret() {
        let masked = mask_secret("sk_test_abc123xyz789");
        assert!(masked.starts_with("sk_test_"));
        assert!(masked.contains("..."));
        assert!(!masked.contains("abc123xyz"));

        let short = mask_secret("tiny");
        assert!(!short.contains("tiny"));
        assert!(short.contains('*'));
    }
}
