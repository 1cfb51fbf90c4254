use crate::models::CipherConfig;
use crate::utils::{BiometricError, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use ring::aead::{Aad, LessSafeKey, Nonce, UnboundKey, AES_256_GCM, NONCE_LEN};
use ring::rand::{SecureRandom, SystemRandom};
use sha2::{Digest, Sha256};
use std::fmt;

/// AES-256-GCM protection for stored templates.
///
/// The key is derived once at construction as `SHA-256(secret || salt)` and is
/// read-only afterwards, so one instance can be shared across threads. Every
/// call to [`TemplateCipher::encrypt`] draws a fresh 96-bit nonce; the blob is
/// base64 of `nonce || ciphertext || tag`.
pub struct TemplateCipher {
    key: LessSafeKey,
    rng: SystemRandom,
}

impl fmt::Debug for TemplateCipher {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("TemplateCipher")
            .field("algorithm", &"AES-256-GCM")
            .finish_non_exhaustive()
    }
}

impl TemplateCipher {
    pub fn new(config: &CipherConfig) -> Result<Self> {
        if config.secret.is_empty() {
            return Err(BiometricError::ConfigError(
                "template secret must not be empty".to_string(),
            ));
        }
        let key_bytes = Self::derive_key(config.secret.as_bytes(), config.salt.as_bytes());
        let unbound = UnboundKey::new(&AES_256_GCM, &key_bytes).map_err(|_| {
            BiometricError::EncryptionError("Failed to initialise AES-256-GCM key".to_string())
        })?;

        log::debug!("Template cipher initialised (AES-256-GCM)");
        Ok(TemplateCipher {
            key: LessSafeKey::new(unbound),
            rng: SystemRandom::new(),
        })
    }

    fn derive_key(secret: &[u8], salt: &[u8]) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(secret);
        hasher.update(salt);
        hasher.finalize().into()
    }

    pub fn encrypt(&self, plaintext: &[u8]) -> Result<String> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        self.rng.fill(&mut nonce_bytes).map_err(|_| {
            BiometricError::EncryptionError("Failed to generate nonce".to_string())
        })?;
        let nonce = Nonce::assume_unique_for_key(nonce_bytes);

        let mut in_out = plaintext.to_vec();
        self.key
            .seal_in_place_append_tag(nonce, Aad::empty(), &mut in_out)
            .map_err(|_| BiometricError::EncryptionError("Failed to seal payload".to_string()))?;

        let mut blob = Vec::with_capacity(NONCE_LEN + in_out.len());
        blob.extend_from_slice(&nonce_bytes);
        blob.extend_from_slice(&in_out);
        Ok(STANDARD.encode(blob))
    }

    pub fn decrypt(&self, blob: &str) -> Result<Vec<u8>> {
        let raw = STANDARD.decode(blob.trim()).map_err(|e| {
            BiometricError::DecryptionError(format!("Template is not valid base64: {}", e))
        })?;

        let min_len = NONCE_LEN + AES_256_GCM.tag_len();
        if raw.len() < min_len {
            return Err(BiometricError::DecryptionError(format!(
                "Template blob too short: {} bytes (minimum {})",
                raw.len(),
                min_len
            )));
        }

        let (nonce_bytes, sealed) = raw.split_at(NONCE_LEN);
        let nonce = Nonce::try_assume_unique_for_key(nonce_bytes)
            .map_err(|_| BiometricError::DecryptionError("Invalid nonce length".to_string()))?;

        let mut in_out = sealed.to_vec();
        let plaintext = self
            .key
            .open_in_place(nonce, Aad::empty(), &mut in_out)
            .map_err(|_| {
                BiometricError::DecryptionError(
                    "Authentication failed: template is corrupted, tampered with, or sealed under a different key"
                        .to_string(),
                )
            })?;
        Ok(plaintext.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn cipher() -> TemplateCipher {
        TemplateCipher::new(&CipherConfig::default()).unwrap()
    }

    #[test]
    fn test_round_trip() {
        let cipher = cipher();
        let blob = cipher.encrypt(b"[0.25,0.5,1.0]").unwrap();
        assert_eq!(cipher.decrypt(&blob).unwrap(), b"[0.25,0.5,1.0]");
    }

    #[test]
    fn test_fresh_nonce_per_call() {
        let cipher = cipher();
        let a = cipher.encrypt(b"same payload").unwrap();
        let b = cipher.encrypt(b"same payload").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_bit_flip_is_rejected() {
        let cipher = cipher();
        let blob = cipher.encrypt(b"feature vector bytes").unwrap();
        let mut raw = STANDARD.decode(&blob).unwrap();
        raw[NONCE_LEN + 3] ^= 0x01;
        let tampered = STANDARD.encode(raw);

        let err = cipher.decrypt(&tampered).unwrap_err();
        assert!(matches!(err, BiometricError::DecryptionError(_)));
    }

    #[test]
    fn test_wrong_key_is_rejected() {
        let blob = cipher().encrypt(b"payload").unwrap();
        let other = TemplateCipher::new(&CipherConfig {
            secret: "another-secret".to_string(),
            salt: CipherConfig::default().salt,
        })
        .unwrap();
        assert!(matches!(
            other.decrypt(&blob),
            Err(BiometricError::DecryptionError(_))
        ));
    }

    #[test]
    fn test_salt_changes_key() {
        let a = TemplateCipher::derive_key(b"secret", b"salt-a");
        let b = TemplateCipher::derive_key(b"secret", b"salt-b");
        assert_ne!(a, b);
    }

    #[test]
    fn test_malformed_blobs() {
        let cipher = cipher();
        assert!(matches!(
            cipher.decrypt("not base64 at all!"),
            Err(BiometricError::DecryptionError(_))
        ));
        let short = STANDARD.encode([0u8; 10]);
        assert!(matches!(
            cipher.decrypt(&short),
            Err(BiometricError::DecryptionError(_))
        ));
    }

    #[test]
    fn test_empty_secret_rejected() {
        let config = CipherConfig {
            secret: String::new(),
            salt: "salt".to_string(),
        };
        assert!(TemplateCipher::new(&config).is_err());
    }

    proptest! {
        #[test]
        fn prop_round_trip(payload in proptest::collection::vec(any::<u8>(), 0..512)) {
            let cipher = cipher();
            let blob = cipher.encrypt(&payload).unwrap();
            prop_assert_eq!(cipher.decrypt(&blob).unwrap(), payload);
        }
    }
}
