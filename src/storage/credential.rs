use crate::models::Modality;
use crate::storage::CredentialIssuer;
use crate::utils::{BiometricError, Result};
use ring::rand::{SecureRandom, SystemRandom};

const NONCE_BYTES: usize = 16;

/// Issues `<prefix>.<owner>.<modality>.<random hex>` tokens.
pub struct StaticCredentialIssuer {
    prefix: String,
    rng: SystemRandom,
}

impl StaticCredentialIssuer {
    pub fn new(prefix: impl Into<String>) -> Self {
        StaticCredentialIssuer {
            prefix: prefix.into(),
            rng: SystemRandom::new(),
        }
    }
}

impl std::fmt::Debug for StaticCredentialIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("StaticCredentialIssuer")
            .field("prefix", &self.prefix)
            .finish()
    }
}

impl CredentialIssuer for StaticCredentialIssuer {
    fn issue_verified_credential(&self, owner: &str, modality: Modality) -> Result<String> {
        let mut nonce = [0u8; NONCE_BYTES];
        self.rng.fill(&mut nonce).map_err(|_| {
            BiometricError::CredentialError("Failed to generate credential nonce".to_string())
        })?;
        Ok(format!(
            "{}.{}.{}.{}",
            self.prefix,
            owner,
            modality,
            hex::encode(nonce)
        ))
    }
}
