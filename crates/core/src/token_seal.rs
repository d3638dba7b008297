use aes_gcm::aead::generic_array::GenericArray;
use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::Aes256Gcm;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use secrecy::{ExposeSecret, SecretString};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::config::AppConfig;

const SEALED_PREFIX: &str = "v1:";
const NONCE_LEN: usize = 12;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum TokenSealError {
    #[error("token sealing key was rejected")]
    InvalidKey,
    #[error("sealed token is malformed")]
    Malformed,
    #[error("sealed token failed authentication")]
    Tampered,
    #[error("token could not be sealed")]
    Seal,
}

/// AES-256-GCM sealing for tokens at rest. Stored values look like
/// `v1:{base64(nonce || ciphertext)}` with a fresh nonce per seal.
#[derive(Clone)]
pub struct TokenCipher {
    key: [u8; 32],
}

impl std::fmt::Debug for TokenCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCipher").finish_non_exhaustive()
    }
}

impl TokenCipher {
    /// The AES key is the SHA-256 of the configured passphrase.
    pub fn new(passphrase: &SecretString) -> Self {
        Self { key: Sha256::digest(passphrase.expose_secret().as_bytes()).into() }
    }

    /// Uses `database.token_key`, falling back to the Slack client secret.
    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(config.database.token_key.as_ref().unwrap_or(&config.slack.client_secret))
    }

    pub fn seal(&self, token: &SecretString) -> Result<String, TokenSealError> {
        let cipher = self.cipher()?;
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = cipher
            .encrypt(&nonce, token.expose_secret().as_bytes())
            .map_err(|_| TokenSealError::Seal)?;

        let mut sealed = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        sealed.extend_from_slice(nonce.as_slice());
        sealed.extend_from_slice(&ciphertext);
        Ok(format!("{SEALED_PREFIX}{}", BASE64.encode(sealed)))
    }

    pub fn open(&self, stored: &str) -> Result<SecretString, TokenSealError> {
        let encoded = stored.strip_prefix(SEALED_PREFIX).ok_or(TokenSealError::Malformed)?;
        let raw = BASE64.decode(encoded).map_err(|_| TokenSealError::Malformed)?;
        if raw.len() <= NONCE_LEN {
            return Err(TokenSealError::Malformed);
        }

        let (nonce, ciphertext) = raw.split_at(NONCE_LEN);
        let plaintext = self
            .cipher()?
            .decrypt(GenericArray::from_slice(nonce), ciphertext)
            .map_err(|_| TokenSealError::Tampered)?;
        let token = String::from_utf8(plaintext).map_err(|_| TokenSealError::Malformed)?;
        Ok(SecretString::from(token))
    }

    fn cipher(&self) -> Result<Aes256Gcm, TokenSealError> {
        Aes256Gcm::new_from_slice(&self.key).map_err(|_| TokenSealError::InvalidKey)
    }
}
