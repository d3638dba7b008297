use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use thiserror::Error;

use crate::config::SlackConfig;

type HmacSha256 = Hmac<Sha256>;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum StateTokenError {
    #[error("state token is malformed")]
    Malformed,
    #[error("state token signature does not match")]
    BadSignature,
    #[error("state token expired {age_secs} seconds after issue")]
    Expired { age_secs: i64 },
    #[error("state signing key was rejected")]
    InvalidKey,
}

/// Signs the OAuth `state` parameter so the callback can prove it started
/// here. Tokens look like `{issued_at}.{hex hmac}`.
#[derive(Clone, Debug)]
pub struct StateTokenSigner {
    client_id: String,
    client_secret: SecretString,
    max_age_secs: i64,
}

impl StateTokenSigner {
    pub fn new(
        client_id: impl Into<String>,
        client_secret: SecretString,
        max_age_secs: u64,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret,
            max_age_secs: i64::try_from(max_age_secs).unwrap_or(i64::MAX),
        }
    }

    pub fn from_config(config: &SlackConfig) -> Self {
        Self::new(
            config.client_id.clone(),
            config.client_secret.clone(),
            config.state_max_age_secs,
        )
    }

    pub fn issue(&self, now: DateTime<Utc>) -> Result<String, StateTokenError> {
        let issued_at = now.timestamp();
        let mut mac = self.mac()?;
        mac.update(self.payload(issued_at).as_bytes());
        Ok(format!("{issued_at}.{}", encode_hex(mac.finalize().into_bytes().as_slice())))
    }

    /// Returns the issue time of a genuine, unexpired token.
    pub fn verify(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<DateTime<Utc>, StateTokenError> {
        let (issued_part, signature_part) =
            token.trim().split_once('.').ok_or(StateTokenError::Malformed)?;
        let issued_at = issued_part.parse::<i64>().map_err(|_| StateTokenError::Malformed)?;
        let signature = decode_hex(signature_part).ok_or(StateTokenError::Malformed)?;

        let mut mac = self.mac()?;
        mac.update(self.payload(issued_at).as_bytes());
        mac.verify_slice(&signature).map_err(|_| StateTokenError::BadSignature)?;

        let issued =
            DateTime::<Utc>::from_timestamp(issued_at, 0).ok_or(StateTokenError::Malformed)?;
        let age_secs = now.timestamp().saturating_sub(issued_at);
        if age_secs > self.max_age_secs {
            return Err(StateTokenError::Expired { age_secs });
        }

        Ok(issued)
    }

    fn payload(&self, issued_at: i64) -> String {
        format!("{}:{issued_at}", self.client_id)
    }

    fn mac(&self) -> Result<HmacSha256, StateTokenError> {
        HmacSha256::new_from_slice(self.client_secret.expose_secret().as_bytes())
            .map_err(|_| StateTokenError::InvalidKey)
    }
}

fn encode_hex(bytes: &[u8]) -> String {
    let mut output = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        output.push_str(&format!("{byte:02x}"));
    }
    output
}

fn decode_hex(input: &str) -> Option<Vec<u8>> {
    if input.is_empty() || input.len() % 2 != 0 || !input.is_ascii() {
        return None;
    }

    (0..input.len())
        .step_by(2)
        .map(|index| u8::from_str_radix(&input[index..index + 2], 16).ok())
        .collect()
}
