use chrono::{DateTime, Utc};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TeamId(pub String);

impl TeamId {
    /// Slack team ids are opaque ASCII identifiers such as `T024BE7LD`.
    pub fn parse(value: impl AsRef<str>) -> Result<Self, DomainError> {
        let trimmed = value.as_ref().trim();
        if trimmed.is_empty() || !trimmed.chars().all(|ch| ch.is_ascii_alphanumeric()) {
            return Err(DomainError::InvalidTeamId(value.as_ref().to_string()));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TeamId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Credentials granted to one workspace by the OAuth handshake.
#[derive(Clone, Debug)]
pub struct TeamCredentials {
    pub team_id: TeamId,
    pub token: SecretString,
    pub bot_id: String,
    pub bot_token: SecretString,
    pub added_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TeamCredentials {
    pub fn new(
        team_id: TeamId,
        token: SecretString,
        bot_id: impl Into<String>,
        bot_token: SecretString,
        now: DateTime<Utc>,
    ) -> Self {
        Self { team_id, token, bot_id: bot_id.into(), bot_token, added_at: now, updated_at: now }
    }
}
