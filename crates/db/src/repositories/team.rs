use chrono::{DateTime, Utc};
use sqlx::Row;

use rollbot_core::domain::team::{TeamCredentials, TeamId};
use rollbot_core::token_seal::TokenCipher;

use super::{RepositoryError, SaveOutcome, TeamRepository};
use crate::DbPool;

/// Team rows with both token columns sealed by `cipher`.
pub struct SqlTeamRepository {
    pool: DbPool,
    cipher: TokenCipher,
}

impl SqlTeamRepository {
    pub fn new(pool: DbPool, cipher: TokenCipher) -> Self {
        Self { pool, cipher }
    }
}

fn parse_timestamp(column: &str, value: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Decode(format!("{column}: {e}")))
}

fn row_to_team(
    row: &sqlx::sqlite::SqliteRow,
    cipher: &TokenCipher,
) -> Result<TeamCredentials, RepositoryError> {
    let id: String = row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let token: String =
        row.try_get("token").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let bot_id: String =
        row.try_get("bot_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let bot_token: String =
        row.try_get("bot_token").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let added_at_str: String =
        row.try_get("added_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let updated_at_str: String =
        row.try_get("updated_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    let added_at = parse_timestamp("added_at", &added_at_str)?;
    let updated_at = parse_timestamp("updated_at", &updated_at_str)?;

    Ok(TeamCredentials {
        team_id: TeamId(id),
        token: cipher.open(&token)?,
        bot_id,
        bot_token: cipher.open(&bot_token)?,
        added_at,
        updated_at,
    })
}

#[async_trait::async_trait]
impl TeamRepository for SqlTeamRepository {
    async fn find_by_id(&self, id: &TeamId) -> Result<Option<TeamCredentials>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, token, bot_id, bot_token, added_at, updated_at
             FROM roll_teams WHERE id = ?",
        )
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(ref r) => Ok(Some(row_to_team(r, &self.cipher)?)),
            None => Ok(None),
        }
    }

    async fn save(&self, credentials: TeamCredentials) -> Result<SaveOutcome, RepositoryError> {
        let sealed_token = self.cipher.seal(&credentials.token)?;
        let sealed_bot_token = self.cipher.seal(&credentials.bot_token)?;
        let mut tx = self.pool.begin().await?;

        let existing: Option<String> =
            sqlx::query_scalar("SELECT id FROM roll_teams WHERE id = ?")
                .bind(&credentials.team_id.0)
                .fetch_optional(&mut *tx)
                .await?;

        sqlx::query(
            "INSERT INTO roll_teams (id, token, bot_id, bot_token, added_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 token = excluded.token,
                 bot_id = excluded.bot_id,
                 bot_token = excluded.bot_token,
                 updated_at = excluded.updated_at",
        )
        .bind(&credentials.team_id.0)
        .bind(&sealed_token)
        .bind(&credentials.bot_id)
        .bind(&sealed_bot_token)
        .bind(credentials.added_at.to_rfc3339())
        .bind(credentials.updated_at.to_rfc3339())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(if existing.is_some() { SaveOutcome::Updated } else { SaveOutcome::Inserted })
    }
}
