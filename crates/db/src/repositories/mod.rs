use async_trait::async_trait;
use thiserror::Error;

use rollbot_core::domain::team::{TeamCredentials, TeamId};
use rollbot_core::token_seal::TokenSealError;

pub mod memory;
pub mod team;

pub use memory::InMemoryTeamRepository;
pub use team::SqlTeamRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("token sealing error: {0}")]
    Sealing(#[from] TokenSealError),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SaveOutcome {
    Inserted,
    Updated,
}

#[async_trait]
pub trait TeamRepository: Send + Sync {
    async fn find_by_id(&self, id: &TeamId) -> Result<Option<TeamCredentials>, RepositoryError>;

    /// Upserts by team id. An existing row keeps its original `added_at`.
    async fn save(&self, credentials: TeamCredentials) -> Result<SaveOutcome, RepositoryError>;
}
