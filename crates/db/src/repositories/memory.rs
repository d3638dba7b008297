use std::collections::HashMap;

use tokio::sync::RwLock;

use rollbot_core::domain::team::{TeamCredentials, TeamId};

use super::{RepositoryError, SaveOutcome, TeamRepository};

#[derive(Default)]
pub struct InMemoryTeamRepository {
    teams: RwLock<HashMap<String, TeamCredentials>>,
}

#[async_trait::async_trait]
impl TeamRepository for InMemoryTeamRepository {
    async fn find_by_id(&self, id: &TeamId) -> Result<Option<TeamCredentials>, RepositoryError> {
        let teams = self.teams.read().await;
        Ok(teams.get(&id.0).cloned())
    }

    async fn save(&self, mut credentials: TeamCredentials) -> Result<SaveOutcome, RepositoryError> {
        let mut teams = self.teams.write().await;
        let outcome = match teams.get(&credentials.team_id.0) {
            Some(existing) => {
                credentials.added_at = existing.added_at;
                SaveOutcome::Updated
            }
            None => SaveOutcome::Inserted,
        };
        teams.insert(credentials.team_id.0.clone(), credentials);
        Ok(outcome)
    }
}
