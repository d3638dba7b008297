use std::sync::Arc;

use axum::Router;
use rollbot_core::config::{AppConfig, ConfigError};
use rollbot_core::token_seal::TokenCipher;
use rollbot_db::{connect_with_config, migrations, DbPool, SqlTeamRepository};
use rollbot_slack::web_api::{HttpSlackClient, SlackApiError};
use thiserror::Error;
use tracing::info;

use crate::{health, routes};

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub state: routes::AppState,
}

impl Application {
    /// Slash-command, OAuth and homepage routes plus `/health`.
    pub fn router(&self) -> Router {
        routes::router(self.state.clone()).merge(health::router(self.db_pool.clone()))
    }
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("slack client could not be built: {0}")]
    SlackClient(#[source] SlackApiError),
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );
    config.validate()?;

    let db_pool =
        connect_with_config(&config.database).await.map_err(BootstrapError::DatabaseConnect)?;
    info!(
        event_name = "system.bootstrap.database_connected",
        correlation_id = "bootstrap",
        "database connection established"
    );

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(
        event_name = "system.bootstrap.migrations_applied",
        correlation_id = "bootstrap",
        "database migrations applied"
    );

    let slack =
        HttpSlackClient::new(config.slack.api_base_url.clone(), config.slack.request_timeout_secs)
            .map_err(BootstrapError::SlackClient)?;
    let state = routes::AppState::new(
        config.clone(),
        Arc::new(SqlTeamRepository::new(db_pool.clone(), TokenCipher::from_config(&config))),
        Arc::new(slack),
    );

    Ok(Application { config, db_pool, state })
}
