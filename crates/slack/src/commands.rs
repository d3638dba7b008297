use serde::Deserialize;
use thiserror::Error;

use rollbot_core::config::AppInfoConfig;
use rollbot_core::domain::team::TeamId;

/// Form fields Slack sends with every slash-command invocation.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SlashCommandPayload {
    pub command: String,
    pub text: String,
    pub team_id: String,
    pub channel_id: String,
    pub user_id: String,
    pub user_name: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandEnvelope {
    pub command: String,
    pub text: String,
    pub team_id: TeamId,
    pub channel_id: String,
    pub user_id: String,
    pub user_name: String,
    pub request_id: String,
}

impl CommandEnvelope {
    /// Name shown in the roll message. Falls back to a user mention.
    pub fn display_name(&self) -> String {
        if self.user_name.trim().is_empty() {
            format!("<@{}>", self.user_id)
        } else {
            self.user_name.clone()
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandParseError {
    #[error("\"{0}\" is not an allowed command")]
    UnsupportedCommand(String),
    #[error("slash command payload is missing a valid team id")]
    MissingTeam,
}

pub fn normalize_roll_command(
    payload: SlashCommandPayload,
    app: &AppInfoConfig,
    request_id: impl Into<String>,
) -> Result<CommandEnvelope, CommandParseError> {
    let command = payload.command.trim().to_owned();
    if !app.is_allowed_command(&command) {
        return Err(CommandParseError::UnsupportedCommand(payload.command));
    }

    let team_id = TeamId::parse(&payload.team_id).map_err(|_| CommandParseError::MissingTeam)?;

    Ok(CommandEnvelope {
        command,
        text: payload.text.trim().to_owned(),
        team_id,
        channel_id: payload.channel_id,
        user_id: payload.user_id,
        user_name: payload.user_name,
        request_id: request_id.into(),
    })
}
