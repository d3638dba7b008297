use thiserror::Error;
use tracing::{info, warn};

use rollbot_core::config::SlackConfig;
use rollbot_core::domain::team::TeamCredentials;

use crate::web_api::{OutgoingMessage, SlackApiError, SlackWebApi};

/// Name and avatar the bot posts under.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BotIdentity {
    pub username: String,
    pub icon_emoji: String,
}

impl BotIdentity {
    pub fn from_config(config: &SlackConfig) -> Self {
        Self { username: config.bot_username.clone(), icon_emoji: config.bot_icon_emoji.clone() }
    }
}

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("bot is not a member of channel `{channel_id}`")]
    ChannelNotFound { channel_id: String },
    #[error("message delivery failed: {0}")]
    Failed(#[source] SlackApiError),
}

impl DeliveryError {
    pub fn user_message(&self, app_name_full: &str) -> String {
        match self {
            Self::ChannelNotFound { .. } => format!(
                "The {app_name_full} bot is not authorized to post in this channel. \
                 Please invite it to join this channel and try again."
            ),
            Self::Failed(error) => {
                let detail = error.code().map(str::to_owned).unwrap_or_else(|| error.to_string());
                format!("{app_name_full} encountered an error: {detail}")
            }
        }
    }
}

pub async fn deliver_roll(
    api: &dyn SlackWebApi,
    credentials: &TeamCredentials,
    channel_id: &str,
    text: &str,
    identity: &BotIdentity,
) -> Result<(), DeliveryError> {
    let message = OutgoingMessage {
        channel: channel_id.to_owned(),
        text: text.to_owned(),
        username: identity.username.clone(),
        icon_emoji: identity.icon_emoji.clone(),
    };

    match api.post_message(&credentials.bot_token, &message).await {
        Ok(()) => {
            info!(
                event_name = "slack.roll.delivered",
                team_id = %credentials.team_id,
                channel_id,
                "roll posted to channel"
            );
            Ok(())
        }
        Err(error) => {
            warn!(
                event_name = "slack.roll.delivery_failed",
                team_id = %credentials.team_id,
                channel_id,
                error = %error,
                "could not post roll"
            );
            if error.code() == Some("channel_not_found") {
                return Err(DeliveryError::ChannelNotFound { channel_id: channel_id.to_owned() });
            }
            Err(DeliveryError::Failed(error))
        }
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use chrono::Utc;
    use secrecy::{ExposeSecret, SecretString};
    use tokio::sync::Mutex;

    use rollbot_core::domain::team::{TeamCredentials, TeamId};

    use super::{deliver_roll, BotIdentity, DeliveryError};
    use crate::web_api::{
        AuthIdentity, OAuthAccessRequest, OAuthGrant, OutgoingMessage, SlackApiError, SlackWebApi,
    };

    #[derive(Default)]
    struct RecordingApi {
        failure: Option<&'static str>,
        posted: Mutex<Vec<(String, OutgoingMessage)>>,
    }

    #[async_trait]
    impl SlackWebApi for RecordingApi {
        async fn auth_test(&self, _token: &SecretString) -> Result<AuthIdentity, SlackApiError> {
            Ok(AuthIdentity::default())
        }

        async fn post_message(
            &self,
            token: &SecretString,
            message: &OutgoingMessage,
        ) -> Result<(), SlackApiError> {
            if let Some(code) = self.failure {
                return Err(SlackApiError::Api(code.to_owned()));
            }
            self.posted.lock().await.push((token.expose_secret().to_owned(), message.clone()));
            Ok(())
        }

        async fn oauth_access(
            &self,
            _request: &OAuthAccessRequest,
        ) -> Result<OAuthGrant, SlackApiError> {
            Err(SlackApiError::Api("not_used".to_owned()))
        }
    }

    fn team() -> TeamCredentials {
        TeamCredentials::new(
            TeamId("T1".to_owned()),
            SecretString::from("xoxp-user".to_owned()),
            "B1",
            SecretString::from("xoxb-bot".to_owned()),
            Utc::now(),
        )
    }

    fn identity() -> BotIdentity {
        BotIdentity { username: "Roll Bot".to_owned(), icon_emoji: ":game_die:".to_owned() }
    }

    #[tokio::test]
    async fn posts_with_bot_token_and_identity() {
        let api = RecordingApi::default();

        deliver_roll(&api, &team(), "C42", "_alice rolled 1 6-sided die:_  *3*  ( 3 )", &identity())
            .await
            .expect("delivered");

        let posted = api.posted.lock().await;
        assert_eq!(posted.len(), 1);
        let (token, message) = &posted[0];
        assert_eq!(token, "xoxb-bot");
        assert_eq!(message.channel, "C42");
        assert_eq!(message.username, "Roll Bot");
        assert_eq!(message.icon_emoji, ":game_die:");
    }

    #[tokio::test]
    async fn channel_not_found_asks_for_an_invite() {
        let api = RecordingApi { failure: Some("channel_not_found"), ..RecordingApi::default() };

        let error = deliver_roll(&api, &team(), "C42", "roll", &identity())
            .await
            .expect_err("delivery fails");

        assert!(matches!(error, DeliveryError::ChannelNotFound { .. }));
        assert_eq!(
            error.user_message("Slack Roll"),
            "The Slack Roll bot is not authorized to post in this channel. \
             Please invite it to join this channel and try again."
        );
    }

    #[tokio::test]
    async fn other_failures_report_slack_error_code() {
        let api = RecordingApi { failure: Some("is_archived"), ..RecordingApi::default() };

        let error = deliver_roll(&api, &team(), "C42", "roll", &identity())
            .await
            .expect_err("delivery fails");

        assert_eq!(error.user_message("Slack Roll"), "Slack Roll encountered an error: is_archived");
    }
}
