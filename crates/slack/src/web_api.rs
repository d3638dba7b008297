use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use rollbot_core::domain::team::TeamCredentials;

#[derive(Debug, Error)]
pub enum SlackApiError {
    #[error("slack request failed: {0}")]
    Transport(#[source] reqwest::Error),
    #[error("slack returned HTTP {0}")]
    Status(u16),
    #[error("{0}")]
    Api(String),
    #[error("could not decode slack response: {0}")]
    Decode(String),
}

impl SlackApiError {
    /// Slack's machine-readable error code, e.g. `channel_not_found`.
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Api(code) => Some(code),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct OutgoingMessage {
    pub channel: String,
    pub text: String,
    pub username: String,
    pub icon_emoji: String,
}

#[derive(Clone, Debug)]
pub struct OAuthAccessRequest {
    pub client_id: String,
    pub client_secret: SecretString,
    pub code: String,
    pub redirect_uri: String,
}

/// Credentials returned by `oauth.access`.
#[derive(Clone, Debug)]
pub struct OAuthGrant {
    pub access_token: SecretString,
    pub team_id: String,
    pub bot_user_id: String,
    pub bot_access_token: SecretString,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct AuthIdentity {
    #[serde(default)]
    pub team_id: String,
    #[serde(default)]
    pub user_id: String,
}

#[async_trait]
pub trait SlackWebApi: Send + Sync {
    async fn auth_test(&self, token: &SecretString) -> Result<AuthIdentity, SlackApiError>;
    async fn post_message(
        &self,
        token: &SecretString,
        message: &OutgoingMessage,
    ) -> Result<(), SlackApiError>;
    async fn oauth_access(&self, request: &OAuthAccessRequest)
        -> Result<OAuthGrant, SlackApiError>;
}

pub struct HttpSlackClient {
    client: Client,
    api_base_url: String,
}

impl HttpSlackClient {
    pub fn new(api_base_url: impl Into<String>, timeout_secs: u64) -> Result<Self, SlackApiError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs.max(1)))
            .build()
            .map_err(SlackApiError::Transport)?;

        Ok(Self { client, api_base_url: api_base_url.into().trim_end_matches('/').to_owned() })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/{method}", self.api_base_url)
    }

    async fn call<T, F>(
        &self,
        method: &str,
        token: Option<&SecretString>,
        form: &F,
    ) -> Result<T, SlackApiError>
    where
        T: DeserializeOwned,
        F: Serialize + ?Sized,
    {
        let mut request = self.client.post(self.method_url(method)).form(form);
        if let Some(token) = token {
            request = request.bearer_auth(token.expose_secret());
        }

        let response = request.send().await.map_err(SlackApiError::Transport)?;
        let status = response.status();
        if !status.is_success() {
            return Err(SlackApiError::Status(status.as_u16()));
        }

        let body = response.text().await.map_err(SlackApiError::Transport)?;
        decode_response(method, &body)
    }
}

#[async_trait]
impl SlackWebApi for HttpSlackClient {
    async fn auth_test(&self, token: &SecretString) -> Result<AuthIdentity, SlackApiError> {
        let empty: &[(&str, &str)] = &[];
        self.call("auth.test", Some(token), empty).await
    }

    async fn post_message(
        &self,
        token: &SecretString,
        message: &OutgoingMessage,
    ) -> Result<(), SlackApiError> {
        let _: serde_json::Value = self.call("chat.postMessage", Some(token), message).await?;
        Ok(())
    }

    async fn oauth_access(
        &self,
        request: &OAuthAccessRequest,
    ) -> Result<OAuthGrant, SlackApiError> {
        let form = [
            ("client_id", request.client_id.as_str()),
            ("client_secret", request.client_secret.expose_secret()),
            ("code", request.code.as_str()),
            ("redirect_uri", request.redirect_uri.as_str()),
        ];
        let response: OAuthAccessResponse = self.call("oauth.access", None, &form[..]).await?;
        response.into_grant()
    }
}

#[derive(Deserialize)]
struct ApiEnvelope {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Deserialize)]
struct OAuthAccessResponse {
    #[serde(default)]
    access_token: String,
    #[serde(default)]
    team_id: String,
    #[serde(default)]
    bot: Option<OAuthBot>,
}

#[derive(Deserialize)]
struct OAuthBot {
    bot_user_id: String,
    bot_access_token: String,
}

impl OAuthAccessResponse {
    fn into_grant(self) -> Result<OAuthGrant, SlackApiError> {
        let bot = self.bot.ok_or_else(|| {
            SlackApiError::Decode("oauth.access response is missing bot credentials".to_owned())
        })?;
        if self.access_token.is_empty() || self.team_id.is_empty() {
            return Err(SlackApiError::Decode(
                "oauth.access response is missing the access token or team id".to_owned(),
            ));
        }

        Ok(OAuthGrant {
            access_token: SecretString::from(self.access_token),
            team_id: self.team_id,
            bot_user_id: bot.bot_user_id,
            bot_access_token: SecretString::from(bot.bot_access_token),
        })
    }
}

fn decode_response<T: DeserializeOwned>(method: &str, body: &str) -> Result<T, SlackApiError> {
    let envelope: ApiEnvelope = serde_json::from_str(body)
        .map_err(|error| SlackApiError::Decode(format!("{method}: {error}")))?;
    if !envelope.ok {
        return Err(SlackApiError::Api(
            envelope.error.unwrap_or_else(|| "unknown_error".to_owned()),
        ));
    }

    serde_json::from_str(body).map_err(|error| SlackApiError::Decode(format!("{method}: {error}")))
}

/// Both the installing user's token and the bot token must pass `auth.test`.
pub async fn credentials_valid(api: &dyn SlackWebApi, credentials: &TeamCredentials) -> bool {
    for (kind, token) in [("user", &credentials.token), ("bot", &credentials.bot_token)] {
        if let Err(error) = api.auth_test(token).await {
            warn!(
                event_name = "slack.auth_test.failed",
                team_id = %credentials.team_id,
                token_kind = kind,
                error = %error,
                "stored slack token failed auth.test"
            );
            return false;
        }
    }
    true
}
