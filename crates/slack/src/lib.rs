//! Slack integration for the dice roller.
//!
//! - **Slash Commands** (`commands`) - form payload decoding and allow-listing
//! - **Web API** (`web_api`) - `auth.test`, `chat.postMessage` and `oauth.access`
//! - **Delivery** (`delivery`) - posting rolls as the bot user
//!
//! # Setup
//!
//! 1. Create a Slack app at https://api.slack.com/apps
//! 2. Point a slash command such as `/roll` at the service root URL
//! 3. Set the OAuth redirect URL to `{base_url}/validate`
//! 4. Set env vars: `ROLLBOT_SLACK_CLIENT_ID`, `ROLLBOT_SLACK_CLIENT_SECRET`

pub mod commands;
pub mod delivery;
pub mod web_api;

pub use commands::{normalize_roll_command, CommandEnvelope, CommandParseError, SlashCommandPayload};
pub use delivery::{deliver_roll, BotIdentity, DeliveryError};
pub use web_api::{
    credentials_valid, AuthIdentity, HttpSlackClient, OAuthAccessRequest, OAuthGrant,
    OutgoingMessage, SlackApiError, SlackWebApi,
};
