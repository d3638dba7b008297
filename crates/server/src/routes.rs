use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
    routing::get,
    Form, Router,
};
use chrono::Utc;
use serde::Deserialize;
use tera::{Context, Tera};
use tracing::{error, info, warn};
use uuid::Uuid;

use rollbot_core::config::{AppConfig, AppInfoConfig};
use rollbot_core::domain::team::{TeamCredentials, TeamId};
use rollbot_core::errors::ApplicationError;
use rollbot_core::oauth_state::{StateTokenError, StateTokenSigner};
use rollbot_core::roll::{make_roll, HelpContext, RngDieSource, RollReply};
use rollbot_db::repositories::{SaveOutcome, TeamRepository};
use rollbot_slack::commands::{normalize_roll_command, CommandEnvelope, SlashCommandPayload};
use rollbot_slack::delivery::{deliver_roll, BotIdentity};
use rollbot_slack::web_api::{credentials_valid, OAuthAccessRequest, SlackApiError, SlackWebApi};

pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub teams: Arc<dyn TeamRepository>,
    pub slack: Arc<dyn SlackWebApi>,
    pub templates: Arc<Tera>,
    pub signer: Arc<StateTokenSigner>,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        teams: Arc<dyn TeamRepository>,
        slack: Arc<dyn SlackWebApi>,
    ) -> Self {
        let signer = StateTokenSigner::from_config(&config.slack);
        Self {
            config: Arc::new(config),
            teams,
            slack,
            templates: init_templates(),
            signer: Arc::new(signer),
        }
    }
}

pub fn init_templates() -> Arc<Tera> {
    let mut tera = Tera::default();
    if let Err(error) =
        tera.add_raw_template("index.html", include_str!("../../../templates/index.html"))
    {
        warn!(error = %error, "failed to register homepage template");
    }
    Arc::new(tera)
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(home_page).post(slash_command))
        .route("/authenticate", get(authenticate))
        .route("/validate", get(validate))
        .with_state(state)
}

#[derive(Debug, Default, Deserialize)]
pub struct HomeQuery {
    #[serde(default)]
    success: Option<String>,
}

async fn home_page(
    Query(query): Query<HomeQuery>,
    State(state): State<AppState>,
) -> Result<Html<String>, (StatusCode, Html<String>)> {
    let app = &state.config.app;
    let mut context = Context::new();
    context.insert(
        "project",
        &serde_json::json!({
            "name": app.name,
            "name_full": app.name_full,
            "version": APP_VERSION,
            "base_url": app.base_url,
            "auth_url": app.auth_url(),
        }),
    );
    context.insert("allowed_commands", &app.allowed_commands);
    context.insert("success", &(query.success.as_deref() == Some("1")));

    state.templates.render("index.html", &context).map(Html).map_err(|error| {
        error!(
            event_name = "http.home.template_error",
            correlation_id = "home",
            error = %error,
            "homepage template failed to render"
        );
        (StatusCode::INTERNAL_SERVER_ERROR, Html("<h1>Template Error</h1>".to_string()))
    })
}

async fn slash_command(
    State(state): State<AppState>,
    Form(payload): Form<SlashCommandPayload>,
) -> Response {
    let correlation_id = Uuid::new_v4().to_string();
    info!(
        event_name = "slack.command.received",
        correlation_id = %correlation_id,
        command = %payload.command,
        team_id = %payload.team_id,
        channel_id = %payload.channel_id,
        user_id = %payload.user_id,
        "slash command received"
    );

    let app = &state.config.app;
    let envelope = match normalize_roll_command(payload, app, correlation_id.clone()) {
        Ok(envelope) => envelope,
        Err(rejection) => {
            warn!(
                event_name = "slack.command.not_allowed",
                correlation_id = %correlation_id,
                reason = %rejection,
                "slash command rejected"
            );
            return (StatusCode::OK, rejection.to_string()).into_response();
        }
    };

    let credentials = match state.teams.find_by_id(&envelope.team_id).await {
        Ok(credentials) => credentials,
        Err(repository_error) => {
            let interface = ApplicationError::Persistence(repository_error.to_string())
                .into_interface(correlation_id.clone());
            error!(
                event_name = "slack.command.team_lookup_failed",
                correlation_id = %correlation_id,
                team_id = %envelope.team_id,
                error = %interface,
                "team credential lookup failed"
            );
            return (StatusCode::SERVICE_UNAVAILABLE, interface.user_message()).into_response();
        }
    };

    let valid = match &credentials {
        Some(found) => credentials_valid(state.slack.as_ref(), found).await,
        None => false,
    };
    let credentials = match credentials {
        Some(credentials) if valid => credentials,
        found => {
            warn!(
                event_name = "slack.command.auth_error",
                correlation_id = %correlation_id,
                team_id = %envelope.team_id,
                team_known = found.is_some(),
                "team is not authorized"
            );
            return (StatusCode::OK, auth_error_message(app)).into_response();
        }
    };

    let reply = roll_for(&envelope, app);
    if !reply.is_roll() {
        if let RollReply::Rejected(diagnostic) = &reply {
            info!(
                event_name = "roll.invalid",
                correlation_id = %correlation_id,
                text = %envelope.text,
                diagnostic = %diagnostic,
                "roll text could not be parsed"
            );
        }
        return (StatusCode::OK, reply.into_text()).into_response();
    }

    let identity = BotIdentity::from_config(&state.config.slack);
    match deliver_roll(
        state.slack.as_ref(),
        &credentials,
        &envelope.channel_id,
        reply.text(),
        &identity,
    )
    .await
    {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(delivery_error) => {
            warn!(
                event_name = "slack.command.delivery_failed",
                correlation_id = %correlation_id,
                error = %delivery_error,
                "roll could not be delivered"
            );
            (StatusCode::OK, delivery_error.user_message(&app.name_full)).into_response()
        }
    }
}

/// Rolls with a thread-local generator. Kept synchronous so the generator
/// never lives across an `.await`.
fn roll_for(envelope: &CommandEnvelope, app: &AppInfoConfig) -> RollReply {
    let help = HelpContext {
        app_name: &app.name_full,
        version: APP_VERSION,
        command: &envelope.command,
    };
    let mut dice = RngDieSource::thread();
    make_roll(&envelope.text, &envelope.display_name(), &help, &mut dice)
}

pub fn auth_error_message(app: &AppInfoConfig) -> String {
    format!(
        "{} is not authorized to post in this team: *<{}|Click here to authorize>*",
        app.name_full, app.base_url
    )
}

async fn authenticate(
    State(state): State<AppState>,
) -> Result<Redirect, (StatusCode, Html<String>)> {
    let token = state.signer.issue(Utc::now()).map_err(|error| {
        let interface =
            ApplicationError::Configuration(error.to_string()).into_interface("authenticate");
        error!(
            event_name = "oauth.state.issue_failed",
            correlation_id = "authenticate",
            error = %interface,
            "could not sign oauth state"
        );
        failure(StatusCode::INTERNAL_SERVER_ERROR, interface.user_message())
    })?;

    let slack = &state.config.slack;
    let scope = slack.scopes.join(" ");
    let redirect_uri = state.config.app.valid_url();
    let url = reqwest::Url::parse_with_params(
        &slack.oauth_url,
        [
            ("client_id", slack.client_id.as_str()),
            ("redirect_uri", redirect_uri.as_str()),
            ("scope", scope.as_str()),
            ("state", token.as_str()),
        ],
    )
    .map_err(|error| {
        error!(
            event_name = "oauth.redirect.invalid_url",
            correlation_id = "authenticate",
            error = %error,
            "slack oauth url could not be built"
        );
        failure(StatusCode::INTERNAL_SERVER_ERROR, "OAuth is misconfigured.")
    })?;

    Ok(Redirect::to(url.as_str()))
}

#[derive(Debug, Deserialize)]
pub struct OAuthCallbackQuery {
    #[serde(default)]
    state: Option<String>,
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

async fn validate(
    State(state): State<AppState>,
    Query(query): Query<OAuthCallbackQuery>,
) -> Result<Redirect, (StatusCode, Html<String>)> {
    let correlation_id = Uuid::new_v4().to_string();

    let (Some(state_token), Some(code)) =
        (query.state.filter(|s| !s.is_empty()), query.code.filter(|c| !c.is_empty()))
    else {
        warn!(
            event_name = "oauth.callback.missing_args",
            correlation_id = %correlation_id,
            slack_error = query.error.as_deref().unwrap_or(""),
            "oauth callback is missing state or code"
        );
        return Err(failure(StatusCode::BAD_REQUEST, "Missing state or code."));
    };

    if let Err(token_error) = state.signer.verify(&state_token, Utc::now()) {
        let (event_name, status) = match token_error {
            StateTokenError::Expired { .. } => ("oauth.state.expired", StatusCode::BAD_REQUEST),
            StateTokenError::Malformed | StateTokenError::BadSignature => {
                ("oauth.state.not_authorized", StatusCode::UNAUTHORIZED)
            }
            StateTokenError::InvalidKey => {
                ("oauth.state.invalid_key", StatusCode::INTERNAL_SERVER_ERROR)
            }
        };
        warn!(
            event_name,
            correlation_id = %correlation_id,
            error = %token_error,
            "oauth state rejected"
        );
        return Err(failure(status, "The authorization request is invalid or has expired."));
    }

    let request = OAuthAccessRequest {
        client_id: state.config.slack.client_id.clone(),
        client_secret: state.config.slack.client_secret.clone(),
        code,
        redirect_uri: state.config.app.valid_url(),
    };
    let grant = state.slack.oauth_access(&request).await.map_err(|exchange_error| {
        warn!(
            event_name = "oauth.exchange.failed",
            correlation_id = %correlation_id,
            error = %exchange_error,
            "slack oauth code exchange failed"
        );
        match exchange_error {
            SlackApiError::Transport(_) | SlackApiError::Status(_) => {
                let interface = ApplicationError::Integration(exchange_error.to_string())
                    .into_interface(correlation_id.clone());
                failure(StatusCode::SERVICE_UNAVAILABLE, interface.user_message())
            }
            SlackApiError::Api(_) | SlackApiError::Decode(_) => {
                failure(StatusCode::BAD_REQUEST, "Slack did not accept the authorization code.")
            }
        }
    })?;

    let team_id = TeamId::parse(&grant.team_id).map_err(|domain_error| {
        let interface = ApplicationError::from(domain_error).into_interface(correlation_id.clone());
        warn!(
            event_name = "oauth.exchange.invalid_team",
            correlation_id = %correlation_id,
            error = %interface,
            "slack returned an unusable team id"
        );
        failure(StatusCode::BAD_REQUEST, interface.user_message())
    })?;

    let credentials = TeamCredentials::new(
        team_id.clone(),
        grant.access_token,
        grant.bot_user_id,
        grant.bot_access_token,
        Utc::now(),
    );
    let outcome = state.teams.save(credentials).await.map_err(|repository_error| {
        let interface = ApplicationError::Persistence(repository_error.to_string())
            .into_interface(correlation_id.clone());
        error!(
            event_name = "oauth.team.save_failed",
            correlation_id = %correlation_id,
            team_id = %team_id,
            error = %interface,
            "could not store team credentials"
        );
        failure(StatusCode::SERVICE_UNAVAILABLE, interface.user_message())
    })?;

    let event_name = match outcome {
        SaveOutcome::Inserted => "oauth.team.added",
        SaveOutcome::Updated => "oauth.team.updated",
    };
    info!(event_name, correlation_id = %correlation_id, team_id = %team_id, "team authorized");

    Ok(Redirect::to(&format!("{}?success=1", state.config.app.base_url.trim_end_matches('/'))))
}

fn failure(status: StatusCode, message: &str) -> (StatusCode, Html<String>) {
    (status, Html(format!("<h1>{}</h1><p>{message}</p>", status.as_u16())))
}
