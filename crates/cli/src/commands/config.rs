use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use rollbot_core::config::{AppConfig, LoadOptions};
use secrecy::ExposeSecret;
use toml::Value;

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());
    render(&config, config_file_doc.as_ref(), config_file_path.as_deref())
}

fn render(config: &AppConfig, file_doc: Option<&Value>, file_path: Option<&Path>) -> String {
    let fields = [
        Field::new("app.name_full", config.app.name_full.clone(), &["ROLLBOT_APP_NAME_FULL"]),
        Field::new("app.base_url", config.app.base_url.clone(), &["ROLLBOT_APP_BASE_URL"]),
        Field::new(
            "app.allowed_commands",
            config.app.allowed_commands.join(","),
            &["ROLLBOT_APP_ALLOWED_COMMANDS"],
        ),
        Field::new("database.url", config.database.url.clone(), &["ROLLBOT_DATABASE_URL"]),
        Field::new(
            "database.max_connections",
            config.database.max_connections.to_string(),
            &["ROLLBOT_DATABASE_MAX_CONNECTIONS"],
        ),
        Field::new(
            "database.timeout_secs",
            config.database.timeout_secs.to_string(),
            &["ROLLBOT_DATABASE_TIMEOUT_SECS"],
        ),
        Field::new(
            "database.token_key",
            config.database.token_key.as_ref().map_or_else(
                || "<slack.client_secret>".to_string(),
                |key| redact_secret(key.expose_secret()),
            ),
            &["ROLLBOT_DATABASE_TOKEN_KEY"],
        ),
        Field::new("slack.client_id", config.slack.client_id.clone(), &["ROLLBOT_SLACK_CLIENT_ID"]),
        Field::new(
            "slack.client_secret",
            redact_secret(config.slack.client_secret.expose_secret()),
            &["ROLLBOT_SLACK_CLIENT_SECRET"],
        ),
        Field::new("slack.oauth_url", config.slack.oauth_url.clone(), &["ROLLBOT_SLACK_OAUTH_URL"]),
        Field::new(
            "slack.api_base_url",
            config.slack.api_base_url.clone(),
            &["ROLLBOT_SLACK_API_BASE_URL"],
        ),
        Field::new("slack.scopes", config.slack.scopes.join(" "), &[]),
        Field::new(
            "slack.state_max_age_secs",
            config.slack.state_max_age_secs.to_string(),
            &["ROLLBOT_SLACK_STATE_MAX_AGE_SECS"],
        ),
        Field::new(
            "server.bind_address",
            config.server.bind_address.clone(),
            &["ROLLBOT_SERVER_BIND_ADDRESS"],
        ),
        Field::new("server.port", config.server.port.to_string(), &["ROLLBOT_SERVER_PORT"]),
        Field::new(
            "server.graceful_shutdown_secs",
            config.server.graceful_shutdown_secs.to_string(),
            &["ROLLBOT_SERVER_GRACEFUL_SHUTDOWN_SECS"],
        ),
        Field::new(
            "logging.level",
            config.logging.level.clone(),
            &["ROLLBOT_LOGGING_LEVEL", "ROLLBOT_LOG_LEVEL"],
        ),
        Field::new(
            "logging.format",
            format!("{:?}", config.logging.format).to_lowercase(),
            &["ROLLBOT_LOGGING_FORMAT", "ROLLBOT_LOG_FORMAT"],
        ),
    ];

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for field in fields {
        let source = field_source(field.key, field.env_keys, file_doc, file_path);
        lines.push(render_line(field.key, &field.value, source));
    }
    lines.join("\n")
}

struct Field {
    key: &'static str,
    value: String,
    env_keys: &'static [&'static str],
}

impl Field {
    fn new(key: &'static str, value: String, env_keys: &'static [&'static str]) -> Self {
        Self { key, value, env_keys }
    }
}

fn detect_config_path() -> Option<PathBuf> {
    [PathBuf::from("rollbot.toml"), PathBuf::from("config/rollbot.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

fn redact_secret(secret: &str) -> String {
    match secret.trim().len() {
        0 => "<empty>".to_string(),
        len => format!("<redacted:{len} chars>"),
    }
}
