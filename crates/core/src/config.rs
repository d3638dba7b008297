use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_ALLOWED_COMMANDS: &[&str] =
    &["/roll", "/rolldice", "/diceroll", "/roll_dice", "/dice_roll"];

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub app: AppInfoConfig,
    pub database: DatabaseConfig,
    pub slack: SlackConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct AppInfoConfig {
    pub name: String,
    pub name_full: String,
    pub base_url: String,
    pub allowed_commands: Vec<String>,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
    /// Passphrase for sealing stored tokens. Unset means the Slack client
    /// secret is used.
    pub token_key: Option<SecretString>,
}

#[derive(Clone, Debug)]
pub struct SlackConfig {
    pub client_id: String,
    pub client_secret: SecretString,
    pub oauth_url: String,
    pub api_base_url: String,
    pub scopes: Vec<String>,
    pub bot_username: String,
    pub bot_icon_emoji: String,
    pub state_max_age_secs: u64,
    pub request_timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub graceful_shutdown_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub base_url: Option<String>,
    pub slack_client_id: Option<String>,
    pub slack_client_secret: Option<String>,
    pub slack_api_base_url: Option<String>,
    pub server_port: Option<u16>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            app: AppInfoConfig {
                name: "slack_roll".to_string(),
                name_full: "Slack Roll".to_string(),
                base_url: "http://localhost:8080".to_string(),
                allowed_commands: DEFAULT_ALLOWED_COMMANDS
                    .iter()
                    .map(|command| command.to_string())
                    .collect(),
            },
            database: DatabaseConfig {
                url: "sqlite://rollbot.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
                token_key: None,
            },
            slack: SlackConfig {
                client_id: String::new(),
                client_secret: String::new().into(),
                oauth_url: "https://slack.com/oauth/authorize".to_string(),
                api_base_url: "https://slack.com/api".to_string(),
                scopes: vec!["commands".to_string(), "bot".to_string()],
                bot_username: "Roll Bot".to_string(),
                bot_icon_emoji: ":game_die:".to_string(),
                state_max_age_secs: 60 * 60,
                request_timeout_secs: 10,
            },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                port: 8080,
                graceful_shutdown_secs: 15,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppInfoConfig {
    /// Landing URL for the "add to Slack" flow.
    pub fn auth_url(&self) -> String {
        format!("{}/authenticate", self.base_url.trim_end_matches('/'))
    }

    /// OAuth redirect target registered with Slack.
    pub fn valid_url(&self) -> String {
        format!("{}/validate", self.base_url.trim_end_matches('/'))
    }

    pub fn is_allowed_command(&self, command: &str) -> bool {
        self.allowed_commands.iter().any(|allowed| allowed == command)
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("rollbot.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(app) = patch.app {
            if let Some(name) = app.name {
                self.app.name = name;
            }
            if let Some(name_full) = app.name_full {
                self.app.name_full = name_full;
            }
            if let Some(base_url) = app.base_url {
                self.app.base_url = base_url;
            }
            if let Some(allowed_commands) = app.allowed_commands {
                self.app.allowed_commands = allowed_commands;
            }
        }

        if let Some(database) = patch.database {
            if let Some(url) = database.url {
                self.database.url = url;
            }
            if let Some(max_connections) = database.max_connections {
                self.database.max_connections = max_connections;
            }
            if let Some(timeout_secs) = database.timeout_secs {
                self.database.timeout_secs = timeout_secs;
            }
            if let Some(token_key) = database.token_key {
                self.database.token_key = Some(secret_value(token_key));
            }
        }

        if let Some(slack) = patch.slack {
            if let Some(client_id) = slack.client_id {
                self.slack.client_id = client_id;
            }
            if let Some(client_secret_value) = slack.client_secret {
                self.slack.client_secret = secret_value(client_secret_value);
            }
            if let Some(oauth_url) = slack.oauth_url {
                self.slack.oauth_url = oauth_url;
            }
            if let Some(api_base_url) = slack.api_base_url {
                self.slack.api_base_url = api_base_url;
            }
            if let Some(scopes) = slack.scopes {
                self.slack.scopes = scopes;
            }
            if let Some(bot_username) = slack.bot_username {
                self.slack.bot_username = bot_username;
            }
            if let Some(bot_icon_emoji) = slack.bot_icon_emoji {
                self.slack.bot_icon_emoji = bot_icon_emoji;
            }
            if let Some(state_max_age_secs) = slack.state_max_age_secs {
                self.slack.state_max_age_secs = state_max_age_secs;
            }
            if let Some(request_timeout_secs) = slack.request_timeout_secs {
                self.slack.request_timeout_secs = request_timeout_secs;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("ROLLBOT_APP_NAME_FULL") {
            self.app.name_full = value;
        }
        if let Some(value) = read_env("ROLLBOT_APP_BASE_URL") {
            self.app.base_url = value;
        }
        if let Some(value) = read_env("ROLLBOT_APP_ALLOWED_COMMANDS") {
            self.app.allowed_commands = parse_list(&value);
        }

        if let Some(value) = read_env("ROLLBOT_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("ROLLBOT_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = parse_u32("ROLLBOT_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("ROLLBOT_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_u64("ROLLBOT_DATABASE_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("ROLLBOT_DATABASE_TOKEN_KEY") {
            self.database.token_key = Some(secret_value(value));
        }

        if let Some(value) = read_env("ROLLBOT_SLACK_CLIENT_ID") {
            self.slack.client_id = value;
        }
        if let Some(value) = read_env("ROLLBOT_SLACK_CLIENT_SECRET") {
            self.slack.client_secret = secret_value(value);
        }
        if let Some(value) = read_env("ROLLBOT_SLACK_OAUTH_URL") {
            self.slack.oauth_url = value;
        }
        if let Some(value) = read_env("ROLLBOT_SLACK_API_BASE_URL") {
            self.slack.api_base_url = value;
        }
        if let Some(value) = read_env("ROLLBOT_SLACK_STATE_MAX_AGE_SECS") {
            self.slack.state_max_age_secs = parse_u64("ROLLBOT_SLACK_STATE_MAX_AGE_SECS", &value)?;
        }

        if let Some(value) = read_env("ROLLBOT_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("ROLLBOT_SERVER_PORT") {
            self.server.port = parse_u16("ROLLBOT_SERVER_PORT", &value)?;
        }
        if let Some(value) = read_env("ROLLBOT_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_u64("ROLLBOT_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        let log_level = read_env("ROLLBOT_LOGGING_LEVEL").or_else(|| read_env("ROLLBOT_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("ROLLBOT_LOGGING_FORMAT").or_else(|| read_env("ROLLBOT_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(database_url) = overrides.database_url {
            self.database.url = database_url;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(base_url) = overrides.base_url {
            self.app.base_url = base_url;
        }
        if let Some(client_id) = overrides.slack_client_id {
            self.slack.client_id = client_id;
        }
        if let Some(client_secret) = overrides.slack_client_secret {
            self.slack.client_secret = secret_value(client_secret);
        }
        if let Some(api_base_url) = overrides.slack_api_base_url {
            self.slack.api_base_url = api_base_url;
        }
        if let Some(port) = overrides.server_port {
            self.server.port = port;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_app(&self.app)?;
        validate_database(&self.database)?;
        validate_slack(&self.slack)?;
        validate_server(&self.server)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("rollbot.toml"), PathBuf::from("config/rollbot.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_app(app: &AppInfoConfig) -> Result<(), ConfigError> {
    if app.name_full.trim().is_empty() {
        return Err(ConfigError::Validation("app.name_full must not be empty".to_string()));
    }

    if !is_http_url(&app.base_url) {
        return Err(ConfigError::Validation(
            "app.base_url must start with http:// or https://".to_string(),
        ));
    }

    if app.allowed_commands.is_empty() {
        return Err(ConfigError::Validation(
            "app.allowed_commands must list at least one slash command".to_string(),
        ));
    }
    if let Some(bad) = app.allowed_commands.iter().find(|command| !command.starts_with('/')) {
        return Err(ConfigError::Validation(format!(
            "app.allowed_commands entry `{bad}` must start with `/`"
        )));
    }

    Ok(())
}

fn validate_database(database: &DatabaseConfig) -> Result<(), ConfigError> {
    let url = database.url.trim();
    let sqlite_url =
        url.starts_with("sqlite://") || url.starts_with("sqlite::") || url == ":memory:";
    if !sqlite_url {
        return Err(ConfigError::Validation(
            "database.url must be a sqlite URL (`sqlite://...`, `sqlite::...`, or `:memory:`)"
                .to_string(),
        ));
    }

    if database.max_connections == 0 {
        return Err(ConfigError::Validation(
            "database.max_connections must be greater than zero".to_string(),
        ));
    }

    if database.timeout_secs == 0 || database.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "database.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    if database.token_key.as_ref().is_some_and(|key| key.expose_secret().trim().is_empty()) {
        return Err(ConfigError::Validation(
            "database.token_key must not be blank when set".to_string(),
        ));
    }

    Ok(())
}

fn validate_slack(slack: &SlackConfig) -> Result<(), ConfigError> {
    if slack.client_id.trim().is_empty() {
        return Err(ConfigError::Validation(
            "slack.client_id is required. Get it from https://api.slack.com/apps > Your App > Basic Information > App Credentials".to_string()
        ));
    }

    if slack.client_secret.expose_secret().trim().is_empty() {
        return Err(ConfigError::Validation(
            "slack.client_secret is required. Get it from https://api.slack.com/apps > Your App > Basic Information > App Credentials".to_string()
        ));
    }

    if !is_http_url(&slack.oauth_url) {
        return Err(ConfigError::Validation(
            "slack.oauth_url must start with http:// or https://".to_string(),
        ));
    }
    if !is_http_url(&slack.api_base_url) {
        return Err(ConfigError::Validation(
            "slack.api_base_url must start with http:// or https://".to_string(),
        ));
    }

    if slack.scopes.iter().all(|scope| scope.trim().is_empty()) {
        return Err(ConfigError::Validation(
            "slack.scopes must request at least one scope".to_string(),
        ));
    }

    if slack.state_max_age_secs == 0 {
        return Err(ConfigError::Validation(
            "slack.state_max_age_secs must be greater than zero".to_string(),
        ));
    }

    if slack.request_timeout_secs == 0 || slack.request_timeout_secs > 120 {
        return Err(ConfigError::Validation(
            "slack.request_timeout_secs must be in range 1..=120".to_string(),
        ));
    }

    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.port == 0 {
        return Err(ConfigError::Validation("server.port must be greater than zero".to_string()));
    }

    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn is_http_url(value: &str) -> bool {
    value.starts_with("http://") || value.starts_with("https://")
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    app: Option<AppPatch>,
    database: Option<DatabasePatch>,
    slack: Option<SlackPatch>,
    server: Option<ServerPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct AppPatch {
    name: Option<String>,
    name_full: Option<String>,
    base_url: Option<String>,
    allowed_commands: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
    token_key: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct SlackPatch {
    client_id: Option<String>,
    client_secret: Option<String>,
    oauth_url: Option<String>,
    api_base_url: Option<String>,
    scopes: Option<Vec<String>>,
    bot_username: Option<String>,
    bot_icon_emoji: Option<String>,
    state_max_age_secs: Option<u64>,
    request_timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

#[cfg(test)]
mod tests {
    use std::env;
    use std::fs;
    use std::io;
    use std::sync::{Mutex, OnceLock};

    use secrecy::ExposeSecret;
    use tempfile::TempDir;

    use super::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat};

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

    fn env_lock() -> &'static Mutex<()> {
        ENV_LOCK.get_or_init(|| Mutex::new(()))
    }

    fn clear_vars(vars: &[&str]) {
        for var in vars {
            env::remove_var(var);
        }
    }

    fn ensure(condition: bool, message: &'static str) -> Result<(), String> {
        if condition {
            Ok(())
        } else {
            Err(message.to_string())
        }
    }

    #[test]
    fn file_load_supports_env_interpolation() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("TEST_SLACK_CLIENT_ID", "123.456");
        env::set_var("TEST_SLACK_CLIENT_SECRET", "shh-from-env");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("rollbot.toml");
            fs::write(
                &path,
                r#"
[slack]
client_id = "${TEST_SLACK_CLIENT_ID}"
client_secret = "${TEST_SLACK_CLIENT_SECRET}"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config =
                AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
                    .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.slack.client_id == "123.456", "client id should come from env")?;
            ensure(
                config.slack.client_secret.expose_secret() == "shh-from-env",
                "client secret should be loaded from environment",
            )?;
            Ok(())
        })();

        clear_vars(&["TEST_SLACK_CLIENT_ID", "TEST_SLACK_CLIENT_SECRET"]);
        result
    }

    #[test]
    fn defaults_cover_original_slash_commands() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("ROLLBOT_SLACK_CLIENT_ID", "id");
        env::set_var("ROLLBOT_SLACK_CLIENT_SECRET", "secret");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.app.is_allowed_command("/roll"), "/roll should be allowed")?;
            ensure(config.app.is_allowed_command("/dice_roll"), "/dice_roll should be allowed")?;
            ensure(!config.app.is_allowed_command("/flip"), "/flip should not be allowed")?;
            ensure(
                config.app.valid_url() == "http://localhost:8080/validate",
                "valid url should derive from base url",
            )?;
            ensure(config.slack.state_max_age_secs == 3600, "state max age defaults to 1h")?;
            Ok(())
        })();

        clear_vars(&["ROLLBOT_SLACK_CLIENT_ID", "ROLLBOT_SLACK_CLIENT_SECRET"]);
        result
    }

    #[test]
    fn allowed_commands_env_list_is_split_on_commas() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("ROLLBOT_SLACK_CLIENT_ID", "id");
        env::set_var("ROLLBOT_SLACK_CLIENT_SECRET", "secret");
        env::set_var("ROLLBOT_APP_ALLOWED_COMMANDS", "/roll, /r ,");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;
            ensure(
                config.app.allowed_commands == vec!["/roll".to_string(), "/r".to_string()],
                "allowed commands should be trimmed and empty entries dropped",
            )
        })();

        clear_vars(&[
            "ROLLBOT_SLACK_CLIENT_ID",
            "ROLLBOT_SLACK_CLIENT_SECRET",
            "ROLLBOT_APP_ALLOWED_COMMANDS",
        ]);
        result
    }

    #[test]
    fn logging_env_aliases_are_supported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("ROLLBOT_SLACK_CLIENT_ID", "id");
        env::set_var("ROLLBOT_SLACK_CLIENT_SECRET", "secret");
        env::set_var("ROLLBOT_LOG_LEVEL", "warn");
        env::set_var("ROLLBOT_LOG_FORMAT", "pretty");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.logging.level == "warn", "warning log level should be set from env var")?;
            ensure(
                matches!(config.logging.format, LogFormat::Pretty),
                "pretty logging format should be set from env var",
            )?;
            Ok(())
        })();

        clear_vars(&[
            "ROLLBOT_SLACK_CLIENT_ID",
            "ROLLBOT_SLACK_CLIENT_SECRET",
            "ROLLBOT_LOG_LEVEL",
            "ROLLBOT_LOG_FORMAT",
        ]);
        result
    }

    #[test]
    fn precedence_defaults_file_env_overrides() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("ROLLBOT_DATABASE_URL", "sqlite://from-env.db");
        env::set_var("ROLLBOT_SLACK_CLIENT_SECRET", "secret-from-env");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("rollbot.toml");
            fs::write(
                &path,
                r#"
[app]
name_full = "EZ Slack Roll"

[database]
url = "sqlite://from-file.db"

[slack]
client_id = "client-from-file"
client_secret = "secret-from-file"

[logging]
level = "warn"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config = AppConfig::load(LoadOptions {
                config_path: Some(path),
                overrides: ConfigOverrides {
                    database_url: Some("sqlite://from-override.db".to_string()),
                    log_level: Some("debug".to_string()),
                    ..ConfigOverrides::default()
                },
                ..LoadOptions::default()
            })
            .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.database.url == "sqlite://from-override.db",
                "override database url should win",
            )?;
            ensure(config.logging.level == "debug", "overridden log level should be debug")?;
            ensure(config.app.name_full == "EZ Slack Roll", "file app name should apply")?;
            ensure(config.slack.client_id == "client-from-file", "file client id should apply")?;
            ensure(
                config.slack.client_secret.expose_secret() == "secret-from-env",
                "env client secret should win over file and defaults",
            )?;
            Ok(())
        })();

        clear_vars(&["ROLLBOT_DATABASE_URL", "ROLLBOT_SLACK_CLIENT_SECRET"]);
        result
    }

    #[test]
    fn token_key_comes_from_env_and_must_not_be_blank() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("ROLLBOT_SLACK_CLIENT_ID", "id");
        env::set_var("ROLLBOT_SLACK_CLIENT_SECRET", "secret");
        env::set_var("ROLLBOT_DATABASE_TOKEN_KEY", "seal-key");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;
            ensure(
                config.database.token_key.as_ref().map(|key| key.expose_secret().to_string())
                    == Some("seal-key".to_string()),
                "token key should be read from env",
            )?;
            ensure(!format!("{config:?}").contains("seal-key"), "token key must stay redacted")?;

            let mut blank = config.clone();
            blank.database.token_key = Some(String::from("  ").into());
            ensure(
                matches!(
                    blank.validate(),
                    Err(ConfigError::Validation(ref message)) if message.contains("database.token_key")
                ),
                "blank token key should fail validation",
            )
        })();

        clear_vars(&[
            "ROLLBOT_SLACK_CLIENT_ID",
            "ROLLBOT_SLACK_CLIENT_SECRET",
            "ROLLBOT_DATABASE_TOKEN_KEY",
        ]);
        result
    }

    #[test]
    fn validation_fails_fast_with_actionable_error() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("ROLLBOT_SLACK_CLIENT_SECRET", "secret");

        let result = (|| -> Result<(), String> {
            let error = match AppConfig::load(LoadOptions::default()) {
                Ok(_) => {
                    return Err("expected validation failure but config load succeeded".to_string())
                }
                Err(error) => error,
            };
            let has_message = matches!(
                error,
                ConfigError::Validation(ref message) if message.contains("slack.client_id")
            );
            ensure(has_message, "validation failure should mention slack.client_id")
        })();

        clear_vars(&["ROLLBOT_SLACK_CLIENT_SECRET"]);
        result
    }

    #[test]
    fn validation_rejects_commands_without_slash() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("ROLLBOT_SLACK_CLIENT_ID", "id");
        env::set_var("ROLLBOT_SLACK_CLIENT_SECRET", "secret");
        env::set_var("ROLLBOT_APP_ALLOWED_COMMANDS", "roll");

        let result = (|| -> Result<(), String> {
            let error = match AppConfig::load(LoadOptions::default()) {
                Ok(_) => return Err("expected validation failure".to_string()),
                Err(error) => error,
            };
            ensure(
                matches!(error, ConfigError::Validation(ref message) if message.contains("`roll`")),
                "validation failure should name the bad command",
            )
        })();

        clear_vars(&[
            "ROLLBOT_SLACK_CLIENT_ID",
            "ROLLBOT_SLACK_CLIENT_SECRET",
            "ROLLBOT_APP_ALLOWED_COMMANDS",
        ]);
        result
    }

    #[test]
    fn secret_values_are_not_leaked_by_debug() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("ROLLBOT_SLACK_CLIENT_ID", "id");
        env::set_var("ROLLBOT_SLACK_CLIENT_SECRET", "client-secret-value");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;
            let debug = format!("{config:?}");

            ensure(
                !debug.contains("client-secret-value"),
                "debug output should not contain client secret",
            )?;
            ensure(
                matches!(config.logging.format, LogFormat::Compact),
                "default logging format should be compact",
            )?;
            Ok(())
        })();

        clear_vars(&["ROLLBOT_SLACK_CLIENT_ID", "ROLLBOT_SLACK_CLIENT_SECRET"]);
        result
    }
}
