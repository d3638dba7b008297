use rollbot_core::config::{AppConfig, LoadOptions};
use rollbot_core::roll::{make_roll, DieSource, HelpContext, RngDieSource, RollReply};

use crate::commands::CommandResult;

/// Runs a roll the way the slash command would. Slack credentials are not
/// needed here, so a config that fails validation falls back to defaults.
pub fn run(text: &str, user: &str, command: &str) -> CommandResult {
    let config = AppConfig::load(LoadOptions::default()).unwrap_or_default();
    let mut dice = RngDieSource::thread();
    roll_with(&config, text, user, command, &mut dice)
}

pub fn roll_with<D: DieSource + ?Sized>(
    config: &AppConfig,
    text: &str,
    user: &str,
    command: &str,
    dice: &mut D,
) -> CommandResult {
    let help = HelpContext {
        app_name: &config.app.name_full,
        version: env!("CARGO_PKG_VERSION"),
        command,
    };

    let reply = make_roll(text.trim(), user, &help, dice);
    let exit_code = if matches!(reply, RollReply::Rejected(_)) { 1 } else { 0 };
    CommandResult { exit_code, output: reply.into_text() }
}
