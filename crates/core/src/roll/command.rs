use super::evaluator::{evaluate, DieSource};
use super::format::format_roll;
use super::parser::{parse, ParsedCommand, MAX_DICE, MAX_SIDES, MIN_DICE, MIN_SIDES};

const DEFAULT_ROLL: &str = "d6";

/// Names used when rendering help and version replies.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HelpContext<'a> {
    pub app_name: &'a str,
    pub version: &'a str,
    pub command: &'a str,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RollReply {
    Rolled(String),
    Help(String),
    Version(String),
    Rejected(String),
}

impl RollReply {
    pub fn text(&self) -> &str {
        match self {
            Self::Rolled(text) | Self::Help(text) | Self::Version(text) | Self::Rejected(text) => {
                text
            }
        }
    }

    pub fn into_text(self) -> String {
        match self {
            Self::Rolled(text) | Self::Help(text) | Self::Version(text) | Self::Rejected(text) => {
                text
            }
        }
    }

    /// Rolls go to the channel. Everything else answers only the caller.
    pub fn is_roll(&self) -> bool {
        matches!(self, Self::Rolled(_))
    }
}

pub fn make_roll<D>(text: &str, user: &str, help: &HelpContext<'_>, dice: &mut D) -> RollReply
where
    D: DieSource + ?Sized,
{
    let text = if text.trim().is_empty() { DEFAULT_ROLL } else { text };

    match parse(text) {
        Ok(ParsedCommand::Help) => RollReply::Help(help_message(help)),
        Ok(ParsedCommand::Version) => RollReply::Version(version_message(help)),
        Ok(ParsedCommand::Roll(request)) => {
            let outcome = evaluate(&request, dice);
            RollReply::Rolled(format_roll(&request, user, &outcome))
        }
        Err(error) => RollReply::Rejected(error.to_string()),
    }
}

pub fn version_message(help: &HelpContext<'_>) -> String {
    format!("{} v{}", help.app_name, help.version)
}

pub fn help_message(help: &HelpContext<'_>) -> String {
    let command = help.command;
    let examples = [
        (String::new(), "Rolls a single 6-sided die".to_string()),
        (" d20".to_string(), "Rolls a single 20-sided die".to_string()),
        (" 4d10".to_string(), "Rolls 4 10-sided dice".to_string()),
        (" 1d6+3".to_string(), "Rolls a single 6-sided die with a +3 modifier".to_string()),
        (
            " 10d6 hit".to_string(),
            "Rolls 10 6-sided dice and counts each 5 or higher as a hit".to_string(),
        ),
        (
            " 10d10 hit7".to_string(),
            "Rolls 10 10-sided dice and counts each 7 or higher as a hit".to_string(),
        ),
        (" help".to_string(), "Shows this message".to_string()),
        (" version".to_string(), format!("Shows the {} version", help.app_name)),
    ];

    let mut message = format!(
        "*{app}* can roll anywhere from *{MIN_DICE}-{MAX_DICE} dice* with \
         *{MIN_SIDES}-{MAX_SIDES} sides* each.\nHere are some examples:\n",
        app = help.app_name,
    );
    for (arguments, description) in examples {
        message.push_str(&format!("\n`{command}{arguments}`\n\t{description}\n"));
    }
    message.push_str(
        "\nWith `hit`, a die showing its highest face counts as two hits and a 1 counts as two misses.\n",
    );
    message
}

#[cfg(test)]
mod tests {
    use super::{help_message, make_roll, HelpContext, RollReply};
    use crate::roll::evaluator::ScriptedDice;

    const HELP: HelpContext<'static> =
        HelpContext { app_name: "Slack Roll", version: "0.2.0", command: "/roll" };

    #[test]
    fn rolls_with_modifier_end_to_end() {
        let mut dice = ScriptedDice::new([15]);
        let reply = make_roll("1d20+5", "Alice", &HELP, &mut dice);

        assert_eq!(
            reply,
            RollReply::Rolled("_Alice rolled 1 20-sided die:_  *20*  ( 15 )  + 5".to_string())
        );
        assert!(reply.is_roll());
    }

    #[test]
    fn empty_text_rolls_a_single_d6() {
        let mut dice = ScriptedDice::new([4]);
        let reply = make_roll("   ", "Sam", &HELP, &mut dice);

        assert_eq!(reply.text(), "_Sam rolled 1 6-sided die:_  *4*  ( 4 )");
    }

    #[test]
    fn help_ignores_user_and_draws_nothing() {
        let mut dice = ScriptedDice::new([1]);
        let reply = make_roll("help", "Bob", &HELP, &mut dice);

        assert!(matches!(reply, RollReply::Help(_)));
        assert!(!reply.is_roll());
        assert_eq!(dice.draws(), 0);
        assert!(reply.text().contains("*Slack Roll*"));
        assert!(reply.text().contains("`/roll 4d10`"));
        assert!(reply.text().contains("`/roll 1d6+3`"));
        assert!(!reply.text().contains("Bob"));
        assert_eq!(reply.text(), help_message(&HELP));
    }

    #[test]
    fn help_uses_invoking_command_name() {
        let context = HelpContext { command: "/dice_roll", ..HELP };
        let text = help_message(&context);

        assert!(text.contains("`/dice_roll d20`"));
        assert!(!text.contains("`/roll d20`"));
        assert!(text.contains("*1-100 dice* with *2-100 sides*"));
    }

    #[test]
    fn version_reports_app_and_version() {
        let mut dice = ScriptedDice::new([1]);
        let reply = make_roll("VERSION", "Bob", &HELP, &mut dice);

        assert_eq!(reply, RollReply::Version("Slack Roll v0.2.0".to_string()));
        assert_eq!(dice.draws(), 0);
    }

    #[test]
    fn parse_failures_become_private_diagnostics() {
        let mut dice = ScriptedDice::new([1]);
        let reply = make_roll("banana", "Bob", &HELP, &mut dice);

        assert_eq!(
            reply,
            RollReply::Rejected("'banana' is not a recognized roll format".to_string())
        );
        assert!(!reply.is_roll());
        assert_eq!(dice.draws(), 0);

        let reply = make_roll("1d6 hit7", "Bob", &HELP, &mut dice);
        assert_eq!(reply.into_text(), "hit threshold 7 is larger than a 6-sided die");
    }
}
