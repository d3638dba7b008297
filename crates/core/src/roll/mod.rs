pub mod command;
pub mod evaluator;
pub mod format;
pub mod parser;

pub use command::{help_message, make_roll, version_message, HelpContext, RollReply};
pub use evaluator::{evaluate, DieSource, RngDieSource, RollOutcome};
pub use format::format_roll;
pub use parser::{parse, Modifier, ParseError, ParsedCommand, RollRequest, Sign};
