pub mod config;
pub mod domain;
pub mod errors;
pub mod oauth_state;
pub mod roll;
pub mod token_seal;

pub use domain::team::{TeamCredentials, TeamId};
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use oauth_state::{StateTokenError, StateTokenSigner};
pub use roll::{
    evaluate, format_roll, help_message, make_roll, parse, DieSource, HelpContext, ParseError,
    ParsedCommand, RngDieSource, RollOutcome, RollReply, RollRequest,
};
pub use token_seal::{TokenCipher, TokenSealError};
