use std::fmt;

use nom::{
    bytes::complete::{tag, take_while1},
    character::complete::{char, digit1, one_of},
    combinator::opt,
    sequence::{pair, preceded, tuple},
    IResult,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const MIN_DICE: u32 = 1;
pub const MAX_DICE: u32 = 100;
pub const MIN_SIDES: u32 = 2;
pub const MAX_SIDES: u32 = 100;
pub const DEFAULT_SIDES: u32 = 6;
pub const MAX_MODIFIER: u32 = 100;
pub const DEFAULT_HIT_THRESHOLD: u32 = 5;
pub const MAX_HIT_THRESHOLD: u32 = 100;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sign {
    Plus,
    Minus,
}

impl fmt::Display for Sign {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Plus => f.write_str("+"),
            Self::Minus => f.write_str("-"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Modifier {
    pub sign: Sign,
    pub amount: u32,
}

impl Modifier {
    pub fn apply(&self, sum: i64) -> i64 {
        match self.sign {
            Sign::Plus => sum + i64::from(self.amount),
            Sign::Minus => sum - i64::from(self.amount),
        }
    }
}

/// A validated roll. `count` and `sides` are already clamped and
/// `hit_threshold` never exceeds `sides`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollRequest {
    pub count: u32,
    pub sides: u32,
    pub modifier: Option<Modifier>,
    pub hit_threshold: Option<u32>,
}

impl Default for RollRequest {
    fn default() -> Self {
        Self { count: MIN_DICE, sides: DEFAULT_SIDES, modifier: None, hit_threshold: None }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ParsedCommand {
    Roll(RollRequest),
    Help,
    Version,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("'{input}' is not a recognized roll format")]
    InvalidFormat { input: String },
    #[error("'{input}' is missing a modifier value")]
    InvalidModifier { input: String },
    #[error("hit threshold {threshold} is larger than a {sides}-sided die")]
    HitThresholdTooLarge { threshold: u32, sides: u32 },
}

/// Raw captures of the roll grammar, before clamping.
#[derive(Debug, PartialEq, Eq)]
struct RollClause<'a> {
    count: Option<&'a str>,
    sides: &'a str,
    modifier: Option<(char, &'a str)>,
    hit: Option<Option<&'a str>>,
}

fn spaces(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| c == ' ')(input)
}

/// `[count]d<sides>[(+|-)<amount>][ +hit[<threshold>]]`. Optional groups
/// that do not match leave the input untouched.
fn roll_clause(input: &str) -> IResult<&str, RollClause<'_>> {
    let (input, (count, _, sides)) = tuple((opt(digit1), char('d'), digit1))(input)?;
    let (input, modifier) = opt(pair(one_of("+-"), digit1))(input)?;
    let (input, hit) = opt(preceded(pair(spaces, tag("hit")), opt(digit1)))(input)?;

    Ok((input, RollClause { count, sides, modifier, hit }))
}

/// Parses a roll, or the `help` / `version` keywords. Matching is
/// case-insensitive and anchored at the start of the trimmed input; text
/// after the roll clause is ignored.
pub fn parse(input: &str) -> Result<ParsedCommand, ParseError> {
    let trimmed = input.trim();
    let normalized = trimmed.to_ascii_lowercase();

    match normalized.as_str() {
        "help" => return Ok(ParsedCommand::Help),
        "version" => return Ok(ParsedCommand::Version),
        _ => {}
    }

    let (_rest, clause) = roll_clause(&normalized)
        .map_err(|_| ParseError::InvalidFormat { input: trimmed.to_string() })?;

    let count = clause
        .count
        .map_or(MIN_DICE, |digits| saturating_number(digits).clamp(MIN_DICE, MAX_DICE));
    let sides = saturating_number(clause.sides).clamp(MIN_SIDES, MAX_SIDES);

    let modifier = match clause.modifier {
        None => None,
        Some((_, "")) => return Err(ParseError::InvalidModifier { input: trimmed.to_string() }),
        Some((sign, digits)) => Some(Modifier {
            sign: if sign == '-' { Sign::Minus } else { Sign::Plus },
            amount: saturating_number(digits).min(MAX_MODIFIER),
        }),
    };

    let hit_threshold = match clause.hit {
        None => None,
        Some(None) => Some(DEFAULT_HIT_THRESHOLD),
        Some(Some(digits)) => Some(saturating_number(digits).min(MAX_HIT_THRESHOLD)),
    };
    if let Some(threshold) = hit_threshold {
        if threshold > sides {
            return Err(ParseError::HitThresholdTooLarge { threshold, sides });
        }
    }

    Ok(ParsedCommand::Roll(RollRequest { count, sides, modifier, hit_threshold }))
}

fn saturating_number(digits: &str) -> u32 {
    digits.bytes().fold(0u32, |acc, digit| {
        acc.saturating_mul(10).saturating_add(u32::from(digit.wrapping_sub(b'0')))
    })
}
