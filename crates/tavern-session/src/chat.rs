//! Chat line interpretation.
//!
//! Lines that start with [`ROLL_PREFIX`] are dice commands: the text after
//! the first space is evaluated, and what gets stored and broadcast is the
//! roll breakdown, never the typed command. Anything else is said as-is.

use rand::Rng;
use tavern_rules::{DiceRoll, roll_with};

/// Prefix that turns a chat line into a dice roll.
pub const ROLL_PREFIX: &str = "/roll";

/// Sender name for private notices from the server.
pub const SYSTEM_SENDER: &str = "System";

/// Sender name for skill-check results.
pub const ROLL_SENDER: &str = "System (Roll)";

/// Usage hint for a bare `/roll`.
pub const ROLL_USAGE: &str = "Usage: /roll 2d6+3";

/// What a chat line turns into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatLine {
    /// Store and broadcast the text verbatim.
    Say(String),
    /// Store and broadcast the roll breakdown.
    Roll(DiceRoll),
    /// Show the text to the sender only. Nothing is stored.
    Notice(String),
}

/// Interpret `message` with the thread-local RNG.
pub fn interpret(message: &str) -> ChatLine {
    interpret_with(message, &mut rand::rng())
}

/// Interpret `message` drawing dice from `rng`.
pub fn interpret_with(message: &str, rng: &mut impl Rng) -> ChatLine {
    if !message.starts_with(ROLL_PREFIX) {
        return ChatLine::Say(message.to_owned());
    }
    let Some((_, expression)) = message.split_once(' ') else {
        return ChatLine::Notice(ROLL_USAGE.to_owned());
    };
    match roll_with(expression, rng) {
        Ok(roll) => ChatLine::Roll(roll),
        Err(e) => ChatLine::Notice(e.to_string()),
    }
}
