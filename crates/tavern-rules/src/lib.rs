//! Game rules for Tavern lobbies: dice expressions and skill checks.
//!
//! Both evaluators are pure apart from their random source. Each public
//! entry point has a `_with` variant taking an explicit [`rand::Rng`] so
//! results are reproducible under a seeded generator.
//!
//! # Modules
//!
//! - [`dice`] -- `[count]d<faces>[+/-modifier]` parsing and rolling
//! - [`skill`] -- ordered bonus lookup over schema-less character sheets
//! - [`error`] -- [`RulesError`], whose messages are shown to players as-is

pub mod dice;
pub mod error;
pub mod skill;

pub use dice::{DiceExpression, DiceRoll, MAX_DICE, MAX_FACES, roll, roll_with};
pub use error::RulesError;
pub use skill::{SkillCheck, find_skill_bonus, roll_skill_check, roll_skill_check_with};
