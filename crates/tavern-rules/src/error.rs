//! Error types for the `tavern-rules` crate.
//!
//! Every [`RulesError`] renders as a message that can be shown to the
//! player verbatim; none of them indicate a server fault.

/// Errors produced while evaluating dice expressions or skill checks.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RulesError {
    /// The expression does not match `[count]d<faces>[(+|-)modifier]`.
    #[error("Invalid format. Use /roll 2d6+3")]
    MalformedExpression,

    /// Dice count or face count was zero.
    #[error("Dice count and faces must be positive")]
    NonPositiveDice,

    /// More dice than a single roll may throw.
    #[error("Too many dice (at most {max})")]
    TooManyDice {
        /// Upper bound on the dice count.
        max: u32,
    },

    /// A die with more faces than supported.
    #[error("Too many faces (at most {max})")]
    TooManyFaces {
        /// Upper bound on the face count.
        max: u32,
    },

    /// No strategy found a numeric bonus for the skill.
    #[error("Skill {0} not found")]
    SkillNotFound(String),
}
