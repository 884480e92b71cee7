//! Dice expression parsing and rolling.
//!
//! Grammar (case-insensitive, whitespace ignored):
//!
//! ```text
//! expression := [count] "d" faces [("+" | "-") modifier]
//! ```
//!
//! `count` defaults to 1. Both `count` and `faces` must be positive and
//! below [`MAX_DICE`] / [`MAX_FACES`]. Rolling draws `count` independent
//! uniform integers in `[1, faces]`, sums them and adds the modifier.

use core::str::FromStr;

use rand::Rng;

use crate::error::RulesError;

/// Most dice a single expression may throw.
pub const MAX_DICE: u32 = 1000;

/// Most faces a single die may have.
pub const MAX_FACES: u32 = 1_000_000;

/// A parsed dice expression such as `2d6+3`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiceExpression {
    /// Number of dice to throw.
    pub count: u32,
    /// Faces per die.
    pub faces: u32,
    /// Signed flat modifier.
    pub modifier: i64,
}

/// The outcome of rolling a [`DiceExpression`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiceRoll {
    /// The expression that was rolled.
    pub expression: DiceExpression,
    /// Individual die results, in throw order.
    pub rolls: Vec<u32>,
    /// Sum of all dice plus the modifier.
    pub total: i64,
}

impl DiceRoll {
    /// Human-readable breakdown, e.g. `Roll 2d6+3: 4+1+3 = **8**`.
    pub fn breakdown(&self) -> String {
        let DiceExpression {
            count,
            faces,
            modifier,
        } = self.expression;
        let dice = self
            .rolls
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("+");
        let tail = if modifier == 0 {
            String::new()
        } else {
            format!("{modifier:+}")
        };
        format!(
            "Roll {count}d{faces}{modifier:+}: {dice}{tail} = **{}**",
            self.total
        )
    }
}

impl FromStr for DiceExpression {
    type Err = RulesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect::<String>()
            .to_lowercase();

        let (count_str, rest) = normalized
            .split_once('d')
            .ok_or(RulesError::MalformedExpression)?;
        let (faces_str, modifier_str) = rest
            .find(['+', '-'])
            .map_or((rest, ""), |at| rest.split_at(at));

        if !is_digits(count_str, true) || !is_digits(faces_str, false) {
            return Err(RulesError::MalformedExpression);
        }
        let modifier = if modifier_str.is_empty() {
            0
        } else {
            // Sign is guaranteed by `find`; the rest must be plain digits.
            if !is_digits(modifier_str.get(1..).unwrap_or(""), false) {
                return Err(RulesError::MalformedExpression);
            }
            modifier_str
                .parse::<i64>()
                .map_err(|_e| RulesError::MalformedExpression)?
        };

        // Digit strings only fail to parse on overflow.
        let count = if count_str.is_empty() {
            1
        } else {
            count_str
                .parse::<u64>()
                .map_err(|_e| RulesError::TooManyDice { max: MAX_DICE })?
        };
        let faces = faces_str
            .parse::<u64>()
            .map_err(|_e| RulesError::TooManyFaces { max: MAX_FACES })?;

        if count == 0 || faces == 0 {
            return Err(RulesError::NonPositiveDice);
        }
        let count = u32::try_from(count)
            .ok()
            .filter(|c| *c <= MAX_DICE)
            .ok_or(RulesError::TooManyDice { max: MAX_DICE })?;
        let faces = u32::try_from(faces)
            .ok()
            .filter(|f| *f <= MAX_FACES)
            .ok_or(RulesError::TooManyFaces { max: MAX_FACES })?;

        Ok(Self {
            count,
            faces,
            modifier,
        })
    }
}

impl DiceExpression {
    /// Throw the dice using the given random source.
    pub fn roll<R: Rng>(self, rng: &mut R) -> DiceRoll {
        let rolls: Vec<u32> = (0..self.count)
            .map(|_| rng.random_range(1..=self.faces))
            .collect();
        let sum = rolls
            .iter()
            .fold(0_i64, |acc, r| acc.saturating_add(i64::from(*r)));
        DiceRoll {
            expression: self,
            rolls,
            total: sum.saturating_add(self.modifier),
        }
    }
}

/// Parse and roll `expression` with the thread-local RNG.
///
/// Failures are returned as [`RulesError`] values whose `Display` text is
/// meant for the player; this function never panics on bad input.
pub fn roll(expression: &str) -> Result<DiceRoll, RulesError> {
    roll_with(expression, &mut rand::rng())
}

/// Parse and roll `expression` with an explicit random source.
pub fn roll_with<R: Rng>(expression: &str, rng: &mut R) -> Result<DiceRoll, RulesError> {
    let parsed: DiceExpression = expression.parse()?;
    let result = parsed.roll(rng);
    tracing::trace!(
        count = parsed.count,
        faces = parsed.faces,
        modifier = parsed.modifier,
        total = result.total,
        "dice rolled"
    );
    Ok(result)
}

fn is_digits(s: &str, allow_empty: bool) -> bool {
    (allow_empty || !s.is_empty()) && s.bytes().all(|b| b.is_ascii_digit())
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::indexing_slicing,
    clippy::arithmetic_side_effects
)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;

    #[test]
    fn two_d_six_plus_three_stays_in_range() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..500 {
            let r = roll_with("2d6+3", &mut rng).unwrap();
            assert!((5..=15).contains(&r.total), "total {} out of range", r.total);
            assert_eq!(r.rolls.len(), 2);
        }
    }

    #[test]
    fn bare_d20_defaults_to_one_die() {
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..200 {
            let r = roll_with("d20", &mut rng).unwrap();
            assert_eq!(r.expression.count, 1);
            assert!((1..=20).contains(&r.total));
        }
    }

    #[test]
    fn whitespace_and_case_are_ignored() {
        let parsed: DiceExpression = " 3 D 8 - 2 ".parse().unwrap();
        assert_eq!(
            parsed,
            DiceExpression {
                count: 3,
                faces: 8,
                modifier: -2
            }
        );
    }

    #[test]
    fn zero_counts_are_rejected() {
        assert_eq!(roll("0d6").unwrap_err(), RulesError::NonPositiveDice);
        assert_eq!(roll("d0").unwrap_err(), RulesError::NonPositiveDice);
    }

    #[test]
    fn garbage_is_malformed() {
        for bad in ["xyz", "", "2d", "d", "2d6+", "2d6+-1", "+2d6", "2d6x", "1.5d6", "2d6+3+1"] {
            assert_eq!(
                roll(bad).unwrap_err(),
                RulesError::MalformedExpression,
                "expected malformed for {bad:?}"
            );
        }
    }

    #[test]
    fn oversized_rolls_are_rejected() {
        assert_eq!(
            roll("1001d6").unwrap_err(),
            RulesError::TooManyDice { max: MAX_DICE }
        );
        assert_eq!(
            roll("99999999999999999999999d6").unwrap_err(),
            RulesError::TooManyDice { max: MAX_DICE }
        );
        assert_eq!(
            roll("1d1000001").unwrap_err(),
            RulesError::TooManyFaces { max: MAX_FACES }
        );
    }

    #[test]
    fn breakdown_lists_each_die_and_modifier() {
        let r = DiceRoll {
            expression: DiceExpression {
                count: 2,
                faces: 6,
                modifier: 3,
            },
            rolls: vec![4, 1],
            total: 8,
        };
        assert_eq!(r.breakdown(), "Roll 2d6+3: 4+1+3 = **8**");

        let plain = DiceRoll {
            expression: DiceExpression {
                count: 1,
                faces: 20,
                modifier: 0,
            },
            rolls: vec![17],
            total: 17,
        };
        assert_eq!(plain.breakdown(), "Roll 1d20+0: 17 = **17**");
    }

    #[test]
    fn negative_modifier_in_breakdown() {
        let mut rng = StdRng::seed_from_u64(3);
        let r = roll_with("1d4-1", &mut rng).unwrap();
        assert!(r.breakdown().starts_with("Roll 1d4-1: "));
        assert_eq!(r.total, i64::from(r.rolls[0]) - 1);

        let fixed = DiceRoll {
            expression: DiceExpression {
                count: 3,
                faces: 8,
                modifier: -2,
            },
            rolls: vec![8, 2, 5],
            total: 13,
        };
        assert_eq!(fixed.breakdown(), "Roll 3d8-2: 8+2+5-2 = **13**");
    }

    #[test]
    fn error_messages_are_player_facing() {
        assert_eq!(
            RulesError::MalformedExpression.to_string(),
            "Invalid format. Use /roll 2d6+3"
        );
    }
}
