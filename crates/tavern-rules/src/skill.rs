//! Skill-check resolution against free-form character sheets.
//!
//! Sheets are caller-defined JSON with no enforced schema, so the bonus
//! for a skill is found by trying a fixed, ordered list of lookups. The
//! first lookup that yields a numeric value wins:
//!
//! 1. `skills.<name>` at the top level
//! 2. `data.skills.<name>` when `data` is an object
//! 3. `<name>` inside any object directly under `data`
//! 4. `<name>` inside any top-level object
//!
//! Object iteration follows the sheet's authoring order. A key whose value
//! is not numeric (integer, integral float, or numeric string) does not
//! count as a hit and the search moves on.

use rand::Rng;
use serde_json::{Map, Value};

use crate::error::RulesError;

/// Faces of the die thrown for every skill check.
pub const CHECK_DIE_FACES: u32 = 20;

type Lookup = fn(&Map<String, Value>, &str) -> Option<i64>;

/// Lookup strategies in priority order, labelled for tracing.
const LOOKUPS: [(&str, Lookup); 4] = [
    ("skills", top_level_skills),
    ("data.skills", data_skills),
    ("data.*", any_object_in_data),
    ("*", any_top_level_object),
];

/// A resolved skill check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SkillCheck {
    /// The raw d20 result.
    pub d20: u32,
    /// Bonus read from the sheet.
    pub bonus: i64,
    /// Caller-supplied situational modifier.
    pub extra_modifier: i64,
    /// `d20 + bonus + extra_modifier`.
    pub total: i64,
}

impl SkillCheck {
    /// `1d20 (14) + 5 (skill) + 0 (mod) = **19**`
    pub fn breakdown(&self) -> String {
        format!(
            "1d20 ({}) + {} (skill) + {} (mod) = **{}**",
            self.d20, self.bonus, self.extra_modifier, self.total
        )
    }
}

/// Find the numeric bonus for `skill` in `sheet`.
pub fn find_skill_bonus(sheet: &Value, skill: &str) -> Option<i64> {
    let root = sheet.as_object()?;
    LOOKUPS.iter().find_map(|(label, lookup)| {
        let hit = lookup(root, skill);
        if let Some(bonus) = hit {
            tracing::trace!(skill, strategy = label, bonus, "skill bonus resolved");
        }
        hit
    })
}

/// Resolve a skill check with the thread-local RNG.
pub fn roll_skill_check(
    sheet: &Value,
    skill: &str,
    extra_modifier: i64,
) -> Result<SkillCheck, RulesError> {
    roll_skill_check_with(sheet, skill, extra_modifier, &mut rand::rng())
}

/// Resolve a skill check with an explicit random source.
pub fn roll_skill_check_with<R: Rng>(
    sheet: &Value,
    skill: &str,
    extra_modifier: i64,
    rng: &mut R,
) -> Result<SkillCheck, RulesError> {
    let bonus =
        find_skill_bonus(sheet, skill).ok_or_else(|| RulesError::SkillNotFound(skill.to_owned()))?;
    let d20 = rng.random_range(1..=CHECK_DIE_FACES);
    let total = i64::from(d20)
        .saturating_add(bonus)
        .saturating_add(extra_modifier);
    Ok(SkillCheck {
        d20,
        bonus,
        extra_modifier,
        total,
    })
}

fn top_level_skills(root: &Map<String, Value>, skill: &str) -> Option<i64> {
    root.get("skills")?.as_object()?.get(skill).and_then(as_bonus)
}

fn data_skills(root: &Map<String, Value>, skill: &str) -> Option<i64> {
    let data = root.get("data")?.as_object()?;
    top_level_skills(data, skill)
}

fn any_object_in_data(root: &Map<String, Value>, skill: &str) -> Option<i64> {
    let data = root.get("data")?.as_object()?;
    any_top_level_object(data, skill)
}

fn any_top_level_object(root: &Map<String, Value>, skill: &str) -> Option<i64> {
    root.values()
        .filter_map(Value::as_object)
        .find_map(|obj| obj.get(skill).and_then(as_bonus))
}

#[allow(clippy::cast_possible_truncation)]
fn as_bonus(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0 && f.abs() < 9.0e15)
                .map(|f| f as i64)
        }),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
