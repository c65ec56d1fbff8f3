//! Roll resolution for character sheets.
//!
//! A roll is a d12 plus the sheet's numbers:
//! 1. mental bonus, attribute value, additive modifiers
//! 2. multiplicative modifiers, combined as `1 + Σmult`
//! 3. critical (`x1.5`) when the die shows 12
//!
//! Each stage is floored, so totals are always integers.
//!
//! The player-facing roll ends there. GM checks run the same pipeline and
//! then compare the total against a graded difficulty threshold; that
//! epilogue is the only place the `mental = 5` threshold adjustment exists.

use crate::character::{ArmedSet, Attribute, Character, Entry, StatKey};
use crate::dice::{self, CHECK_DIE_SIDES};
use crate::stats::ModifierTotals;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tracing::debug;

/// Critical multiplier, applied after every other modifier.
pub const CRITICAL_MULTIPLIER: f64 = 1.5;

/// Bonus added to the die by the sheet's mental state.
pub fn mental_dice_bonus(mental: i64) -> i64 {
    match mental {
        4 => 5,
        -8 | -9 => -5,
        _ => 0,
    }
}

/// Adjustment to the difficulty threshold of GM checks.
pub fn dt_bonus(mental: i64) -> i64 {
    if mental == 5 {
        -3
    } else {
        0
    }
}

// ============================================================================
// Grades
// ============================================================================

/// Difficulty grade of a GM check.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub enum Grade {
    #[default]
    G0,
    G1,
    G2,
    G3,
    G4,
    G5,
    G6,
}

impl Grade {
    /// Difficulty threshold for this grade.
    pub fn dt(&self) -> i64 {
        match self {
            Grade::G0 => 6,
            Grade::G1 => 9,
            Grade::G2 => 12,
            Grade::G3 => 15,
            Grade::G4 => 21,
            Grade::G5 => 27,
            Grade::G6 => 33,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Grade::G0 => "G0",
            Grade::G1 => "G1",
            Grade::G2 => "G2",
            Grade::G3 => "G3",
            Grade::G4 => "G4",
            Grade::G5 => "G5",
            Grade::G6 => "G6",
        }
    }

    pub fn all() -> [Grade; 7] {
        [
            Grade::G0,
            Grade::G1,
            Grade::G2,
            Grade::G3,
            Grade::G4,
            Grade::G5,
            Grade::G6,
        ]
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GradeError {
    #[error("Unknown grade: {0} (expected G0 to G6)")]
    Unknown(String),
}

impl FromStr for Grade {
    type Err = GradeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_uppercase();
        Grade::all()
            .into_iter()
            .find(|g| g.label() == upper)
            .ok_or_else(|| GradeError::Unknown(s.to_string()))
    }
}

/// Whether a total meets the threshold of `grade` for a sheet in `mental`.
pub fn evaluate_success(total: i64, grade: Grade, mental: i64) -> bool {
    total >= grade.dt() + dt_bonus(mental)
}

// ============================================================================
// Results
// ============================================================================

/// What a roll was made against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "key", rename_all = "camelCase")]
pub enum RollTarget {
    Attribute(Attribute),
    /// An entry roll, with the entry's base key (if any).
    Entry(Option<StatKey>),
}

impl RollTarget {
    /// Key used for the attribute term and for passive applicability.
    pub fn key(&self) -> Option<StatKey> {
        match self {
            RollTarget::Attribute(a) => Some(StatKey::Attribute(*a)),
            RollTarget::Entry(base) => *base,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ContributionKind {
    Mental,
    Attribute,
    /// The rolled ACTIVE entry's own modifier.
    Entry,
    Passive,
    MultTotal,
    Critical,
}

/// One named, non-zero term of a roll.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contribution {
    pub label: String,
    pub kind: ContributionKind,
    pub value: f64,
}

impl Contribution {
    fn new(label: impl Into<String>, kind: ContributionKind, value: f64) -> Self {
        Self {
            label: label.into(),
            kind,
            value,
        }
    }
}

impl fmt::Display for Contribution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            ContributionKind::MultTotal => write!(f, "{}: x{}", self.label, 1.0 + self.value),
            ContributionKind::Critical => write!(f, "{}: x{}", self.label, self.value),
            _ => write!(f, "{}: {:+}", self.label, self.value),
        }
    }
}

/// The outcome of one roll.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RollResult {
    pub target: RollTarget,
    pub die: u32,
    /// Non-zero terms in application order.
    pub contributions: Vec<Contribution>,
    /// Sum of every ADD modifier that applied.
    pub additive_sum: f64,
    /// `1 + Σmult` over every MULT modifier that applied.
    pub mult_factor: f64,
    pub critical: bool,
    /// Floored total, saturating at the `i64` bounds.
    pub total: i64,
}

impl fmt::Display for RollResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "d12 [{}]", self.die)?;
        for c in &self.contributions {
            write!(f, ", {c}")?;
        }
        write!(f, " = {}", self.total)?;
        if self.critical {
            write!(f, " (CRITICAL)")?;
        }
        Ok(())
    }
}

/// A GM check: a roll compared against a graded threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckResult {
    pub roll: RollResult,
    pub grade: Grade,
    pub dt: i64,
    pub dt_bonus: i64,
    /// `dt + dt_bonus`.
    pub target: i64,
    pub success: bool,
}

// ============================================================================
// Engine
// ============================================================================

/// Stateless roll resolver. The armed set is supplied on every call.
#[derive(Debug, Clone, Copy, Default)]
pub struct RuleEngine;

impl RuleEngine {
    pub fn new() -> Self {
        Self
    }

    pub fn roll_attribute(
        &self,
        attribute: Attribute,
        character: &Character,
        armed: &ArmedSet,
    ) -> RollResult {
        self.roll_attribute_with_rng(attribute, character, armed, &mut rand::thread_rng())
    }

    pub fn roll_attribute_with_rng<R: Rng>(
        &self,
        attribute: Attribute,
        character: &Character,
        armed: &ArmedSet,
        rng: &mut R,
    ) -> RollResult {
        let die = dice::roll_d12(rng);
        self.resolve_with_die(die, RollTarget::Attribute(attribute), None, character, armed)
    }

    pub fn roll_entry(&self, entry: &Entry, character: &Character, armed: &ArmedSet) -> RollResult {
        self.roll_entry_with_rng(entry, character, armed, &mut rand::thread_rng())
    }

    pub fn roll_entry_with_rng<R: Rng>(
        &self,
        entry: &Entry,
        character: &Character,
        armed: &ArmedSet,
        rng: &mut R,
    ) -> RollResult {
        let die = dice::roll_d12(rng);
        self.resolve_with_die(
            die,
            RollTarget::Entry(entry.attribute_base),
            Some(entry),
            character,
            armed,
        )
    }

    /// Run the roll pipeline on an already drawn die.
    ///
    /// `rolled` is the entry being rolled, if any; only an ACTIVE entry adds
    /// its own modifier. The die is clamped into `1..=12`.
    pub fn resolve_with_die(
        &self,
        die: u32,
        target: RollTarget,
        rolled: Option<&Entry>,
        character: &Character,
        armed: &ArmedSet,
    ) -> RollResult {
        let die = die.clamp(1, CHECK_DIE_SIDES);
        let key = target.key();
        let mut contributions = Vec::new();
        let mut totals = ModifierTotals::default();

        let mental = mental_dice_bonus(character.mental) as f64;
        if mental != 0.0 {
            contributions.push(Contribution::new(
                format!("Mental {}", character.mental),
                ContributionKind::Mental,
                mental,
            ));
        }

        let attribute = key.and_then(|k| k.attribute());
        let attribute_value = attribute.map_or(0.0, |a| character.attribute(a));
        if let Some(a) = attribute.filter(|_| attribute_value != 0.0) {
            contributions.push(Contribution::new(
                a.abbreviation(),
                ContributionKind::Attribute,
                attribute_value,
            ));
        }

        if let Some(entry) = rolled.filter(|e| !e.is_passive() && !e.modifier.is_inert()) {
            totals.push(&entry.modifier);
            contributions.push(modifier_contribution(entry, ContributionKind::Entry));
        }

        for (_, passive) in character.armed_passives(armed) {
            if passive.applies_to(key) && !passive.modifier.is_inert() {
                totals.push(&passive.modifier);
                contributions.push(modifier_contribution(passive, ContributionKind::Passive));
            }
        }

        let subtotal = die as f64 + mental + attribute_value;
        if totals.mult != 0.0 {
            contributions.push(Contribution::new(
                "Mult total",
                ContributionKind::MultTotal,
                totals.mult,
            ));
        }
        let mut total = totals.apply(subtotal).floor();

        let critical = die == CHECK_DIE_SIDES;
        if critical {
            total = (total * CRITICAL_MULTIPLIER).floor();
            contributions.push(Contribution::new(
                "Critical",
                ContributionKind::Critical,
                CRITICAL_MULTIPLIER,
            ));
        }

        let result = RollResult {
            target,
            die,
            contributions,
            additive_sum: totals.add,
            mult_factor: totals.factor(),
            critical,
            total: total as i64,
        };
        debug!(die, total = result.total, critical, "Resolved roll");
        result
    }

    /// GM check on an attribute.
    pub fn check_attribute<R: Rng>(
        &self,
        attribute: Attribute,
        grade: Grade,
        character: &Character,
        armed: &ArmedSet,
        rng: &mut R,
    ) -> CheckResult {
        let roll = self.roll_attribute_with_rng(attribute, character, armed, rng);
        self.check(roll, grade, character.mental)
    }

    /// GM check on an entry.
    pub fn check_entry<R: Rng>(
        &self,
        entry: &Entry,
        grade: Grade,
        character: &Character,
        armed: &ArmedSet,
        rng: &mut R,
    ) -> CheckResult {
        let roll = self.roll_entry_with_rng(entry, character, armed, rng);
        self.check(roll, grade, character.mental)
    }

    /// Threshold epilogue over a finished roll.
    pub fn check(&self, roll: RollResult, grade: Grade, mental: i64) -> CheckResult {
        let dt = grade.dt();
        let bonus = dt_bonus(mental);
        let success = evaluate_success(roll.total, grade, mental);
        debug!(total = roll.total, %grade, dt, bonus, success, "Evaluated check");
        CheckResult {
            roll,
            grade,
            dt,
            dt_bonus: bonus,
            target: dt + bonus,
            success,
        }
    }
}

fn modifier_contribution(entry: &Entry, kind: ContributionKind) -> Contribution {
    Contribution::new(entry.name.clone(), kind, entry.modifier.value().unwrap_or(0.0))
}
