//! Dice for the sheet engine.
//!
//! Every check is a single d12. The free-form `dN` buttons of the player
//! view are supported through [`roll_die`], which carries no modifiers.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Error type for die parsing and rolling.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DiceError {
    #[error("Invalid die notation: {0}")]
    InvalidNotation(String),
    #[error("Invalid die size: {0} (a die needs at least 2 sides)")]
    InvalidDieSize(u32),
}

/// Face count of the check die.
pub const CHECK_DIE_SIDES: u32 = 12;

/// Common die types offered as quick buttons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DieType {
    D4,
    D6,
    D8,
    D10,
    D12,
    D20,
    D100,
}

impl DieType {
    pub fn sides(&self) -> u32 {
        match self {
            DieType::D4 => 4,
            DieType::D6 => 6,
            DieType::D8 => 8,
            DieType::D10 => 10,
            DieType::D12 => 12,
            DieType::D20 => 20,
            DieType::D100 => 100,
        }
    }

    pub fn from_sides(sides: u32) -> Option<DieType> {
        match sides {
            4 => Some(DieType::D4),
            6 => Some(DieType::D6),
            8 => Some(DieType::D8),
            10 => Some(DieType::D10),
            12 => Some(DieType::D12),
            20 => Some(DieType::D20),
            100 => Some(DieType::D100),
            _ => None,
        }
    }

    pub fn all() -> [DieType; 7] {
        [
            DieType::D4,
            DieType::D6,
            DieType::D8,
            DieType::D10,
            DieType::D12,
            DieType::D20,
            DieType::D100,
        ]
    }
}

impl fmt::Display for DieType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "d{}", self.sides())
    }
}

/// The outcome of a single free-form die.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DieRoll {
    pub sides: u32,
    pub value: u32,
}

impl fmt::Display for DieRoll {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "d{} -> {}", self.sides, self.value)
    }
}

/// Parse `"d8"`, `"D20"` or a bare `"8"` into a side count.
pub fn parse_sides(notation: &str) -> Result<u32, DiceError> {
    let trimmed = notation.trim().to_lowercase();
    let digits = trimmed.strip_prefix('d').unwrap_or(&trimmed);
    let sides: u32 = digits
        .parse()
        .map_err(|_| DiceError::InvalidNotation(notation.to_string()))?;
    if sides < 2 {
        return Err(DiceError::InvalidDieSize(sides));
    }
    Ok(sides)
}

/// Draw the check die uniformly from `1..=12`.
pub fn roll_d12<R: Rng>(rng: &mut R) -> u32 {
    rng.gen_range(1..=CHECK_DIE_SIDES)
}

/// Roll one free-form die.
pub fn roll_die(sides: u32) -> Result<DieRoll, DiceError> {
    roll_die_with_rng(sides, &mut rand::thread_rng())
}

/// Roll one free-form die with a specific RNG (useful for testing).
pub fn roll_die_with_rng<R: Rng>(sides: u32, rng: &mut R) -> Result<DieRoll, DiceError> {
    if sides < 2 {
        return Err(DiceError::InvalidDieSize(sides));
    }
    Ok(DieRoll {
        sides,
        value: rng.gen_range(1..=sides),
    })
}

/// Convenience function to roll a die from a notation string like `"d6"`.
pub fn roll(notation: &str) -> Result<DieRoll, DiceError> {
    roll_die(parse_sides(notation)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_d12_range() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..1000 {
            let v = roll_d12(&mut rng);
            assert!((1..=12).contains(&v));
        }
    }

    #[test]
    fn test_d12_is_roughly_uniform() {
        let mut rng = StdRng::seed_from_u64(42);
        let trials = 120_000;
        let mut counts = [0u32; 12];
        for _ in 0..trials {
            counts[(roll_d12(&mut rng) - 1) as usize] += 1;
        }

        // Pearson chi-square with 11 degrees of freedom; 31.26 is the 0.001 critical value.
        let expected = trials as f64 / 12.0;
        let chi2: f64 = counts
            .iter()
            .map(|&c| {
                let d = c as f64 - expected;
                d * d / expected
            })
            .sum();
        assert!(chi2 < 31.26, "chi-square too high: {chi2} ({counts:?})");
        assert!(counts.iter().all(|&c| c > 0));
    }

    #[test]
    fn test_parse_sides() {
        assert_eq!(parse_sides("d20").unwrap(), 20);
        assert_eq!(parse_sides(" D8 ").unwrap(), 8);
        assert_eq!(parse_sides("6").unwrap(), 6);
        assert_eq!(parse_sides("d1"), Err(DiceError::InvalidDieSize(1)));
        assert!(matches!(
            parse_sides("dx"),
            Err(DiceError::InvalidNotation(_))
        ));
    }

    #[test]
    fn test_roll_die_bounds() {
        let mut rng = StdRng::seed_from_u64(3);
        for die in DieType::all() {
            for _ in 0..200 {
                let roll = roll_die_with_rng(die.sides(), &mut rng).unwrap();
                assert!(roll.value >= 1 && roll.value <= die.sides());
            }
        }
        assert_eq!(roll_die(0), Err(DiceError::InvalidDieSize(0)));

        let quick = roll("d4").unwrap();
        assert_eq!(quick.sides, 4);
        assert!(quick.value >= 1 && quick.value <= 4);
    }

    #[test]
    fn test_die_display() {
        assert_eq!(DieType::D12.to_string(), "d12");
        let roll = DieRoll { sides: 6, value: 4 };
        assert_eq!(roll.to_string(), "d6 -> 4");
        assert_eq!(DieType::from_sides(100), Some(DieType::D100));
        assert_eq!(DieType::from_sides(7), None);
    }
}
