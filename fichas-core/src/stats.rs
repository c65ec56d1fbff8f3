//! Derived statistics.
//!
//! Everything here is a pure function of FOR, DEX and VIG. Each attribute
//! contributes its integer part; non-finite values count as 0.

use crate::character::{ArmedSet, Attribute, Attributes, Character, DerivedStat, Modifier, StatKey};
use serde::{Deserialize, Serialize};

/// Multiplier of the head and torso resistance terms.
pub const HEAD_TORSO_FACTOR: i64 = 3;
/// Multiplier of the limb resistance term.
pub const LIMB_FACTOR: i64 = 2;
/// Number of limbs counted towards hit points.
pub const LIMB_COUNT: i64 = 4;

/// Running additive and multiplicative totals of a set of modifiers.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ModifierTotals {
    pub add: f64,
    pub mult: f64,
}

impl ModifierTotals {
    pub fn push(&mut self, modifier: &Modifier) {
        match modifier {
            Modifier::None => {}
            Modifier::Add(v) => self.add += v,
            Modifier::Mult(v) => self.mult += v,
        }
    }

    /// `1 + Σmult`.
    pub fn factor(&self) -> f64 {
        1.0 + self.mult
    }

    /// Add the additive sum to `base`, then scale by the factor if any
    /// multiplier is present.
    pub fn apply(&self, base: f64) -> f64 {
        let sum = base + self.add;
        if self.mult != 0.0 {
            sum * self.factor()
        } else {
            sum
        }
    }
}

/// Values derived from a sheet's attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DerivedStats {
    pub intentions: i64,
    pub movement_per_action: i64,
    pub base_defense: i64,
    pub inventory_capacity: i64,
    pub head_resistance: i64,
    pub torso_resistance: i64,
    pub limb_resistance: i64,
    pub total_hit_points: i64,
}

impl DerivedStats {
    pub fn get(&self, stat: DerivedStat) -> i64 {
        match stat {
            DerivedStat::Intentions => self.intentions,
            DerivedStat::Movement => self.movement_per_action,
            DerivedStat::Defense => self.base_defense,
            DerivedStat::Inventory => self.inventory_capacity,
        }
    }

    fn set(&mut self, stat: DerivedStat, value: i64) {
        match stat {
            DerivedStat::Intentions => self.intentions = value,
            DerivedStat::Movement => self.movement_per_action = value,
            DerivedStat::Defense => self.base_defense = value,
            DerivedStat::Inventory => self.inventory_capacity = value,
        }
    }
}

fn whole(attributes: &Attributes, attribute: Attribute) -> i64 {
    attributes.get(attribute).floor() as i64
}

/// `(base + 3) * factor + 6`, saturating.
fn resistance(base: i64, factor: i64) -> i64 {
    base.saturating_add(3)
        .saturating_mul(factor)
        .saturating_add(6)
}

/// Every formula saturates at the `i64` bounds, so oversized attributes
/// yield extreme values instead of overflowing.
pub fn compute_derived_stats(attributes: &Attributes) -> DerivedStats {
    let str_ = whole(attributes, Attribute::Strength);
    let dex = whole(attributes, Attribute::Dexterity);
    let vig = whole(attributes, Attribute::Vigor);

    let head_resistance = resistance(vig, HEAD_TORSO_FACTOR);
    let torso_resistance = resistance(vig.saturating_add(str_), HEAD_TORSO_FACTOR);
    let limb_resistance = resistance(vig, LIMB_FACTOR);

    DerivedStats {
        intentions: vig.saturating_add(dex).div_euclid(2).saturating_add(1),
        movement_per_action: dex.saturating_add(2),
        base_defense: dex.saturating_add(6),
        inventory_capacity: str_.saturating_add(vig).saturating_mul(4),
        head_resistance,
        torso_resistance,
        limb_resistance,
        total_hit_points: head_resistance
            .saturating_add(torso_resistance)
            .saturating_add(limb_resistance.saturating_mul(LIMB_COUNT))
            .saturating_mul(2),
    }
}

/// Derived stats with armed passives tagged INTENTIONS, MOVEMENT, DEFENSE or
/// INVENTORY applied. Resistances and hit points are never adjusted.
pub fn adjusted_derived_stats(character: &Character, armed: &ArmedSet) -> DerivedStats {
    let mut stats = compute_derived_stats(&character.attributes);
    let passives = character.armed_passives(armed);

    for stat in DerivedStat::all() {
        let key = Some(StatKey::Derived(stat));
        let mut totals = ModifierTotals::default();
        for (_, entry) in passives.iter().filter(|(_, e)| e.applies_to(key)) {
            totals.push(&entry.modifier);
        }
        if totals != ModifierTotals::default() {
            let adjusted = totals.apply(stats.get(stat) as f64).floor() as i64;
            stats.set(stat, adjusted);
        }
    }

    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::character::{create_sample_character, Entry, EntryCollection, EntryRef};
    use crate::slug::Slug;

    #[test]
    fn test_reference_values_for_twos() {
        let stats = compute_derived_stats(&Attributes::new(0.0, 2.0, 2.0, 2.0));
        assert_eq!(
            stats,
            DerivedStats {
                intentions: 3,
                movement_per_action: 4,
                base_defense: 8,
                inventory_capacity: 16,
                head_resistance: 21,
                torso_resistance: 27,
                limb_resistance: 16,
                total_hit_points: 224,
            }
        );
    }

    #[test]
    fn test_qi_does_not_matter() {
        let a = compute_derived_stats(&Attributes::new(0.0, 1.0, 3.0, 2.0));
        let b = compute_derived_stats(&Attributes::new(9.0, 1.0, 3.0, 2.0));
        assert_eq!(a, b);
    }

    #[test]
    fn test_fractional_and_non_finite_attributes() {
        let stats = compute_derived_stats(&Attributes::new(0.0, 2.9, 2.5, f64::NAN));
        assert_eq!(stats.movement_per_action, 4);
        assert_eq!(stats.intentions, 2);
        assert_eq!(stats.inventory_capacity, 8);
        assert_eq!(stats.head_resistance, 15);
    }

    #[test]
    fn test_odd_sum_intentions_floor() {
        let stats = compute_derived_stats(&Attributes::new(0.0, 0.0, -1.0, 0.0));
        assert_eq!(stats.intentions, 0);
        let stats = compute_derived_stats(&Attributes::new(0.0, 0.0, 3.0, 0.0));
        assert_eq!(stats.intentions, 2);
    }

    #[test]
    fn test_modifier_totals_apply() {
        let mut totals = ModifierTotals::default();
        assert_eq!(totals.apply(5.0), 5.0);
        totals.push(&Modifier::Add(3.0));
        totals.push(&Modifier::Mult(0.5));
        totals.push(&Modifier::Mult(0.25));
        assert_eq!(totals.factor(), 1.75);
        assert_eq!(totals.apply(5.0), 14.0);
    }

    #[test]
    fn test_adjusted_by_armed_passives() {
        let mut character = create_sample_character("Ayla");
        let shield = Entry::passive("Escudo")
            .with_base(DerivedStat::Defense)
            .with_modifier(Modifier::Mult(0.5));
        let shield_ref = character.insert_entry(
            EntryCollection::Items,
            Slug::from_name("Escudo").unwrap(),
            shield,
        );
        let boots = EntryRef::new(EntryCollection::Items, Slug::from_name("Botas Leves").unwrap());

        let base = compute_derived_stats(&character.attributes);
        let unarmed = adjusted_derived_stats(&character, &ArmedSet::new());
        assert_eq!(unarmed, base);

        let armed: ArmedSet = [boots, shield_ref].into_iter().collect();
        let adjusted = adjusted_derived_stats(&character, &armed);
        assert_eq!(adjusted.movement_per_action, base.movement_per_action + 1);
        assert_eq!(adjusted.base_defense, (base.base_defense as f64 * 1.5).floor() as i64);
        assert_eq!(adjusted.total_hit_points, base.total_hit_points);
        assert_eq!(adjusted.intentions, base.intentions);
    }

    #[test]
    fn test_extreme_attributes_saturate() {
        let stats = compute_derived_stats(&Attributes::new(0.0, 0.0, 0.0, 1e19));
        assert_eq!(stats.head_resistance, i64::MAX);
        assert_eq!(stats.torso_resistance, i64::MAX);
        assert_eq!(stats.limb_resistance, i64::MAX);
        assert_eq!(stats.total_hit_points, i64::MAX);
        assert_eq!(stats.inventory_capacity, i64::MAX);
        assert_eq!(stats.intentions, i64::MAX / 2 + 1);
        assert_eq!(stats.movement_per_action, 2);

        let stats = compute_derived_stats(&Attributes::new(0.0, -1e19, 0.0, -1e19));
        assert_eq!(stats.head_resistance, i64::MIN + 6);
        assert_eq!(stats.total_hit_points, i64::MIN);
        assert_eq!(stats.inventory_capacity, i64::MIN);
    }

    #[test]
    fn test_adjusted_with_extreme_attributes() {
        let mut character = Character::new("Titan");
        character.attributes = Attributes::new(0.0, 0.0, 0.0, 1e19);
        let pack = Entry::passive("Mochila")
            .with_base(DerivedStat::Inventory)
            .with_modifier(Modifier::Add(5.0));
        let pack_ref = character.insert_entry(
            EntryCollection::Items,
            Slug::from_name("Mochila").unwrap(),
            pack,
        );

        let armed: ArmedSet = [pack_ref].into_iter().collect();
        let adjusted = adjusted_derived_stats(&character, &armed);
        assert_eq!(adjusted.inventory_capacity, i64::MAX);
        assert_eq!(adjusted.total_hit_points, i64::MAX);
    }
}
