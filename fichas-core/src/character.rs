//! Character sheet types.
//!
//! A sheet holds four base attributes, a `mental` state and three keyed
//! collections of entries (items, advantages, disadvantages). Entries are
//! stored on the wire as a flat record but held in memory as tagged
//! variants, so a multiplicative entry without a value cannot exist.

use crate::slug::Slug;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tracing::warn;

/// Longest entry name accepted by the sheet.
pub const MAX_ENTRY_NAME_LEN: usize = 80;

/// Largest attribute magnitude accepted on import.
pub const MAX_ATTRIBUTE_MAGNITUDE: f64 = 1_000_000.0;

/// Replace NaN and infinities with zero.
pub(crate) fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

// ============================================================================
// Attributes
// ============================================================================

/// The four base attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Attribute {
    #[serde(rename = "QI")]
    Qi,
    #[serde(rename = "FOR")]
    Strength,
    #[serde(rename = "DEX")]
    Dexterity,
    #[serde(rename = "VIG")]
    Vigor,
}

impl Attribute {
    pub fn abbreviation(&self) -> &'static str {
        match self {
            Attribute::Qi => "QI",
            Attribute::Strength => "FOR",
            Attribute::Dexterity => "DEX",
            Attribute::Vigor => "VIG",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Attribute::Qi => "Intellect",
            Attribute::Strength => "Strength",
            Attribute::Dexterity => "Dexterity",
            Attribute::Vigor => "Vigor",
        }
    }

    pub fn all() -> [Attribute; 4] {
        [
            Attribute::Qi,
            Attribute::Strength,
            Attribute::Dexterity,
            Attribute::Vigor,
        ]
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.abbreviation())
    }
}

impl FromStr for Attribute {
    type Err = EntryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_uppercase();
        Attribute::all()
            .into_iter()
            .find(|a| a.abbreviation() == upper)
            .ok_or_else(|| EntryError::UnknownStat(s.to_string()))
    }
}

/// Attribute values of a sheet. Values may be fractional.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Attributes {
    #[serde(rename = "QI")]
    pub qi: f64,
    #[serde(rename = "FOR")]
    pub strength: f64,
    #[serde(rename = "DEX")]
    pub dexterity: f64,
    #[serde(rename = "VIG")]
    pub vigor: f64,
}

impl Attributes {
    pub fn new(qi: f64, strength: f64, dexterity: f64, vigor: f64) -> Self {
        Self {
            qi,
            strength,
            dexterity,
            vigor,
        }
    }

    /// Value of an attribute, with non-finite values read as 0.
    pub fn get(&self, attribute: Attribute) -> f64 {
        let raw = match attribute {
            Attribute::Qi => self.qi,
            Attribute::Strength => self.strength,
            Attribute::Dexterity => self.dexterity,
            Attribute::Vigor => self.vigor,
        };
        finite_or_zero(raw)
    }

    pub fn set(&mut self, attribute: Attribute, value: f64) {
        match attribute {
            Attribute::Qi => self.qi = value,
            Attribute::Strength => self.strength = value,
            Attribute::Dexterity => self.dexterity = value,
            Attribute::Vigor => self.vigor = value,
        }
    }
}

impl Default for Attributes {
    fn default() -> Self {
        Self::new(0.0, 0.0, 0.0, 0.0)
    }
}

// ============================================================================
// Stat keys
// ============================================================================

/// Derived statistics that passive entries may target by tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DerivedStat {
    Intentions,
    Movement,
    Defense,
    Inventory,
}

impl DerivedStat {
    /// Reserved `attributeBase` tag.
    pub fn tag(&self) -> &'static str {
        match self {
            DerivedStat::Intentions => "INTENTIONS",
            DerivedStat::Movement => "MOVEMENT",
            DerivedStat::Defense => "DEFENSE",
            DerivedStat::Inventory => "INVENTORY",
        }
    }

    pub fn all() -> [DerivedStat; 4] {
        [
            DerivedStat::Intentions,
            DerivedStat::Movement,
            DerivedStat::Defense,
            DerivedStat::Inventory,
        ]
    }
}

/// What an entry's `attributeBase` may name: a base attribute or a reserved
/// derived-stat tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum StatKey {
    Attribute(Attribute),
    Derived(DerivedStat),
}

impl StatKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatKey::Attribute(a) => a.abbreviation(),
            StatKey::Derived(d) => d.tag(),
        }
    }

    /// The base attribute, if this key names one.
    pub fn attribute(&self) -> Option<Attribute> {
        match self {
            StatKey::Attribute(a) => Some(*a),
            StatKey::Derived(_) => None,
        }
    }
}

impl From<Attribute> for StatKey {
    fn from(attribute: Attribute) -> Self {
        StatKey::Attribute(attribute)
    }
}

impl From<DerivedStat> for StatKey {
    fn from(stat: DerivedStat) -> Self {
        StatKey::Derived(stat)
    }
}

impl fmt::Display for StatKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StatKey {
    type Err = EntryError;

    /// Tags are matched exactly; `"qi"` is not `"QI"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(a) = Attribute::all().into_iter().find(|a| a.abbreviation() == s) {
            return Ok(StatKey::Attribute(a));
        }
        DerivedStat::all()
            .into_iter()
            .find(|d| d.tag() == s)
            .map(StatKey::Derived)
            .ok_or_else(|| EntryError::UnknownStat(s.to_string()))
    }
}

impl TryFrom<String> for StatKey {
    type Error = EntryError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<StatKey> for String {
    fn from(key: StatKey) -> Self {
        key.as_str().to_string()
    }
}

// ============================================================================
// Entries
// ============================================================================

/// Errors raised when an entry record violates its invariants.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EntryError {
    #[error("Entry name is required")]
    EmptyName,

    #[error("Entry name is {len} characters long (max {max})")]
    NameTooLong { len: usize, max: usize },

    #[error("modValue is required when modMode is {0}")]
    MissingModValue(ModMode),

    #[error("modValue must be a finite number")]
    NonFiniteModValue,

    #[error("Unknown attribute or stat tag: {0}")]
    UnknownStat(String),

    #[error("Unknown entry type: {0}")]
    UnknownActivation(String),

    #[error("Unknown modifier mode: {0}")]
    UnknownModMode(String),

    #[error("Unknown entry collection: {0}")]
    UnknownCollection(String),
}

/// Whether an entry is triggered per roll or armed ahead of time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Activation {
    Active,
    Passive,
}

impl Activation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Activation::Active => "ACTIVE",
            Activation::Passive => "PASSIVE",
        }
    }
}

impl FromStr for Activation {
    type Err = EntryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ACTIVE" => Ok(Activation::Active),
            "PASSIVE" => Ok(Activation::Passive),
            other => Err(EntryError::UnknownActivation(other.to_string())),
        }
    }
}

/// Wire tag for [`Modifier`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ModMode {
    #[default]
    None,
    Add,
    Mult,
}

impl ModMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModMode::None => "NONE",
            ModMode::Add => "ADD",
            ModMode::Mult => "MULT",
        }
    }
}

impl fmt::Display for ModMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModMode {
    type Err = EntryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "NONE" => Ok(ModMode::None),
            "ADD" => Ok(ModMode::Add),
            "MULT" => Ok(ModMode::Mult),
            other => Err(EntryError::UnknownModMode(other.to_string())),
        }
    }
}

/// How an entry changes a roll.
///
/// `Mult` values are fractions combined as `1 + Σmult`, so `Mult(0.5)`
/// means "+50%".
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Modifier {
    #[default]
    None,
    Add(f64),
    Mult(f64),
}

impl Modifier {
    /// Build a modifier from its wire pair, enforcing the mode/value invariant.
    pub fn from_parts(mode: ModMode, value: Option<f64>) -> Result<Self, EntryError> {
        match mode {
            ModMode::None => Ok(Modifier::None),
            ModMode::Add | ModMode::Mult => {
                let v = value.ok_or(EntryError::MissingModValue(mode))?;
                if !v.is_finite() {
                    return Err(EntryError::NonFiniteModValue);
                }
                Ok(if mode == ModMode::Add {
                    Modifier::Add(v)
                } else {
                    Modifier::Mult(v)
                })
            }
        }
    }

    pub fn mode(&self) -> ModMode {
        match self {
            Modifier::None => ModMode::None,
            Modifier::Add(_) => ModMode::Add,
            Modifier::Mult(_) => ModMode::Mult,
        }
    }

    pub fn value(&self) -> Option<f64> {
        match self {
            Modifier::None => None,
            Modifier::Add(v) | Modifier::Mult(v) => Some(*v),
        }
    }

    /// True when the modifier cannot change a roll (no mode, or a zero value).
    pub fn is_inert(&self) -> bool {
        self.value().map_or(true, |v| v == 0.0)
    }
}

/// A sheet entry: an item, advantage or disadvantage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "EntryRecord", into = "EntryRecord")]
pub struct Entry {
    pub name: String,
    pub activation: Activation,
    pub attribute_base: Option<StatKey>,
    pub modifier: Modifier,
    pub uses_current: Option<i64>,
    pub uses_max: Option<i64>,
    pub notes: Option<String>,
}

impl Entry {
    pub fn new(name: impl Into<String>, activation: Activation) -> Self {
        Self {
            name: name.into(),
            activation,
            attribute_base: None,
            modifier: Modifier::None,
            uses_current: None,
            uses_max: None,
            notes: None,
        }
    }

    pub fn active(name: impl Into<String>) -> Self {
        Self::new(name, Activation::Active)
    }

    pub fn passive(name: impl Into<String>) -> Self {
        Self::new(name, Activation::Passive)
    }

    pub fn with_base(mut self, base: impl Into<StatKey>) -> Self {
        self.attribute_base = Some(base.into());
        self
    }

    pub fn with_modifier(mut self, modifier: Modifier) -> Self {
        self.modifier = modifier;
        self
    }

    pub fn with_uses(mut self, current: i64, max: i64) -> Self {
        self.uses_current = Some(current);
        self.uses_max = Some(max);
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    pub fn is_passive(&self) -> bool {
        self.activation == Activation::Passive
    }

    /// Whether this entry's effect applies to a roll targeting `target`.
    ///
    /// Matching is exact: an entry without a base only applies to rolls
    /// without a target, and a based entry only to rolls on that key.
    pub fn applies_to(&self, target: Option<StatKey>) -> bool {
        self.attribute_base == target
    }
}

/// Flat storage shape of an [`Entry`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryRecord {
    pub name: String,
    #[serde(rename = "type")]
    pub activation: Activation,
    #[serde(default)]
    pub attribute_base: Option<StatKey>,
    #[serde(default)]
    pub mod_mode: ModMode,
    #[serde(default)]
    pub mod_value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uses_current: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uses_max: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl TryFrom<EntryRecord> for Entry {
    type Error = EntryError;

    fn try_from(record: EntryRecord) -> Result<Self, Self::Error> {
        let name = record.name.trim().to_string();
        if name.is_empty() {
            return Err(EntryError::EmptyName);
        }
        let len = name.chars().count();
        if len > MAX_ENTRY_NAME_LEN {
            return Err(EntryError::NameTooLong {
                len,
                max: MAX_ENTRY_NAME_LEN,
            });
        }

        Ok(Entry {
            name,
            activation: record.activation,
            attribute_base: record.attribute_base,
            modifier: Modifier::from_parts(record.mod_mode, record.mod_value)?,
            uses_current: record.uses_current,
            uses_max: record.uses_max,
            notes: record.notes,
        })
    }
}

impl From<Entry> for EntryRecord {
    fn from(entry: Entry) -> Self {
        EntryRecord {
            mod_mode: entry.modifier.mode(),
            mod_value: entry.modifier.value(),
            name: entry.name,
            activation: entry.activation,
            attribute_base: entry.attribute_base,
            uses_current: entry.uses_current,
            uses_max: entry.uses_max,
            notes: entry.notes,
        }
    }
}

// ============================================================================
// Collections
// ============================================================================

/// The three entry collections of a sheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EntryCollection {
    Items,
    Advantages,
    Disadvantages,
}

impl EntryCollection {
    /// Field name of the collection on the sheet record.
    pub fn key(&self) -> &'static str {
        match self {
            EntryCollection::Items => "items",
            EntryCollection::Advantages => "advantages",
            EntryCollection::Disadvantages => "disadvantages",
        }
    }

    pub fn all() -> [EntryCollection; 3] {
        [
            EntryCollection::Items,
            EntryCollection::Advantages,
            EntryCollection::Disadvantages,
        ]
    }
}

impl fmt::Display for EntryCollection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for EntryCollection {
    type Err = EntryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EntryCollection::all()
            .into_iter()
            .find(|c| c.key() == s)
            .ok_or_else(|| EntryError::UnknownCollection(s.to_string()))
    }
}

/// Reference to one entry of a sheet, e.g. `advantages/sexto-sentido`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntryRef {
    pub collection: EntryCollection,
    pub id: Slug,
}

impl EntryRef {
    pub fn new(collection: EntryCollection, id: Slug) -> Self {
        Self { collection, id }
    }
}

impl fmt::Display for EntryRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.collection, self.id)
    }
}

/// Passive entries the player armed for the current request.
pub type ArmedSet = HashSet<EntryRef>;

// ============================================================================
// Character
// ============================================================================

/// A materialized character sheet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Character {
    pub name: String,
    #[serde(default)]
    pub attributes: Attributes,
    #[serde(default)]
    pub mental: i64,
    #[serde(default)]
    pub items: BTreeMap<Slug, Entry>,
    #[serde(default)]
    pub advantages: BTreeMap<Slug, Entry>,
    #[serde(default)]
    pub disadvantages: BTreeMap<Slug, Entry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl Character {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Attributes::default(),
            mental: 0,
            items: BTreeMap::new(),
            advantages: BTreeMap::new(),
            disadvantages: BTreeMap::new(),
            notes: None,
        }
    }

    pub fn attribute(&self, attribute: Attribute) -> f64 {
        self.attributes.get(attribute)
    }

    pub fn collection(&self, collection: EntryCollection) -> &BTreeMap<Slug, Entry> {
        match collection {
            EntryCollection::Items => &self.items,
            EntryCollection::Advantages => &self.advantages,
            EntryCollection::Disadvantages => &self.disadvantages,
        }
    }

    pub fn collection_mut(&mut self, collection: EntryCollection) -> &mut BTreeMap<Slug, Entry> {
        match collection {
            EntryCollection::Items => &mut self.items,
            EntryCollection::Advantages => &mut self.advantages,
            EntryCollection::Disadvantages => &mut self.disadvantages,
        }
    }

    pub fn entry(&self, entry_ref: &EntryRef) -> Option<&Entry> {
        self.collection(entry_ref.collection).get(&entry_ref.id)
    }

    /// Insert an entry under an already-resolved id, returning its reference.
    pub fn insert_entry(
        &mut self,
        collection: EntryCollection,
        id: Slug,
        entry: Entry,
    ) -> EntryRef {
        self.collection_mut(collection).insert(id.clone(), entry);
        EntryRef::new(collection, id)
    }

    /// Iterate over every entry of the sheet with its reference.
    pub fn entries(&self) -> impl Iterator<Item = (EntryRef, &Entry)> {
        EntryCollection::all().into_iter().flat_map(move |c| {
            self.collection(c)
                .iter()
                .map(move |(id, e)| (EntryRef::new(c, id.clone()), e))
        })
    }

    /// The armed entries that exist on this sheet and are PASSIVE, in sheet
    /// order. Anything else in `armed` is skipped with a warning.
    pub fn armed_passives<'a>(&'a self, armed: &ArmedSet) -> Vec<(EntryRef, &'a Entry)> {
        for entry_ref in armed {
            match self.entry(entry_ref) {
                None => warn!(entry = %entry_ref, "Armed entry not found on sheet, ignoring"),
                Some(e) if !e.is_passive() => {
                    warn!(entry = %entry_ref, "Armed entry is not PASSIVE, ignoring")
                }
                Some(_) => {}
            }
        }

        self.entries()
            .filter(|(r, e)| e.is_passive() && armed.contains(r))
            .collect()
    }
}

/// A ready-to-play sheet used by tests and the headless front end.
pub fn create_sample_character(name: &str) -> Character {
    let mut character = Character::new(name);
    character.attributes = Attributes::new(2.0, 3.0, 2.0, 1.0);

    let entries = [
        (
            EntryCollection::Items,
            Entry::active("Espada Élfica")
                .with_base(Attribute::Strength)
                .with_modifier(Modifier::Add(2.0)),
        ),
        (
            EntryCollection::Items,
            Entry::passive("Botas Leves")
                .with_base(DerivedStat::Movement)
                .with_modifier(Modifier::Add(1.0)),
        ),
        (
            EntryCollection::Advantages,
            Entry::passive("Fúria")
                .with_base(Attribute::Strength)
                .with_modifier(Modifier::Mult(0.5)),
        ),
        (
            EntryCollection::Advantages,
            Entry::passive("Sorte")
                .with_modifier(Modifier::Add(1.0))
                .with_uses(3, 3),
        ),
        (
            EntryCollection::Disadvantages,
            Entry::passive("Desajeitado")
                .with_base(Attribute::Dexterity)
                .with_modifier(Modifier::Add(-2.0)),
        ),
    ];

    for (collection, entry) in entries {
        if let Ok(id) = Slug::from_name(&entry.name) {
            character.insert_entry(collection, id, entry);
        }
    }

    character
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_attribute_parse_and_display() {
        assert_eq!("for".parse::<Attribute>().unwrap(), Attribute::Strength);
        assert_eq!(Attribute::Vigor.to_string(), "VIG");
        assert!("STR".parse::<Attribute>().is_err());
    }

    #[test]
    fn test_attributes_non_finite_reads_as_zero() {
        let mut attrs = Attributes::new(1.0, 2.0, 3.0, 4.0);
        attrs.set(Attribute::Dexterity, f64::NAN);
        assert_eq!(attrs.get(Attribute::Dexterity), 0.0);
        assert_eq!(attrs.get(Attribute::Vigor), 4.0);
    }

    #[test]
    fn test_stat_key_round_trip_strings() {
        for key in ["QI", "FOR", "DEX", "VIG", "INTENTIONS", "MOVEMENT", "DEFENSE", "INVENTORY"] {
            let parsed: StatKey = key.parse().unwrap();
            assert_eq!(parsed.as_str(), key);
        }
        assert!("qi".parse::<StatKey>().is_err());
        assert_eq!(
            StatKey::from(DerivedStat::Defense).attribute(),
            None
        );
    }

    #[test]
    fn test_modifier_invariants() {
        assert_eq!(
            Modifier::from_parts(ModMode::None, Some(3.0)).unwrap(),
            Modifier::None
        );
        assert_eq!(
            Modifier::from_parts(ModMode::Add, None),
            Err(EntryError::MissingModValue(ModMode::Add))
        );
        assert_eq!(
            Modifier::from_parts(ModMode::Mult, Some(f64::INFINITY)),
            Err(EntryError::NonFiniteModValue)
        );
        assert!(Modifier::Add(0.0).is_inert());
        assert!(Modifier::None.is_inert());
        assert!(!Modifier::Mult(0.25).is_inert());
    }

    #[test]
    fn test_entry_wire_shape() {
        let entry = Entry::active("Arco Curto")
            .with_base(Attribute::Dexterity)
            .with_modifier(Modifier::Mult(0.25));
        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(
            value,
            json!({
                "name": "Arco Curto",
                "type": "ACTIVE",
                "attributeBase": "DEX",
                "modMode": "MULT",
                "modValue": 0.25
            })
        );
    }

    #[test]
    fn test_entry_rejects_missing_value() {
        let raw = json!({ "name": "Amuleto", "type": "PASSIVE", "modMode": "ADD" });
        assert!(serde_json::from_value::<Entry>(raw).is_err());

        let raw = json!({
            "name": "Amuleto",
            "type": "PASSIVE",
            "modMode": "NONE",
            "modValue": null
        });
        let entry: Entry = serde_json::from_value(raw).unwrap();
        assert_eq!(entry.modifier, Modifier::None);
        assert_eq!(entry.attribute_base, None);
    }

    #[test]
    fn test_entry_name_limit() {
        let long = "x".repeat(MAX_ENTRY_NAME_LEN + 1);
        let raw = json!({ "name": long, "type": "ACTIVE" });
        assert!(serde_json::from_value::<Entry>(raw).is_err());
    }

    #[test]
    fn test_applies_to_is_exact() {
        let universal = Entry::passive("Sorte").with_modifier(Modifier::Add(1.0));
        assert!(universal.applies_to(None));
        assert!(!universal.applies_to(Some(Attribute::Qi.into())));

        let based = Entry::passive("Fúria").with_base(Attribute::Strength);
        assert!(based.applies_to(Some(Attribute::Strength.into())));
        assert!(!based.applies_to(Some(Attribute::Vigor.into())));
        assert!(!based.applies_to(None));
    }

    #[test]
    fn test_sample_character_entries() {
        let character = create_sample_character("Ayla");
        assert_eq!(character.items.len(), 2);
        assert_eq!(character.advantages.len(), 2);
        assert_eq!(character.disadvantages.len(), 1);

        let sword = EntryRef::new(
            EntryCollection::Items,
            Slug::from_name("Espada Élfica").unwrap(),
        );
        assert_eq!(sword.to_string(), "items/espada-elfica");
        assert!(character.entry(&sword).is_some());
        assert_eq!(character.entries().count(), 5);
    }

    #[test]
    fn test_armed_passives_skips_missing_and_active() {
        let character = create_sample_character("Ayla");
        let armed: ArmedSet = [
            EntryRef::new(EntryCollection::Advantages, Slug::from_name("Fúria").unwrap()),
            EntryRef::new(EntryCollection::Items, Slug::from_name("Espada Élfica").unwrap()),
            EntryRef::new(EntryCollection::Items, Slug::from_name("Nada").unwrap()),
        ]
        .into_iter()
        .collect();

        let passives = character.armed_passives(&armed);
        assert_eq!(passives.len(), 1);
        assert_eq!(passives[0].1.name, "Fúria");
    }

    #[test]
    fn test_character_deserializes_with_defaults() {
        let raw = json!({ "name": "Bram", "attributes": { "DEX": 3 } });
        let character: Character = serde_json::from_value(raw).unwrap();
        assert_eq!(character.attribute(Attribute::Dexterity), 3.0);
        assert_eq!(character.attribute(Attribute::Qi), 0.0);
        assert_eq!(character.mental, 0);
        assert!(character.items.is_empty());
    }
}
