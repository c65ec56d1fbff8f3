//! Character sheet engine for a d12 tabletop RPG.
//!
//! This crate provides:
//! - Roll resolution: d12, mental bonus, passive and active modifiers, criticals
//! - GM checks against graded difficulty thresholds
//! - Derived statistics from base attributes
//! - Slug identifiers with conflict resolution for sheets and entries
//! - Validated bulk import producing one atomic write set
//!
//! # Quick Start
//!
//! ```ignore
//! use fichas_core::{create_sample_character, ArmedSet, Attribute, RuleEngine};
//!
//! let sheet = create_sample_character("Ayla");
//! let roll = RuleEngine::new().roll_attribute(Attribute::Strength, &sheet, &ArmedSet::new());
//! println!("{roll}");
//! ```

pub mod character;
pub mod config;
pub mod dice;
pub mod import;
pub mod rules;
pub mod slug;
pub mod stats;
pub mod store;
pub mod testing;

// Primary public API
pub use character::{
    create_sample_character, Activation, ArmedSet, Attribute, Attributes, Character, DerivedStat,
    Entry, EntryCollection, EntryError, EntryRef, ModMode, Modifier, StatKey,
};
pub use config::{ConfigError, EngineConfig};
pub use import::{
    import, import_json, merge, validate, validate_json, ImportError, NormalizedRecord,
    ValidationError, ValidationReport,
};
pub use rules::{
    evaluate_success, CheckResult, Grade, GradeError, RollResult, RollTarget, RuleEngine,
};
pub use slug::{
    normalize, ConflictDecision, ConflictResolver, ImportMode, RenamePlan, Slug, SlugError,
    SlugResolver,
};
pub use stats::{adjusted_derived_stats, compute_derived_stats, DerivedStats};
pub use store::{BackReference, ExistenceOracle, Snapshot, StoreError, WriteSet};
pub use testing::MemoryStore;
