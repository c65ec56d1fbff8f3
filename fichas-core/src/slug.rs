//! Slug identity: stable string keys for sheets and their entries.
//!
//! Every stored record is keyed by a slug derived from its display name.
//! When a slug is already taken the caller decides, through a
//! [`ConflictResolver`], whether to overwrite it or take the first free
//! numbered suffix (`goblin-2`, `goblin-3`, ...).
//!
//! Existence checks go to an external store and are not reservations: the
//! gap between the check and the caller's write is an unguarded race.

use crate::store::{record_path, BackReference, ExistenceOracle, StoreError, WriteSet};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tracing::{debug, info};
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Default number of suffixes tried before giving up.
pub const DEFAULT_MAX_SUFFIX_PROBES: u32 = 199;

/// First numbered suffix tried after the bare slug.
const FIRST_SUFFIX: u32 = 2;

/// Errors from slug normalization and resolution.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SlugError {
    #[error("'{input}' does not produce a usable identifier")]
    InvalidIdentifier { input: String },

    #[error("No free identifier for '{base}' after {attempts} attempts")]
    ResolutionExhausted { base: Slug, attempts: u32 },

    #[error("Identifier '{candidate}' is taken and the conflict was not resolved")]
    Cancelled { candidate: Slug },

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Unknown import mode: {0} (expected MERGE or CREATE_ONLY)")]
    UnknownImportMode(String),
}

/// A normalized identifier: non-empty, `[a-z0-9-]` only, no leading,
/// trailing or doubled hyphens.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Slug(String);

impl Slug {
    /// Derive a slug from a display name.
    pub fn from_name(name: &str) -> Result<Self, SlugError> {
        normalize(name)
    }

    /// Accept a string that is already in normal form.
    pub fn parse(raw: &str) -> Result<Self, SlugError> {
        let normalized = normalize(raw)?;
        if normalized.0 != raw {
            return Err(SlugError::InvalidIdentifier {
                input: raw.to_string(),
            });
        }
        Ok(normalized)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `goblin` -> `goblin-<n>`.
    pub fn with_suffix(&self, n: u32) -> Slug {
        Slug(format!("{}-{}", self.0, n))
    }
}

impl fmt::Display for Slug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Slug {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl FromStr for Slug {
    type Err = SlugError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Slug::parse(s)
    }
}

impl TryFrom<String> for Slug {
    type Error = SlugError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Slug::parse(&value)
    }
}

impl From<Slug> for String {
    fn from(slug: Slug) -> Self {
        slug.0
    }
}

/// Normalize free text into a slug.
///
/// Lower-cases, strips diacritics, turns whitespace runs into single
/// hyphens, drops everything outside `[a-z0-9-]`, collapses repeated
/// hyphens and trims them from both ends.
pub fn normalize(text: &str) -> Result<Slug, SlugError> {
    let mut out = String::with_capacity(text.len());
    let mut pending_hyphen = false;

    for ch in text.nfd().filter(|c| !is_combining_mark(*c)) {
        if ch.is_whitespace() || ch == '-' {
            pending_hyphen = true;
            continue;
        }
        for lower in ch.to_lowercase() {
            if lower.is_ascii_lowercase() || lower.is_ascii_digit() {
                if pending_hyphen && !out.is_empty() {
                    out.push('-');
                }
                pending_hyphen = false;
                out.push(lower);
            }
        }
    }

    if out.is_empty() {
        return Err(SlugError::InvalidIdentifier {
            input: text.to_string(),
        });
    }
    Ok(Slug(out))
}

/// What to do when a desired identifier is already used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ConflictDecision {
    /// Reuse the identifier, replacing the existing record.
    Overwrite,
    /// Take the first free numbered suffix.
    Suffix,
    /// Abort the operation.
    Cancel,
}

/// Decision point invoked when a desired identifier is taken.
pub trait ConflictResolver {
    fn decide(&self, candidate: &Slug) -> ConflictDecision;
}

impl<F> ConflictResolver for F
where
    F: Fn(&Slug) -> ConflictDecision,
{
    fn decide(&self, candidate: &Slug) -> ConflictDecision {
        self(candidate)
    }
}

/// A fixed policy, for callers without an interactive operator.
impl ConflictResolver for ConflictDecision {
    fn decide(&self, _candidate: &Slug) -> ConflictDecision {
        *self
    }
}

/// How an import batch treats identifiers that already exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ImportMode {
    /// Existing records with the same id are overwritten.
    #[default]
    Merge,
    /// Never overwrite; colliding ids get a numbered suffix.
    CreateOnly,
}

impl FromStr for ImportMode {
    type Err = SlugError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().replace('-', "_").as_str() {
            "MERGE" => Ok(ImportMode::Merge),
            "CREATE_ONLY" => Ok(ImportMode::CreateOnly),
            _ => Err(SlugError::UnknownImportMode(s.to_string())),
        }
    }
}

/// Result of resolving a rename.
#[derive(Debug, Clone, PartialEq)]
pub struct RenamePlan {
    pub from: Slug,
    pub id: Slug,
    /// Record move plus every back-reference update, to be applied together.
    pub writes: WriteSet,
}

impl RenamePlan {
    pub fn is_rename(&self) -> bool {
        self.from != self.id
    }
}

/// Resolves desired names into free (or deliberately reused) identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlugResolver {
    max_probes: u32,
}

impl Default for SlugResolver {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_SUFFIX_PROBES)
    }
}

impl SlugResolver {
    pub fn new(max_probes: u32) -> Self {
        Self { max_probes }
    }

    pub fn max_probes(&self) -> u32 {
        self.max_probes
    }

    /// Resolve an identifier for a new record.
    pub async fn resolve_for_create<O, C>(
        &self,
        desired: &str,
        oracle: &O,
        resolver: &C,
    ) -> Result<Slug, SlugError>
    where
        O: ExistenceOracle + ?Sized,
        C: ConflictResolver + ?Sized,
    {
        let base = normalize(desired)?;
        if !oracle.exists(&base).await? {
            return Ok(base);
        }
        self.decide_conflict(base, None, oracle, resolver).await
    }

    /// Resolve the new identifier of an existing record and plan the move.
    ///
    /// The plan writes `record` at its final path. When the id changes it
    /// also deletes the old path and points every back-reference at the new
    /// id, so the caller applies one batch.
    #[allow(clippy::too_many_arguments)]
    pub async fn resolve_for_rename<O, C>(
        &self,
        collection_path: &str,
        old: &Slug,
        new_desired: &str,
        record: &Value,
        back_refs: &[BackReference],
        oracle: &O,
        resolver: &C,
    ) -> Result<RenamePlan, SlugError>
    where
        O: ExistenceOracle + ?Sized,
        C: ConflictResolver + ?Sized,
    {
        let base = normalize(new_desired)?;
        let id = if base == *old || !oracle.exists(&base).await? {
            base
        } else {
            self.decide_conflict(base, Some(old), oracle, resolver).await?
        };

        let mut writes = WriteSet::new();
        if id != *old {
            writes.delete(record_path(collection_path, old));
            for back_ref in back_refs {
                writes.set(back_ref.path.clone(), Value::String(id.to_string()));
            }
            info!(from = %old, to = %id, back_refs = back_refs.len(), "Planned rename");
        }
        writes.set(record_path(collection_path, &id), record.clone());

        Ok(RenamePlan {
            from: old.clone(),
            id,
            writes,
        })
    }

    /// Resolve an identifier inside an import batch.
    ///
    /// `taken` holds the ids already present plus those claimed earlier in
    /// the same batch; the chosen id is added to it.
    pub fn resolve_for_import(
        &self,
        desired: &str,
        mode: ImportMode,
        taken: &mut HashSet<Slug>,
    ) -> Result<Slug, SlugError> {
        let base = normalize(desired)?;
        let id = match mode {
            ImportMode::Merge => base,
            ImportMode::CreateOnly if !taken.contains(&base) => base,
            ImportMode::CreateOnly => {
                let mut found = None;
                for n in self.suffixes() {
                    let candidate = base.with_suffix(n);
                    if !taken.contains(&candidate) {
                        found = Some(candidate);
                        break;
                    }
                }
                found.ok_or_else(|| SlugError::ResolutionExhausted {
                    base: base.clone(),
                    attempts: self.max_probes,
                })?
            }
        };
        taken.insert(id.clone());
        Ok(id)
    }

    async fn decide_conflict<O, C>(
        &self,
        base: Slug,
        own: Option<&Slug>,
        oracle: &O,
        resolver: &C,
    ) -> Result<Slug, SlugError>
    where
        O: ExistenceOracle + ?Sized,
        C: ConflictResolver + ?Sized,
    {
        match resolver.decide(&base) {
            ConflictDecision::Overwrite => {
                debug!(id = %base, "Conflict resolved by overwrite");
                Ok(base)
            }
            ConflictDecision::Suffix => self.first_free_suffix(&base, own, oracle).await,
            ConflictDecision::Cancel => Err(SlugError::Cancelled { candidate: base }),
        }
    }

    /// Probe `base-2`, `base-3`, ... A record's own current id counts as free.
    async fn first_free_suffix<O>(
        &self,
        base: &Slug,
        own: Option<&Slug>,
        oracle: &O,
    ) -> Result<Slug, SlugError>
    where
        O: ExistenceOracle + ?Sized,
    {
        for n in self.suffixes() {
            let candidate = base.with_suffix(n);
            if own == Some(&candidate) || !oracle.exists(&candidate).await? {
                debug!(base = %base, id = %candidate, "Resolved suffix");
                return Ok(candidate);
            }
        }
        Err(SlugError::ResolutionExhausted {
            base: base.clone(),
            attempts: self.max_probes,
        })
    }

    fn suffixes(&self) -> std::ops::Range<u32> {
        FIRST_SUFFIX..FIRST_SUFFIX.saturating_add(self.max_probes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn slug(s: &str) -> Slug {
        Slug::parse(s).unwrap()
    }

    fn taken(ids: &[&str]) -> HashSet<Slug> {
        ids.iter().map(|s| slug(s)).collect()
    }

    #[test]
    fn test_normalize_examples() {
        assert_eq!(normalize("Espada Élfica!").unwrap().as_str(), "espada-elfica");
        assert_eq!(normalize("  Ação   Rápida ").unwrap().as_str(), "acao-rapida");
        assert_eq!(normalize("--Orc__Chief--").unwrap().as_str(), "orcchief");
        assert_eq!(normalize("Goblin - 2").unwrap().as_str(), "goblin-2");
        assert_eq!(normalize("Çà et là").unwrap().as_str(), "ca-et-la");
        assert_eq!(normalize("R2 D2").unwrap().as_str(), "r2-d2");
    }

    #[test]
    fn test_normalize_rejects_empty() {
        assert!(matches!(
            normalize("   "),
            Err(SlugError::InvalidIdentifier { .. })
        ));
        assert!(matches!(
            normalize("!!! ???"),
            Err(SlugError::InvalidIdentifier { .. })
        ));
        assert!(normalize("").is_err());
    }

    #[test]
    fn test_parse_requires_normal_form() {
        assert!(Slug::parse("goblin-2").is_ok());
        assert!(Slug::parse("Goblin").is_err());
        assert!(Slug::parse("goblin--2").is_err());
        assert!(serde_json::from_value::<Slug>(json!("orc")).is_ok());
        assert!(serde_json::from_value::<Slug>(json!("Orc King")).is_err());
    }

    #[tokio::test]
    async fn test_create_unused_returns_desired() {
        let resolver = SlugResolver::default();
        let store = taken(&[]);
        let id = resolver
            .resolve_for_create("Goblin", &store, &ConflictDecision::Cancel)
            .await
            .unwrap();
        assert_eq!(id.as_str(), "goblin");
    }

    #[tokio::test]
    async fn test_create_conflict_suffix() {
        let resolver = SlugResolver::default();
        let store = taken(&["goblin", "goblin-2"]);
        let id = resolver
            .resolve_for_create("goblin", &store, &ConflictDecision::Suffix)
            .await
            .unwrap();
        assert_eq!(id.as_str(), "goblin-3");
    }

    #[tokio::test]
    async fn test_create_conflict_overwrite_and_cancel() {
        let resolver = SlugResolver::default();
        let store = taken(&["goblin"]);
        let id = resolver
            .resolve_for_create("Goblin", &store, &ConflictDecision::Overwrite)
            .await
            .unwrap();
        assert_eq!(id.as_str(), "goblin");

        let err = resolver
            .resolve_for_create("Goblin", &store, &ConflictDecision::Cancel)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            SlugError::Cancelled {
                candidate: slug("goblin")
            }
        );
    }

    #[tokio::test]
    async fn test_create_decision_sees_candidate() {
        let resolver = SlugResolver::default();
        let store = taken(&["orc"]);
        let seen = std::sync::Mutex::new(Vec::new());
        let decide = |candidate: &Slug| {
            seen.lock().unwrap().push(candidate.to_string());
            ConflictDecision::Suffix
        };
        let id = resolver.resolve_for_create("Orc", &store, &decide).await.unwrap();
        assert_eq!(id.as_str(), "orc-2");
        assert_eq!(*seen.lock().unwrap(), vec!["orc".to_string()]);
    }

    #[tokio::test]
    async fn test_create_exhausted() {
        let resolver = SlugResolver::new(3);
        let store = taken(&["imp", "imp-2", "imp-3", "imp-4"]);
        let err = resolver
            .resolve_for_create("imp", &store, &ConflictDecision::Suffix)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            SlugError::ResolutionExhausted {
                base: slug("imp"),
                attempts: 3
            }
        );
    }

    #[tokio::test]
    async fn test_default_bound_is_199_probes() {
        let resolver = SlugResolver::default();
        let mut ids = vec!["bat".to_string()];
        ids.extend((2..=200).map(|n| format!("bat-{n}")));
        let store: HashSet<Slug> = ids.iter().map(|s| slug(s)).collect();
        let err = resolver
            .resolve_for_create("bat", &store, &ConflictDecision::Suffix)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            SlugError::ResolutionExhausted { attempts: 199, .. }
        ));

        let mut store = store;
        store.remove(&slug("bat-200"));
        let id = resolver
            .resolve_for_create("bat", &store, &ConflictDecision::Suffix)
            .await
            .unwrap();
        assert_eq!(id.as_str(), "bat-200");
    }

    #[tokio::test]
    async fn test_rename_moves_record_and_back_refs() {
        let resolver = SlugResolver::default();
        let store = taken(&["goblin", "orc"]);
        let record = json!({ "name": "Orc" });
        let refs = [BackReference::new("assignments/p1/sheetId")];

        let plan = resolver
            .resolve_for_rename(
                "sheets",
                &slug("goblin"),
                "Orc",
                &record,
                &refs,
                &store,
                &ConflictDecision::Suffix,
            )
            .await
            .unwrap();

        assert!(plan.is_rename());
        assert_eq!(plan.id.as_str(), "orc-2");
        assert_eq!(plan.writes.get("sheets/goblin"), Some(&Value::Null));
        assert_eq!(plan.writes.get("sheets/orc-2"), Some(&record));
        assert_eq!(
            plan.writes.get("assignments/p1/sheetId"),
            Some(&json!("orc-2"))
        );
        assert_eq!(plan.writes.len(), 3);
    }

    #[tokio::test]
    async fn test_rename_to_same_slug_is_in_place() {
        let resolver = SlugResolver::default();
        let store = taken(&["goblin"]);
        let record = json!({ "name": "GOBLIN" });
        let refs = [BackReference::new("assignments/p1/sheetId")];

        let plan = resolver
            .resolve_for_rename(
                "sheets",
                &slug("goblin"),
                "GOBLIN",
                &record,
                &refs,
                &store,
                &ConflictDecision::Cancel,
            )
            .await
            .unwrap();

        assert!(!plan.is_rename());
        assert_eq!(plan.writes.len(), 1);
        assert_eq!(plan.writes.get("sheets/goblin"), Some(&record));
    }

    #[tokio::test]
    async fn test_rename_suffix_treats_own_id_as_free() {
        let resolver = SlugResolver::default();
        let store = taken(&["goblin", "goblin-2"]);
        let plan = resolver
            .resolve_for_rename(
                "sheets",
                &slug("goblin-2"),
                "Goblin",
                &json!({ "name": "Goblin" }),
                &[],
                &store,
                &ConflictDecision::Suffix,
            )
            .await
            .unwrap();
        assert_eq!(plan.id.as_str(), "goblin-2");
        assert!(!plan.is_rename());
    }

    #[test]
    fn test_import_create_only_within_batch() {
        let resolver = SlugResolver::default();
        let mut ids = HashSet::new();
        let a = resolver
            .resolve_for_import("Goblin", ImportMode::CreateOnly, &mut ids)
            .unwrap();
        let b = resolver
            .resolve_for_import("goblin", ImportMode::CreateOnly, &mut ids)
            .unwrap();
        assert_eq!(a.as_str(), "goblin");
        assert_eq!(b.as_str(), "goblin-2");
        assert_eq!(ids.len(), 2);
    }

    #[test]
    fn test_import_merge_reuses_existing() {
        let resolver = SlugResolver::default();
        let mut ids = taken(&["goblin"]);
        let id = resolver
            .resolve_for_import("Goblin", ImportMode::Merge, &mut ids)
            .unwrap();
        assert_eq!(id.as_str(), "goblin");
        assert_eq!(ids.len(), 1);
    }

    #[test]
    fn test_import_mode_parse() {
        assert_eq!("merge".parse::<ImportMode>().unwrap(), ImportMode::Merge);
        assert_eq!(
            "create-only".parse::<ImportMode>().unwrap(),
            ImportMode::CreateOnly
        );
        assert_eq!(
            "upsert".parse::<ImportMode>(),
            Err(SlugError::UnknownImportMode("upsert".to_string()))
        );
        assert_eq!(
            serde_json::to_value(ImportMode::CreateOnly).unwrap(),
            json!("CREATE_ONLY")
        );
    }
}
