//! Bulk import of character sheets.
//!
//! An import payload is `{ "sheets": [ ... ] }` where each sheet carries its
//! entries as arrays. [`validate`] walks the whole payload and reports every
//! problem it finds; only a clean report may be handed to [`merge`], which
//! assigns identifiers and produces one [`WriteSet`] for the whole batch.

use crate::character::{
    Activation, Attribute, Attributes, Character, Entry, EntryCollection, ModMode, Modifier,
    StatKey, MAX_ATTRIBUTE_MAGNITUDE,
};
use crate::config::EngineConfig;
use crate::slug::{normalize, ImportMode, Slug, SlugError};
use crate::store::{record_path, Snapshot, StoreError, WriteSet};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::HashSet;
use std::fmt;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("Import rejected with {} validation error(s)", .0.errors.len())]
    Invalid(ValidationReport),

    #[error("Identifier error: {0}")]
    Slug(#[from] SlugError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Failed to encode record: {0}")]
    Encode(#[from] serde_json::Error),
}

/// One structural problem, located by a JSON-ish path such as
/// `sheets[2].items[0].modMode`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationError {
    pub path: String,
    pub message: String,
}

impl ValidationError {
    fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            f.write_str(&self.message)
        } else {
            write!(f, "{}: {}", self.path, self.message)
        }
    }
}

/// A sheet that passed validation, entries still in payload order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sheet_id: Option<String>,
    pub name: String,
    pub attributes: Attributes,
    pub mental: i64,
    pub items: Vec<Entry>,
    pub advantages: Vec<Entry>,
    pub disadvantages: Vec<Entry>,
}

impl NormalizedRecord {
    /// `sheetId` when supplied, otherwise the sheet name.
    pub fn desired_id(&self) -> &str {
        self.sheet_id.as_deref().unwrap_or(&self.name)
    }

    pub fn entries(&self, collection: EntryCollection) -> &[Entry] {
        match collection {
            EntryCollection::Items => &self.items,
            EntryCollection::Advantages => &self.advantages,
            EntryCollection::Disadvantages => &self.disadvantages,
        }
    }

    fn entries_mut(&mut self, collection: EntryCollection) -> &mut Vec<Entry> {
        match collection {
            EntryCollection::Items => &mut self.items,
            EntryCollection::Advantages => &mut self.advantages,
            EntryCollection::Disadvantages => &mut self.disadvantages,
        }
    }
}

/// Outcome of [`validate`]. `ok` is true iff `errors` is empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    pub ok: bool,
    pub errors: Vec<ValidationError>,
    pub count: usize,
    pub normalized: Vec<NormalizedRecord>,
}

impl ValidationReport {
    fn rejected(message: impl Into<String>) -> Self {
        Self::build(vec![ValidationError::new("", message)], Vec::new())
    }

    fn build(errors: Vec<ValidationError>, normalized: Vec<NormalizedRecord>) -> Self {
        Self {
            ok: errors.is_empty(),
            count: normalized.len(),
            errors,
            normalized,
        }
    }
}

// ============================================================================
// Validation
// ============================================================================

/// Validate raw payload text.
pub fn validate_json(text: &str, config: &EngineConfig) -> ValidationReport {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return ValidationReport::rejected("empty payload");
    }
    match serde_json::from_str::<Value>(trimmed) {
        Ok(payload) => validate(&payload, config),
        Err(e) => ValidationReport::rejected(format!("invalid JSON: {e}")),
    }
}

/// Validate a parsed payload, collecting every error.
pub fn validate(payload: &Value, config: &EngineConfig) -> ValidationReport {
    let Some(root) = payload.as_object() else {
        return ValidationReport::rejected("root must be an object");
    };
    let Some(sheets) = root.get("sheets").and_then(Value::as_array) else {
        return ValidationReport::rejected("field 'sheets' must be an array");
    };

    let mut errors = Vec::new();
    let mut normalized = Vec::new();
    for (idx, sheet) in sheets.iter().enumerate() {
        let before = errors.len();
        let record = validate_sheet(&format!("sheets[{idx}]"), sheet, config, &mut errors);
        if let Some(record) = record.filter(|_| errors.len() == before) {
            normalized.push(record);
        }
    }

    let report = ValidationReport::build(errors, normalized);
    debug!(
        sheets = sheets.len(),
        errors = report.errors.len(),
        "Validated import payload"
    );
    report
}

fn validate_sheet(
    path: &str,
    value: &Value,
    config: &EngineConfig,
    errors: &mut Vec<ValidationError>,
) -> Option<NormalizedRecord> {
    let Some(obj) = value.as_object() else {
        errors.push(ValidationError::new(path, "must be an object"));
        return None;
    };

    let name = required_name(path, obj, config.max_sheet_name_len, errors);

    let sheet_id = match obj.get("sheetId") {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) if s.trim().is_empty() => None,
        Some(Value::String(s)) => {
            check_identifier(&format!("{path}.sheetId"), s, errors);
            Some(s.trim().to_string())
        }
        Some(_) => {
            errors.push(ValidationError::new(format!("{path}.sheetId"), "must be a string"));
            None
        }
    };

    let mut attributes = Attributes::default();
    match obj.get("attributes") {
        None | Some(Value::Null) => {}
        Some(Value::Object(attrs)) => {
            for attribute in Attribute::all() {
                let key = attribute.abbreviation();
                match attrs.get(key) {
                    None | Some(Value::Null) => {}
                    Some(v) => match v.as_f64().filter(|n| n.is_finite()) {
                        Some(n) if n.abs() <= MAX_ATTRIBUTE_MAGNITUDE => {
                            attributes.set(attribute, n)
                        }
                        Some(_) => errors.push(ValidationError::new(
                            format!("{path}.attributes.{key}"),
                            format!("must be between -{m} and {m}", m = MAX_ATTRIBUTE_MAGNITUDE),
                        )),
                        None => errors.push(ValidationError::new(
                            format!("{path}.attributes.{key}"),
                            "must be a number",
                        )),
                    },
                }
            }
        }
        Some(_) => errors.push(ValidationError::new(
            format!("{path}.attributes"),
            "must be an object",
        )),
    }

    let mental =
        optional_integer(&format!("{path}.mental"), obj.get("mental"), errors).unwrap_or(0);

    let mut record = NormalizedRecord {
        sheet_id,
        name: name.unwrap_or_default(),
        attributes,
        mental,
        items: Vec::new(),
        advantages: Vec::new(),
        disadvantages: Vec::new(),
    };

    for collection in EntryCollection::all() {
        let key = collection.key();
        match obj.get(key) {
            None | Some(Value::Null) => {}
            Some(Value::Array(raw)) => {
                for (i, entry) in raw.iter().enumerate() {
                    let entry_path = format!("{path}.{key}[{i}]");
                    if let Some(e) = validate_entry(&entry_path, entry, config, errors) {
                        record.entries_mut(collection).push(e);
                    }
                }
            }
            Some(_) => errors.push(ValidationError::new(
                format!("{path}.{key}"),
                "must be an array",
            )),
        }
    }

    Some(record)
}

fn validate_entry(
    path: &str,
    value: &Value,
    config: &EngineConfig,
    errors: &mut Vec<ValidationError>,
) -> Option<Entry> {
    let Some(obj) = value.as_object() else {
        errors.push(ValidationError::new(path, "must be an object"));
        return None;
    };
    let before = errors.len();

    let name = required_name(path, obj, config.max_entry_name_len, errors);

    let activation = match obj.get("type") {
        Some(Value::String(s)) => s
            .parse::<Activation>()
            .map_err(|_| {
                errors.push(ValidationError::new(
                    format!("{path}.type"),
                    format!("must be ACTIVE or PASSIVE, got '{s}'"),
                ))
            })
            .ok(),
        _ => {
            errors.push(ValidationError::new(
                format!("{path}.type"),
                "is required (ACTIVE or PASSIVE)",
            ));
            None
        }
    };

    let attribute_base = match obj.get("attributeBase") {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => s
            .parse::<StatKey>()
            .map_err(|_| {
                errors.push(ValidationError::new(
                    format!("{path}.attributeBase"),
                    format!("unknown attribute or stat tag '{s}'"),
                ))
            })
            .ok(),
        Some(_) => {
            errors.push(ValidationError::new(
                format!("{path}.attributeBase"),
                "must be a string or null",
            ));
            None
        }
    };

    let mod_mode = match obj.get("modMode") {
        None | Some(Value::Null) => Some(ModMode::None),
        Some(Value::String(s)) => s
            .parse::<ModMode>()
            .map_err(|_| {
                errors.push(ValidationError::new(
                    format!("{path}.modMode"),
                    format!("must be NONE, ADD or MULT, got '{s}'"),
                ))
            })
            .ok(),
        Some(_) => {
            errors.push(ValidationError::new(format!("{path}.modMode"), "must be a string"));
            None
        }
    };

    let mod_value = match obj.get("modValue") {
        None | Some(Value::Null) => None,
        Some(v) => match v.as_f64().filter(|n| n.is_finite()) {
            Some(n) => Some(n),
            None => {
                errors.push(ValidationError::new(
                    format!("{path}.modValue"),
                    "must be a finite number",
                ));
                None
            }
        },
    };

    let value_given = !matches!(obj.get("modValue"), None | Some(Value::Null));
    let modifier = match mod_mode {
        Some(mode) if mode != ModMode::None && mod_value.is_none() => {
            if !value_given {
                errors.push(ValidationError::new(
                    format!("{path}.modValue"),
                    format!("is required when modMode is {mode}"),
                ));
            }
            None
        }
        Some(mode) => Modifier::from_parts(mode, mod_value).ok(),
        None => None,
    };

    let uses_current =
        optional_integer(&format!("{path}.usesCurrent"), obj.get("usesCurrent"), errors);
    let uses_max = optional_integer(&format!("{path}.usesMax"), obj.get("usesMax"), errors);

    let notes = match obj.get("notes") {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s.clone()),
        Some(_) => {
            errors.push(ValidationError::new(format!("{path}.notes"), "must be a string"));
            None
        }
    };

    if errors.len() != before {
        return None;
    }

    Some(Entry {
        name: name?,
        activation: activation?,
        attribute_base,
        modifier: modifier?,
        uses_current,
        uses_max,
        notes,
    })
}

/// A trimmed, non-empty, bounded name that yields a usable identifier.
fn required_name(
    path: &str,
    obj: &Map<String, Value>,
    max_len: usize,
    errors: &mut Vec<ValidationError>,
) -> Option<String> {
    let field = format!("{path}.name");
    let name = match obj.get("name") {
        Some(Value::String(s)) if !s.trim().is_empty() => s.trim().to_string(),
        _ => {
            errors.push(ValidationError::new(field, "is required (non-empty string)"));
            return None;
        }
    };

    let len = name.chars().count();
    if len > max_len {
        errors.push(ValidationError::new(
            field,
            format!("is {len} characters long (max {max_len})"),
        ));
        return None;
    }
    if !check_identifier(&field, &name, errors) {
        return None;
    }
    Some(name)
}

fn check_identifier(path: &str, text: &str, errors: &mut Vec<ValidationError>) -> bool {
    match normalize(text) {
        Ok(_) => true,
        Err(e) => {
            errors.push(ValidationError::new(path, e.to_string()));
            false
        }
    }
}

/// Whole floats that convert to `i64` without clamping.
const I64_RANGE: std::ops::Range<f64> = i64::MIN as f64..i64::MAX as f64;

/// Absent and null read as `None`; anything else must be a whole number.
fn optional_integer(
    path: &str,
    value: Option<&Value>,
    errors: &mut Vec<ValidationError>,
) -> Option<i64> {
    match value {
        None | Some(Value::Null) => None,
        Some(v) => {
            let int = v.as_i64().or_else(|| {
                v.as_f64()
                    .filter(|n| n.fract() == 0.0 && I64_RANGE.contains(n))
                    .map(|n| n as i64)
            });
            if int.is_none() {
                errors.push(ValidationError::new(path, "must be an integer"));
            }
            int
        }
    }
}

// ============================================================================
// Merge
// ============================================================================

/// Assign identifiers to validated records and build the batch write.
///
/// Sheet ids are resolved against `existing` plus the ids claimed earlier in
/// the batch. Entry ids are resolved within their own sheet and collection,
/// always by suffixing. `now_ms` stamps `updatedAt`; an overwritten sheet
/// keeps its stored `createdAt`.
pub fn merge(
    records: &[NormalizedRecord],
    mode: ImportMode,
    existing: &Snapshot,
    now_ms: i64,
    config: &EngineConfig,
) -> Result<WriteSet, ImportError> {
    let resolver = config.slug_resolver();
    let mut taken: HashSet<Slug> = existing.keys().cloned().collect();
    let mut batch: HashSet<Slug> = HashSet::new();
    let mut writes = WriteSet::new();

    for record in records {
        let id = resolver.resolve_for_import(record.desired_id(), mode, &mut taken)?;
        if !batch.insert(id.clone()) {
            warn!(
                id = %id,
                name = %record.name,
                "Two imported sheets share an id; the later one wins"
            );
        }

        let mut character = Character::new(record.name.clone());
        character.attributes = record.attributes;
        character.mental = record.mental;
        for collection in EntryCollection::all() {
            let mut local = HashSet::new();
            for entry in record.entries(collection) {
                let entry_id =
                    resolver.resolve_for_import(&entry.name, ImportMode::CreateOnly, &mut local)?;
                character.insert_entry(collection, entry_id, entry.clone());
            }
        }

        let created_at = existing
            .get(&id)
            .and_then(|prev| prev.get("createdAt"))
            .filter(|v| !v.is_null())
            .cloned()
            .unwrap_or_else(|| json!(now_ms));

        let mut value = serde_json::to_value(&character)?;
        if let Value::Object(fields) = &mut value {
            fields.insert("createdAt".to_string(), created_at);
            fields.insert("updatedAt".to_string(), json!(now_ms));
        }

        debug!(id = %id, entries = character.entries().count(), "Merged sheet");
        writes.set(record_path(&config.characters_path, &id), value);
    }

    Ok(writes)
}

/// Validate then merge. Merge is never attempted on a failed report.
pub fn import(
    payload: &Value,
    mode: ImportMode,
    existing: &Snapshot,
    now_ms: i64,
    config: &EngineConfig,
) -> Result<WriteSet, ImportError> {
    let report = validate(payload, config);
    run_pipeline(report, mode, existing, now_ms, config)
}

/// [`import`] over raw payload text.
pub fn import_json(
    text: &str,
    mode: ImportMode,
    existing: &Snapshot,
    now_ms: i64,
    config: &EngineConfig,
) -> Result<WriteSet, ImportError> {
    let report = validate_json(text, config);
    run_pipeline(report, mode, existing, now_ms, config)
}

fn run_pipeline(
    report: ValidationReport,
    mode: ImportMode,
    existing: &Snapshot,
    now_ms: i64,
    config: &EngineConfig,
) -> Result<WriteSet, ImportError> {
    if !report.ok {
        warn!(errors = report.errors.len(), "Import rejected by validation");
        return Err(ImportError::Invalid(report));
    }
    let writes = merge(&report.normalized, mode, existing, now_ms, config)?;
    info!(sheets = writes.len(), ?mode, "Import merged");
    Ok(writes)
}
