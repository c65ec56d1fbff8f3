//! Command execution. Every command produces a JSON value for stdout.

use crate::cli::{Command, Subject};
use anyhow::{anyhow, bail, Context, Result};
use fichas_core::dice;
use fichas_core::store::record_path;
use fichas_core::{
    adjusted_derived_stats, compute_derived_stats, create_sample_character, validate_json,
    ArmedSet, BackReference, Character, EngineConfig, Entry, EntryRef, ImportError, MemoryStore,
    RuleEngine, Slug, WriteSet,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{info, warn};

/// Current time in epoch milliseconds.
pub fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

pub async fn run(command: Command, config: &EngineConfig) -> Result<Value> {
    match command {
        Command::Help => Ok(Value::Null),
        Command::Roll {
            sheet,
            subject,
            armed,
            seed,
        } => {
            let sheet = load_sheet(&sheet).await?;
            let armed: ArmedSet = armed.into_iter().collect();
            let engine = RuleEngine::new();
            let mut rng = rng_from(seed);
            let roll = match &subject {
                Subject::Attribute(a) => {
                    engine.roll_attribute_with_rng(*a, &sheet, &armed, &mut rng)
                }
                Subject::Entry(r) => {
                    let entry = find_entry(&sheet, r)?;
                    engine.roll_entry_with_rng(entry, &sheet, &armed, &mut rng)
                }
            };
            info!("{roll}");
            Ok(serde_json::to_value(&roll)?)
        }
        Command::Check {
            sheet,
            subject,
            grade,
            armed,
            seed,
        } => {
            let sheet = load_sheet(&sheet).await?;
            let armed: ArmedSet = armed.into_iter().collect();
            let engine = RuleEngine::new();
            let mut rng = rng_from(seed);
            let check = match &subject {
                Subject::Attribute(a) => {
                    engine.check_attribute(*a, grade, &sheet, &armed, &mut rng)
                }
                Subject::Entry(r) => {
                    let entry = find_entry(&sheet, r)?;
                    engine.check_entry(entry, grade, &sheet, &armed, &mut rng)
                }
            };
            info!(
                grade = %check.grade,
                target = check.target,
                success = check.success,
                "{}",
                check.roll
            );
            Ok(serde_json::to_value(&check)?)
        }
        Command::Stats { sheet, armed } => {
            let sheet = load_sheet(&sheet).await?;
            let armed: ArmedSet = armed.into_iter().collect();
            Ok(json!({
                "base": compute_derived_stats(&sheet.attributes),
                "adjusted": adjusted_derived_stats(&sheet, &armed),
            }))
        }
        Command::Die { sides, seed } => {
            let roll = dice::roll_die_with_rng(sides, &mut rng_from(seed))?;
            info!("{roll}");
            Ok(serde_json::to_value(roll)?)
        }
        Command::Sample { name } => Ok(serde_json::to_value(create_sample_character(&name))?),
        Command::Validate { payload } => {
            let text = read_text(&payload).await?;
            let report = validate_json(&text, config);
            for error in &report.errors {
                warn!("{error}");
            }
            Ok(serde_json::to_value(&report)?)
        }
        Command::Import {
            payload,
            store,
            mode,
        } => {
            let text = read_text(&payload).await?;
            let db = load_store(&store).await?;
            let writes = match db.import(&text, mode, now_ms(), config).await {
                Ok(writes) => writes,
                Err(ImportError::Invalid(report)) => {
                    for error in &report.errors {
                        warn!("{error}");
                    }
                    bail!("import rejected with {} validation error(s)", report.errors.len());
                }
                Err(e) => return Err(e.into()),
            };
            save_store(&store, &db).await?;
            Ok(json!({ "written": writes.paths().collect::<Vec<_>>() }))
        }
        Command::Create {
            store,
            name,
            on_conflict,
        } => {
            let db = load_store(&store).await?;
            let oracle = db.collection(config.characters_path.clone());
            let id = config
                .slug_resolver()
                .resolve_for_create(&name, &oracle, &on_conflict)
                .await?;

            let ts = now_ms();
            let mut record = serde_json::to_value(Character::new(name.trim()))?;
            if let Value::Object(fields) = &mut record {
                fields.insert("createdAt".to_string(), json!(ts));
                fields.insert("updatedAt".to_string(), json!(ts));
            }
            let mut writes = WriteSet::new();
            writes.set(record_path(&config.characters_path, &id), record);
            db.apply(&writes).await?;
            save_store(&store, &db).await?;
            info!(id = %id, "Created sheet");
            Ok(json!({ "id": id }))
        }
        Command::Rename {
            store,
            id,
            name,
            on_conflict,
        } => {
            let db = load_store(&store).await?;
            let path = record_path(&config.characters_path, &id);
            let mut record = db
                .get(&path)
                .await
                .ok_or_else(|| anyhow!("no sheet at {path}"))?;
            if let Value::Object(fields) = &mut record {
                fields.insert("name".to_string(), json!(name.trim()));
                fields.insert("updatedAt".to_string(), json!(now_ms()));
            }

            let back_refs = find_back_refs(&db.dump().await, &id);
            let oracle = db.collection(config.characters_path.clone());
            let plan = config
                .slug_resolver()
                .resolve_for_rename(
                    &config.characters_path,
                    &id,
                    &name,
                    &record,
                    &back_refs,
                    &oracle,
                    &on_conflict,
                )
                .await?;
            db.apply(&plan.writes).await?;
            save_store(&store, &db).await?;
            Ok(json!({
                "from": plan.from,
                "id": plan.id,
                "backReferences": back_refs.len(),
            }))
        }
    }
}

fn rng_from(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

fn find_entry<'a>(sheet: &'a Character, entry_ref: &EntryRef) -> Result<&'a Entry> {
    sheet
        .entry(entry_ref)
        .ok_or_else(|| anyhow!("sheet '{}' has no entry {entry_ref}", sheet.name))
}

/// Every `.../sheetId` leaf pointing at `id`.
fn find_back_refs(data: &BTreeMap<String, Value>, id: &Slug) -> Vec<BackReference> {
    data.iter()
        .filter(|(path, value)| path.ends_with("/sheetId") && value.as_str() == Some(id.as_str()))
        .map(|(path, _)| BackReference::new(path.clone()))
        .collect()
}

async fn read_text(path: &Path) -> Result<String> {
    tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("reading {}", path.display()))
}

async fn load_sheet(path: &Path) -> Result<Character> {
    let text = read_text(path).await?;
    serde_json::from_str(&text).with_context(|| format!("parsing sheet {}", path.display()))
}

/// Load a flat store file; a missing file is an empty store.
async fn load_store(path: &Path) -> Result<MemoryStore> {
    match tokio::fs::read_to_string(path).await {
        Ok(text) => {
            let data: BTreeMap<String, Value> = serde_json::from_str(&text)
                .with_context(|| format!("parsing store {}", path.display()))?;
            Ok(MemoryStore::from_map(data))
        }
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(MemoryStore::new()),
        Err(e) => Err(e).with_context(|| format!("reading {}", path.display())),
    }
}

async fn save_store(path: &Path, store: &MemoryStore) -> Result<()> {
    let text = serde_json::to_string_pretty(&store.dump().await)?;
    tokio::fs::write(path, text)
        .await
        .with_context(|| format!("writing {}", path.display()))
}
