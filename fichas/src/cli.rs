//! Command-line parsing.

use fichas_core::{
    Attribute, ConflictDecision, EntryCollection, EntryError, EntryRef, Grade, GradeError,
    ImportMode, Slug, SlugError,
};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum CliError {
    #[error("No command given (try `fichas help`)")]
    MissingCommand,

    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    #[error("{0} requires a value")]
    MissingValue(String),

    #[error("Missing required option {0}")]
    MissingOption(&'static str),

    #[error("Invalid value for {flag}: {reason}")]
    InvalidValue { flag: String, reason: String },

    #[error("Unexpected argument: {0}")]
    Unexpected(String),
}

/// What a roll is made against.
#[derive(Debug, Clone, PartialEq)]
pub enum Subject {
    Attribute(Attribute),
    Entry(EntryRef),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Help,
    Roll {
        sheet: PathBuf,
        subject: Subject,
        armed: Vec<EntryRef>,
        seed: Option<u64>,
    },
    Check {
        sheet: PathBuf,
        subject: Subject,
        grade: Grade,
        armed: Vec<EntryRef>,
        seed: Option<u64>,
    },
    Stats {
        sheet: PathBuf,
        armed: Vec<EntryRef>,
    },
    Die {
        sides: u32,
        seed: Option<u64>,
    },
    Sample {
        name: String,
    },
    Validate {
        payload: PathBuf,
    },
    Import {
        payload: PathBuf,
        store: PathBuf,
        mode: ImportMode,
    },
    Create {
        store: PathBuf,
        name: String,
        on_conflict: ConflictDecision,
    },
    Rename {
        store: PathBuf,
        id: Slug,
        name: String,
        on_conflict: ConflictDecision,
    },
}

/// Options shared by every command, collected in one pass.
#[derive(Debug, Default)]
struct Options {
    positional: Vec<String>,
    sheet: Option<PathBuf>,
    store: Option<PathBuf>,
    attr: Option<Attribute>,
    entry: Option<EntryRef>,
    armed: Vec<EntryRef>,
    seed: Option<u64>,
    grade: Option<Grade>,
    mode: Option<ImportMode>,
    name: Option<String>,
    id: Option<Slug>,
    on_conflict: Option<ConflictDecision>,
}

impl Options {
    fn subject(&self) -> Result<Subject, CliError> {
        match (&self.attr, &self.entry) {
            (Some(a), None) => Ok(Subject::Attribute(*a)),
            (None, Some(e)) => Ok(Subject::Entry(e.clone())),
            (Some(_), Some(_)) => Err(CliError::InvalidValue {
                flag: "--attr/--entry".to_string(),
                reason: "give only one".to_string(),
            }),
            (None, None) => Err(CliError::MissingOption("--attr or --entry")),
        }
    }

    fn sheet(&self) -> Result<PathBuf, CliError> {
        self.sheet.clone().ok_or(CliError::MissingOption("--sheet"))
    }

    fn store(&self) -> Result<PathBuf, CliError> {
        self.store.clone().ok_or(CliError::MissingOption("--store"))
    }

    fn name(&self) -> Result<String, CliError> {
        self.name.clone().ok_or(CliError::MissingOption("--name"))
    }

    fn single_positional(&self, what: &'static str) -> Result<String, CliError> {
        match self.positional.as_slice() {
            [one] => Ok(one.clone()),
            [] => Err(CliError::MissingOption(what)),
            [_, extra, ..] => Err(CliError::Unexpected(extra.clone())),
        }
    }

    fn no_positional(&self) -> Result<(), CliError> {
        match self.positional.first() {
            Some(extra) => Err(CliError::Unexpected(extra.clone())),
            None => Ok(()),
        }
    }
}

/// Parse `args` as produced by `std::env::args()`, program name included.
pub fn parse_args(args: &[String]) -> Result<Command, CliError> {
    let Some(command) = args.get(1) else {
        return Err(CliError::MissingCommand);
    };
    if matches!(command.as_str(), "help" | "--help" | "-h") {
        return Ok(Command::Help);
    }

    let opts = parse_options(&args[2..])?;
    match command.as_str() {
        "roll" => {
            opts.no_positional()?;
            Ok(Command::Roll {
                sheet: opts.sheet()?,
                subject: opts.subject()?,
                armed: opts.armed.clone(),
                seed: opts.seed,
            })
        }
        "check" => {
            opts.no_positional()?;
            Ok(Command::Check {
                sheet: opts.sheet()?,
                subject: opts.subject()?,
                grade: opts.grade.unwrap_or_default(),
                armed: opts.armed.clone(),
                seed: opts.seed,
            })
        }
        "stats" => {
            opts.no_positional()?;
            Ok(Command::Stats {
                sheet: opts.sheet()?,
                armed: opts.armed.clone(),
            })
        }
        "die" => {
            let notation = opts.single_positional("<dN>")?;
            let sides =
                fichas_core::dice::parse_sides(&notation).map_err(|e| CliError::InvalidValue {
                    flag: "<dN>".to_string(),
                    reason: e.to_string(),
                })?;
            Ok(Command::Die {
                sides,
                seed: opts.seed,
            })
        }
        "sample" => Ok(Command::Sample {
            name: opts.name.clone().unwrap_or_else(|| "Aventureira".to_string()),
        }),
        "validate" => Ok(Command::Validate {
            payload: PathBuf::from(opts.single_positional("<payload.json>")?),
        }),
        "import" => Ok(Command::Import {
            payload: PathBuf::from(opts.single_positional("<payload.json>")?),
            store: opts.store()?,
            mode: opts.mode.unwrap_or_default(),
        }),
        "create" => {
            opts.no_positional()?;
            Ok(Command::Create {
                store: opts.store()?,
                name: opts.name()?,
                on_conflict: opts.on_conflict.unwrap_or(ConflictDecision::Cancel),
            })
        }
        "rename" => {
            opts.no_positional()?;
            Ok(Command::Rename {
                store: opts.store()?,
                id: opts.id.clone().ok_or(CliError::MissingOption("--id"))?,
                name: opts.name()?,
                on_conflict: opts.on_conflict.unwrap_or(ConflictDecision::Cancel),
            })
        }
        other => Err(CliError::UnknownCommand(other.to_string())),
    }
}

fn parse_options(args: &[String]) -> Result<Options, CliError> {
    let mut opts = Options::default();

    let mut i = 0;
    while i < args.len() {
        let flag = args[i].as_str();
        if !flag.starts_with("--") {
            opts.positional.push(args[i].clone());
            i += 1;
            continue;
        }

        let value = args
            .get(i + 1)
            .ok_or_else(|| CliError::MissingValue(flag.to_string()))?;
        let invalid = |reason: String| CliError::InvalidValue {
            flag: flag.to_string(),
            reason,
        };

        match flag {
            "--sheet" => opts.sheet = Some(PathBuf::from(value)),
            "--store" => opts.store = Some(PathBuf::from(value)),
            "--attr" => {
                let attr = value.parse().map_err(|e: EntryError| invalid(e.to_string()))?;
                opts.attr = Some(attr);
            }
            "--entry" => opts.entry = Some(parse_entry_ref(value).map_err(invalid)?),
            "--arm" => opts.armed.push(parse_entry_ref(value).map_err(invalid)?),
            "--seed" => {
                let seed = value
                    .parse()
                    .map_err(|_| invalid("expected an integer".to_string()))?;
                opts.seed = Some(seed);
            }
            "--grade" => {
                let grade = value.parse().map_err(|e: GradeError| invalid(e.to_string()))?;
                opts.grade = Some(grade);
            }
            "--mode" => {
                let mode = value.parse().map_err(|e: SlugError| invalid(e.to_string()))?;
                opts.mode = Some(mode);
            }
            "--name" => opts.name = Some(value.clone()),
            "--id" => opts.id = Some(Slug::parse(value).map_err(|e| invalid(e.to_string()))?),
            "--on-conflict" => opts.on_conflict = Some(parse_decision(value).map_err(invalid)?),
            other => return Err(CliError::Unexpected(other.to_string())),
        }
        i += 2;
    }

    Ok(opts)
}

/// `items/espada-elfica`, or a display name after the slash.
fn parse_entry_ref(raw: &str) -> Result<EntryRef, String> {
    let (collection, name) = raw
        .split_once('/')
        .ok_or_else(|| format!("expected <collection>/<id>, got '{raw}'"))?;
    let collection: EntryCollection = collection
        .parse()
        .map_err(|e: EntryError| e.to_string())?;
    let id = Slug::from_name(name).map_err(|e| e.to_string())?;
    Ok(EntryRef::new(collection, id))
}

fn parse_decision(raw: &str) -> Result<ConflictDecision, String> {
    match raw.to_lowercase().as_str() {
        "overwrite" => Ok(ConflictDecision::Overwrite),
        "suffix" => Ok(ConflictDecision::Suffix),
        "cancel" => Ok(ConflictDecision::Cancel),
        other => Err(format!("expected overwrite, suffix or cancel, got '{other}'")),
    }
}

pub fn print_help() {
    println!("fichas - character sheet engine");
    println!();
    println!("USAGE:");
    println!("  fichas <COMMAND> [OPTIONS]");
    println!();
    println!("COMMANDS:");
    println!("  roll      Roll an attribute or entry of a sheet");
    println!("  check     GM check: roll and compare against a grade");
    println!("  stats     Derived statistics of a sheet");
    println!("  die       Roll a single free-form die (d4, d20, ...)");
    println!("  sample    Print a sample sheet");
    println!("  validate  Validate an import payload");
    println!("  import    Import a payload into a store file");
    println!("  create    Create an empty sheet in a store file");
    println!("  rename    Rename a sheet in a store file");
    println!();
    println!("OPTIONS:");
    println!("  --sheet <FILE>         Sheet JSON (roll, check, stats)");
    println!("  --attr <QI|FOR|DEX|VIG>");
    println!("  --entry <COLL>/<ID>    e.g. items/espada-elfica");
    println!("  --arm <COLL>/<ID>      Arm a passive entry (repeatable)");
    println!("  --grade <G0..G6>       Check grade (default G0)");
    println!("  --seed <N>             Seed the dice for a reproducible roll");
    println!("  --store <FILE>         Flat path->value JSON store");
    println!("  --mode <merge|create-only>");
    println!("  --name <NAME>");
    println!("  --id <ID>              Current id of the sheet to rename");
    println!("  --on-conflict <overwrite|suffix|cancel>  (default cancel)");
    println!();
    println!("Logging goes to stderr; set RUST_LOG=debug for detail.");
}
