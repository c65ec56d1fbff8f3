//! Engine configuration.

use crate::character::MAX_ENTRY_NAME_LEN;
use crate::slug::{SlugResolver, DEFAULT_MAX_SUFFIX_PROBES};
use serde::{Deserialize, Serialize};
use std::env;
use thiserror::Error;

pub const ENV_MAX_SUFFIX_PROBES: &str = "FICHAS_MAX_SUFFIX_PROBES";
pub const ENV_CHARACTERS_PATH: &str = "FICHAS_CHARACTERS_PATH";
pub const ENV_MAX_NAME_LEN: &str = "FICHAS_MAX_NAME_LEN";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("{var} must be a positive integer, got '{value}'")]
    InvalidNumber { var: &'static str, value: String },

    #[error("{var} must not be empty")]
    Empty { var: &'static str },
}

/// Limits and store layout used by slug resolution and import.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Suffixes tried (`-2`, `-3`, ...) before resolution gives up.
    pub max_suffix_probes: u32,
    /// Store path of the character collection.
    pub characters_path: String,
    pub max_entry_name_len: usize,
    pub max_sheet_name_len: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_suffix_probes: DEFAULT_MAX_SUFFIX_PROBES,
            characters_path: "sheets".to_string(),
            max_entry_name_len: MAX_ENTRY_NAME_LEN,
            max_sheet_name_len: MAX_ENTRY_NAME_LEN,
        }
    }
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults overridden by any `FICHAS_*` variables that are set.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| env::var(var).ok())
    }

    /// Same as [`EngineConfig::from_env`] over an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(value) = lookup(ENV_MAX_SUFFIX_PROBES) {
            config.max_suffix_probes = parse_positive(ENV_MAX_SUFFIX_PROBES, &value)?;
        }
        if let Some(value) = lookup(ENV_CHARACTERS_PATH) {
            let trimmed = value.trim().trim_matches('/');
            if trimmed.is_empty() {
                return Err(ConfigError::Empty {
                    var: ENV_CHARACTERS_PATH,
                });
            }
            config.characters_path = trimmed.to_string();
        }
        if let Some(value) = lookup(ENV_MAX_NAME_LEN) {
            let len: usize = parse_positive(ENV_MAX_NAME_LEN, &value)?;
            config.max_entry_name_len = len;
            config.max_sheet_name_len = len;
        }

        Ok(config)
    }

    pub fn with_max_suffix_probes(mut self, probes: u32) -> Self {
        self.max_suffix_probes = probes;
        self
    }

    pub fn with_characters_path(mut self, path: impl Into<String>) -> Self {
        self.characters_path = path.into();
        self
    }

    pub fn with_max_entry_name_len(mut self, len: usize) -> Self {
        self.max_entry_name_len = len;
        self
    }

    pub fn with_max_sheet_name_len(mut self, len: usize) -> Self {
        self.max_sheet_name_len = len;
        self
    }

    pub fn slug_resolver(&self) -> SlugResolver {
        SlugResolver::new(self.max_suffix_probes)
    }
}

fn parse_positive<T>(var: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr + PartialOrd + Default,
{
    match value.trim().parse::<T>() {
        Ok(n) if n > T::default() => Ok(n),
        _ => Err(ConfigError::InvalidNumber {
            var,
            value: value.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |var| map.get(var).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.max_suffix_probes, 199);
        assert_eq!(config.characters_path, "sheets");
        assert_eq!(config.max_entry_name_len, 80);
        assert_eq!(config.slug_resolver().max_probes(), 199);
    }

    #[test]
    fn test_from_lookup_overrides() {
        let config = EngineConfig::from_lookup(lookup(&[
            (ENV_MAX_SUFFIX_PROBES, "10"),
            (ENV_CHARACTERS_PATH, "/rooms/abc/sheets/"),
            (ENV_MAX_NAME_LEN, "40"),
        ]))
        .unwrap();
        assert_eq!(config.max_suffix_probes, 10);
        assert_eq!(config.characters_path, "rooms/abc/sheets");
        assert_eq!(config.max_sheet_name_len, 40);
    }

    #[test]
    fn test_from_lookup_rejects_bad_values() {
        assert!(matches!(
            EngineConfig::from_lookup(lookup(&[(ENV_MAX_SUFFIX_PROBES, "0")])),
            Err(ConfigError::InvalidNumber { .. })
        ));
        assert!(matches!(
            EngineConfig::from_lookup(lookup(&[(ENV_MAX_NAME_LEN, "many")])),
            Err(ConfigError::InvalidNumber { .. })
        ));
        assert_eq!(
            EngineConfig::from_lookup(lookup(&[(ENV_CHARACTERS_PATH, " / ")])),
            Err(ConfigError::Empty {
                var: ENV_CHARACTERS_PATH
            })
        );
    }

    #[test]
    fn test_builders() {
        let config = EngineConfig::new()
            .with_max_suffix_probes(5)
            .with_characters_path("npcs")
            .with_max_entry_name_len(20)
            .with_max_sheet_name_len(30);
        assert_eq!(config.max_suffix_probes, 5);
        assert_eq!(config.characters_path, "npcs");
        assert_eq!(config.max_entry_name_len, 20);
        assert_eq!(config.max_sheet_name_len, 30);
    }
}
