//! Configuration tree.
//!
//! Loaded once at bootstrap from a directory of TOML files; each file
//! becomes a top-level table named after its stem, so `app.toml` containing
//! `name = "demo"` is read back as `config.get("app.name")`.

use std::collections::BTreeMap;
use std::path::Path;

use serde::de::DeserializeOwned;

use crate::error::Error;

/// Dot-path keyed configuration items.
#[derive(Default, Clone, Debug)]
pub struct Config {
    items: BTreeMap<String, toml::Value>,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads every `*.toml` file in a directory.
    pub fn load_dir(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        let mut config = Self::new();

        let entries = std::fs::read_dir(path).map_err(|e| {
            Error::Configuration(format!("unable to read config directory {}: {e}", path.display()))
        })?;

        for entry in entries {
            let entry = entry.map_err(|e| Error::Configuration(e.to_string()))?;
            let file = entry.path();
            if file.extension().and_then(|ext| ext.to_str()) != Some("toml") {
                continue;
            }

            let Some(stem) = file.file_stem().and_then(|s| s.to_str()) else { continue };
            let text = std::fs::read_to_string(&file).map_err(|e| {
                Error::Configuration(format!("unable to read {}: {e}", file.display()))
            })?;
            let value: toml::Value = text.parse().map_err(|e| {
                Error::Configuration(format!("invalid TOML in {}: {e}", file.display()))
            })?;

            config.items.insert(stem.to_owned(), value);
        }

        Ok(config)
    }

    /// Looks an item up by dot path (`"app.name"`).
    pub fn get(&self, key: &str) -> Option<&toml::Value> {
        let mut segments = key.split('.');
        let mut current = self.items.get(segments.next()?)?;

        for segment in segments {
            current = current.as_table()?.get(segment)?;
        }

        Some(current)
    }

    /// Typed lookup through serde.
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.get(key).cloned().and_then(|value| value.try_into().ok())
    }

    /// String lookup with a default.
    pub fn get_str<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.get(key).and_then(|value| value.as_str()).unwrap_or(default)
    }

    /// Boolean lookup with a default.
    pub fn get_bool(&self, key: &str, default: bool) -> bool {
        self.get(key).and_then(|value| value.as_bool()).unwrap_or(default)
    }

    /// Sets an item by dot path, creating intermediate tables as needed.
    pub fn set(&mut self, key: &str, value: impl Into<toml::Value>) {
        let mut segments: Vec<&str> = key.split('.').collect();
        let leaf = segments.pop().expect("config key must be non-empty");

        if segments.is_empty() {
            self.items.insert(leaf.to_owned(), value.into());
            return;
        }

        let root = self
            .items
            .entry(segments[0].to_owned())
            .or_insert_with(|| toml::Value::Table(toml::Table::new()));

        let mut current = root;
        for segment in &segments[1..] {
            if !current.is_table() {
                *current = toml::Value::Table(toml::Table::new());
            }
            current = current
                .as_table_mut()
                .expect("intermediate config node is a table")
                .entry((*segment).to_owned())
                .or_insert_with(|| toml::Value::Table(toml::Table::new()));
        }

        if !current.is_table() {
            *current = toml::Value::Table(toml::Table::new());
        }
        current
            .as_table_mut()
            .expect("intermediate config node is a table")
            .insert(leaf.to_owned(), value.into());
    }

    pub fn has(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Every top-level table, keyed by file stem.
    pub fn all(&self) -> &BTreeMap<String, toml::Value> {
        &self.items
    }
}
