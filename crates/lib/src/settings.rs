//! Build settings: a flat map of dotted option keys to string values.
//!
//! Settings come from an optional TOML file and from `key=value` overrides
//! given on the command line. Nested TOML tables flatten into dotted keys, so
//!
//! ```toml
//! [loom]
//! build_directory = "out"
//! ```
//!
//! is the same as the override `loom.build_directory=out`.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Errors raised while reading or parsing settings.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
  #[error("invalid option {0:?}: expected KEY=VALUE")]
  InvalidOption(String),

  #[error("failed to read settings file {path}: {source}")]
  Read { path: String, source: io::Error },

  #[error("failed to parse settings file {path}: {message}")]
  Parse { path: String, message: String },
}

/// Ordered option map. An empty value marks a key for removal on [`Settings::update`].
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
  values: BTreeMap<String, String>,
}

impl Settings {
  pub fn new() -> Self {
    Self::default()
  }

  /// Parse `KEY=VALUE` override strings.
  pub fn parse<S: AsRef<str>>(options: &[S]) -> Result<Self, SettingsError> {
    let mut settings = Settings::new();
    for option in options {
      let option = option.as_ref();
      let Some((key, value)) = option.split_once('=') else {
        return Err(SettingsError::InvalidOption(option.to_string()));
      };
      let key = key.trim();
      if key.is_empty() {
        return Err(SettingsError::InvalidOption(option.to_string()));
      }
      settings.values.insert(key.to_string(), value.to_string());
    }
    Ok(settings)
  }

  /// Load settings from a TOML file. A missing file yields empty settings.
  pub fn from_file(path: &Path) -> Result<Self, SettingsError> {
    let content = match fs::read_to_string(path) {
      Ok(content) => content,
      Err(e) if e.kind() == io::ErrorKind::NotFound => {
        debug!(path = %path.display(), "no settings file");
        return Ok(Settings::new());
      }
      Err(source) => {
        return Err(SettingsError::Read {
          path: path.display().to_string(),
          source,
        });
      }
    };

    let table: toml::Table = toml::from_str(&content).map_err(|e| SettingsError::Parse {
      path: path.display().to_string(),
      message: e.to_string(),
    })?;

    let mut settings = Settings::new();
    flatten_table("", &table, &mut settings.values);
    debug!(path = %path.display(), count = settings.values.len(), "loaded settings file");
    Ok(settings)
  }

  /// Merge `other` into `self`. Keys with an empty value are removed.
  pub fn update(&mut self, other: Settings) {
    for (key, value) in other.values {
      if value.is_empty() {
        self.values.remove(&key);
      } else {
        self.values.insert(key, value);
      }
    }
  }

  pub fn set(&mut self, key: &str, value: impl Into<String>) {
    self.values.insert(key.to_string(), value.into());
  }

  pub fn get(&self, key: &str) -> Option<&str> {
    self.values.get(key).map(String::as_str)
  }

  pub fn get_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
    self.get(key).unwrap_or(default)
  }

  /// Interpret a value as a boolean. Unrecognized values yield `None`.
  pub fn get_bool(&self, key: &str) -> Option<bool> {
    match self.get(key)?.to_ascii_lowercase().as_str() {
      "true" | "1" | "yes" | "on" => Some(true),
      "false" | "0" | "no" | "off" => Some(false),
      _ => None,
    }
  }

  /// Interpret a value as a comma-separated list.
  pub fn get_list(&self, key: &str) -> Vec<String> {
    self
      .get(key)
      .map(|v| {
        v.split(',')
          .map(str::trim)
          .filter(|s| !s.is_empty())
          .map(str::to_string)
          .collect()
      })
      .unwrap_or_default()
  }

  pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
    self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
  }

  pub fn len(&self) -> usize {
    self.values.len()
  }

  pub fn is_empty(&self) -> bool {
    self.values.is_empty()
  }
}

fn flatten_table(prefix: &str, table: &toml::Table, out: &mut BTreeMap<String, String>) {
  for (key, value) in table {
    let key = if prefix.is_empty() {
      key.clone()
    } else {
      format!("{}.{}", prefix, key)
    };
    match value {
      toml::Value::Table(inner) => flatten_table(&key, inner, out),
      toml::Value::String(s) => {
        out.insert(key, s.clone());
      }
      toml::Value::Array(items) => {
        let joined = items
          .iter()
          .map(|item| match item {
            toml::Value::String(s) => s.clone(),
            other => other.to_string(),
          })
          .collect::<Vec<_>>()
          .join(",");
        out.insert(key, joined);
      }
      other => {
        out.insert(key, other.to_string());
      }
    }
  }
}
