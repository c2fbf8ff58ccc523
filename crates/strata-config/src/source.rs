//! Raw key/value settings for a stack.
//!
//! Values are kept as JSON. Stack settings are strings on the command line, so
//! numeric lookups also accept decimal strings and list lookups accept
//! comma-separated strings.
//!
//! Keys may carry a project namespace (`myproject:motd`); the namespace is
//! dropped on insert so `motd` and `myproject:motd` address the same setting.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ConfigError;

/// An explicit, in-memory set of stack settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigSource {
  values: BTreeMap<String, Value>,
}

impl ConfigSource {
  /// Create an empty source.
  pub fn new() -> Self {
    Self::default()
  }

  /// Builder-style insert.
  pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
    self.set(key, value);
    self
  }

  /// Insert or replace a setting.
  pub fn set(&mut self, key: &str, value: impl Into<Value>) {
    self.values.insert(normalize_key(key), value.into());
  }

  /// Parse a JSON document. Accepts a flat object or `{"config": {...}}`.
  pub fn from_json_str(content: &str) -> Result<Self, ConfigError> {
    let doc: Value =
      serde_json::from_str(content).map_err(|e| ConfigError::Parse(format!("invalid JSON: {}", e)))?;
    Self::from_document(doc)
  }

  /// Parse a YAML document with the same shapes as [`from_json_str`](Self::from_json_str).
  pub fn from_yaml_str(content: &str) -> Result<Self, ConfigError> {
    let doc: Value =
      serde_yaml::from_str(content).map_err(|e| ConfigError::Parse(format!("invalid YAML: {}", e)))?;
    Self::from_document(doc)
  }

  /// Load a stack file, choosing the parser by extension (`.yaml`/`.yml`, else JSON).
  pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
      path: path.to_path_buf(),
      source,
    })?;

    match path.extension().and_then(|e| e.to_str()) {
      Some("yaml") | Some("yml") => Self::from_yaml_str(&content),
      _ => Self::from_json_str(&content),
    }
  }

  /// Apply a `key=value` override. The value is always stored as a string.
  pub fn apply_override(&mut self, assignment: &str) -> Result<(), ConfigError> {
    let (key, value) = assignment
      .split_once('=')
      .ok_or_else(|| ConfigError::Parse(format!("expected key=value, got '{}'", assignment)))?;

    let key = key.trim();
    if key.is_empty() {
      return Err(ConfigError::Parse(format!(
        "empty key in override '{}'",
        assignment
      )));
    }

    self.set(key, Value::String(value.to_string()));
    Ok(())
  }

  /// Overlay another source on top of this one.
  pub fn merge(&mut self, other: ConfigSource) {
    self.values.extend(other.values);
  }

  /// Check if `key` is set.
  pub fn contains(&self, key: &str) -> bool {
    self.values.contains_key(key)
  }

  /// Read a string setting. Scalar numbers and booleans are rendered as strings.
  pub fn get_string(&self, key: &str) -> Result<Option<String>, ConfigError> {
    match self.values.get(key) {
      None | Some(Value::Null) => Ok(None),
      Some(Value::String(s)) => Ok(Some(s.clone())),
      Some(Value::Number(n)) => Ok(Some(n.to_string())),
      Some(Value::Bool(b)) => Ok(Some(b.to_string())),
      Some(_) => Err(ConfigError::InvalidType {
        key: key.to_string(),
        expected: "string",
      }),
    }
  }

  /// Read a required string setting. Empty strings count as missing.
  pub fn require(&self, key: &str) -> Result<String, ConfigError> {
    match self.get_string(key)? {
      Some(s) if !s.is_empty() => Ok(s),
      _ => Err(ConfigError::MissingKey(key.to_string())),
    }
  }

  /// Read a non-negative integer setting.
  pub fn get_number(&self, key: &str) -> Result<Option<u64>, ConfigError> {
    let invalid = || ConfigError::InvalidType {
      key: key.to_string(),
      expected: "non-negative integer",
    };

    match self.values.get(key) {
      None | Some(Value::Null) => Ok(None),
      Some(Value::Number(n)) => n.as_u64().map(Some).ok_or_else(invalid),
      Some(Value::String(s)) => s.trim().parse::<u64>().map(Some).map_err(|_| invalid()),
      Some(_) => Err(invalid()),
    }
  }

  /// Read a list of strings, from a JSON array or a comma-separated string.
  pub fn get_string_list(&self, key: &str) -> Result<Option<Vec<String>>, ConfigError> {
    let invalid = || ConfigError::InvalidType {
      key: key.to_string(),
      expected: "list of strings",
    };

    match self.values.get(key) {
      None | Some(Value::Null) => Ok(None),
      Some(Value::Array(items)) => items
        .iter()
        .map(|item| item.as_str().map(str::to_string).ok_or_else(invalid))
        .collect::<Result<Vec<_>, _>>()
        .map(Some),
      Some(Value::String(s)) => Ok(Some(
        s.split(',')
          .map(str::trim)
          .filter(|s| !s.is_empty())
          .map(str::to_string)
          .collect(),
      )),
      Some(_) => Err(invalid()),
    }
  }

  fn from_document(doc: Value) -> Result<Self, ConfigError> {
    let object = match doc {
      Value::Object(mut map) => match map.remove("config") {
        Some(Value::Object(nested)) => nested,
        Some(_) => {
          return Err(ConfigError::Parse(
            "top-level 'config' must be an object".to_string(),
          ));
        }
        None => map,
      },
      Value::Null => serde_json::Map::new(),
      _ => {
        return Err(ConfigError::Parse(
          "stack file must contain an object".to_string(),
        ));
      }
    };

    let mut source = Self::new();
    for (key, value) in object {
      source.set(&key, value);
    }
    Ok(source)
  }
}

/// Strip an optional `<project>:` namespace.
fn normalize_key(key: &str) -> String {
  key.rsplit(':').next().unwrap_or(key).trim().to_string()
}
