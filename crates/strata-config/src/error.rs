use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while loading or resolving stack configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
  /// A required key has no value.
  #[error("missing required key: {0}")]
  MissingKey(String),

  /// A key is present but holds the wrong kind of value.
  #[error("invalid type for key '{key}': expected {expected}")]
  InvalidType { key: String, expected: &'static str },

  /// A key holds a value outside its accepted range.
  #[error("invalid value for key '{key}': {message}")]
  InvalidValue { key: String, message: String },

  /// A stack file could not be read.
  #[error("failed to read config file {}: {source}", path.display())]
  Io {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  /// A stack file or override could not be parsed.
  #[error("failed to parse config: {0}")]
  Parse(String),
}
