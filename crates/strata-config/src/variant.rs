use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Deployment variant, which decides defaults and required keys.
///
/// `Component` is the self-contained composite that declares its own network
/// and requires an explicit `name`. `Standalone` is the lighter program
/// that falls back to the `app` prefix and a smaller memory default.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Variant {
  #[default]
  Component,
  Standalone,
}

impl Variant {
  /// Memory (MiB) used when `memory` is not configured.
  pub fn default_memory(self) -> u32 {
    match self {
      Variant::Component => 1024,
      Variant::Standalone => 128,
    }
  }

  /// Whether `name` must be supplied explicitly.
  pub fn requires_name(self) -> bool {
    matches!(self, Variant::Component)
  }
}

impl fmt::Display for Variant {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Variant::Component => f.write_str("component"),
      Variant::Standalone => f.write_str("standalone"),
    }
  }
}

impl FromStr for Variant {
  type Err = ConfigError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "component" => Ok(Variant::Component),
      "standalone" => Ok(Variant::Standalone),
      other => Err(ConfigError::InvalidValue {
        key: "variant".to_string(),
        message: format!("unknown variant '{}' (expected component or standalone)", other),
      }),
    }
  }
}
