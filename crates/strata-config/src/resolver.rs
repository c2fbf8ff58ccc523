use std::collections::HashSet;

use tracing::debug;

use crate::config::Config;
use crate::error::ConfigError;
use crate::source::ConfigSource;
use crate::variant::Variant;

const DEFAULT_CONTAINER_PORT: u64 = 80;
const DEFAULT_CPU: u64 = 512;
const DEFAULT_REGION: &str = "us-west-2";
const STANDALONE_NAME: &str = "app";

/// Resolves raw settings into a typed [`Config`].
///
/// Resolution is all-or-nothing: the first missing or invalid key aborts it
/// and no partial config is returned.
pub struct ConfigResolver<'a> {
  source: &'a ConfigSource,
  variant: Variant,
}

impl<'a> ConfigResolver<'a> {
  /// Create a resolver applying the defaults of `variant`.
  pub fn new(source: &'a ConfigSource, variant: Variant) -> Self {
    Self { source, variant }
  }

  /// Resolve every setting, applying defaults and validating the result.
  pub fn resolve(&self) -> Result<Config, ConfigError> {
    let motd = self.source.require("motd")?;

    let name = if self.variant.requires_name() {
      self.source.require("name")?
    } else {
      self
        .source
        .get_string("name")?
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| STANDALONE_NAME.to_string())
    };
    validate_name(&name)?;

    let container_port = self.port("containerPort", DEFAULT_CONTAINER_PORT)?;
    let cpu = self.positive("cpu", DEFAULT_CPU)?;
    let memory = self.positive("memory", u64::from(self.variant.default_memory()))?;

    let region = self
      .source
      .get_string("region")?
      .unwrap_or_else(|| DEFAULT_REGION.to_string());

    let availability_zones = match self.source.get_string_list("availabilityZones")? {
      Some(zones) => zones,
      None => vec![format!("{}a", region), format!("{}b", region)],
    };
    validate_zones(&availability_zones)?;

    let config = Config {
      name,
      container_port,
      cpu,
      memory,
      motd,
      region,
      availability_zones,
      variant: self.variant,
    };

    debug!(
      name = %config.name,
      variant = %config.variant,
      container_port = config.container_port,
      cpu = config.cpu,
      memory = config.memory,
      "resolved stack config"
    );

    Ok(config)
  }

  fn port(&self, key: &str, default: u64) -> Result<u16, ConfigError> {
    let value = self.source.get_number(key)?.unwrap_or(default);
    match u16::try_from(value) {
      Ok(port) if port > 0 => Ok(port),
      _ => Err(ConfigError::InvalidValue {
        key: key.to_string(),
        message: format!("{} is not a valid port (1-65535)", value),
      }),
    }
  }

  fn positive(&self, key: &str, default: u64) -> Result<u32, ConfigError> {
    let value = self.source.get_number(key)?.unwrap_or(default);
    match u32::try_from(value) {
      Ok(v) if v > 0 => Ok(v),
      _ => Err(ConfigError::InvalidValue {
        key: key.to_string(),
        message: format!("{} must be a positive 32-bit integer", value),
      }),
    }
  }
}

fn validate_name(name: &str) -> Result<(), ConfigError> {
  let valid = name
    .chars()
    .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
  if !valid {
    return Err(ConfigError::InvalidValue {
      key: "name".to_string(),
      message: format!(
        "'{}' may only contain ASCII letters, digits, '-' and '_'",
        name
      ),
    });
  }
  Ok(())
}

fn validate_zones(zones: &[String]) -> Result<(), ConfigError> {
  let distinct: HashSet<&str> = zones.iter().map(String::as_str).collect();
  if distinct.len() != zones.len() {
    return Err(ConfigError::InvalidValue {
      key: "availabilityZones".to_string(),
      message: "availability zones must be distinct".to_string(),
    });
  }
  if zones.len() < 2 {
    return Err(ConfigError::InvalidValue {
      key: "availabilityZones".to_string(),
      message: format!("at least two zones are required, got {}", zones.len()),
    });
  }
  Ok(())
}
