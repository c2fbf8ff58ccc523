use serde::{Deserialize, Serialize};

use crate::variant::Variant;

/// Fully resolved provisioning parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
  /// Prefix for every child resource name, e.g. `<name>-vpc`.
  pub name: String,
  /// Port the container listens on; also the target group port.
  pub container_port: u16,
  /// Task CPU units.
  pub cpu: u32,
  /// Task memory in MiB.
  pub memory: u32,
  /// Message-of-the-day injected as the `MOTD` environment variable.
  pub motd: String,
  pub region: String,
  /// Distinct availability zones, one subnet each.
  pub availability_zones: Vec<String>,
  pub variant: Variant,
}
