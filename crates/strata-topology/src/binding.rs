use serde::Serialize;

use crate::error::TopologyError;
use crate::input::Input;

/// Target group health-check policy.
///
/// Construct through [`HealthCheck::new`], which enforces
/// `interval > timeout` and non-zero thresholds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthCheck {
  path: String,
  interval: u32,
  timeout: u32,
  healthy_threshold: u32,
  unhealthy_threshold: u32,
}

impl HealthCheck {
  /// Create a health check. The path must be absolute, the interval longer
  /// than the timeout, and both thresholds at least 1.
  pub fn new(
    path: impl Into<String>,
    interval: u32,
    timeout: u32,
    healthy_threshold: u32,
    unhealthy_threshold: u32,
  ) -> Result<Self, TopologyError> {
    let path = path.into();
    if !path.starts_with('/') {
      return Err(TopologyError::InvalidHealthCheck(format!(
        "path '{}' must start with '/'",
        path
      )));
    }
    if interval <= timeout {
      return Err(TopologyError::InvalidHealthCheck(format!(
        "interval ({}s) must be greater than timeout ({}s)",
        interval, timeout
      )));
    }
    if healthy_threshold == 0 || unhealthy_threshold == 0 {
      return Err(TopologyError::InvalidHealthCheck(
        "thresholds must be at least 1".to_string(),
      ));
    }

    Ok(Self {
      path,
      interval,
      timeout,
      healthy_threshold,
      unhealthy_threshold,
    })
  }

  /// `GET /` every 30s, 5s timeout, 2 successes/failures to flip state.
  pub fn canonical() -> Self {
    Self {
      path: "/".to_string(),
      interval: 30,
      timeout: 5,
      healthy_threshold: 2,
      unhealthy_threshold: 2,
    }
  }

  /// Path the target group requests to check health.
  pub fn path(&self) -> &str {
    &self.path
  }

  /// Seconds between checks.
  pub fn interval(&self) -> u32 {
    self.interval
  }

  /// Seconds before a check counts as failed.
  pub fn timeout(&self) -> u32 {
    self.timeout
  }

  /// Consecutive successes before a target is healthy.
  pub fn healthy_threshold(&self) -> u32 {
    self.healthy_threshold
  }

  /// Consecutive failures before a target is unhealthy.
  pub fn unhealthy_threshold(&self) -> u32 {
    self.unhealthy_threshold
  }

  /// The health check as target group input.
  pub fn to_input(&self) -> Input {
    Input::map([
      ("path", Input::from(self.path.as_str())),
      ("interval", Input::from(self.interval)),
      ("timeout", Input::from(self.timeout)),
      ("healthyThreshold", Input::from(self.healthy_threshold)),
      ("unhealthyThreshold", Input::from(self.unhealthy_threshold)),
    ])
  }
}

impl Default for HealthCheck {
  fn default() -> Self {
    Self::canonical()
  }
}

/// Couples the container port to the target group and listener.
///
/// The container port is used unchanged for the port mapping, the target
/// group port and the service's load balancer binding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointBinding {
  pub container_port: u16,
  /// Public port the listener accepts traffic on.
  pub listener_port: u16,
  pub health_check: HealthCheck,
}

impl EndpointBinding {
  pub const LISTENER_PORT: u16 = 80;

  /// Bind `container_port` behind the standard listener port.
  pub fn new(container_port: u16, health_check: HealthCheck) -> Self {
    Self {
      container_port,
      listener_port: Self::LISTENER_PORT,
      health_check,
    }
  }

  /// The target group forwards to the container port.
  pub fn target_port(&self) -> u16 {
    self.container_port
  }
}
