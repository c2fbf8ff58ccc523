//! Provisioning events and notifiers for observability.
//!
//! Events are emitted as a run progresses so consumers can log progress,
//! stream it to a terminal, or assert on it in tests.

use serde::{Deserialize, Serialize};
use strata_backend::SubmissionStatus;
use strata_topology::{ResourceId, ResourceKind};
use tokio::sync::mpsc;
use tracing::{error, info};

/// Events emitted during a provisioning run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ProvisionEvent {
  RunStarted {
    run_id: String,
    owner: String,
    resources: usize,
  },

  /// A resource's dependencies are done and it has been scheduled.
  ResourceStarted {
    run_id: String,
    resource: ResourceId,
    kind: ResourceKind,
  },

  /// A registry push credential was obtained for an image.
  CredentialFetched {
    run_id: String,
    resource: ResourceId,
    registry_id: String,
  },

  ResourceCompleted {
    run_id: String,
    resource: ResourceId,
    status: SubmissionStatus,
    attributes: serde_json::Value,
  },

  ResourceFailed {
    run_id: String,
    resource: ResourceId,
    error: String,
  },

  RunCompleted { run_id: String },

  RunFailed { run_id: String, error: String },
}

/// Receives provisioning events.
///
/// The provisioner calls `notify` for each event; implementations decide
/// what to do with them.
pub trait ProvisionNotifier: Send + Sync {
  fn notify(&self, event: ProvisionEvent);
}

/// Discards all events.
#[derive(Debug, Clone, Default)]
pub struct NoopNotifier;

impl ProvisionNotifier for NoopNotifier {
  fn notify(&self, _event: ProvisionEvent) {}
}

/// Sends events to an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
  // Unbounded so a slow consumer never stalls a run. Volume is a handful of
  // events per resource.
  sender: mpsc::UnboundedSender<ProvisionEvent>,
}

impl ChannelNotifier {
  /// Create a new channel notifier.
  pub fn new(sender: mpsc::UnboundedSender<ProvisionEvent>) -> Self {
    Self { sender }
  }
}

impl ProvisionNotifier for ChannelNotifier {
  fn notify(&self, event: ProvisionEvent) {
    // Receiver may have been dropped
    let _ = self.sender.send(event);
  }
}

/// Logs every event through `tracing`.
#[derive(Debug, Clone, Default)]
pub struct TracingNotifier;

impl ProvisionNotifier for TracingNotifier {
  fn notify(&self, event: ProvisionEvent) {
    match event {
      ProvisionEvent::RunStarted {
        run_id,
        owner,
        resources,
      } => info!(run_id = %run_id, owner = %owner, resources, "provisioning started"),
      ProvisionEvent::ResourceStarted {
        run_id,
        resource,
        kind,
      } => info!(run_id = %run_id, resource = %resource, kind = %kind, "submitting"),
      ProvisionEvent::CredentialFetched {
        run_id,
        resource,
        registry_id,
      } => info!(run_id = %run_id, resource = %resource, registry_id = %registry_id, "registry credential fetched"),
      ProvisionEvent::ResourceCompleted {
        run_id,
        resource,
        status,
        ..
      } => info!(run_id = %run_id, resource = %resource, status = ?status, "resource ready"),
      ProvisionEvent::ResourceFailed {
        run_id,
        resource,
        error,
      } => error!(run_id = %run_id, resource = %resource, error = %error, "resource failed"),
      ProvisionEvent::RunCompleted { run_id } => info!(run_id = %run_id, "provisioning completed"),
      ProvisionEvent::RunFailed { run_id, error } => {
        error!(run_id = %run_id, error = %error, "provisioning failed")
      }
    }
  }
}
