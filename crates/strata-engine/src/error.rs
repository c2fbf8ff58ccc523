use strata_backend::ProviderError;
use strata_output::OutputError;
use strata_registry::CredentialError;
use strata_topology::{ResourceId, TopologyError};
use thiserror::Error;

/// Why a single resource could not be provisioned.
#[derive(Debug, Clone, Error)]
pub enum ResourceError {
  /// One of the resource's inputs did not resolve.
  #[error("inputs did not resolve: {0}")]
  Inputs(#[from] OutputError),

  #[error("registry credential unavailable: {0}")]
  Credential(#[from] CredentialError),

  #[error(transparent)]
  Provider(#[from] ProviderError),

  /// The submission task panicked or was aborted.
  #[error("submission task failed: {0}")]
  Task(String),
}

/// Errors that end a provisioning run.
///
/// Resources created before the run ended are listed and left in place;
/// nothing is rolled back.
#[derive(Debug, Error)]
pub enum ApplyError {
  /// The topology cannot be ordered. Nothing was submitted.
  #[error("invalid topology: {0}")]
  Topology(#[from] TopologyError),

  #[error("failed to provision '{resource}': {source}")]
  Failed {
    resource: ResourceId,
    #[source]
    source: ResourceError,
    created: Vec<ResourceId>,
  },

  #[error("provisioning cancelled")]
  Cancelled { created: Vec<ResourceId> },
}

impl ApplyError {
  /// Resources that exist despite the failure.
  pub fn created(&self) -> &[ResourceId] {
    match self {
      ApplyError::Topology(_) => &[],
      ApplyError::Failed { created, .. } | ApplyError::Cancelled { created } => created,
    }
  }
}
