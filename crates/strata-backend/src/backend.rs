use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use strata_output::Attributes;
use strata_registry::Credential;
use strata_topology::{ResourceId, ResourceKind};

use crate::error::ProviderError;

/// One resource's fully resolved desired state.
#[derive(Debug, Clone)]
pub struct SubmitRequest {
  pub id: ResourceId,
  pub kind: ResourceKind,
  /// A JSON object; every deferred reference has already been resolved.
  pub inputs: Value,
  /// Registry push credential, only set for image resources.
  pub credential: Option<Credential>,
}

impl SubmitRequest {
  /// Create a request without a registry credential.
  pub fn new(id: impl Into<ResourceId>, kind: ResourceKind, inputs: Value) -> Self {
    Self {
      id: id.into(),
      kind,
      inputs,
      credential: None,
    }
  }

  /// Attach the credential used to push an image.
  pub fn with_credential(mut self, credential: Credential) -> Self {
    self.credential = Some(credential);
    self
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionStatus {
  Created,
  /// Already existed with identical inputs.
  Unchanged,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Submission {
  pub attributes: Attributes,
  pub status: SubmissionStatus,
}

/// Creates resources.
///
/// Submitting identical inputs for an existing id must be a no-op that
/// returns the stored attributes.
#[async_trait]
pub trait ProvisioningBackend: Send + Sync {
  async fn submit(&self, request: SubmitRequest) -> Result<Submission, ProviderError>;
}

#[async_trait]
impl<T: ProvisioningBackend + ?Sized> ProvisioningBackend for Arc<T> {
  async fn submit(&self, request: SubmitRequest) -> Result<Submission, ProviderError> {
    (**self).submit(request).await
  }
}
