use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use strata_registry::{AuthorizationData, CredentialError, TokenSource};
use strata_topology::{ResourceId, ResourceKind};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::attributes::{compute, registry_host};
use crate::backend::{ProvisioningBackend, SubmitRequest, Submission, SubmissionStatus};
use crate::error::ProviderError;
use crate::state::{BackendState, StoredResource};

/// Account that owns every simulated resource.
pub const ACCOUNT_ID: &str = "123456789012";

const DEFAULT_REGION: &str = "us-west-2";
const TOKEN_TTL_HOURS: i64 = 12;

/// One accepted or refused submission, in arrival order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubmissionRecord {
  pub id: ResourceId,
  pub kind: ResourceKind,
  pub inputs: Value,
  /// Registry user the request was authenticated as, if any.
  pub registry_user: Option<String>,
  /// `None` when the submission was refused.
  pub status: Option<SubmissionStatus>,
  pub at: DateTime<Utc>,
}

/// A deterministic in-process provider.
pub struct MemoryBackend {
  region: String,
  latency: Option<Duration>,
  fail_on: HashSet<ResourceId>,
  token_ttl: chrono::Duration,
  state: Mutex<BackendState>,
  log: Mutex<Vec<SubmissionRecord>>,
}

impl MemoryBackend {
  /// Create a backend with no existing resources.
  pub fn new() -> Self {
    Self::with_state(BackendState::default())
  }

  /// Create a backend that already holds `state`.
  pub fn with_state(state: BackendState) -> Self {
    Self {
      region: DEFAULT_REGION.to_string(),
      latency: None,
      fail_on: HashSet::new(),
      token_ttl: chrono::Duration::hours(TOKEN_TTL_HOURS),
      state: Mutex::new(state),
      log: Mutex::new(Vec::new()),
    }
  }

  /// Restore from a state file written by [`save`](Self::save).
  pub async fn load(path: &Path) -> Result<Self, ProviderError> {
    let state = BackendState::load(path).await?;
    info!(path = %path.display(), resources = state.resources.len(), "restored backend state");
    Ok(Self::with_state(state))
  }

  /// Provision into `region`.
  pub fn with_region(mut self, region: impl Into<String>) -> Self {
    self.region = region.into();
    self
  }

  /// Delay every submission, to make concurrent waves observable.
  pub fn with_latency(mut self, latency: Duration) -> Self {
    self.latency = Some(latency);
    self
  }

  /// Refuse any submission for `id`.
  pub fn fail_on(mut self, id: impl Into<ResourceId>) -> Self {
    self.fail_on.insert(id.into());
    self
  }

  /// Lifetime of issued registry tokens. Non-positive values issue tokens
  /// that are already expired.
  pub fn with_token_ttl(mut self, ttl: chrono::Duration) -> Self {
    self.token_ttl = ttl;
    self
  }

  /// Region used for generated names and endpoints.
  pub fn region(&self) -> &str {
    &self.region
  }

  /// Copy of every stored resource.
  pub async fn snapshot(&self) -> BackendState {
    self.state.lock().await.clone()
  }

  /// Persist the stored resources to `path`.
  pub async fn save(&self, path: &Path) -> Result<(), ProviderError> {
    let state = self.snapshot().await;
    state.save(path).await?;
    info!(path = %path.display(), resources = state.resources.len(), "saved backend state");
    Ok(())
  }

  /// Every submission seen so far, refused ones included.
  pub async fn submissions(&self) -> Vec<SubmissionRecord> {
    self.log.lock().await.clone()
  }

  /// Look up a stored resource by id.
  pub async fn resource(&self, id: &str) -> Option<StoredResource> {
    self.state.lock().await.resources.get(id).cloned()
  }

  async fn record(&self, request: &SubmitRequest, status: Option<SubmissionStatus>) {
    self.log.lock().await.push(SubmissionRecord {
      id: request.id.clone(),
      kind: request.kind,
      inputs: request.inputs.clone(),
      registry_user: request.credential.as_ref().map(|c| c.username.clone()),
      status,
      at: Utc::now(),
    });
  }

  fn check(&self, request: &SubmitRequest) -> Result<(), ProviderError> {
    if self.fail_on.contains(&request.id) {
      return Err(ProviderError::Rejected {
        resource: request.id.clone(),
        message: "injected failure".to_string(),
      });
    }
    if !request.inputs.is_object() {
      return Err(ProviderError::InvalidRequest {
        resource: request.id.clone(),
        message: "inputs must be an object".to_string(),
      });
    }
    if request.kind.needs_registry_credential() {
      let credential = request
        .credential
        .as_ref()
        .ok_or_else(|| ProviderError::InvalidRequest {
          resource: request.id.clone(),
          message: "image push requires a registry credential".to_string(),
        })?;
      if !credential.is_valid_at(Utc::now()) {
        return Err(ProviderError::Rejected {
          resource: request.id.clone(),
          message: "registry credential expired before push".to_string(),
        });
      }
    }
    Ok(())
  }

  async fn apply(&self, request: &SubmitRequest) -> Result<Submission, ProviderError> {
    self.check(request)?;

    let mut state = self.state.lock().await;
    if let Some(existing) = state.resources.get(&request.id) {
      if existing.kind == request.kind && existing.inputs == request.inputs {
        return Ok(Submission {
          attributes: existing.attributes.clone(),
          status: SubmissionStatus::Unchanged,
        });
      }
      return Err(ProviderError::Conflict {
        resource: request.id.clone(),
      });
    }

    let attributes = compute(request, &self.region, ACCOUNT_ID)?;
    state.resources.insert(
      request.id.clone(),
      StoredResource {
        kind: request.kind,
        inputs: request.inputs.clone(),
        attributes: attributes.clone(),
        created_at: Utc::now(),
      },
    );
    Ok(Submission {
      attributes,
      status: SubmissionStatus::Created,
    })
  }
}

impl Default for MemoryBackend {
  fn default() -> Self {
    Self::new()
  }
}

#[async_trait]
impl ProvisioningBackend for MemoryBackend {
  async fn submit(&self, request: SubmitRequest) -> Result<Submission, ProviderError> {
    if let Some(latency) = self.latency {
      tokio::time::sleep(latency).await;
    }

    let result = self.apply(&request).await;
    match &result {
      Ok(submission) => {
        debug!(resource = %request.id, kind = %request.kind, status = ?submission.status, "submission accepted");
        self.record(&request, Some(submission.status)).await;
      }
      Err(e) => {
        warn!(resource = %request.id, kind = %request.kind, error = %e, "submission refused");
        self.record(&request, None).await;
      }
    }
    result
  }
}

#[async_trait]
impl TokenSource for MemoryBackend {
  async fn authorization_token(&self, registry_id: &str) -> Result<AuthorizationData, CredentialError> {
    if registry_id != ACCOUNT_ID {
      return Err(CredentialError::Lookup {
        registry_id: registry_id.to_string(),
        message: "registry not found".to_string(),
      });
    }

    let token = format!("AWS:{}", uuid::Uuid::new_v4());
    Ok(AuthorizationData {
      authorization_token: STANDARD.encode(token),
      proxy_endpoint: format!("https://{}", registry_host(ACCOUNT_ID, &self.region)),
      expires_at: Utc::now() + self.token_ttl,
    })
  }
}
