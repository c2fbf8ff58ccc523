use std::collections::HashMap;

use async_trait::async_trait;

use crate::credential::AuthorizationData;
use crate::error::CredentialError;

/// Looks up the current authorization token for a registry.
#[async_trait]
pub trait TokenSource: Send + Sync {
  async fn authorization_token(&self, registry_id: &str) -> Result<AuthorizationData, CredentialError>;
}

#[async_trait]
impl<T: TokenSource + ?Sized> TokenSource for std::sync::Arc<T> {
  async fn authorization_token(&self, registry_id: &str) -> Result<AuthorizationData, CredentialError> {
    (**self).authorization_token(registry_id).await
  }
}

/// A fixed table of tokens keyed by registry id.
///
/// Unknown registries fail with [`CredentialError::Lookup`].
#[derive(Debug, Default, Clone)]
pub struct StaticTokenSource {
  tokens: HashMap<String, AuthorizationData>,
}

impl StaticTokenSource {
  /// Create a source with no tokens.
  pub fn new() -> Self {
    Self::default()
  }

  /// Serve `data` for `registry_id`.
  pub fn with_token(mut self, registry_id: impl Into<String>, data: AuthorizationData) -> Self {
    self.tokens.insert(registry_id.into(), data);
    self
  }
}

#[async_trait]
impl TokenSource for StaticTokenSource {
  async fn authorization_token(&self, registry_id: &str) -> Result<AuthorizationData, CredentialError> {
    self
      .tokens
      .get(registry_id)
      .cloned()
      .ok_or_else(|| CredentialError::Lookup {
        registry_id: registry_id.to_string(),
        message: "no such registry".to_string(),
      })
  }
}
