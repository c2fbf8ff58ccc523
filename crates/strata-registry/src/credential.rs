use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What a registry's identity provider returns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationData {
  /// base64 of `username:password`.
  pub authorization_token: String,
  /// Registry endpoint the token is valid for, e.g. `https://123.dkr.ecr.local`.
  pub proxy_endpoint: String,
  pub expires_at: DateTime<Utc>,
}

/// A decoded push credential.
///
/// Deliberately not `Serialize`: credentials are handed to the image push and
/// never written to outputs or state.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
  pub username: String,
  pub password: String,
  pub endpoint: String,
  pub valid_until: DateTime<Utc>,
}

impl Credential {
  /// Check if the credential is still valid at `at`.
  pub fn is_valid_at(&self, at: DateTime<Utc>) -> bool {
    at < self.valid_until
  }
}

impl fmt::Debug for Credential {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Credential")
      .field("username", &self.username)
      .field("password", &"<redacted>")
      .field("endpoint", &self.endpoint)
      .field("valid_until", &self.valid_until)
      .finish()
  }
}
