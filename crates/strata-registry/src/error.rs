use thiserror::Error;

/// Errors raised while obtaining a registry push credential.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CredentialError {
  /// The token lookup itself failed (network, unauthorized, unknown registry).
  #[error("failed to look up authorization token for registry '{registry_id}': {message}")]
  Lookup {
    registry_id: String,
    message: String,
  },

  /// The token does not decode to `username:password`.
  #[error("malformed authorization token: {0}")]
  Malformed(String),

  /// The token was already past its validity window when fetched.
  #[error("authorization token for registry '{registry_id}' expired at {expired_at}")]
  Expired {
    registry_id: String,
    expired_at: String,
  },
}
