use thiserror::Error;

/// Errors reported by a provisioning backend.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
  /// The provider refused to create the resource.
  #[error("provider rejected '{resource}': {message}")]
  Rejected { resource: String, message: String },

  /// A resource with this id exists with different desired attributes.
  /// Nothing is ever updated in place.
  #[error("resource '{resource}' already exists with different inputs")]
  Conflict { resource: String },

  /// The request itself is unusable (wrong input shape, missing credential).
  #[error("invalid request for '{resource}': {message}")]
  InvalidRequest { resource: String, message: String },

  /// Reading or writing the backend's state file failed.
  #[error("state file {path}: {message}")]
  State { path: String, message: String },
}
