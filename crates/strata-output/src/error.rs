use thiserror::Error;

/// Why a deferred value could not be observed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OutputError {
  /// The producer went away without resolving (its resource was never created).
  #[error("output '{label}' was never resolved")]
  Unresolved { label: String },

  /// The producer explicitly failed the value.
  #[error("output '{label}' failed: {message}")]
  Rejected { label: String, message: String },

  /// A resource's outputs did not carry the requested attribute.
  #[error("output '{label}' has no attribute '{attribute}'")]
  MissingAttribute { label: String, attribute: String },

  /// A derived value could not be computed from its inputs.
  #[error("failed to derive '{label}': {message}")]
  Derive { label: String, message: String },
}
