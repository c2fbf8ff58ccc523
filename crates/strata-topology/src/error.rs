use thiserror::Error;

#[derive(Debug, Error)]
pub enum TopologyError {
  /// Two resources share an id.
  #[error("duplicate resource id: {0}")]
  DuplicateResource(String),

  /// A resource depends on something that has not been declared.
  #[error("resource '{resource}' depends on undeclared resource '{dependency}'")]
  MissingDependency { resource: String, dependency: String },

  /// The dependency relation is not acyclic.
  #[error("cycle detected in topology involving: {}", remaining.join(", "))]
  CycleDetected { remaining: Vec<String> },

  /// A health check violates `interval > timeout` or a threshold is zero.
  #[error("invalid health check: {0}")]
  InvalidHealthCheck(String),

  /// The topology is missing a resource the composite expects.
  #[error("resource not found: {0}")]
  ResourceNotFound(String),
}
