use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use strata_output::Attributes;
use strata_topology::{ResourceId, ResourceKind};

use crate::error::ProviderError;

/// A resource the backend has created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredResource {
  pub kind: ResourceKind,
  pub inputs: Value,
  pub attributes: Attributes,
  pub created_at: DateTime<Utc>,
}

/// Everything the simulated provider knows, as written to the state file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BackendState {
  pub resources: BTreeMap<ResourceId, StoredResource>,
}

impl BackendState {
  /// Read a state file. A missing file is an empty state.
  pub async fn load(path: &Path) -> Result<Self, ProviderError> {
    let contents = match tokio::fs::read_to_string(path).await {
      Ok(contents) => contents,
      Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Self::default()),
      Err(e) => return Err(state_error(path, e)),
    };
    serde_json::from_str(&contents).map_err(|e| state_error(path, e))
  }

  /// Write the state as JSON, creating parent directories.
  pub async fn save(&self, path: &Path) -> Result<(), ProviderError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
      tokio::fs::create_dir_all(parent)
        .await
        .map_err(|e| state_error(path, e))?;
    }
    let contents = serde_json::to_string_pretty(self).map_err(|e| state_error(path, e))?;
    tokio::fs::write(path, contents)
      .await
      .map_err(|e| state_error(path, e))
  }
}

fn state_error(path: &Path, e: impl std::fmt::Display) -> ProviderError {
  ProviderError::State {
    path: path.display().to_string(),
    message: e.to_string(),
  }
}
