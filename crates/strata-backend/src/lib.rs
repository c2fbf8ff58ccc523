//! Strata Backend
//!
//! The [`ProvisioningBackend`] trait is the seam between the provisioner and
//! whatever actually creates resources. A backend accepts one desired-state
//! record at a time and reports the resource's computed attributes.
//!
//! [`MemoryBackend`] is a deterministic, in-process provider used by the CLI
//! and the tests. It records every submission, can be told to fail specific
//! resources, persists its state to a JSON file between runs, and issues
//! registry tokens for the repositories it hosts.

mod attributes;
mod backend;
mod error;
mod memory;
mod state;

pub use backend::{ProvisioningBackend, SubmitRequest, Submission, SubmissionStatus};
pub use error::ProviderError;
pub use memory::{ACCOUNT_ID, MemoryBackend, SubmissionRecord};
pub use state::{BackendState, StoredResource};
