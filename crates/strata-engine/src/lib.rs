//! Strata Engine
//!
//! Provisions a [`Topology`](strata_topology::Topology) against a
//! [`ProvisioningBackend`](strata_backend::ProvisioningBackend).
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        Provisioner                          │
//! │  - apply(topology, cancel) → ApplyReport                    │
//! │  - waves of resources whose dependencies have completed     │
//! │  - resolves each resource's output cell after submission    │
//! └─────────────────────────────────────────────────────────────┘
//!                 │                               │
//!                 ▼                               ▼
//! ┌───────────────────────────────┐ ┌───────────────────────────┐
//! │   RegistryCredentialBridge    │ │    ProvisioningBackend    │
//! │  - push credential per image  │ │  - submit(request)        │
//! └───────────────────────────────┘ └───────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! let backend = Arc::new(MemoryBackend::new());
//! let provisioner = Provisioner::new(backend.clone(), backend.clone())
//!   .with_notifier(TracingNotifier);
//!
//! let app = AppInfra::new(&config)?;
//! let url = app.url();
//! provisioner.apply(app.into_topology(), CancellationToken::new()).await?;
//! println!("{}", url.get().await?);
//! ```

mod error;
mod events;
mod provisioner;

pub use error::{ApplyError, ResourceError};
pub use events::{ChannelNotifier, NoopNotifier, ProvisionEvent, ProvisionNotifier, TracingNotifier};
pub use provisioner::{ApplyReport, Provisioner};
