//! Strata Output
//!
//! Deferred values for attributes that only exist once a resource has been
//! created: a load balancer's DNS name, a repository URL, an ARN.
//!
//! Every [`Output`] has exactly one [`Producer`]. The producer is consumed when
//! it resolves or rejects, so a value can be set at most once. Consumers clone
//! the output freely and await it; they observe the resolved value or an
//! [`OutputError`], never a placeholder. A producer that is dropped without
//! resolving fails all of its consumers with [`OutputError::Unresolved`].
//!
//! Derived values are built with [`Output::combine`], [`Output::apply`] and
//! [`interpolate`], which only resolve once every input has resolved.

mod error;
mod interpolate;
mod output;
mod table;

pub use error::OutputError;
pub use interpolate::interpolate;
pub use output::{Output, Producer};
pub use table::{Attributes, OutputTable};
