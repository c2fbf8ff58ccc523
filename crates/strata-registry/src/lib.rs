//! Strata Registry
//!
//! Hands a short-lived push credential for a container registry to the image
//! build step.
//!
//! A [`TokenSource`] looks up the registry's authorization token: base64 of
//! `username:password`. [`RegistryCredentialBridge::fetch`] decodes it into a
//! [`Credential`]. Credentials are fetched on demand for every image push and
//! never cached, so a run never reuses a token from an earlier one.

mod bridge;
mod credential;
mod error;
mod source;

pub use bridge::{RegistryCredentialBridge, decode_token};
pub use credential::{AuthorizationData, Credential};
pub use error::CredentialError;
pub use source::{StaticTokenSource, TokenSource};
