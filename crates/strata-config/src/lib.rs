//! Strata Config
//!
//! This crate contains the provisioning parameters for a strata stack and the
//! resolver that turns raw key/value settings into a typed [`Config`].
//!
//! Settings can be loaded from:
//! - JSON or YAML stack files (flat, or nested under a top-level `config` key)
//! - `key=value` overrides (via CLI with `--set motd="hello"`)
//!
//! There is no process-wide configuration. A [`ConfigSource`] is built
//! explicitly, resolved once by [`ConfigResolver`], and the resulting
//! [`Config`] is threaded through topology construction.

mod config;
mod error;
mod resolver;
mod source;
mod variant;

pub use config::Config;
pub use error::ConfigError;
pub use resolver::ConfigResolver;
pub use source::ConfigSource;
pub use variant::Variant;
