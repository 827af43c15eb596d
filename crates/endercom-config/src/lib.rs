//! # endercom-config
//!
//! Configuration for the `endercom` binary. Reads `endercom.toml`, then lets
//! environment variables override it. Library users build the option structs
//! in `endercom-core` directly and never touch this crate.

pub mod loader;
pub mod schema;

pub use loader::ConfigLoader;
pub use schema::{ConfigWarning, EndercomConfig, WarningSeverity};
