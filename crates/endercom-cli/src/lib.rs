//! # endercom-cli
//!
//! Command-line interface for Endercom agents.
//!
//! ## Commands
//!
//! - `endercom agent`: Poll the configured frequency with the demo handler
//! - `endercom send`: Publish one message on the frequency
//! - `endercom function`: Serve the data processor function endpoint
//! - `endercom config`: Show the resolved configuration
//! - `endercom doctor`: Report configuration problems

pub mod commands;
pub mod handlers;

pub use commands::Cli;
