//! # wgbridge-cli
//!
//! Command-line front end for the `wgbridge` tunnel lifecycle core.
//!
//! Provides commands for:
//! - Validating and canonicalizing wg-quick configuration files
//! - Generating and deriving keys
//! - Running a tunnel session against a selectable backend

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cli;
pub mod commands;
pub mod error;
pub mod output;

pub use cli::{BackendKind, Cli, Commands, Format, UpArgs};
pub use error::CliError;
pub use output::OutputFormat;
