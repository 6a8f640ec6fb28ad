//! CLI error types.

use thiserror::Error;

use wgbridge::error::InvalidTunnelName;
use wgbridge::{CommandError, ConfigError, KeyError};

/// CLI-specific errors.
#[derive(Debug, Error)]
pub enum CliError {
    /// The configuration file did not parse.
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    /// A key argument did not decode.
    #[error("invalid key: {0}")]
    Key(#[from] KeyError),

    /// A tunnel command failed.
    #[error("{0}")]
    Command(#[from] CommandError),

    /// Invalid argument.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Output formatting error.
    #[error("format error: {0}")]
    Format(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<InvalidTunnelName> for CliError {
    fn from(err: InvalidTunnelName) -> Self {
        Self::InvalidArgument(err.to_string())
    }
}
