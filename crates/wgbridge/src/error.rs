//! Error types for tunnel configuration, platform backends and the command surface.
//!
//! Three layers exist:
//!
//! - [`ConfigError`] is produced by the parser and never reaches a backend.
//! - [`BackendError`] is produced by a [`PlatformTunnelBackend`](crate::backend::PlatformTunnelBackend).
//! - [`ErrorKind`] / [`CommandError`] is the only shape exposed by the
//!   [`CommandFacade`](crate::facade::CommandFacade).

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for configuration parsing.
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Errors that can occur while parsing wg-quick configuration text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// A required section is absent (`[Interface]`, or no `[Peer]` at all).
    #[error("missing section: [{section}]")]
    MissingSection {
        /// Name of the missing section.
        section: &'static str,
    },

    /// A section that may appear only once was repeated.
    #[error("line {line}: duplicate section [{section}]")]
    DuplicateSection {
        /// Line of the repeated header.
        line: usize,
        /// Name of the repeated section.
        section: &'static str,
    },

    /// A line or value could not be parsed.
    #[error("line {line}: malformed {key}: {reason}")]
    MalformedKey {
        /// Line number (1-based).
        line: usize,
        /// Key being parsed.
        key: String,
        /// What was wrong with it.
        reason: String,
    },

    /// A key field did not decode to exactly 32 bytes.
    #[error("line {line}: {key} must decode to 32 bytes{}", describe_length(*.length))]
    InvalidKeyLength {
        /// Line number (1-based).
        line: usize,
        /// Key field name.
        key: &'static str,
        /// Decoded length, or `None` when the value was not base64 at all.
        length: Option<usize>,
    },

    /// A required field is absent from a section.
    #[error("[{section}] is missing required field {field}")]
    MissingField {
        /// Section the field belongs to.
        section: &'static str,
        /// Missing field name.
        field: &'static str,
    },
}

fn describe_length(length: Option<usize>) -> String {
    match length {
        Some(n) => format!(", got {n}"),
        None => ", got invalid base64".to_string(),
    }
}

impl ConfigError {
    /// Creates a `MalformedKey` error.
    #[must_use]
    pub fn malformed(line: usize, key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedKey {
            line,
            key: key.into(),
            reason: reason.into(),
        }
    }
}

/// Errors that can occur when decoding key material.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyError {
    /// Invalid base64 encoding.
    #[error("invalid base64 encoding: {0}")]
    InvalidBase64(String),

    /// Invalid key length.
    #[error("invalid key length: expected 32, got {0}")]
    InvalidKeyLength(usize),
}

impl KeyError {
    /// Returns the decoded length, if decoding got that far.
    #[must_use]
    pub fn decoded_length(&self) -> Option<usize> {
        match self {
            Self::InvalidBase64(_) => None,
            Self::InvalidKeyLength(n) => Some(*n),
        }
    }
}

/// Errors reported by a platform tunnel backend.
///
/// The taxonomy is OS-agnostic so the lifecycle manager never branches on
/// which platform it is driving.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    /// The user or the OS refused VPN permission.
    #[error("VPN permission denied")]
    PermissionDenied,

    /// Consent is required but nothing is available to show the prompt.
    #[error("no user interface available to request VPN permission")]
    NoUserInterface,

    /// The platform refused the tunnel configuration.
    #[error("configuration rejected: {0}")]
    ConfigRejected(String),

    /// The OS-level tunnel object is already gone.
    #[error("tunnel is already inactive")]
    AlreadyInactive,

    /// The VPN subsystem cannot be reached.
    #[error("platform unavailable: {0}")]
    PlatformUnavailable(String),

    /// Anything else the platform reported.
    #[error("backend error: {0}")]
    Unknown(String),
}

impl BackendError {
    /// Returns the boundary error kind this backend error maps to.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::PermissionDenied => ErrorKind::PermissionDenied,
            Self::NoUserInterface => ErrorKind::NoUserInterface,
            Self::Unknown(_) => ErrorKind::Unknown,
            Self::ConfigRejected(_) | Self::AlreadyInactive | Self::PlatformUnavailable(_) => {
                ErrorKind::BackendFailure
            }
        }
    }
}

/// Error classification exposed at the command boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    /// Configuration text failed to parse or validate.
    ConfigInvalid,
    /// Another lifecycle command is in flight.
    Busy,
    /// There is no tunnel (or no permission yet) to act on.
    NotInitialized,
    /// VPN permission was refused.
    PermissionDenied,
    /// The platform backend failed.
    BackendFailure,
    /// No UI context is available to show the permission prompt.
    NoUserInterface,
    /// Unclassified failure.
    Unknown,
}

impl ErrorKind {
    /// Returns the wire code for this kind.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ConfigInvalid => "CONFIG_INVALID",
            Self::Busy => "BUSY",
            Self::NotInitialized => "NOT_INITIALIZED",
            Self::PermissionDenied => "PERMISSION_DENIED",
            Self::BackendFailure => "BACKEND_FAILURE",
            Self::NoUserInterface => "NO_USER_INTERFACE",
            Self::Unknown => "UNKNOWN",
        }
    }

    /// Returns `true` if retrying the same command later can succeed without
    /// user action.
    #[must_use]
    pub fn is_retryable(self) -> bool {
        matches!(self, Self::Busy)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured failure returned by every facade command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("{kind}: {message}")]
pub struct CommandError {
    /// Error classification.
    pub kind: ErrorKind,
    /// Human-readable description.
    pub message: String,
}

impl CommandError {
    /// Creates a new command error.
    #[must_use]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// A tunnel name the OS would refuse.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid tunnel name {name:?}: {reason}")]
pub struct InvalidTunnelName {
    /// The rejected name.
    pub name: String,
    /// Why it was rejected.
    pub reason: &'static str,
}

/// Result type returned by facade commands.
pub type CommandResult<T> = std::result::Result<T, CommandError>;

/// Errors produced by the lifecycle manager.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ManagerError {
    /// The configuration text was invalid.
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    /// A mutating command is already executing.
    #[error("another tunnel command is in progress")]
    Busy,

    /// The command is not legal in the current state.
    #[error("{0}")]
    NotInitialized(String),

    /// The backend failed; the manager is now faulted (or unchanged for
    /// permission queries).
    #[error(transparent)]
    Backend(#[from] BackendError),
}

impl ManagerError {
    /// Returns the boundary error kind.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Config(_) => ErrorKind::ConfigInvalid,
            Self::Busy => ErrorKind::Busy,
            Self::NotInitialized(_) => ErrorKind::NotInitialized,
            Self::Backend(e) => e.kind(),
        }
    }
}

impl From<ManagerError> for CommandError {
    fn from(err: ManagerError) -> Self {
        Self::new(err.kind(), err.to_string())
    }
}
