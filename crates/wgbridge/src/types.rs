//! Core types shared by the parser, the backends and the lifecycle manager.

use std::fmt;
use std::net::{IpAddr, Ipv6Addr};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Default name of the single managed tunnel.
pub const DEFAULT_TUNNEL_NAME: &str = "wg0";

/// Host part of a peer endpoint.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum EndpointHost {
    /// A literal IP address.
    Ip(IpAddr),
    /// A DNS name, resolved by the platform.
    Name(String),
}

/// A `WireGuard` peer endpoint (`host:port`).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Endpoint {
    host: EndpointHost,
    port: u16,
}

/// Reasons an endpoint string can be rejected.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EndpointParseError(pub String);

impl fmt::Display for EndpointParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for EndpointParseError {}

impl Endpoint {
    /// Creates an endpoint from an IP address and port.
    #[must_use]
    pub fn from_ip_port(ip: IpAddr, port: u16) -> Self {
        Self {
            host: EndpointHost::Ip(ip),
            port,
        }
    }

    /// Returns the host.
    #[must_use]
    pub fn host(&self) -> &EndpointHost {
        &self.host
    }

    /// Returns the port.
    #[must_use]
    pub fn port(&self) -> u16 {
        self.port
    }
}

fn valid_hostname(host: &str) -> bool {
    !host.is_empty()
        && host.len() <= 253
        && host.split('.').all(|label| {
            !label.is_empty()
                && label.len() <= 63
                && !label.starts_with('-')
                && !label.ends_with('-')
                && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
        })
}

impl FromStr for Endpoint {
    type Err = EndpointParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = |reason: &str| EndpointParseError(format!("{reason}: {s}"));

        let (host, port) = if let Some(rest) = s.strip_prefix('[') {
            let (v6, port) = rest
                .split_once("]:")
                .ok_or_else(|| err("expected [ipv6]:port"))?;
            let ip = v6
                .parse::<Ipv6Addr>()
                .map_err(|_| err("invalid IPv6 address"))?;
            (EndpointHost::Ip(IpAddr::V6(ip)), port)
        } else {
            let (host, port) = s.rsplit_once(':').ok_or_else(|| err("expected host:port"))?;
            let host = match host.parse::<IpAddr>() {
                Ok(IpAddr::V4(ip)) => EndpointHost::Ip(IpAddr::V4(ip)),
                // Bare IPv6 must be bracketed, otherwise the port is ambiguous.
                Ok(IpAddr::V6(_)) => return Err(err("IPv6 endpoints must be bracketed")),
                Err(_) if valid_hostname(host) => EndpointHost::Name(host.to_string()),
                Err(_) => return Err(err("invalid host")),
            };
            (host, port)
        };

        let port = port.parse::<u16>().map_err(|_| err("invalid port"))?;
        if port == 0 {
            return Err(err("port must be non-zero"));
        }

        Ok(Self { host, port })
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.host {
            EndpointHost::Ip(IpAddr::V6(ip)) => write!(f, "[{ip}]:{}", self.port),
            EndpointHost::Ip(ip) => write!(f, "{ip}:{}", self.port),
            EndpointHost::Name(name) => write!(f, "{name}:{}", self.port),
        }
    }
}

/// Identity of the OS-level tunnel object.
///
/// Owned by the lifecycle manager; backends only ever see a reference.
/// Deliberately not `Clone`.
#[derive(Debug, PartialEq, Eq)]
pub struct TunnelHandle {
    id: Uuid,
    name: String,
}

impl TunnelHandle {
    /// Creates a fresh handle for the named tunnel.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
        }
    }

    /// Returns the opaque handle id.
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Returns the tunnel (interface) name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Lifecycle state of the managed tunnel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TunnelState {
    /// No permission has been requested yet.
    #[default]
    Uninitialized,
    /// Waiting for the user to answer the OS consent prompt.
    PermissionPending,
    /// Permission granted, no tunnel started yet.
    Ready,
    /// Tunnel is being brought up.
    Activating,
    /// Tunnel is established.
    Up,
    /// Tunnel is being torn down.
    Deactivating,
    /// Tunnel was torn down; may be restarted.
    Down,
    /// A backend call failed; a fresh start is required.
    Faulted,
}

impl TunnelState {
    /// Returns the status code reported to callers.
    #[must_use]
    pub fn status_code(self) -> StatusCode {
        match self {
            Self::Up => StatusCode::Up,
            Self::Activating => StatusCode::Connecting,
            Self::Deactivating => StatusCode::Disconnecting,
            Self::Faulted => StatusCode::Unknown,
            Self::Uninitialized | Self::PermissionPending | Self::Ready | Self::Down => {
                StatusCode::Down
            }
        }
    }

    /// Returns `true` while a mutating command is mid-flight.
    #[must_use]
    pub fn is_transitioning(self) -> bool {
        matches!(self, Self::Activating | Self::Deactivating)
    }
}

impl fmt::Display for TunnelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Uninitialized => "uninitialized",
            Self::PermissionPending => "permission_pending",
            Self::Ready => "ready",
            Self::Activating => "activating",
            Self::Up => "up",
            Self::Deactivating => "deactivating",
            Self::Down => "down",
            Self::Faulted => "faulted",
        };
        f.write_str(s)
    }
}

/// Tunnel status as reported at the command boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum StatusCode {
    /// Tunnel is up.
    Up,
    /// Tunnel is down or was never started.
    Down,
    /// Tunnel is coming up.
    Connecting,
    /// Tunnel is going down.
    Disconnecting,
    /// State cannot be determined (faulted or OS query failed).
    Unknown,
}

impl StatusCode {
    /// Returns the wire string.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Up => "UP",
            Self::Down => "DOWN",
            Self::Connecting => "CONNECTING",
            Self::Disconnecting => "DISCONNECTING",
            Self::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a permission request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionOutcome {
    /// Permission is already in place.
    AlreadyGranted,
    /// A consent prompt was shown; the answer arrives later.
    GrantRequested,
}
