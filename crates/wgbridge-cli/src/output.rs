//! Output formatting for CLI commands.
//!
//! Supports table (human-readable) and JSON output formats.

use std::io::Write;

use serde::Serialize;

use wgbridge::{StatusCode, TunnelConfig, TunnelSnapshot};

use crate::cli::Format;
use crate::error::CliError;

/// Output formatter that handles both table and JSON output.
#[derive(Debug, Clone)]
pub struct OutputFormat {
    format: Format,
}

impl OutputFormat {
    /// Create a new output formatter.
    #[must_use]
    pub const fn new(format: Format) -> Self {
        Self { format }
    }

    /// Check if JSON format is selected.
    #[must_use]
    pub const fn is_json(&self) -> bool {
        matches!(self.format, Format::Json)
    }

    /// Write a serializable value to the output.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or writing fails.
    pub fn write<W, T>(&self, writer: &mut W, value: &T) -> Result<(), CliError>
    where
        W: Write,
        T: Serialize + TableDisplay,
    {
        match self.format {
            Format::Json => {
                serde_json::to_writer_pretty(&mut *writer, value)
                    .map_err(|e| CliError::Format(format!("JSON serialization failed: {e}")))?;
                writeln!(writer)?;
            }
            Format::Table => {
                value.write_table(writer)?;
            }
        }
        writer.flush()?;
        Ok(())
    }

    /// Write a serializable value to a string.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_string<T>(&self, value: &T) -> Result<String, CliError>
    where
        T: Serialize + TableDisplay,
    {
        let mut buf = Vec::new();
        self.write(&mut buf, value)?;
        String::from_utf8(buf).map_err(|e| CliError::Format(format!("UTF-8 error: {e}")))
    }
}

impl Default for OutputFormat {
    fn default() -> Self {
        Self::new(Format::Table)
    }
}

/// Trait for types that can be displayed as a table.
pub trait TableDisplay {
    /// Write the value as a human-readable table.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError>;
}

/// Peer part of a [`ConfigSummary`].
#[derive(Debug, Clone, Serialize)]
pub struct PeerSummary {
    /// Peer public key (base64).
    pub public_key: String,
    /// Peer endpoint.
    pub endpoint: String,
    /// Allowed IP ranges.
    pub allowed_ips: Vec<String>,
    /// Keepalive interval in seconds.
    pub persistent_keepalive: Option<u16>,
    /// Whether a preshared key is configured.
    pub preshared_key: bool,
}

/// Summary of a parsed configuration. Carries no secret key material.
#[derive(Debug, Clone, Serialize)]
pub struct ConfigSummary {
    /// Interface public key (base64).
    pub public_key: String,
    /// Interface addresses.
    pub addresses: Vec<String>,
    /// DNS servers.
    pub dns: Vec<String>,
    /// Listen port.
    pub listen_port: Option<u16>,
    /// MTU.
    pub mtu: Option<u16>,
    /// Peers.
    pub peers: Vec<PeerSummary>,
}

impl From<&TunnelConfig> for ConfigSummary {
    fn from(config: &TunnelConfig) -> Self {
        let interface = config.interface();
        Self {
            public_key: interface.public_key().to_base64(),
            addresses: interface.addresses().iter().map(ToString::to_string).collect(),
            dns: interface.dns().iter().map(ToString::to_string).collect(),
            listen_port: interface.listen_port(),
            mtu: interface.mtu(),
            peers: config
                .peers()
                .iter()
                .map(|peer| PeerSummary {
                    public_key: peer.public_key().to_base64(),
                    endpoint: peer.endpoint().to_string(),
                    allowed_ips: peer.allowed_ips().iter().map(ToString::to_string).collect(),
                    persistent_keepalive: peer.persistent_keepalive(),
                    preshared_key: peer.preshared_key().is_some(),
                })
                .collect(),
        }
    }
}

fn or_dash(value: Option<u16>) -> String {
    value.map_or_else(|| "-".to_string(), |v| v.to_string())
}

impl TableDisplay for ConfigSummary {
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        writeln!(writer, "Interface")?;
        writeln!(writer, "══════════════════════════════════")?;
        writeln!(writer, "Public Key:   {}", self.public_key)?;
        writeln!(writer, "Addresses:    {}", self.addresses.join(", "))?;
        if !self.dns.is_empty() {
            writeln!(writer, "DNS:          {}", self.dns.join(", "))?;
        }
        writeln!(writer, "Listen Port:  {}", or_dash(self.listen_port))?;
        writeln!(writer, "MTU:          {}", or_dash(self.mtu))?;
        writeln!(writer)?;

        writeln!(
            writer,
            "{:<44}  {:<28}  {:<9}  {}",
            "PEER", "ENDPOINT", "KEEPALIVE", "ALLOWED IPS"
        )?;
        writeln!(writer, "{}", "─".repeat(100))?;
        for peer in &self.peers {
            writeln!(
                writer,
                "{:<44}  {:<28}  {:<9}  {}",
                peer.public_key,
                peer.endpoint,
                or_dash(peer.persistent_keepalive),
                peer.allowed_ips.join(", ")
            )?;
        }

        writeln!(writer)?;
        writeln!(writer, "Total: {} peer(s)", self.peers.len())?;
        Ok(())
    }
}

/// Canonical wg-quick text.
#[derive(Debug, Clone, Serialize)]
pub struct RenderedConfig {
    /// The rendered configuration.
    pub wg_quick: String,
}

impl TableDisplay for RenderedConfig {
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        write!(writer, "{}", self.wg_quick)?;
        Ok(())
    }
}

/// A freshly generated key pair.
#[derive(Debug, Clone, Serialize)]
pub struct KeyPairOutput {
    /// Private key (base64).
    pub private_key: String,
    /// Public key (base64).
    pub public_key: String,
}

impl TableDisplay for KeyPairOutput {
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        writeln!(writer, "PrivateKey = {}", self.private_key)?;
        writeln!(writer, "PublicKey  = {}", self.public_key)?;
        Ok(())
    }
}

/// A derived public key.
#[derive(Debug, Clone, Serialize)]
pub struct PublicKeyOutput {
    /// Public key (base64).
    pub public_key: String,
}

impl TableDisplay for PublicKeyOutput {
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        writeln!(writer, "{}", self.public_key)?;
        Ok(())
    }
}

/// Result of a tunnel command plus the state it left behind.
#[derive(Debug, Clone, Serialize)]
pub struct TunnelReport {
    /// Command message.
    pub message: String,
    /// Reported status.
    pub status: StatusCode,
    /// Stored manager state.
    #[serde(flatten)]
    pub snapshot: TunnelSnapshot,
}

impl TableDisplay for TunnelReport {
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        writeln!(writer, "{}", self.message)?;
        writeln!(writer, "  Tunnel:  {}", self.snapshot.tunnel_name)?;
        writeln!(writer, "  Status:  {}", self.status)?;
        writeln!(writer, "  State:   {}", self.snapshot.state)?;
        if let Some(id) = self.snapshot.handle_id {
            writeln!(writer, "  Handle:  {id}")?;
        }
        if let Some(err) = &self.snapshot.last_error {
            writeln!(writer, "  Error:   {err}")?;
        }
        Ok(())
    }
}
