//! Command-line argument parsing with clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use wgbridge::DEFAULT_TUNNEL_NAME;

/// wgbridge - WireGuard tunnel lifecycle tool.
#[derive(Parser, Debug, Clone)]
#[command(name = "wgbridge")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Output format.
    #[arg(short, long, value_enum, default_value_t = Format::Table)]
    pub format: Format,

    /// Name of the managed tunnel.
    #[arg(short, long, env = "WGBRIDGE_TUNNEL_NAME", default_value = DEFAULT_TUNNEL_NAME)]
    pub tunnel_name: String,

    /// Trust the stored state instead of asking the OS on status queries.
    #[arg(long)]
    pub no_reconcile: bool,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Format {
    /// Human-readable table format.
    #[default]
    Table,
    /// JSON output for scripting.
    Json,
}

/// Top-level subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Parse a configuration file and summarize it.
    Check {
        /// Path to a wg-quick configuration file.
        file: PathBuf,
    },

    /// Parse a configuration file and print it in canonical form.
    Render {
        /// Path to a wg-quick configuration file.
        file: PathBuf,
    },

    /// Generate a new key pair.
    Genkey,

    /// Derive the public key for a base64 private key.
    Pubkey {
        /// Base64-encoded private key.
        private_key: String,
    },

    /// Bring a tunnel up and hold it until Ctrl+C.
    Up(UpArgs),
}

/// Arguments for the `up` command.
#[derive(Args, Debug, Clone)]
pub struct UpArgs {
    /// Path to a wg-quick configuration file.
    pub file: PathBuf,

    /// Platform backend to drive.
    #[arg(short, long, value_enum, default_value_t = BackendKind::Fake)]
    pub backend: BackendKind,
}

/// Selectable tunnel backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum BackendKind {
    /// In-memory simulation; touches nothing on the host.
    #[default]
    Fake,
    /// Linux kernel module over netlink (needs the `linux` feature and root).
    Linux,
}
