//! `up` command implementation.
//!
//! Drives one full tunnel session through the command facade: request
//! permission, start, report, wait for the shutdown signal, stop.

use std::future::Future;
use std::io::Write;

use tracing::{info, warn};

use wgbridge::{
    CommandFacade, ErrorKind, ManagerConfig, PlatformTunnelBackend, TunnelState,
};

use crate::error::CliError;
use crate::output::{OutputFormat, TunnelReport};

/// Up command executor.
pub struct UpCommand {
    config: ManagerConfig,
}

impl UpCommand {
    /// Create a new up command.
    ///
    /// # Errors
    ///
    /// Returns an error if the manager configuration is invalid.
    pub fn new(config: ManagerConfig) -> Result<Self, CliError> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Run a session on `backend` until `shutdown` resolves.
    ///
    /// # Errors
    ///
    /// Returns an error if a tunnel command or output fails.
    pub async fn execute<B, W, F>(
        &self,
        backend: B,
        writer: &mut W,
        format: &OutputFormat,
        config_text: &str,
        shutdown: F,
    ) -> Result<(), CliError>
    where
        B: PlatformTunnelBackend,
        W: Write,
        F: Future<Output = ()>,
    {
        let facade = CommandFacade::new(backend, self.config.clone());

        let permission = facade.request_permission().await?;
        info!(tunnel = %self.config.tunnel_name, "{permission}");
        if facade.snapshot().state == TunnelState::PermissionPending {
            return Err(CliError::InvalidArgument(
                "VPN permission must be granted interactively on this platform".to_string(),
            ));
        }

        // A failed activation can leave a half-built tunnel behind, so both
        // early exits tear down whatever the manager still holds.
        let message = match facade.start_tunnel(config_text).await {
            Ok(message) => message,
            Err(err) => {
                facade.manager().shutdown().await;
                return Err(err.into());
            }
        };
        let report = TunnelReport {
            message,
            status: facade.get_tunnel_status().await,
            snapshot: facade.snapshot(),
        };
        if let Err(err) = format.write(writer, &report) {
            facade.manager().shutdown().await;
            return Err(err);
        }

        shutdown.await;
        info!(tunnel = %self.config.tunnel_name, "shutdown requested");

        let message = match facade.stop_tunnel().await {
            Ok(()) => "Tunnel stopped".to_string(),
            Err(err) if err.kind == ErrorKind::NotInitialized => {
                warn!(tunnel = %self.config.tunnel_name, "tunnel was already gone");
                "Tunnel already stopped".to_string()
            }
            Err(err) => return Err(err.into()),
        };

        let report = TunnelReport {
            message,
            status: facade.get_tunnel_status().await,
            snapshot: facade.snapshot(),
        };
        format.write(writer, &report)
    }
}
