//! Command surface exposed to the host application.
//!
//! Every command resolves exactly once to a [`CommandResult`]; platform error
//! types never cross this boundary.

use crate::backend::PlatformTunnelBackend;
use crate::error::CommandResult;
use crate::manager::{ManagerConfig, StartOutcome, TunnelLifecycleManager, TunnelSnapshot};
use crate::types::{PermissionOutcome, StatusCode, TunnelState};

/// Success message for a permission check that needed no prompt.
pub const MSG_PERMISSION_GRANTED: &str = "VPN permission already granted";
/// Success message for a permission check that showed a prompt.
pub const MSG_PERMISSION_REQUESTED: &str = "VPN permission requested";
/// Success message for a start that activated the tunnel.
pub const MSG_TUNNEL_STARTED: &str = "Tunnel started successfully";
/// Success message for a start against an already running tunnel.
pub const MSG_TUNNEL_ALREADY_RUNNING: &str = "Tunnel already running";

/// Thin async command layer over a [`TunnelLifecycleManager`].
pub struct CommandFacade<B> {
    manager: TunnelLifecycleManager<B>,
}

impl<B: PlatformTunnelBackend> CommandFacade<B> {
    /// Creates a facade with a fresh manager.
    #[must_use]
    pub fn new(backend: B, config: ManagerConfig) -> Self {
        Self::from_manager(TunnelLifecycleManager::new(backend, config))
    }

    /// Wraps an existing manager.
    #[must_use]
    pub fn from_manager(manager: TunnelLifecycleManager<B>) -> Self {
        Self { manager }
    }

    /// Returns the underlying manager.
    pub fn manager(&self) -> &TunnelLifecycleManager<B> {
        &self.manager
    }

    /// Triggers the OS consent flow if needed.
    ///
    /// # Errors
    ///
    /// Fails with `BUSY`, `PERMISSION_DENIED`, `NO_USER_INTERFACE`,
    /// `BACKEND_FAILURE` or `UNKNOWN`.
    pub async fn request_permission(&self) -> CommandResult<String> {
        let outcome = self.manager.request_permission().await?;
        Ok(match outcome {
            PermissionOutcome::AlreadyGranted => MSG_PERMISSION_GRANTED,
            PermissionOutcome::GrantRequested => MSG_PERMISSION_REQUESTED,
        }
        .to_string())
    }

    /// Delivers the answer to a consent prompt.
    ///
    /// # Errors
    ///
    /// Fails with `PERMISSION_DENIED` when an outstanding prompt was denied.
    pub fn permission_result(&self, granted: bool) -> CommandResult<TunnelState> {
        Ok(self.manager.complete_permission(granted)?)
    }

    /// Parses `config_text` and starts the tunnel.
    ///
    /// # Errors
    ///
    /// Fails with `CONFIG_INVALID`, `BUSY`, `NOT_INITIALIZED`, or a backend
    /// kind.
    pub async fn start_tunnel(&self, config_text: &str) -> CommandResult<String> {
        let outcome = self.manager.start(config_text).await?;
        Ok(match outcome {
            StartOutcome::Started => MSG_TUNNEL_STARTED,
            StartOutcome::AlreadyRunning => MSG_TUNNEL_ALREADY_RUNNING,
        }
        .to_string())
    }

    /// Stops the tunnel.
    ///
    /// # Errors
    ///
    /// Fails with `BUSY`, `NOT_INITIALIZED`, or a backend kind.
    pub async fn stop_tunnel(&self) -> CommandResult<()> {
        Ok(self.manager.stop().await?)
    }

    /// Reports the tunnel status. Never fails.
    pub async fn get_tunnel_status(&self) -> StatusCode {
        self.manager.status().await
    }

    /// Returns a snapshot of the stored state.
    pub fn snapshot(&self) -> TunnelSnapshot {
        self.manager.snapshot()
    }
}
