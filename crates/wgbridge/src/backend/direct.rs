//! Backend for platforms with an imperative "set tunnel state" API.
//!
//! These platforms gate VPN use behind a one-time consent activity. The app
//! asks whether consent is needed (`prepare`), launches the consent UI when it
//! is, and learns the answer later through an activity-result callback. Once
//! consent is in place, tunnels are brought up and down with a single
//! `set_state` call carrying the full configuration.

use std::future::Future;

use thiserror::Error;
use tracing::{debug, info};

use crate::backend::PlatformTunnelBackend;
use crate::config::TunnelConfig;
use crate::error::BackendError;
use crate::types::{PermissionOutcome, TunnelHandle, TunnelState};

/// Result of asking the platform whether VPN consent is needed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrepareOutcome {
    /// Consent was given earlier.
    Granted,
    /// The consent activity must be shown.
    ConsentRequired,
}

/// Tunnel state as the platform API reports it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectState {
    /// Tunnel is running.
    Up,
    /// Tunnel is stopped.
    Down,
}

impl From<DirectState> for TunnelState {
    fn from(state: DirectState) -> Self {
        match state {
            DirectState::Up => Self::Up,
            DirectState::Down => Self::Down,
        }
    }
}

/// Errors raised by the platform API.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DirectApiError {
    /// The app has no VPN consent.
    #[error("VPN service not authorized")]
    VpnNotAuthorized,
    /// There is no foreground activity to host the consent prompt.
    #[error("no activity available to show the consent prompt")]
    NoActivity,
    /// The VPN service could not be started.
    #[error("unable to start VPN service")]
    UnableToStartVpn,
    /// The TUN device could not be created.
    #[error("TUN device creation failed")]
    TunCreationError,
    /// The userspace implementation refused the configuration.
    #[error("activation failed with code {0}")]
    ActivationError(i32),
    /// A peer endpoint hostname did not resolve.
    #[error("endpoint DNS resolution failed: {0}")]
    DnsResolutionFailure(String),
    /// Anything else.
    #[error("{0}")]
    Other(String),
}

impl From<DirectApiError> for BackendError {
    fn from(err: DirectApiError) -> Self {
        match err {
            DirectApiError::VpnNotAuthorized => Self::PermissionDenied,
            DirectApiError::NoActivity => Self::NoUserInterface,
            DirectApiError::UnableToStartVpn | DirectApiError::TunCreationError => {
                Self::PlatformUnavailable(err.to_string())
            }
            DirectApiError::ActivationError(_) | DirectApiError::DnsResolutionFailure(_) => {
                Self::ConfigRejected(err.to_string())
            }
            DirectApiError::Other(message) => Self::Unknown(message),
        }
    }
}

/// Binding to a platform's imperative VPN API.
pub trait VpnStateApi: Send + Sync {
    /// Checks whether VPN consent is needed.
    fn prepare(&self) -> Result<PrepareOutcome, DirectApiError>;

    /// Shows the consent activity. The answer arrives out of band.
    fn launch_consent(&self) -> Result<(), DirectApiError>;

    /// Sets the tunnel state, returning the state the platform settled in.
    ///
    /// `config` is `Some` when bringing the tunnel up.
    fn set_state(
        &self,
        name: &str,
        state: DirectState,
        config: Option<&TunnelConfig>,
    ) -> impl Future<Output = Result<DirectState, DirectApiError>> + Send;

    /// Reads the tunnel state.
    fn get_state(
        &self,
        name: &str,
    ) -> impl Future<Output = Result<DirectState, DirectApiError>> + Send;
}

/// Backend over a [`VpnStateApi`].
#[derive(Debug, Clone)]
pub struct DirectBackend<V> {
    api: V,
}

impl<V: VpnStateApi> DirectBackend<V> {
    /// Creates a backend over `api`.
    #[must_use]
    pub fn new(api: V) -> Self {
        Self { api }
    }

    /// Returns the underlying API.
    pub fn api(&self) -> &V {
        &self.api
    }
}

impl<V: VpnStateApi> PlatformTunnelBackend for DirectBackend<V> {
    async fn request_permission(&self) -> Result<PermissionOutcome, BackendError> {
        match self.api.prepare()? {
            PrepareOutcome::Granted => Ok(PermissionOutcome::AlreadyGranted),
            PrepareOutcome::ConsentRequired => {
                self.api.launch_consent()?;
                debug!("VPN consent prompt launched");
                Ok(PermissionOutcome::GrantRequested)
            }
        }
    }

    async fn activate(&self, handle: &TunnelHandle, config: &TunnelConfig) -> Result<(), BackendError> {
        let settled = self
            .api
            .set_state(handle.name(), DirectState::Up, Some(config))
            .await?;
        if settled != DirectState::Up {
            return Err(BackendError::Unknown(format!(
                "tunnel {} did not come up",
                handle.name()
            )));
        }
        info!(tunnel = handle.name(), "direct tunnel up");
        Ok(())
    }

    async fn deactivate(&self, handle: &TunnelHandle) -> Result<(), BackendError> {
        if self.api.get_state(handle.name()).await? == DirectState::Down {
            return Err(BackendError::AlreadyInactive);
        }
        self.api
            .set_state(handle.name(), DirectState::Down, None)
            .await?;
        info!(tunnel = handle.name(), "direct tunnel down");
        Ok(())
    }

    async fn query_status(&self, handle: &TunnelHandle) -> Result<TunnelState, BackendError> {
        Ok(self.api.get_state(handle.name()).await?.into())
    }
}
