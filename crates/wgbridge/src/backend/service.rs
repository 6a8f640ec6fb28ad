//! Backend for platforms that expose a long-lived, installable VPN service object.
//!
//! On these platforms a tunnel is a saved profile: the app writes a profile
//! holding the wg-quick text, reloads it, and then starts or stops the
//! profile's connection. The consent prompt is shown by the OS on first save,
//! so there is nothing to ask for up front.

use std::fmt;
use std::future::Future;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::backend::PlatformTunnelBackend;
use crate::config::TunnelConfig;
use crate::error::BackendError;
use crate::types::{PermissionOutcome, TunnelHandle, TunnelState};

/// Connection status of a saved VPN profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceStatus {
    /// The profile does not exist or was never loaded.
    Invalid,
    /// Not connected.
    Disconnected,
    /// Connecting.
    Connecting,
    /// Connected.
    Connected,
    /// Re-establishing after a network change.
    Reasserting,
    /// Disconnecting.
    Disconnecting,
}

impl From<ServiceStatus> for TunnelState {
    fn from(status: ServiceStatus) -> Self {
        match status {
            ServiceStatus::Connected => Self::Up,
            ServiceStatus::Connecting | ServiceStatus::Reasserting => Self::Activating,
            ServiceStatus::Disconnecting => Self::Deactivating,
            ServiceStatus::Disconnected | ServiceStatus::Invalid => Self::Down,
        }
    }
}

/// Error codes reported by a service-object VPN store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreErrorCode {
    /// The profile contents were rejected.
    ConfigurationInvalid,
    /// The profile is disabled.
    ConfigurationDisabled,
    /// The in-memory profile is out of date and must be reloaded.
    ConfigurationStale,
    /// Reading or writing saved profiles failed.
    ReadWriteFailed,
    /// The connection could not be started.
    ConnectionFailed,
    /// The user declined to allow the VPN profile.
    PermissionDenied,
    /// Anything else.
    Unknown,
}

/// An error reported by a [`VpnServiceStore`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{code:?}: {message}")]
pub struct StoreError {
    /// Error code.
    pub code: StoreErrorCode,
    /// Platform description.
    pub message: String,
}

impl StoreError {
    /// Creates a store error.
    #[must_use]
    pub fn new(code: StoreErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl From<StoreError> for BackendError {
    fn from(err: StoreError) -> Self {
        match err.code {
            StoreErrorCode::ConfigurationInvalid | StoreErrorCode::ConfigurationDisabled => {
                Self::ConfigRejected(err.message)
            }
            StoreErrorCode::ReadWriteFailed | StoreErrorCode::ConnectionFailed => {
                Self::PlatformUnavailable(err.message)
            }
            StoreErrorCode::PermissionDenied => Self::PermissionDenied,
            StoreErrorCode::ConfigurationStale | StoreErrorCode::Unknown => {
                Self::Unknown(err.message)
            }
        }
    }
}

/// A saved VPN profile.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceProfile {
    /// Profile (tunnel) name.
    pub name: String,
    /// Bundle identifier of the packet-tunnel provider extension.
    pub provider_bundle_id: String,
    /// Server address shown in system settings.
    pub server_address: String,
    /// Localized description shown in system settings.
    pub description: String,
    /// The wg-quick configuration handed to the provider extension.
    pub wg_quick_config: String,
    /// Whether the profile is enabled.
    pub enabled: bool,
}

impl fmt::Debug for ServiceProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceProfile")
            .field("name", &self.name)
            .field("provider_bundle_id", &self.provider_bundle_id)
            .field("server_address", &self.server_address)
            .field("description", &self.description)
            .field("wg_quick_config", &"[REDACTED]")
            .field("enabled", &self.enabled)
            .finish()
    }
}

/// Binding to a platform's saved-profile VPN API.
pub trait VpnServiceStore: Send + Sync {
    /// Loads every saved profile belonging to the app.
    fn load_all(&self) -> impl Future<Output = Result<Vec<ServiceProfile>, StoreError>> + Send;

    /// Saves (creates or replaces) a profile.
    fn save(&self, profile: ServiceProfile) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Reloads a saved profile by name.
    fn load(&self, name: &str) -> impl Future<Output = Result<ServiceProfile, StoreError>> + Send;

    /// Starts the profile's connection.
    fn start(&self, name: &str) -> Result<(), StoreError>;

    /// Stops the profile's connection.
    fn stop(&self, name: &str);

    /// Returns the profile's connection status.
    fn status(&self, name: &str) -> ServiceStatus;
}

/// Static settings for [`ServiceBackend`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceBackendConfig {
    /// Bundle identifier of the packet-tunnel provider extension.
    pub provider_bundle_id: String,
    /// Server address shown in system settings.
    pub server_address: String,
    /// Description shown in system settings.
    pub description: String,
}

impl Default for ServiceBackendConfig {
    fn default() -> Self {
        Self {
            provider_bundle_id: "com.wgbridge.network-extension".to_string(),
            server_address: "WireGuard".to_string(),
            description: "WireGuard VPN".to_string(),
        }
    }
}

impl ServiceBackendConfig {
    /// Creates a config for the given provider extension.
    #[must_use]
    pub fn new(provider_bundle_id: impl Into<String>) -> Self {
        Self {
            provider_bundle_id: provider_bundle_id.into(),
            ..Self::default()
        }
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// Backend over a [`VpnServiceStore`].
#[derive(Debug, Clone)]
pub struct ServiceBackend<S> {
    store: S,
    config: ServiceBackendConfig,
}

impl<S: VpnServiceStore> ServiceBackend<S> {
    /// Creates a backend over `store`.
    #[must_use]
    pub fn new(store: S, config: ServiceBackendConfig) -> Self {
        Self { store, config }
    }

    /// Returns the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    fn profile_for(&self, handle: &TunnelHandle, config: &TunnelConfig) -> ServiceProfile {
        ServiceProfile {
            name: handle.name().to_string(),
            provider_bundle_id: self.config.provider_bundle_id.clone(),
            server_address: self.config.server_address.clone(),
            description: self.config.description.clone(),
            wg_quick_config: config.to_wg_quick(),
            enabled: true,
        }
    }
}

impl<S: VpnServiceStore> PlatformTunnelBackend for ServiceBackend<S> {
    async fn request_permission(&self) -> Result<PermissionOutcome, BackendError> {
        let profiles = self.store.load_all().await?;
        debug!(saved = profiles.len(), "loaded VPN profiles");
        Ok(PermissionOutcome::AlreadyGranted)
    }

    async fn activate(&self, handle: &TunnelHandle, config: &TunnelConfig) -> Result<(), BackendError> {
        let profile = self.profile_for(handle, config);
        self.store.save(profile).await?;

        // A saved profile must be reloaded before its connection can start.
        let loaded = self.store.load(handle.name()).await?;
        if !loaded.enabled {
            return Err(BackendError::ConfigRejected(format!(
                "profile {} is disabled",
                loaded.name
            )));
        }

        self.store.start(handle.name())?;
        info!(tunnel = handle.name(), "service tunnel started");
        Ok(())
    }

    async fn deactivate(&self, handle: &TunnelHandle) -> Result<(), BackendError> {
        match self.store.status(handle.name()) {
            ServiceStatus::Invalid | ServiceStatus::Disconnected => {
                Err(BackendError::AlreadyInactive)
            }
            _ => {
                self.store.stop(handle.name());
                info!(tunnel = handle.name(), "service tunnel stopped");
                Ok(())
            }
        }
    }

    async fn query_status(&self, handle: &TunnelHandle) -> Result<TunnelState, BackendError> {
        Ok(self.store.status(handle.name()).into())
    }
}
