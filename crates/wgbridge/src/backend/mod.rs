//! Platform tunnel backends.
//!
//! A [`PlatformTunnelBackend`] performs the OS-facing half of the lifecycle:
//! permission, activation, deactivation and status. One implementation exists
//! per platform shape; the lifecycle manager only ever talks to the trait.
//!
//! - [`ServiceBackend`] drives platforms that expose a long-lived, installable
//!   VPN service object (save a profile, load it, start/stop its connection).
//! - [`DirectBackend`] drives platforms with an imperative set-state call.
//! - `LinuxBackend` (feature `linux`) drives the kernel module over netlink.
//! - [`FakeBackend`] simulates an OS in memory.

use std::future::Future;

use crate::config::TunnelConfig;
use crate::error::BackendError;
use crate::types::{PermissionOutcome, TunnelHandle, TunnelState};

pub mod direct;
pub mod fake;
#[cfg(feature = "linux")]
pub mod linux;
pub mod service;

pub use direct::{DirectApiError, DirectBackend, DirectState, PrepareOutcome, VpnStateApi};
pub use fake::FakeBackend;
#[cfg(feature = "linux")]
pub use linux::LinuxBackend;
pub use service::{
    ServiceBackend, ServiceBackendConfig, ServiceProfile, ServiceStatus, StoreError, StoreErrorCode,
    VpnServiceStore,
};

/// OS-facing tunnel operations.
///
/// Implementations must not keep their own copy of the [`TunnelHandle`]
/// beyond what is needed to address the OS object during a call.
pub trait PlatformTunnelBackend: Send + Sync {
    /// Triggers the OS consent flow if one is required.
    fn request_permission(
        &self,
    ) -> impl Future<Output = Result<PermissionOutcome, BackendError>> + Send;

    /// Installs and brings up the tunnel.
    ///
    /// Called only while no other activate/deactivate is outstanding for the
    /// same handle.
    ///
    /// Must tolerate a tunnel that is already live for `handle`: after a
    /// failed teardown the manager retries `start` by activating again
    /// without a successful `deactivate` in between. Existing OS state is
    /// reused and reconfigured rather than rejected.
    fn activate(
        &self,
        handle: &TunnelHandle,
        config: &TunnelConfig,
    ) -> impl Future<Output = Result<(), BackendError>> + Send;

    /// Tears the tunnel down.
    ///
    /// Returns [`BackendError::AlreadyInactive`] when the OS object is already
    /// gone.
    fn deactivate(
        &self,
        handle: &TunnelHandle,
    ) -> impl Future<Output = Result<(), BackendError>> + Send;

    /// Reads the live tunnel state without mutating anything.
    fn query_status(
        &self,
        handle: &TunnelHandle,
    ) -> impl Future<Output = Result<TunnelState, BackendError>> + Send;
}
