//! In-memory backend that simulates an OS VPN subsystem.
//!
//! Used by the test suite and by `wgbridge up --backend fake`. Clones share
//! the same simulated OS, so a test can keep one clone to inspect calls and
//! inject failures while the manager owns another.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::debug;

use crate::backend::PlatformTunnelBackend;
use crate::config::TunnelConfig;
use crate::error::BackendError;
use crate::types::{PermissionOutcome, TunnelHandle, TunnelState};

#[derive(Debug, Default)]
struct FakeOs {
    tunnels: HashMap<String, TunnelState>,
    last_config: Option<TunnelConfig>,
    permission: Option<Result<PermissionOutcome, BackendError>>,
    fail_activate: Option<BackendError>,
    fail_deactivate: Option<BackendError>,
    fail_query: Option<BackendError>,
    activation_delay: Option<Duration>,
    deactivation_delay: Option<Duration>,
    activate_calls: usize,
    deactivate_calls: usize,
    query_calls: usize,
}

/// A fake platform backend for testing.
#[derive(Debug, Clone, Default)]
pub struct FakeBackend {
    os: Arc<Mutex<FakeOs>>,
}

impl FakeBackend {
    /// Creates a fake backend where permission is already granted.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the result of the next and all following permission requests.
    pub fn set_permission(&self, result: Result<PermissionOutcome, BackendError>) {
        self.os.lock().permission = Some(result);
    }

    /// Makes the next `activate` call fail with `err`.
    pub fn fail_next_activate(&self, err: BackendError) {
        self.os.lock().fail_activate = Some(err);
    }

    /// Makes the next `deactivate` call fail with `err`.
    pub fn fail_next_deactivate(&self, err: BackendError) {
        self.os.lock().fail_deactivate = Some(err);
    }

    /// Makes the next `query_status` call fail with `err`.
    pub fn fail_next_query(&self, err: BackendError) {
        self.os.lock().fail_query = Some(err);
    }

    /// Delays every activation, simulating a slow OS round-trip.
    pub fn set_activation_delay(&self, delay: Duration) {
        self.os.lock().activation_delay = Some(delay);
    }

    /// Delays every deactivation, simulating a slow OS round-trip.
    pub fn set_deactivation_delay(&self, delay: Duration) {
        self.os.lock().deactivation_delay = Some(delay);
    }

    /// Overrides the OS-side state of a tunnel, as if the OS changed it.
    pub fn force_os_state(&self, name: &str, state: TunnelState) {
        self.os.lock().tunnels.insert(name.to_string(), state);
    }

    /// Returns the OS-side state of a tunnel.
    pub fn os_state(&self, name: &str) -> TunnelState {
        self.os
            .lock()
            .tunnels
            .get(name)
            .copied()
            .unwrap_or(TunnelState::Down)
    }

    /// Number of `activate` calls so far.
    pub fn activate_calls(&self) -> usize {
        self.os.lock().activate_calls
    }

    /// Number of `deactivate` calls so far.
    pub fn deactivate_calls(&self) -> usize {
        self.os.lock().deactivate_calls
    }

    /// Number of `query_status` calls so far.
    pub fn query_calls(&self) -> usize {
        self.os.lock().query_calls
    }

    /// The configuration most recently activated.
    pub fn last_config(&self) -> Option<TunnelConfig> {
        self.os.lock().last_config.clone()
    }
}

impl PlatformTunnelBackend for FakeBackend {
    async fn request_permission(&self) -> Result<PermissionOutcome, BackendError> {
        self.os
            .lock()
            .permission
            .clone()
            .unwrap_or(Ok(PermissionOutcome::AlreadyGranted))
    }

    async fn activate(&self, handle: &TunnelHandle, config: &TunnelConfig) -> Result<(), BackendError> {
        let delay = {
            let mut os = self.os.lock();
            os.activate_calls += 1;
            if let Some(err) = os.fail_activate.take() {
                return Err(err);
            }
            os.tunnels.insert(handle.name().to_string(), TunnelState::Activating);
            os.activation_delay
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut os = self.os.lock();
        os.tunnels.insert(handle.name().to_string(), TunnelState::Up);
        os.last_config = Some(config.clone());
        debug!(tunnel = handle.name(), "fake tunnel up");
        Ok(())
    }

    async fn deactivate(&self, handle: &TunnelHandle) -> Result<(), BackendError> {
        let delay = {
            let mut os = self.os.lock();
            os.deactivate_calls += 1;
            if let Some(err) = os.fail_deactivate.take() {
                return Err(err);
            }
            os.deactivation_delay
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut os = self.os.lock();
        match os.tunnels.remove(handle.name()) {
            None | Some(TunnelState::Down) => Err(BackendError::AlreadyInactive),
            Some(_) => {
                debug!(tunnel = handle.name(), "fake tunnel down");
                Ok(())
            }
        }
    }

    async fn query_status(&self, handle: &TunnelHandle) -> Result<TunnelState, BackendError> {
        let mut os = self.os.lock();
        os.query_calls += 1;
        if let Some(err) = os.fail_query.take() {
            return Err(err);
        }
        Ok(os
            .tunnels
            .get(handle.name())
            .copied()
            .unwrap_or(TunnelState::Down))
    }
}
