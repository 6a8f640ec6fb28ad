//! Tunnel lifecycle manager.
//!
//! [`TunnelLifecycleManager`] owns the single managed tunnel: its state, its
//! active configuration and its [`TunnelHandle`]. Every mutating command
//! (permission request, start, stop) passes through one mutation gate; a
//! command issued while another is executing fails with
//! [`ManagerError::Busy`] instead of queuing. Status queries bypass the gate.

use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::backend::PlatformTunnelBackend;
use crate::config::{TunnelConfig, parse};
use crate::error::{BackendError, InvalidTunnelName, ManagerError};
use crate::types::{DEFAULT_TUNNEL_NAME, PermissionOutcome, StatusCode, TunnelHandle, TunnelState};

/// Longest interface name most kernels accept.
const MAX_TUNNEL_NAME_LEN: usize = 15;

/// Configuration for the lifecycle manager.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagerConfig {
    /// Name of the managed tunnel (OS interface or profile name).
    pub tunnel_name: String,
    /// Whether status queries consult the OS and adopt OS-side teardown.
    pub reconcile_status: bool,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            tunnel_name: DEFAULT_TUNNEL_NAME.to_string(),
            reconcile_status: true,
        }
    }
}

impl ManagerConfig {
    /// Creates a config for the named tunnel.
    #[must_use]
    pub fn new(tunnel_name: impl Into<String>) -> Self {
        Self {
            tunnel_name: tunnel_name.into(),
            ..Self::default()
        }
    }

    /// Sets the tunnel name.
    #[must_use]
    pub fn with_tunnel_name(mut self, name: impl Into<String>) -> Self {
        self.tunnel_name = name.into();
        self
    }

    /// Enables or disables status reconciliation.
    #[must_use]
    pub fn with_reconcile_status(mut self, reconcile: bool) -> Self {
        self.reconcile_status = reconcile;
        self
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the tunnel name is empty, too long, or contains
    /// characters other than ASCII alphanumerics, `-` and `_`.
    pub fn validate(&self) -> Result<(), InvalidTunnelName> {
        let reject = |reason| {
            Err(InvalidTunnelName {
                name: self.tunnel_name.clone(),
                reason,
            })
        };

        if self.tunnel_name.is_empty() {
            return reject("must not be empty");
        }
        if self.tunnel_name.len() > MAX_TUNNEL_NAME_LEN {
            return reject("must be at most 15 characters");
        }
        if !self
            .tunnel_name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return reject("may only contain ASCII letters, digits, '-' and '_'");
        }
        Ok(())
    }
}

/// Result of a successful start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StartOutcome {
    /// The tunnel was activated.
    Started,
    /// The tunnel was already up with an equal configuration.
    AlreadyRunning,
}

/// Point-in-time view of the manager.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TunnelSnapshot {
    /// Stored lifecycle state.
    pub state: TunnelState,
    /// Id of the live handle, if one exists.
    pub handle_id: Option<Uuid>,
    /// Name of the managed tunnel.
    pub tunnel_name: String,
    /// Message of the backend failure that caused `Faulted`.
    pub last_error: Option<String>,
}

#[derive(Debug, Default)]
struct Inner {
    state: TunnelState,
    config: Option<Arc<TunnelConfig>>,
    handle: Option<Arc<TunnelHandle>>,
    last_error: Option<String>,
    /// Bumped by every start, restart and release. Status reconciliation only
    /// applies an OS answer when the generation it queried is still current.
    generation: u64,
}

impl Inner {
    fn bump(&mut self) -> u64 {
        self.generation = self.generation.wrapping_add(1);
        self.generation
    }

    fn release(&mut self, state: TunnelState) {
        self.state = state;
        self.config = None;
        self.handle = None;
        self.last_error = None;
        self.bump();
    }
}

/// Owns the tunnel state machine and drives a [`PlatformTunnelBackend`].
pub struct TunnelLifecycleManager<B> {
    backend: B,
    config: ManagerConfig,
    gate: Mutex<()>,
    inner: RwLock<Inner>,
}

impl<B: PlatformTunnelBackend> TunnelLifecycleManager<B> {
    /// Creates a manager in the `Uninitialized` state.
    #[must_use]
    pub fn new(backend: B, config: ManagerConfig) -> Self {
        Self {
            backend,
            config,
            gate: Mutex::new(()),
            inner: RwLock::new(Inner::default()),
        }
    }

    /// Returns the backend.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Returns the manager configuration.
    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    /// Returns the stored lifecycle state.
    pub fn state(&self) -> TunnelState {
        self.inner.read().state
    }

    /// Returns the active tunnel configuration, if any.
    pub fn active_config(&self) -> Option<Arc<TunnelConfig>> {
        self.inner.read().config.clone()
    }

    /// Returns a snapshot of the stored state.
    pub fn snapshot(&self) -> TunnelSnapshot {
        let inner = self.inner.read();
        TunnelSnapshot {
            state: inner.state,
            handle_id: inner.handle.as_ref().map(|h| h.id()),
            tunnel_name: self.config.tunnel_name.clone(),
            last_error: inner.last_error.clone(),
        }
    }

    fn enter(&self) -> Result<MutexGuard<'_, ()>, ManagerError> {
        self.gate.try_lock().map_err(|_| ManagerError::Busy)
    }

    fn set_state(&self, state: TunnelState) {
        let mut inner = self.inner.write();
        debug!(tunnel = %self.config.tunnel_name, from = ?inner.state, to = ?state, "state transition");
        inner.state = state;
    }

    fn fault(&self, err: BackendError) -> ManagerError {
        warn!(tunnel = %self.config.tunnel_name, error = %err, "backend failure, tunnel faulted");
        let mut inner = self.inner.write();
        inner.state = TunnelState::Faulted;
        inner.last_error = Some(err.to_string());
        ManagerError::Backend(err)
    }

    /// Asks the backend for VPN permission.
    ///
    /// Only moves the state out of `Uninitialized`, `PermissionPending` or
    /// `Faulted`; in any other state the outcome is reported and the state is
    /// left alone.
    ///
    /// # Errors
    ///
    /// Returns [`ManagerError::Busy`] if another command is executing, or the
    /// backend error.
    pub async fn request_permission(&self) -> Result<PermissionOutcome, ManagerError> {
        let _gate = self.enter()?;
        let before = self.state();
        let result = self.backend.request_permission().await;

        let applies = matches!(
            before,
            TunnelState::Uninitialized | TunnelState::PermissionPending | TunnelState::Faulted
        );
        if !applies {
            debug!(tunnel = %self.config.tunnel_name, state = ?before, "permission check leaves state unchanged");
            return result.map_err(ManagerError::from);
        }

        match result {
            Ok(PermissionOutcome::AlreadyGranted) => {
                info!(tunnel = %self.config.tunnel_name, "VPN permission granted");
                self.set_state(TunnelState::Ready);
                Ok(PermissionOutcome::AlreadyGranted)
            }
            Ok(PermissionOutcome::GrantRequested) => {
                info!(tunnel = %self.config.tunnel_name, "VPN permission prompt shown");
                self.set_state(TunnelState::PermissionPending);
                Ok(PermissionOutcome::GrantRequested)
            }
            Err(err) => Err(self.fault(err)),
        }
    }

    /// Applies the user's answer to an outstanding permission prompt.
    ///
    /// Ignored unless the manager is `PermissionPending`.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::PermissionDenied`] when the answer was a denial
    /// of an outstanding prompt.
    pub fn complete_permission(&self, granted: bool) -> Result<TunnelState, ManagerError> {
        let mut inner = self.inner.write();
        if inner.state != TunnelState::PermissionPending {
            debug!(tunnel = %self.config.tunnel_name, state = ?inner.state, "ignoring unsolicited permission result");
            return Ok(inner.state);
        }

        if granted {
            info!(tunnel = %self.config.tunnel_name, "VPN permission granted by user");
            inner.state = TunnelState::Ready;
            Ok(inner.state)
        } else {
            let err = BackendError::PermissionDenied;
            warn!(tunnel = %self.config.tunnel_name, "VPN permission denied by user");
            inner.state = TunnelState::Faulted;
            inner.last_error = Some(err.to_string());
            Err(ManagerError::Backend(err))
        }
    }

    /// Parses `config_text` and brings the tunnel up with it.
    ///
    /// Starting an `Up` tunnel with an equal configuration is a no-op. A
    /// different configuration is stored, then the old tunnel is torn down
    /// and the new one activated on the same handle. If that teardown fails
    /// the manager is `Faulted` holding the new configuration.
    ///
    /// Starting from `Faulted` with a live handle activates again without a
    /// teardown; backends accept activation over a live tunnel.
    ///
    /// # Errors
    ///
    /// Returns [`ManagerError::Config`] for invalid text (before any other
    /// check), [`ManagerError::Busy`] if another command is executing,
    /// [`ManagerError::NotInitialized`] before permission is granted, or the
    /// backend error (the manager is then `Faulted`).
    pub async fn start(&self, config_text: &str) -> Result<StartOutcome, ManagerError> {
        let config = Arc::new(parse(config_text)?);
        let _gate = self.enter()?;

        let (state, current, existing) = {
            let inner = self.inner.read();
            (inner.state, inner.config.clone(), inner.handle.clone())
        };

        match state {
            TunnelState::Uninitialized | TunnelState::PermissionPending => {
                return Err(ManagerError::NotInitialized(
                    "VPN permission not granted".to_string(),
                ));
            }
            TunnelState::Up if current.as_deref() == Some(&*config) => {
                debug!(tunnel = %self.config.tunnel_name, "tunnel already running with this configuration");
                return Ok(StartOutcome::AlreadyRunning);
            }
            TunnelState::Activating | TunnelState::Deactivating => return Err(ManagerError::Busy),
            _ => {}
        }

        if let (TunnelState::Up, Some(handle)) = (state, &existing) {
            info!(tunnel = %self.config.tunnel_name, "configuration changed, restarting tunnel");
            {
                let mut inner = self.inner.write();
                inner.state = TunnelState::Deactivating;
                inner.config = Some(Arc::clone(&config));
                inner.bump();
            }
            match self.backend.deactivate(handle).await {
                Ok(()) | Err(BackendError::AlreadyInactive) => {}
                Err(err) => return Err(self.fault(err)),
            }
        }

        let handle = {
            let mut inner = self.inner.write();
            inner.state = TunnelState::Activating;
            inner.config = Some(Arc::clone(&config));
            inner.bump();
            let name = &self.config.tunnel_name;
            Arc::clone(
                inner
                    .handle
                    .get_or_insert_with(|| Arc::new(TunnelHandle::new(name.clone()))),
            )
        };

        info!(tunnel = %handle.name(), handle = %handle.id(), "activating tunnel");
        match self.backend.activate(&handle, &config).await {
            Ok(()) => {
                let mut inner = self.inner.write();
                inner.state = TunnelState::Up;
                inner.last_error = None;
                info!(tunnel = %handle.name(), "tunnel up");
                Ok(StartOutcome::Started)
            }
            Err(err) => Err(self.fault(err)),
        }
    }

    /// Tears the tunnel down and releases the handle.
    ///
    /// # Errors
    ///
    /// Returns [`ManagerError::Busy`] if another command is executing,
    /// [`ManagerError::NotInitialized`] when there is no live tunnel, or the
    /// backend error (the manager is then `Faulted` and keeps the handle).
    pub async fn stop(&self) -> Result<(), ManagerError> {
        let _gate = self.enter()?;

        let handle = {
            let mut inner = self.inner.write();
            match (inner.state, inner.handle.clone()) {
                (TunnelState::Up | TunnelState::Faulted, Some(handle)) => {
                    inner.state = TunnelState::Deactivating;
                    handle
                }
                _ => return Err(ManagerError::NotInitialized("Tunnel not initialized".to_string())),
            }
        };

        info!(tunnel = %handle.name(), "deactivating tunnel");
        match self.backend.deactivate(&handle).await {
            Ok(()) => {}
            Err(BackendError::AlreadyInactive) => {
                debug!(tunnel = %handle.name(), "tunnel was already inactive");
            }
            Err(err) => return Err(self.fault(err)),
        }

        self.inner.write().release(TunnelState::Down);
        info!(tunnel = %handle.name(), "tunnel down");
        Ok(())
    }

    /// Reports the tunnel status.
    ///
    /// While `Up`, the OS is consulted (unless reconciliation is disabled): an
    /// OS-side teardown moves the manager to `Down`, transient OS states are
    /// reported without being stored, and a failed query reports `UNKNOWN`.
    pub async fn status(&self) -> StatusCode {
        let (state, handle, generation) = {
            let inner = self.inner.read();
            (inner.state, inner.handle.clone(), inner.generation)
        };

        let handle = match handle {
            Some(handle) if state == TunnelState::Up && self.config.reconcile_status => handle,
            _ => return state.status_code(),
        };

        match self.backend.query_status(&handle).await {
            Ok(TunnelState::Down) => {
                let mut inner = self.inner.write();
                if inner.state == TunnelState::Up && inner.generation == generation {
                    warn!(tunnel = %handle.name(), "tunnel torn down outside the manager");
                    inner.release(TunnelState::Down);
                }
                inner.state.status_code()
            }
            Ok(os_state) => os_state.status_code(),
            Err(err) => {
                warn!(tunnel = %handle.name(), error = %err, "status query failed");
                StatusCode::Unknown
            }
        }
    }

    /// Stops a live tunnel, logging instead of failing.
    pub async fn shutdown(&self) {
        let live = {
            let inner = self.inner.read();
            inner.handle.is_some() && matches!(inner.state, TunnelState::Up | TunnelState::Faulted)
        };
        if !live {
            return;
        }

        match self.stop().await {
            Ok(()) => info!(tunnel = %self.config.tunnel_name, "tunnel stopped on shutdown"),
            Err(err) => warn!(tunnel = %self.config.tunnel_name, error = %err, "shutdown stop failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::FakeBackend;
    use crate::config::tests::sample_config_text;
    use crate::error::ErrorKind;
    use std::time::Duration;
    use test_case::test_case;
    use tokio::sync::Notify;

    /// Holds every status query until released, then reports the tunnel as
    /// down. Everything else goes to the wrapped fake.
    struct HeldQuery {
        fake: FakeBackend,
        release: Arc<Notify>,
    }

    impl PlatformTunnelBackend for HeldQuery {
        async fn request_permission(&self) -> Result<PermissionOutcome, BackendError> {
            self.fake.request_permission().await
        }

        async fn activate(&self, handle: &TunnelHandle, config: &TunnelConfig) -> Result<(), BackendError> {
            self.fake.activate(handle, config).await
        }

        async fn deactivate(&self, handle: &TunnelHandle) -> Result<(), BackendError> {
            self.fake.deactivate(handle).await
        }

        async fn query_status(&self, _handle: &TunnelHandle) -> Result<TunnelState, BackendError> {
            self.release.notified().await;
            Ok(TunnelState::Down)
        }
    }

    async fn held(fake: &FakeBackend, release: &Arc<Notify>) -> TunnelLifecycleManager<HeldQuery> {
        let m = TunnelLifecycleManager::new(
            HeldQuery {
                fake: fake.clone(),
                release: Arc::clone(release),
            },
            ManagerConfig::default(),
        );
        m.request_permission().await.expect("permission");
        m.start(&sample_config_text()).await.expect("start");
        m
    }

    fn manager(fake: &FakeBackend) -> TunnelLifecycleManager<FakeBackend> {
        TunnelLifecycleManager::new(fake.clone(), ManagerConfig::default())
    }

    async fn ready(fake: &FakeBackend) -> TunnelLifecycleManager<FakeBackend> {
        let m = manager(fake);
        m.request_permission().await.expect("permission");
        m
    }

    fn other_config_text() -> String {
        sample_config_text().replace("10.0.0.2/24", "10.0.0.3/24")
    }

    #[tokio::test]
    async fn start_before_permission_is_not_initialized() {
        let fake = FakeBackend::new();
        let m = manager(&fake);

        let err = m.start(&sample_config_text()).await.expect_err("must fail");
        assert_eq!(err.kind(), ErrorKind::NotInitialized);
        assert_eq!(fake.activate_calls(), 0);
    }

    #[tokio::test]
    async fn invalid_config_fails_before_any_backend_call() {
        let fake = FakeBackend::new();
        let m = ready(&fake).await;

        let err = m.start("[Interface]\n").await.expect_err("must fail");
        assert_eq!(err.kind(), ErrorKind::ConfigInvalid);
        assert_eq!(m.state(), TunnelState::Ready);
        assert_eq!(fake.activate_calls(), 0);
    }

    #[tokio::test]
    async fn start_brings_tunnel_up() {
        let fake = FakeBackend::new();
        let m = ready(&fake).await;
        assert_eq!(m.state(), TunnelState::Ready);

        assert_eq!(m.start(&sample_config_text()).await, Ok(StartOutcome::Started));
        assert_eq!(m.state(), TunnelState::Up);
        assert_eq!(m.status().await, StatusCode::Up);
        assert_eq!(fake.activate_calls(), 1);
        assert!(m.snapshot().handle_id.is_some());
    }

    #[tokio::test]
    async fn repeated_start_with_equal_config_is_a_noop() {
        let fake = FakeBackend::new();
        let m = ready(&fake).await;

        m.start(&sample_config_text()).await.expect("first start");
        let outcome = m.start(&sample_config_text()).await.expect("second start");

        assert_eq!(outcome, StartOutcome::AlreadyRunning);
        assert_eq!(fake.activate_calls(), 1);
        assert_eq!(fake.deactivate_calls(), 0);
    }

    #[tokio::test]
    async fn start_with_new_config_restarts_tunnel() {
        let fake = FakeBackend::new();
        let m = ready(&fake).await;
        m.start(&sample_config_text()).await.expect("first start");
        let handle_id = m.snapshot().handle_id;

        m.start(&other_config_text()).await.expect("restart");

        assert_eq!(fake.deactivate_calls(), 1);
        assert_eq!(fake.activate_calls(), 2);
        assert_eq!(m.state(), TunnelState::Up);
        assert_eq!(m.snapshot().handle_id, handle_id);
        let active = m.active_config().expect("active config");
        assert_eq!(active.interface().addresses()[0].to_string(), "10.0.0.3/24");
    }

    #[tokio::test]
    async fn concurrent_start_is_busy() {
        let fake = FakeBackend::new();
        fake.set_activation_delay(Duration::from_millis(20));
        let m = ready(&fake).await;
        let text = sample_config_text();

        let (first, second, status) = tokio::join!(m.start(&text), m.start(&text), m.status());

        assert_eq!(first, Ok(StartOutcome::Started));
        assert_eq!(second.map_err(|e| e.kind()), Err(ErrorKind::Busy));
        assert_eq!(status, StatusCode::Connecting);
        assert_eq!(fake.activate_calls(), 1);
        assert_eq!(fake.query_calls(), 0);
    }

    #[tokio::test]
    async fn concurrent_stop_is_busy_and_reports_disconnecting() {
        let fake = FakeBackend::new();
        fake.set_deactivation_delay(Duration::from_millis(20));
        let m = ready(&fake).await;
        m.start(&sample_config_text()).await.expect("start");

        let (first, second, status) = tokio::join!(m.stop(), m.stop(), m.status());

        assert_eq!(first, Ok(()));
        assert_eq!(second.map_err(|e| e.kind()), Err(ErrorKind::Busy));
        assert_eq!(status, StatusCode::Disconnecting);
        assert_eq!(fake.deactivate_calls(), 1);
        assert_eq!(m.state(), TunnelState::Down);
    }

    #[tokio::test]
    async fn stop_during_start_is_busy() {
        let fake = FakeBackend::new();
        fake.set_activation_delay(Duration::from_millis(20));
        let m = ready(&fake).await;
        let text = sample_config_text();

        let (started, stopped) = tokio::join!(m.start(&text), m.stop());

        assert_eq!(started, Ok(StartOutcome::Started));
        assert_eq!(stopped.map_err(|e| e.kind()), Err(ErrorKind::Busy));
        assert_eq!(m.state(), TunnelState::Up);
        assert_eq!(fake.deactivate_calls(), 0);
    }

    #[tokio::test]
    async fn start_during_stop_is_busy() {
        let fake = FakeBackend::new();
        fake.set_deactivation_delay(Duration::from_millis(20));
        let m = ready(&fake).await;
        m.start(&sample_config_text()).await.expect("start");
        let other = other_config_text();

        let (stopped, started) = tokio::join!(m.stop(), m.start(&other));

        assert_eq!(stopped, Ok(()));
        assert_eq!(started.map_err(|e| e.kind()), Err(ErrorKind::Busy));
        assert_eq!(m.state(), TunnelState::Down);
        assert_eq!(fake.activate_calls(), 1);
    }

    #[tokio::test]
    async fn failed_restart_teardown_keeps_new_config() {
        let fake = FakeBackend::new();
        let m = ready(&fake).await;
        m.start(&sample_config_text()).await.expect("first start");
        let handle_id = m.snapshot().handle_id;
        fake.fail_next_deactivate(BackendError::PlatformUnavailable("netlink".into()));

        assert!(m.start(&other_config_text()).await.is_err());
        assert_eq!(m.state(), TunnelState::Faulted);
        assert_eq!(m.snapshot().handle_id, handle_id);
        let active = m.active_config().expect("active config");
        assert_eq!(active.interface().addresses()[0].to_string(), "10.0.0.3/24");

        // The retry activates over the live tunnel without another teardown.
        m.start(&other_config_text()).await.expect("retry");
        assert_eq!(m.state(), TunnelState::Up);
        assert_eq!(fake.deactivate_calls(), 1);
        assert_eq!(fake.activate_calls(), 2);
    }

    #[tokio::test]
    async fn stop_without_tunnel_is_not_initialized() {
        let fake = FakeBackend::new();
        let m = ready(&fake).await;

        let err = m.stop().await.expect_err("must fail");
        assert_eq!(err, ManagerError::NotInitialized("Tunnel not initialized".into()));
        assert_eq!(fake.deactivate_calls(), 0);
    }

    #[tokio::test]
    async fn stop_releases_handle() {
        let fake = FakeBackend::new();
        let m = ready(&fake).await;
        m.start(&sample_config_text()).await.expect("start");

        m.stop().await.expect("stop");

        let snapshot = m.snapshot();
        assert_eq!(snapshot.state, TunnelState::Down);
        assert_eq!(snapshot.handle_id, None);
        assert!(m.active_config().is_none());
        assert_eq!(m.status().await, StatusCode::Down);
        assert_eq!(m.stop().await.map_err(|e| e.kind()), Err(ErrorKind::NotInitialized));
    }

    #[tokio::test]
    async fn stop_tolerates_already_inactive() {
        let fake = FakeBackend::new();
        let m = TunnelLifecycleManager::new(
            fake.clone(),
            ManagerConfig::default().with_reconcile_status(false),
        );
        m.request_permission().await.expect("permission");
        m.start(&sample_config_text()).await.expect("start");
        fake.force_os_state("wg0", TunnelState::Down);

        assert_eq!(m.stop().await, Ok(()));
        assert_eq!(m.state(), TunnelState::Down);
    }

    #[tokio::test]
    async fn activation_failure_faults_and_allows_restart() {
        let fake = FakeBackend::new();
        let m = ready(&fake).await;
        fake.fail_next_activate(BackendError::ConfigRejected("bad mtu".into()));

        let err = m.start(&sample_config_text()).await.expect_err("must fail");
        assert_eq!(err.kind(), ErrorKind::BackendFailure);
        assert_eq!(m.state(), TunnelState::Faulted);
        assert_eq!(m.status().await, StatusCode::Unknown);
        assert_eq!(
            m.snapshot().last_error.as_deref(),
            Some("configuration rejected: bad mtu")
        );

        m.start(&sample_config_text()).await.expect("restart from faulted");
        assert_eq!(m.state(), TunnelState::Up);
        assert_eq!(m.snapshot().last_error, None);
    }

    #[tokio::test]
    async fn failed_stop_keeps_handle_for_retry() {
        let fake = FakeBackend::new();
        let m = ready(&fake).await;
        m.start(&sample_config_text()).await.expect("start");
        fake.fail_next_deactivate(BackendError::PlatformUnavailable("netlink".into()));

        assert!(m.stop().await.is_err());
        assert_eq!(m.state(), TunnelState::Faulted);
        assert!(m.snapshot().handle_id.is_some());

        m.stop().await.expect("retry stop");
        assert_eq!(m.state(), TunnelState::Down);
    }

    #[tokio::test]
    async fn os_teardown_is_reconciled() {
        let fake = FakeBackend::new();
        let m = ready(&fake).await;
        m.start(&sample_config_text()).await.expect("start");

        fake.force_os_state("wg0", TunnelState::Down);

        assert_eq!(m.status().await, StatusCode::Down);
        assert_eq!(m.state(), TunnelState::Down);
        assert_eq!(m.stop().await.map_err(|e| e.kind()), Err(ErrorKind::NotInitialized));
    }

    #[tokio::test]
    async fn stale_down_answer_does_not_release_restarted_tunnel() {
        let fake = FakeBackend::new();
        let release = Arc::new(Notify::new());
        let m = held(&fake, &release).await;
        let other = other_config_text();

        let (status, restart) = tokio::join!(m.status(), async {
            let outcome = m.start(&other).await;
            release.notify_one();
            outcome
        });

        assert_eq!(restart, Ok(StartOutcome::Started));
        assert_eq!(status, StatusCode::Up);
        assert_eq!(m.state(), TunnelState::Up);
        assert!(m.snapshot().handle_id.is_some());
        assert_eq!(fake.os_state("wg0"), TunnelState::Up);

        m.stop().await.expect("stop reaches the live tunnel");
        assert_eq!(fake.os_state("wg0"), TunnelState::Down);
    }

    #[tokio::test]
    async fn held_down_answer_is_adopted_when_nothing_changed() {
        let fake = FakeBackend::new();
        let release = Arc::new(Notify::new());
        let m = held(&fake, &release).await;

        release.notify_one();

        assert_eq!(m.status().await, StatusCode::Down);
        assert_eq!(m.state(), TunnelState::Down);
        assert_eq!(m.snapshot().handle_id, None);
    }

    #[tokio::test]
    async fn transient_os_state_is_reported_not_stored() {
        let fake = FakeBackend::new();
        let m = ready(&fake).await;
        m.start(&sample_config_text()).await.expect("start");

        fake.force_os_state("wg0", TunnelState::Activating);

        assert_eq!(m.status().await, StatusCode::Connecting);
        assert_eq!(m.state(), TunnelState::Up);
    }

    #[tokio::test]
    async fn reconciliation_can_be_disabled() {
        let fake = FakeBackend::new();
        let m = TunnelLifecycleManager::new(
            fake.clone(),
            ManagerConfig::default().with_reconcile_status(false),
        );
        m.request_permission().await.expect("permission");
        m.start(&sample_config_text()).await.expect("start");
        fake.force_os_state("wg0", TunnelState::Down);

        assert_eq!(m.status().await, StatusCode::Up);
        assert_eq!(fake.query_calls(), 0);
    }

    #[tokio::test]
    async fn query_failure_reports_unknown_without_mutation() {
        let fake = FakeBackend::new();
        let m = ready(&fake).await;
        m.start(&sample_config_text()).await.expect("start");
        fake.fail_next_query(BackendError::Unknown("ipc".into()));

        assert_eq!(m.status().await, StatusCode::Unknown);
        assert_eq!(m.state(), TunnelState::Up);
        assert_eq!(m.status().await, StatusCode::Up);
    }

    #[tokio::test]
    async fn handle_is_stable_across_status_queries() {
        let fake = FakeBackend::new();
        let m = ready(&fake).await;
        m.start(&sample_config_text()).await.expect("start");
        let before = m.snapshot().handle_id;

        for _ in 0..3 {
            m.status().await;
        }

        assert_eq!(m.snapshot().handle_id, before);
    }

    #[tokio::test]
    async fn consent_prompt_then_grant() {
        let fake = FakeBackend::new();
        fake.set_permission(Ok(PermissionOutcome::GrantRequested));
        let m = manager(&fake);

        assert_eq!(m.request_permission().await, Ok(PermissionOutcome::GrantRequested));
        assert_eq!(m.state(), TunnelState::PermissionPending);
        assert_eq!(
            m.start(&sample_config_text()).await.map_err(|e| e.kind()),
            Err(ErrorKind::NotInitialized)
        );

        assert_eq!(m.complete_permission(true), Ok(TunnelState::Ready));
        m.start(&sample_config_text()).await.expect("start");
    }

    #[tokio::test]
    async fn consent_denied_faults() {
        let fake = FakeBackend::new();
        fake.set_permission(Ok(PermissionOutcome::GrantRequested));
        let m = manager(&fake);
        m.request_permission().await.expect("prompt");

        let err = m.complete_permission(false).expect_err("denied");
        assert_eq!(err.kind(), ErrorKind::PermissionDenied);
        assert_eq!(m.state(), TunnelState::Faulted);
    }

    #[tokio::test]
    async fn unsolicited_permission_result_is_ignored() {
        let fake = FakeBackend::new();
        let m = ready(&fake).await;

        assert_eq!(m.complete_permission(false), Ok(TunnelState::Ready));
    }

    #[tokio::test]
    async fn permission_failure_faults_from_uninitialized() {
        let fake = FakeBackend::new();
        fake.set_permission(Err(BackendError::NoUserInterface));
        let m = manager(&fake);

        let err = m.request_permission().await.expect_err("must fail");
        assert_eq!(err.kind(), ErrorKind::NoUserInterface);
        assert_eq!(m.state(), TunnelState::Faulted);
    }

    #[tokio::test]
    async fn permission_request_leaves_running_tunnel_alone() {
        let fake = FakeBackend::new();
        let m = ready(&fake).await;
        m.start(&sample_config_text()).await.expect("start");

        fake.set_permission(Err(BackendError::PermissionDenied));
        assert!(m.request_permission().await.is_err());
        assert_eq!(m.state(), TunnelState::Up);
    }

    #[tokio::test]
    async fn shutdown_stops_live_tunnel() {
        let fake = FakeBackend::new();
        let m = ready(&fake).await;
        m.start(&sample_config_text()).await.expect("start");

        m.shutdown().await;

        assert_eq!(m.state(), TunnelState::Down);
        assert_eq!(fake.os_state("wg0"), TunnelState::Down);
    }

    #[tokio::test]
    async fn shutdown_without_tunnel_is_quiet() {
        let fake = FakeBackend::new();
        let m = ready(&fake).await;

        m.shutdown().await;

        assert_eq!(m.state(), TunnelState::Ready);
        assert_eq!(fake.deactivate_calls(), 0);
    }

    #[test]
    fn default_config() {
        let config = ManagerConfig::default();
        assert_eq!(config.tunnel_name, "wg0");
        assert!(config.reconcile_status);
        assert!(config.validate().is_ok());
    }

    #[test_case("" ; "empty")]
    #[test_case("a-very-long-tunnel-name" ; "too long")]
    #[test_case("wg 0" ; "space")]
    #[test_case("wg/0" ; "slash")]
    fn invalid_tunnel_names(name: &str) {
        assert!(ManagerConfig::new(name).validate().is_err());
    }

    #[test_case("wg0")]
    #[test_case("office_vpn")]
    #[test_case("tun-1")]
    fn valid_tunnel_names(name: &str) {
        assert!(ManagerConfig::new(name).validate().is_ok());
    }
}
