//! `WireGuard` tunnel lifecycle core.
//!
//! Turns wg-quick configuration text into a validated [`TunnelConfig`], drives
//! a single tunnel through its lifecycle with [`TunnelLifecycleManager`], and
//! exposes the result through [`CommandFacade`] with one uniform error shape.
//! OS specifics live behind [`PlatformTunnelBackend`].
//!
//! ```no_run
//! use wgbridge::{CommandFacade, FakeBackend, ManagerConfig};
//!
//! # async fn run(config_text: &str) -> Result<(), wgbridge::CommandError> {
//! let facade = CommandFacade::new(FakeBackend::new(), ManagerConfig::default());
//! facade.request_permission().await?;
//! facade.start_tunnel(config_text).await?;
//! println!("{}", facade.get_tunnel_status().await);
//! facade.stop_tunnel().await?;
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod backend;
pub mod config;
pub mod error;
pub mod facade;
pub mod keys;
pub mod manager;
pub mod types;

pub use backend::{FakeBackend, PlatformTunnelBackend};
pub use config::{InterfaceSection, PeerSection, TunnelConfig, parse};
pub use error::{
    BackendError, CommandError, CommandResult, ConfigError, ErrorKind, KeyError, ManagerError,
};
pub use facade::CommandFacade;
pub use keys::{KEY_SIZE, PresharedKey, PrivateKey, PublicKey, generate_keypair};
pub use manager::{ManagerConfig, StartOutcome, TunnelLifecycleManager, TunnelSnapshot};
pub use types::{
    DEFAULT_TUNNEL_NAME, Endpoint, EndpointHost, PermissionOutcome, StatusCode, TunnelHandle,
    TunnelState,
};
