//! CLI command implementations.
//!
//! - [`config`] - `check` and `render`
//! - [`keys`] - `genkey` and `pubkey`
//! - [`up`] - run a tunnel session

pub mod config;
pub mod keys;
pub mod up;

pub use config::ConfigCommand;
pub use keys::KeyCommand;
pub use up::UpCommand;
