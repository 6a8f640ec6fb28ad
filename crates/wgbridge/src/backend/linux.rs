//! Linux kernel `WireGuard` backend using the netlink API.
//!
//! Wraps `defguard_wireguard_rs` with the `Kernel` implementation. The
//! backend keeps no state of its own: every call addresses the interface by
//! the handle's name, so the kernel is the single source of truth.

use std::net::SocketAddr;
use std::str::FromStr;

use defguard_wireguard_rs::host::Peer as DgPeer;
use defguard_wireguard_rs::key::Key;
use defguard_wireguard_rs::net::IpAddrMask;
use defguard_wireguard_rs::{InterfaceConfiguration, Kernel, WGApi, WireguardInterfaceApi};
use ipnet::IpNet;
use tracing::{debug, info, warn};

use crate::backend::PlatformTunnelBackend;
use crate::config::{PeerSection, TunnelConfig};
use crate::error::BackendError;
use crate::keys::KEY_SIZE;
use crate::types::{EndpointHost, PermissionOutcome, TunnelHandle, TunnelState};

/// Kernel-module backend. Requires `CAP_NET_ADMIN`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LinuxBackend;

impl LinuxBackend {
    /// Creates a Linux backend.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

fn api_for(name: &str) -> Result<WGApi<Kernel>, BackendError> {
    WGApi::<Kernel>::new(name.to_string())
        .map_err(|e| BackendError::PlatformUnavailable(format!("WGApi::new: {e}")))
}

fn to_ip_addr_mask(net: &IpNet) -> Result<IpAddrMask, BackendError> {
    IpAddrMask::from_str(&net.to_string())
        .map_err(|e| BackendError::ConfigRejected(format!("{net}: {e}")))
}

fn to_key(bytes: &[u8; KEY_SIZE], what: &str) -> Result<Key, BackendError> {
    Key::try_from(bytes.as_slice())
        .map_err(|e| BackendError::ConfigRejected(format!("{what}: {e}")))
}

async fn resolve(peer: &PeerSection) -> Result<SocketAddr, BackendError> {
    let endpoint = peer.endpoint();
    match endpoint.host() {
        EndpointHost::Ip(ip) => Ok(SocketAddr::new(*ip, endpoint.port())),
        EndpointHost::Name(name) => tokio::net::lookup_host((name.as_str(), endpoint.port()))
            .await
            .ok()
            .and_then(|mut addrs| addrs.next())
            .ok_or_else(|| {
                BackendError::ConfigRejected(format!("cannot resolve endpoint {endpoint}"))
            }),
    }
}

async fn build_peer(peer: &PeerSection) -> Result<DgPeer, BackendError> {
    let mut dg_peer = DgPeer::new(to_key(peer.public_key().as_bytes(), "public key")?);
    dg_peer.endpoint = Some(resolve(peer).await?);
    dg_peer.persistent_keepalive_interval = peer.persistent_keepalive();

    if let Some(psk) = peer.preshared_key() {
        dg_peer.preshared_key = Some(to_key(psk.as_bytes(), "preshared key")?);
    }

    for net in peer.allowed_ips() {
        dg_peer.allowed_ips.push(to_ip_addr_mask(net)?);
    }

    Ok(dg_peer)
}

impl PlatformTunnelBackend for LinuxBackend {
    async fn request_permission(&self) -> Result<PermissionOutcome, BackendError> {
        // Access is governed by process capabilities, not a consent prompt.
        Ok(PermissionOutcome::AlreadyGranted)
    }

    async fn activate(&self, handle: &TunnelHandle, config: &TunnelConfig) -> Result<(), BackendError> {
        let name = handle.name();
        let interface = config.interface();

        let mut peers = Vec::with_capacity(config.peers().len());
        for peer in config.peers() {
            peers.push(build_peer(peer).await?);
        }
        let addresses = interface
            .addresses()
            .iter()
            .map(to_ip_addr_mask)
            .collect::<Result<Vec<_>, _>>()?;

        let mut api = api_for(name)?;
        if api.read_interface_data().is_ok() {
            debug!(interface = %name, "reusing existing interface");
        } else {
            info!(interface = %name, "creating Linux WireGuard interface");
            api.create_interface()
                .map_err(|e| BackendError::PlatformUnavailable(format!("create_interface: {e}")))?;
        }

        for addr in &addresses {
            api.assign_address(addr)
                .map_err(|e| BackendError::ConfigRejected(format!("assign_address: {e}")))?;
        }

        let iface_config = InterfaceConfiguration {
            name: name.to_string(),
            prvkey: interface.private_key().to_base64(),
            addresses,
            port: interface.listen_port().unwrap_or(0),
            peers: peers.clone(),
            mtu: interface.mtu().map(u32::from),
        };

        api.configure_interface(&iface_config)
            .map_err(|e| BackendError::ConfigRejected(format!("configure_interface: {e}")))?;

        if !peers.is_empty() {
            api.configure_peer_routing(&peers)
                .map_err(|e| BackendError::ConfigRejected(format!("configure_peer_routing: {e}")))?;
        }

        if !interface.dns().is_empty() {
            warn!(interface = %name, "DNS servers are not applied by the kernel backend");
        }

        info!(interface = %name, peers = peers.len(), "Linux WireGuard interface up");
        Ok(())
    }

    async fn deactivate(&self, handle: &TunnelHandle) -> Result<(), BackendError> {
        let name = handle.name();
        let api = api_for(name)?;

        if api.read_interface_data().is_err() {
            return Err(BackendError::AlreadyInactive);
        }

        info!(interface = %name, "removing Linux WireGuard interface");
        api.remove_interface()
            .map_err(|e| BackendError::PlatformUnavailable(format!("remove_interface: {e}")))
    }

    async fn query_status(&self, handle: &TunnelHandle) -> Result<TunnelState, BackendError> {
        let api = api_for(handle.name())?;
        Ok(if api.read_interface_data().is_ok() {
            TunnelState::Up
        } else {
            TunnelState::Down
        })
    }
}
