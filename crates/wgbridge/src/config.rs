//! wg-quick configuration parsing and rendering.
//!
//! This module handles the INI-style configuration format used by `WireGuard`:
//!
//! ```text
//! [Interface]
//! PrivateKey = <base64>
//! Address = 10.0.0.2/24, fd00::2/64
//! DNS = 1.1.1.1
//!
//! [Peer]
//! PublicKey = <base64>
//! Endpoint = vpn.example.com:51820
//! AllowedIPs = 0.0.0.0/0, ::/0
//! ```
//!
//! [`parse`] is pure: the same text always yields the same config or the
//! same error.

use std::fmt::Write as FmtWrite;
use std::net::IpAddr;
use std::str::FromStr;

use ipnet::IpNet;

use crate::error::{ConfigError, KeyError, Result};
use crate::keys::{PresharedKey, PrivateKey, PublicKey};
use crate::types::Endpoint;

/// The local side of the tunnel.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InterfaceSection {
    private_key: PrivateKey,
    addresses: Vec<IpNet>,
    dns: Vec<IpAddr>,
    listen_port: Option<u16>,
    mtu: Option<u16>,
}

impl InterfaceSection {
    /// Returns the interface's private key.
    #[must_use]
    pub fn private_key(&self) -> &PrivateKey {
        &self.private_key
    }

    /// Returns the public key derived from the private key.
    #[must_use]
    pub fn public_key(&self) -> PublicKey {
        self.private_key.public_key()
    }

    /// Returns the local addresses (never empty).
    #[must_use]
    pub fn addresses(&self) -> &[IpNet] {
        &self.addresses
    }

    /// Returns the DNS servers.
    #[must_use]
    pub fn dns(&self) -> &[IpAddr] {
        &self.dns
    }

    /// Returns the listen port, if set.
    #[must_use]
    pub fn listen_port(&self) -> Option<u16> {
        self.listen_port
    }

    /// Returns the MTU, if set.
    #[must_use]
    pub fn mtu(&self) -> Option<u16> {
        self.mtu
    }
}

/// A remote peer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PeerSection {
    public_key: PublicKey,
    preshared_key: Option<PresharedKey>,
    endpoint: Endpoint,
    allowed_ips: Vec<IpNet>,
    persistent_keepalive: Option<u16>,
}

impl PeerSection {
    /// Returns the peer's public key.
    #[must_use]
    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }

    /// Returns the preshared key, if set.
    #[must_use]
    pub fn preshared_key(&self) -> Option<&PresharedKey> {
        self.preshared_key.as_ref()
    }

    /// Returns the peer endpoint.
    #[must_use]
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Returns the allowed IP ranges (never empty).
    #[must_use]
    pub fn allowed_ips(&self) -> &[IpNet] {
        &self.allowed_ips
    }

    /// Returns the persistent keepalive interval in seconds, if set.
    #[must_use]
    pub fn persistent_keepalive(&self) -> Option<u16> {
        self.persistent_keepalive
    }
}

/// A validated tunnel configuration: one interface and at least one peer.
///
/// Immutable once constructed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TunnelConfig {
    interface: InterfaceSection,
    peers: Vec<PeerSection>,
}

impl TunnelConfig {
    /// Returns the interface section.
    #[must_use]
    pub fn interface(&self) -> &InterfaceSection {
        &self.interface
    }

    /// Returns the peers in file order (never empty).
    #[must_use]
    pub fn peers(&self) -> &[PeerSection] {
        &self.peers
    }

    /// Renders the configuration as canonical wg-quick text.
    ///
    /// The output parses back to an equal `TunnelConfig`.
    #[must_use]
    pub fn to_wg_quick(&self) -> String {
        let iface = &self.interface;
        let mut output = String::new();

        output.push_str("[Interface]\n");
        let _ = writeln!(output, "PrivateKey = {}", iface.private_key.to_base64());
        let _ = writeln!(output, "Address = {}", join(&iface.addresses));

        if !iface.dns.is_empty() {
            let _ = writeln!(output, "DNS = {}", join(&iface.dns));
        }
        if let Some(port) = iface.listen_port {
            let _ = writeln!(output, "ListenPort = {port}");
        }
        if let Some(mtu) = iface.mtu {
            let _ = writeln!(output, "MTU = {mtu}");
        }

        for peer in &self.peers {
            output.push_str("\n[Peer]\n");
            let _ = writeln!(output, "PublicKey = {}", peer.public_key.to_base64());
            if let Some(ref psk) = peer.preshared_key {
                let _ = writeln!(output, "PresharedKey = {}", psk.to_base64());
            }
            let _ = writeln!(output, "Endpoint = {}", peer.endpoint);
            let _ = writeln!(output, "AllowedIPs = {}", join(&peer.allowed_ips));
            if let Some(keepalive) = peer.persistent_keepalive {
                let _ = writeln!(output, "PersistentKeepalive = {keepalive}");
            }
        }

        output
    }
}

impl FromStr for TunnelConfig {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self> {
        parse(s)
    }
}

fn join<T: ToString>(items: &[T]) -> String {
    items.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
}

/// Parser state for configuration files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    None,
    Interface,
    Peer,
    Unknown,
}

/// Parses wg-quick configuration text into a validated [`TunnelConfig`].
///
/// # Errors
///
/// - [`ConfigError::MissingSection`] without `[Interface]` or without any `[Peer]`
/// - [`ConfigError::DuplicateSection`] for a second `[Interface]`
/// - [`ConfigError::MalformedKey`] for unparseable lines or values
/// - [`ConfigError::InvalidKeyLength`] for keys not decoding to 32 bytes
/// - [`ConfigError::MissingField`] for absent required fields
pub fn parse(text: &str) -> Result<TunnelConfig> {
    let mut section = Section::None;
    let mut interface: Option<ParsedInterface> = None;
    let mut peers: Vec<ParsedPeer> = Vec::new();

    for (index, raw) in text.lines().enumerate() {
        let line_number = index + 1;
        let line = strip_comment(raw).trim();

        if line.is_empty() {
            continue;
        }

        if line.starts_with('[') && line.ends_with(']') {
            section = match &line[1..line.len() - 1] {
                "Interface" => {
                    if interface.is_some() {
                        return Err(ConfigError::DuplicateSection {
                            line: line_number,
                            section: "Interface",
                        });
                    }
                    interface = Some(ParsedInterface::default());
                    Section::Interface
                }
                "Peer" => {
                    peers.push(ParsedPeer::default());
                    Section::Peer
                }
                _ => Section::Unknown,
            };
            continue;
        }

        let Some((key, value)) = line.split_once('=') else {
            return Err(ConfigError::malformed(line_number, line, "expected key = value"));
        };
        let key = key.trim();
        let value = value.trim();

        match section {
            Section::None => {
                return Err(ConfigError::malformed(
                    line_number,
                    key,
                    "key-value pair outside of section",
                ));
            }
            Section::Interface => {
                if let Some(iface) = interface.as_mut() {
                    iface.parse_key(key, value, line_number)?;
                }
            }
            Section::Peer => {
                if let Some(peer) = peers.last_mut() {
                    peer.parse_key(key, value, line_number)?;
                }
            }
            Section::Unknown => {}
        }
    }

    let interface = interface
        .ok_or(ConfigError::MissingSection { section: "Interface" })?
        .build()?;

    if peers.is_empty() {
        return Err(ConfigError::MissingSection { section: "Peer" });
    }
    let peers = peers
        .into_iter()
        .map(ParsedPeer::build)
        .collect::<Result<Vec<_>>>()?;

    Ok(TunnelConfig { interface, peers })
}

fn strip_comment(line: &str) -> &str {
    match line.find('#') {
        Some(pos) => &line[..pos],
        None => line,
    }
}

fn parse_key_field<T>(
    value: &str,
    key: &'static str,
    line: usize,
    decode: impl FnOnce(&str) -> std::result::Result<T, KeyError>,
) -> Result<T> {
    decode(value).map_err(|e| ConfigError::InvalidKeyLength {
        line,
        key,
        length: e.decoded_length(),
    })
}

fn parse_number<T: FromStr>(value: &str, key: &str, line: usize) -> Result<T> {
    value
        .parse()
        .map_err(|_| ConfigError::malformed(line, key, format!("not a valid number: {value}")))
}

fn parse_list<T: FromStr>(value: &str, key: &str, line: usize, out: &mut Vec<T>) -> Result<()>
where
    T::Err: std::fmt::Display,
{
    for entry in value.split(',') {
        let entry = entry.trim();
        if entry.is_empty() {
            return Err(ConfigError::malformed(line, key, "empty list entry"));
        }
        let parsed = entry
            .parse()
            .map_err(|e| ConfigError::malformed(line, key, format!("{entry}: {e}")))?;
        out.push(parsed);
    }
    Ok(())
}

/// Builder for the interface section during parsing.
#[derive(Default)]
struct ParsedInterface {
    private_key: Option<PrivateKey>,
    addresses: Vec<IpNet>,
    dns: Vec<IpAddr>,
    listen_port: Option<u16>,
    mtu: Option<u16>,
}

impl ParsedInterface {
    fn parse_key(&mut self, key: &str, value: &str, line: usize) -> Result<()> {
        match key {
            "PrivateKey" => {
                self.private_key = Some(parse_key_field(
                    value,
                    "PrivateKey",
                    line,
                    PrivateKey::from_base64,
                )?);
            }
            "Address" => parse_list(value, key, line, &mut self.addresses)?,
            "DNS" => parse_list(value, key, line, &mut self.dns)?,
            "ListenPort" => self.listen_port = Some(parse_number(value, key, line)?),
            "MTU" => self.mtu = Some(parse_number(value, key, line)?),
            _ => {}
        }
        Ok(())
    }

    fn build(self) -> Result<InterfaceSection> {
        let private_key = self.private_key.ok_or(ConfigError::MissingField {
            section: "Interface",
            field: "PrivateKey",
        })?;
        if self.addresses.is_empty() {
            return Err(ConfigError::MissingField {
                section: "Interface",
                field: "Address",
            });
        }

        Ok(InterfaceSection {
            private_key,
            addresses: self.addresses,
            dns: self.dns,
            listen_port: self.listen_port,
            mtu: self.mtu,
        })
    }
}

/// Builder for peer configuration during parsing.
#[derive(Default)]
struct ParsedPeer {
    public_key: Option<PublicKey>,
    preshared_key: Option<PresharedKey>,
    endpoint: Option<Endpoint>,
    allowed_ips: Vec<IpNet>,
    persistent_keepalive: Option<u16>,
}

impl ParsedPeer {
    fn parse_key(&mut self, key: &str, value: &str, line: usize) -> Result<()> {
        match key {
            "PublicKey" => {
                self.public_key = Some(parse_key_field(
                    value,
                    "PublicKey",
                    line,
                    PublicKey::from_base64,
                )?);
            }
            "PresharedKey" => {
                self.preshared_key = Some(parse_key_field(
                    value,
                    "PresharedKey",
                    line,
                    PresharedKey::from_base64,
                )?);
            }
            "Endpoint" => {
                self.endpoint = Some(
                    value
                        .parse()
                        .map_err(|e| ConfigError::malformed(line, key, format!("{e}")))?,
                );
            }
            "AllowedIPs" => parse_list(value, key, line, &mut self.allowed_ips)?,
            "PersistentKeepalive" => {
                self.persistent_keepalive = Some(parse_number(value, key, line)?);
            }
            _ => {}
        }
        Ok(())
    }

    fn build(self) -> Result<PeerSection> {
        let missing = |field| ConfigError::MissingField {
            section: "Peer",
            field,
        };
        let public_key = self.public_key.ok_or_else(|| missing("PublicKey"))?;
        let endpoint = self.endpoint.ok_or_else(|| missing("Endpoint"))?;
        if self.allowed_ips.is_empty() {
            return Err(missing("AllowedIPs"));
        }

        Ok(PeerSection {
            public_key,
            preshared_key: self.preshared_key,
            endpoint,
            allowed_ips: self.allowed_ips,
            persistent_keepalive: self.persistent_keepalive,
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::keys::KEY_SIZE;
    use base64::Engine;

    pub(crate) fn private_b64() -> String {
        PrivateKey::from_bytes_array([1u8; KEY_SIZE]).to_base64()
    }

    pub(crate) fn public_b64() -> String {
        PublicKey::from_bytes_array([2u8; KEY_SIZE]).to_base64()
    }

    /// The minimal single-peer configuration used across the crate's tests.
    pub(crate) fn sample_config_text() -> String {
        format!(
            "[Interface]\nPrivateKey={}\nAddress=10.0.0.2/24\n[Peer]\nPublicKey={}\nEndpoint=vpn.example.com:51820\nAllowedIPs=0.0.0.0/0\n",
            private_b64(),
            public_b64()
        )
    }

    fn short_key() -> String {
        base64::engine::general_purpose::STANDARD.encode([9u8; 16])
    }

    #[test]
    fn parse_minimal_scenario() {
        let config = parse(&sample_config_text()).expect("valid config");

        assert_eq!(config.interface().addresses().len(), 1);
        assert_eq!(config.interface().addresses()[0].to_string(), "10.0.0.2/24");
        assert_eq!(config.peers().len(), 1);
        assert_eq!(config.peers()[0].endpoint().to_string(), "vpn.example.com:51820");
        assert_eq!(config.peers()[0].public_key().to_base64(), public_b64());
    }

    #[test]
    fn parse_full_config() {
        let psk = PresharedKey::from_bytes(&[3u8; KEY_SIZE]).expect("valid key");
        let text = format!(
            "# exported by the app\n\
             [Interface]\n\
             PrivateKey = {}\n\
             Address = 10.0.0.2/24, fd00::2/64\n\
             DNS = 1.1.1.1, 2606:4700:4700::1111\n\
             ListenPort = 51820\n\
             MTU = 1420\n\
             \n\
             [Peer]\n\
             PublicKey = {}\n\
             PresharedKey = {}\n\
             Endpoint = [2001:db8::1]:51820\n\
             AllowedIPs = 0.0.0.0/0, ::/0 # full tunnel\n\
             PersistentKeepalive = 25\n",
            private_b64(),
            public_b64(),
            psk.to_base64()
        );

        let config = parse(&text).expect("valid config");
        let iface = config.interface();
        assert_eq!(iface.dns().len(), 2);
        assert_eq!(iface.listen_port(), Some(51820));
        assert_eq!(iface.mtu(), Some(1420));

        let peer = &config.peers()[0];
        let allowed: Vec<String> = peer.allowed_ips().iter().map(ToString::to_string).collect();
        assert_eq!(allowed, vec!["0.0.0.0/0", "::/0"]);
        assert_eq!(peer.preshared_key(), Some(&psk));
        assert_eq!(peer.persistent_keepalive(), Some(25));
        assert_eq!(peer.endpoint().to_string(), "[2001:db8::1]:51820");
    }

    #[test]
    fn multiple_peers_keep_file_order() {
        let second = PublicKey::from_bytes_array([4u8; KEY_SIZE]).to_base64();
        let text = format!(
            "{}\n[Peer]\nPublicKey = {second}\nEndpoint = 10.1.1.1:51820\nAllowedIPs = 10.1.0.0/16\n",
            sample_config_text()
        );

        let config = parse(&text).expect("valid config");
        assert_eq!(config.peers().len(), 2);
        assert_eq!(config.peers()[1].public_key().to_base64(), second);
    }

    #[test]
    fn missing_interface_section() {
        let text = format!(
            "[Peer]\nPublicKey = {}\nEndpoint = 1.2.3.4:51820\nAllowedIPs = 0.0.0.0/0\n",
            public_b64()
        );
        assert_eq!(
            parse(&text),
            Err(ConfigError::MissingSection { section: "Interface" })
        );
    }

    #[test]
    fn missing_peer_section() {
        let text = format!("[Interface]\nPrivateKey = {}\nAddress = 10.0.0.2/24\n", private_b64());
        assert_eq!(parse(&text), Err(ConfigError::MissingSection { section: "Peer" }));
    }

    #[test]
    fn section_names_are_case_sensitive() {
        let text = sample_config_text().replace("[Interface]", "[interface]");
        assert_eq!(
            parse(&text),
            Err(ConfigError::MissingSection { section: "Interface" })
        );
    }

    #[test]
    fn duplicate_interface_rejected() {
        let text = format!("{}[Interface]\n", sample_config_text());
        assert!(matches!(
            parse(&text),
            Err(ConfigError::DuplicateSection { section: "Interface", .. })
        ));
    }

    #[test]
    fn unknown_keys_and_sections_ignored() {
        let text = sample_config_text()
            .replace("[Peer]", "Table = off\nPostUp = iptables -A\n[Peer]")
            + "[Extras]\nWhatever = 1\n";
        assert!(parse(&text).is_ok());
    }

    #[test]
    fn short_private_key_is_invalid_length() {
        let text = sample_config_text().replace(&private_b64(), &short_key());
        assert_eq!(
            parse(&text),
            Err(ConfigError::InvalidKeyLength {
                line: 2,
                key: "PrivateKey",
                length: Some(16),
            })
        );
    }

    #[test]
    fn short_public_key_is_invalid_length() {
        let text = sample_config_text().replace(&public_b64(), &short_key());
        assert!(matches!(
            parse(&text),
            Err(ConfigError::InvalidKeyLength { key: "PublicKey", length: Some(16), .. })
        ));
    }

    #[test]
    fn non_base64_key_is_invalid_length() {
        let text = sample_config_text().replace(&public_b64(), "not-a-key");
        assert!(matches!(
            parse(&text),
            Err(ConfigError::InvalidKeyLength { key: "PublicKey", length: None, .. })
        ));
    }

    #[test]
    fn malformed_cidr_fails_whole_parse() {
        let text = sample_config_text().replace("AllowedIPs=0.0.0.0/0", "AllowedIPs=0.0.0.0/0, 10.0.0.0/33");
        assert!(matches!(
            parse(&text),
            Err(ConfigError::MalformedKey { ref key, .. }) if key == "AllowedIPs"
        ));
    }

    #[test]
    fn bare_address_without_prefix_is_malformed() {
        let text = sample_config_text().replace("Address=10.0.0.2/24", "Address=10.0.0.2");
        assert!(matches!(parse(&text), Err(ConfigError::MalformedKey { line: 3, .. })));
    }

    #[test]
    fn bad_listen_port_is_malformed() {
        let text = sample_config_text().replace("Address=10.0.0.2/24", "Address=10.0.0.2/24\nListenPort=99999");
        assert!(matches!(parse(&text), Err(ConfigError::MalformedKey { line: 4, .. })));
    }

    #[test]
    fn negative_keepalive_is_malformed() {
        let text = format!("{}PersistentKeepalive = -5\n", sample_config_text());
        assert!(matches!(parse(&text), Err(ConfigError::MalformedKey { .. })));
    }

    #[test]
    fn line_without_equals_is_malformed() {
        let text = sample_config_text().replace("[Peer]", "garbage\n[Peer]");
        assert!(matches!(parse(&text), Err(ConfigError::MalformedKey { .. })));
    }

    #[test]
    fn key_before_section_is_malformed() {
        let text = format!("MTU = 1280\n{}", sample_config_text());
        assert!(matches!(parse(&text), Err(ConfigError::MalformedKey { line: 1, .. })));
    }

    #[test]
    fn missing_endpoint_is_missing_field() {
        let text = sample_config_text().replace("Endpoint=vpn.example.com:51820\n", "");
        assert_eq!(
            parse(&text),
            Err(ConfigError::MissingField { section: "Peer", field: "Endpoint" })
        );
    }

    #[test]
    fn missing_address_is_missing_field() {
        let text = sample_config_text().replace("Address=10.0.0.2/24\n", "");
        assert_eq!(
            parse(&text),
            Err(ConfigError::MissingField { section: "Interface", field: "Address" })
        );
    }

    #[test]
    fn wg_quick_rendering_parses_back() {
        let text = format!(
            "[Interface]\nPrivateKey = {}\nAddress = 10.0.0.2/24\nDNS = 9.9.9.9\nMTU = 1280\n\
             [Peer]\nPublicKey = {}\nEndpoint = vpn.example.com:51820\nAllowedIPs = 0.0.0.0/0, ::/0\nPersistentKeepalive = 15\n",
            private_b64(),
            public_b64()
        );
        let config = parse(&text).expect("valid config");
        let rendered = config.to_wg_quick();
        assert_eq!(parse(&rendered), Ok(config));
    }

    #[test]
    fn parse_is_deterministic() {
        let text = sample_config_text();
        assert_eq!(parse(&text), parse(&text));
        let broken = text.replace("[Peer]", "[Nope]");
        assert_eq!(parse(&broken), parse(&broken));
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn wrong_length_key_fails_in_any_key_field(
                len in (0usize..64).prop_filter("not 32", |n| *n != KEY_SIZE),
                field in prop::sample::select(vec!["PrivateKey", "PublicKey"]),
            ) {
                let bad = base64::engine::general_purpose::STANDARD.encode(vec![5u8; len]);
                let text = if field == "PrivateKey" {
                    sample_config_text().replace(&private_b64(), &bad)
                } else {
                    sample_config_text().replace(&public_b64(), &bad)
                };
                let is_invalid_length = matches!(
                    parse(&text),
                    Err(ConfigError::InvalidKeyLength { key, length: Some(n), .. }) if key == field && n == len
                );
                prop_assert!(is_invalid_length);
            }

            #[test]
            fn allowed_ips_roundtrip(
                octets in prop::collection::vec((any::<[u8; 4]>(), 0u8..=32), 1..5),
            ) {
                let entries: Vec<String> = octets
                    .iter()
                    .map(|(o, p)| format!("{}.{}.{}.{}/{}", o[0], o[1], o[2], o[3], p))
                    .collect();
                let text = sample_config_text()
                    .replace("AllowedIPs=0.0.0.0/0", &format!("AllowedIPs={}", entries.join(", ")));
                let config = parse(&text).expect("valid config");
                let parsed: Vec<String> = config.peers()[0]
                    .allowed_ips()
                    .iter()
                    .map(ToString::to_string)
                    .collect();
                prop_assert_eq!(parsed, entries);
            }
        }
    }
}
