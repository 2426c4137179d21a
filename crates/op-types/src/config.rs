//! Configuration structs for the SSH gateway and the optional HTTP responder.
use std::{path::PathBuf, time::Duration};

use serde::{Deserialize, Serialize};

/// Window a client has to finish the handshake and authenticate.
pub const DEFAULT_AUTH_TIMEOUT: Duration = Duration::from_secs(10);
/// Deadline for establishing the outbound connection of one forward.
pub const DEFAULT_DIAL_TIMEOUT: Duration = Duration::from_secs(25);
/// Local Tor SOCKS port.
pub const DEFAULT_SOCKS_PROXY: &str = "127.0.0.1:9050";

/// Runtime configuration for the SSH forwarding gateway.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// IP address or hostname to bind the SSH listener to.
    pub bind: String,
    /// TCP port the SSH server should listen on.
    pub port: u16,
    /// Path of the private key used as the server identity.
    pub host_key: PathBuf,
    /// Create an Ed25519 key at `host_key` when the file does not exist.
    pub generate_host_key: bool,
    pub auth_timeout: Duration,
    pub dial_timeout: Duration,
    /// How permitted destinations are reached.
    pub dialer: DialerConfig,
    /// Which credentials are accepted.
    pub auth: AuthConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".to_string(),
            port: 2222,
            host_key: PathBuf::from("id_rsa"),
            generate_host_key: false,
            auth_timeout: DEFAULT_AUTH_TIMEOUT,
            dial_timeout: DEFAULT_DIAL_TIMEOUT,
            dialer: DialerConfig::default(),
            auth: AuthConfig::default(),
        }
    }
}

/// Outbound connection strategy.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DialerConfig {
    /// Plain TCP connect from this host.
    Direct,
    /// SOCKS5 CONNECT through a fixed proxy; hostnames are resolved by the proxy.
    Socks5 {
        proxy: String,
        credentials: Option<SocksCredentials>,
    },
}

impl Default for DialerConfig {
    fn default() -> Self {
        Self::Socks5 {
            proxy: DEFAULT_SOCKS_PROXY.to_string(),
            credentials: None,
        }
    }
}

/// Username/password pair for SOCKS5 authentication (RFC 1929).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SocksCredentials {
    pub username: String,
    pub password: String,
}

/// Authentication policy selection.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AuthConfig {
    /// Accept every password and every public key.
    #[default]
    AllowAll,
    /// Accept public keys listed in an OpenSSH `authorized_keys` file.
    AuthorizedKeys { path: PathBuf, allow_password: bool },
}

/// Plain HTTP responder that redirects every request to `location`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedirectConfig {
    pub bind: String,
    pub port: u16,
    pub location: String,
}

impl Default for RedirectConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".to_string(),
            port: 8080,
            location: "https://github.com/fasmide/onionpass".to_string(),
        }
    }
}
