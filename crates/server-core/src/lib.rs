//! SSH forwarding gateway that only passes `direct-tcpip` traffic to `.onion` services.
//!
//! [`run_server`] wires the configured host key, auth policy and dialer into a
//! [`Server`]; the pieces are public so embedders and tests can swap any of them.

pub mod auth;
pub mod error;
pub mod events;
pub mod handler;
pub mod server;
pub mod ssh_server;
pub mod transport;

use std::{future::Future, sync::Arc};

use op_types::config::{DialerConfig, ServerConfig};
use ssh_core::{forwarding::dialer_from_config, keys};
use tracing::info;

pub use crate::{
    error::{ServerError, ServerResult}, events::{ServerEvents, TracingEvents}, handler::{Limits, Rejection}, server::Server, ssh_server::RusshTransport
};

/// Run the gateway until the listener fails.
pub async fn run_server(config: ServerConfig) -> ServerResult<()> {
    run_server_with_shutdown(config, std::future::pending()).await
}

/// Run the gateway until `shutdown` resolves.
///
/// Host key, auth policy and bind errors are returned before any connection is accepted.
pub async fn run_server_with_shutdown<F>(config: ServerConfig, shutdown: F) -> ServerResult<()>
where
    F: Future<Output = ()> + Send,
{
    let host_key = if config.generate_host_key {
        keys::load_or_generate_host_key(&config.host_key)?
    } else {
        keys::load_host_key(&config.host_key)?
    };
    let policy = auth::policy_from_config(&config.auth)?;

    match &config.dialer {
        DialerConfig::Direct => info!("dialing forward destinations directly"),
        DialerConfig::Socks5 { proxy, .. } => info!(%proxy, "dialing forward destinations through socks5"),
    }
    let dialer = dialer_from_config(&config.dialer);

    let transport = Arc::new(RusshTransport::new(host_key, policy));
    let limits = Limits {
        auth_timeout: config.auth_timeout,
        dial_timeout: config.dial_timeout,
    };
    let server = Server::new(transport, dialer, Arc::new(TracingEvents), limits);

    let listener = Server::bind(listen_address(&config.bind, config.port)).await?;
    info!(bind = %config.bind, port = config.port, "starting onionpass ssh server");
    server.listen_with_shutdown(listener, shutdown).await
}

/// `host:port`, bracketing bare IPv6 addresses.
fn listen_address(bind: &str, port: u16) -> String {
    if bind.contains(':') && !bind.starts_with('[') {
        format!("[{bind}]:{port}")
    } else {
        format!("{bind}:{port}")
    }
}
