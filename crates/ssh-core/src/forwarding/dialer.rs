use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use op_types::config::{DialerConfig, SocksCredentials};
use tokio::net::TcpStream;
use tokio_socks::tcp::Socks5Stream;
use tracing::debug;

use super::traits::ForwardStream;
use crate::error::DialError;

/// Establishes the outbound side of a forward.
///
/// Implementations must not apply their own deadline; callers wrap `dial` with
/// [`dial_with_deadline`]. Dropping the returned future abandons the attempt
/// along with any half-open connection.
#[async_trait]
pub trait Dialer: Send + Sync + 'static {
    /// Connect over TCP to `address` (`host:port`).
    async fn dial(&self, address: &str) -> Result<ForwardStream, DialError>;
}

/// Plain TCP connect from this host.
#[derive(Clone, Debug, Default)]
pub struct DirectDialer;

#[async_trait]
impl Dialer for DirectDialer {
    async fn dial(&self, address: &str) -> Result<ForwardStream, DialError> {
        let stream = TcpStream::connect(address).await?;
        stream.set_nodelay(true).ok();
        Ok(Box::new(stream))
    }
}

/// SOCKS5 CONNECT through a fixed proxy. The target hostname is handed to the
/// proxy unresolved, which is what makes `.onion` names reachable via Tor.
#[derive(Clone, Debug)]
pub struct SocksDialer {
    proxy: String,
    credentials: Option<SocksCredentials>,
}

impl SocksDialer {
    pub fn new(proxy: impl Into<String>) -> Self {
        Self {
            proxy: proxy.into(),
            credentials: None,
        }
    }

    pub fn with_credentials(mut self, credentials: Option<SocksCredentials>) -> Self {
        self.credentials = credentials;
        self
    }
}

#[async_trait]
impl Dialer for SocksDialer {
    async fn dial(&self, address: &str) -> Result<ForwardStream, DialError> {
        let stream = match &self.credentials {
            Some(creds) => {
                Socks5Stream::connect_with_password(self.proxy.as_str(), address, &creds.username, &creds.password).await?
            }
            None => Socks5Stream::connect(self.proxy.as_str(), address).await?,
        };
        debug!(proxy = %self.proxy, destination = address, "socks5 connect established");
        let stream = stream.into_inner();
        stream.set_nodelay(true).ok();
        Ok(Box::new(stream))
    }
}

/// Build the dialer selected by configuration.
pub fn dialer_from_config(config: &DialerConfig) -> Arc<dyn Dialer> {
    match config {
        DialerConfig::Direct => Arc::new(DirectDialer),
        DialerConfig::Socks5 { proxy, credentials } => Arc::new(SocksDialer::new(proxy.clone()).with_credentials(credentials.clone())),
    }
}

/// Run `dialer.dial(address)`, giving up with [`DialError::Timeout`] once `deadline` elapses.
pub async fn dial_with_deadline(dialer: &dyn Dialer, address: &str, deadline: Duration) -> Result<ForwardStream, DialError> {
    match tokio::time::timeout(deadline, dialer.dial(address)).await {
        Ok(result) => result,
        Err(_) => Err(DialError::Timeout { after: deadline }),
    }
}
