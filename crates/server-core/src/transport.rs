//! Seam between the connection handler and a concrete SSH engine.
//!
//! A [`Transport`] performs the SSH handshake on a raw connection and, once the
//! client is authenticated, surfaces two ordered streams: global requests and
//! channel-open requests. Each request carries its own reply path, so the
//! handler never touches engine types.

use std::net::SocketAddr;

use async_trait::async_trait;
use op_types::{auth::AuthMethod, ssh::OpenFailure};
use ssh_core::forwarding::ForwardStream;
use tokio::sync::{mpsc, oneshot};

use crate::error::ServerResult;

/// A raw, not yet handshaken client connection.
pub type RawConnection = ForwardStream;

/// Identity of an authenticated client connection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionInfo {
    pub peer: SocketAddr,
    pub user: String,
    pub method: AuthMethod,
    /// SHA-256 fingerprint of the accepted public key, if any.
    pub fingerprint: Option<String>,
}

/// Result of a successful handshake.
pub struct Established {
    pub session: SessionInfo,
    /// Ends when the client connection ends.
    pub global_requests: mpsc::UnboundedReceiver<GlobalRequest>,
    /// Ends when the client connection ends.
    pub channel_opens: mpsc::UnboundedReceiver<Box<dyn ChannelOpen>>,
}

#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Run the SSH handshake, including authentication, on `stream`.
    ///
    /// The caller bounds this with the authentication timeout; dropping the
    /// returned future must close the underlying connection.
    async fn handshake(&self, stream: RawConnection, peer: SocketAddr) -> ServerResult<Established>;
}

/// A connection-level request such as `tcpip-forward`.
#[derive(Debug)]
pub struct GlobalRequest {
    request_type: String,
    reply: Option<oneshot::Sender<bool>>,
}

impl GlobalRequest {
    /// Returns the request together with the receiver its reply is delivered to.
    pub fn new(request_type: impl Into<String>) -> (Self, oneshot::Receiver<bool>) {
        let (tx, rx) = oneshot::channel();
        let request = Self {
            request_type: request_type.into(),
            reply: Some(tx),
        };
        (request, rx)
    }

    pub fn request_type(&self) -> &str {
        &self.request_type
    }

    pub fn reply(mut self, accepted: bool) {
        if let Some(tx) = self.reply.take() {
            // The engine may have dropped the connection already.
            let _ = tx.send(accepted);
        }
    }
}

/// A pending channel-open request. Exactly one of `accept` or `reject` consumes it;
/// dropping it without a decision rejects the channel.
#[async_trait]
pub trait ChannelOpen: Send {
    /// SSH channel type, e.g. `direct-tcpip`.
    fn channel_type(&self) -> &str;

    /// Type-specific bytes that followed the common channel-open fields.
    fn extra_data(&self) -> &[u8];

    /// Called once the request has passed screening and before its destination
    /// is dialed.
    ///
    /// Returns `true` if the channel is now confirmed to the client. Engines that
    /// cannot keep an open request pending across the dial do this. The dial then
    /// runs beside the channel loop, and a later `reject` closes the confirmed
    /// channel rather than refusing it.
    async fn confirm_before_dial(&mut self) -> bool {
        false
    }

    async fn reject(self: Box<Self>, reason: OpenFailure, message: String);

    async fn accept(self: Box<Self>) -> ServerResult<ForwardStream>;
}
