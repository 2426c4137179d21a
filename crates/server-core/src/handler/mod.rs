//! Per-connection state machine: handshake under a deadline, then service global
//! requests and channel opens until the client goes away.

use std::{net::SocketAddr, sync::Arc, time::Duration};

use op_types::{
    config::{DEFAULT_AUTH_TIMEOUT, DEFAULT_DIAL_TIMEOUT}, ssh::KEEPALIVE_REQUEST
};
use ssh_core::forwarding::Dialer;
use tokio::{
    sync::mpsc::UnboundedReceiver, task::JoinSet, time::{Instant, timeout}
};

use crate::{
    error::ServerError, events::ServerEvents, transport::{ChannelOpen, Established, GlobalRequest, RawConnection, SessionInfo, Transport}
};

mod channel;

pub use channel::Rejection;

/// The only two deadlines the server enforces.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Limits {
    /// Time a client has to finish the handshake and authenticate.
    pub auth_timeout: Duration,
    /// Time a single outbound dial may take.
    pub dial_timeout: Duration,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            auth_timeout: DEFAULT_AUTH_TIMEOUT,
            dial_timeout: DEFAULT_DIAL_TIMEOUT,
        }
    }
}

/// Drives one client connection from raw socket to close.
///
/// Shared between all connections of a server; holds no per-connection state.
pub struct ConnectionHandler {
    transport: Arc<dyn Transport>,
    dialer: Arc<dyn Dialer>,
    events: Arc<dyn ServerEvents>,
    limits: Limits,
}

impl ConnectionHandler {
    pub fn new(transport: Arc<dyn Transport>, dialer: Arc<dyn Dialer>, events: Arc<dyn ServerEvents>, limits: Limits) -> Self {
        Self {
            transport,
            dialer,
            events,
            limits,
        }
    }

    /// Handle `stream` until the client disconnects and every forward it opened has finished.
    pub async fn run(&self, stream: RawConnection, peer: SocketAddr) {
        let started = Instant::now();

        // Dropping the handshake future on timeout closes the connection.
        let established = match timeout(self.limits.auth_timeout, self.transport.handshake(stream, peer)).await {
            Ok(Ok(established)) => established,
            Ok(Err(err)) => {
                self.events.handshake_failed(peer, &err);
                return;
            }
            Err(_) => {
                self.events
                    .handshake_failed(peer, &ServerError::AuthTimeout(self.limits.auth_timeout));
                return;
            }
        };

        let Established {
            session,
            global_requests,
            channel_opens,
        } = established;
        self.events.session_started(&session);

        let (_, mut relays) = tokio::join!(
            self.serve_global_requests(&session, global_requests),
            self.serve_channel_opens(&session, channel_opens),
        );

        // In-flight forwards are left to finish on their own.
        while relays.join_next().await.is_some() {}

        self.events.session_closed(&session, started.elapsed());
    }

    async fn serve_global_requests(&self, session: &SessionInfo, mut requests: UnboundedReceiver<GlobalRequest>) {
        while let Some(request) = requests.recv().await {
            let accepted = request.request_type() == KEEPALIVE_REQUEST;
            self.events.global_request(session, request.request_type(), accepted);
            request.reply(accepted);
        }
    }

    async fn serve_channel_opens(&self, session: &SessionInfo, mut opens: UnboundedReceiver<Box<dyn ChannelOpen>>) -> JoinSet<()> {
        let mut relays = JoinSet::new();
        while let Some(open) = opens.recv().await {
            self.open_channel(session, open, &mut relays).await;
            // Reap finished forwards so long-lived sessions do not accumulate them.
            while relays.try_join_next().is_some() {}
        }
        relays
    }
}
