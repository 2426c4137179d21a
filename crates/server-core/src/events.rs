//! Connection lifecycle notifications.
//!
//! The server reports what happens to each connection through [`ServerEvents`]
//! instead of logging directly, so embedders and tests can observe it.
//! [`TracingEvents`] is the stock implementation.

use std::{io, net::SocketAddr, time::Duration};

use ssh_core::forwarding::{ForwardDescriptor, RelaySummary};
use tracing::{debug, info, warn};

use crate::{error::ServerError, handler::Rejection, transport::SessionInfo};

/// Every method defaults to a no-op.
pub trait ServerEvents: Send + Sync + 'static {
    fn listening(&self, _addr: SocketAddr) {}

    fn connection_accepted(&self, _peer: SocketAddr) {}

    fn accept_failed(&self, _error: &io::Error) {}

    /// Handshake failed or did not complete within the authentication timeout.
    fn handshake_failed(&self, _peer: SocketAddr, _error: &ServerError) {}

    fn session_started(&self, _session: &SessionInfo) {}

    fn global_request(&self, _session: &SessionInfo, _request_type: &str, _accepted: bool) {}

    fn channel_rejected(&self, _session: &SessionInfo, _channel_type: &str, _rejection: &Rejection) {}

    fn forward_started(&self, _session: &SessionInfo, _forward: &ForwardDescriptor) {}

    fn forward_finished(&self, _session: &SessionInfo, _forward: &ForwardDescriptor, _summary: &RelaySummary) {}

    fn session_closed(&self, _session: &SessionInfo, _duration: Duration) {}
}

/// Emits every event through `tracing`.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingEvents;

impl ServerEvents for TracingEvents {
    fn listening(&self, addr: SocketAddr) {
        info!(%addr, "listening");
    }

    fn connection_accepted(&self, peer: SocketAddr) {
        debug!(%peer, "client connected");
    }

    fn accept_failed(&self, error: &io::Error) {
        warn!(%error, "failed to accept incoming connection");
    }

    fn handshake_failed(&self, peer: SocketAddr, error: &ServerError) {
        info!(%peer, %error, "failed to handshake");
    }

    fn session_started(&self, session: &SessionInfo) {
        info!(
            peer = %session.peer,
            user = %session.user,
            method = %session.method,
            fingerprint = session.fingerprint.as_deref().unwrap_or("-"),
            "accepted session"
        );
    }

    fn global_request(&self, session: &SessionInfo, request_type: &str, accepted: bool) {
        debug!(peer = %session.peer, request_type, accepted, "global request");
    }

    fn channel_rejected(&self, session: &SessionInfo, channel_type: &str, rejection: &Rejection) {
        match rejection {
            Rejection::DialFailed { .. } | Rejection::Malformed(_) => {
                warn!(peer = %session.peer, channel_type, reason = %rejection, "channel open rejected")
            }
            _ => info!(peer = %session.peer, channel_type, reason = %rejection, "channel open rejected"),
        }
    }

    fn forward_started(&self, session: &SessionInfo, forward: &ForwardDescriptor) {
        info!(
            peer = %session.peer,
            originator = %forward.originator(),
            destination = %forward.destination(),
            "accepting forward"
        );
    }

    fn forward_finished(&self, session: &SessionInfo, forward: &ForwardDescriptor, summary: &RelaySummary) {
        debug!(
            peer = %session.peer,
            destination = %forward.destination(),
            sent = summary.a_to_b,
            received = summary.b_to_a,
            first_closed = ?summary.first_closed,
            "forward closed"
        );
    }

    fn session_closed(&self, session: &SessionInfo, duration: Duration) {
        info!(peer = %session.peer, user = %session.user, ?duration, "client went away");
    }
}
