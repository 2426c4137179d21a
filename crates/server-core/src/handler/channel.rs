//! Channel-open screening: type check, payload decode, destination policy and
//! the pre-accept dial.

use std::{sync::Arc, time::Duration};

use op_types::ssh::{DIRECT_TCPIP, OpenFailure};
use ssh_core::{
    DecodeError, DialError, forwarding::{Dialer, ForwardDescriptor, ForwardStream, dial_with_deadline, relay}
};
use thiserror::Error;
use tokio::task::JoinSet;
use tracing::warn;

use super::ConnectionHandler;
use crate::{
    events::ServerEvents, transport::{ChannelOpen, SessionInfo}
};

/// Why a channel-open request was refused. The `Display` text is the reason
/// string sent to the client.
#[derive(Debug, Error)]
pub enum Rejection {
    #[error("no {0} allowed, only direct-tcpip")]
    UnsupportedType(String),

    #[error("failed to parse forward information")]
    Malformed(#[source] DecodeError),

    #[error("onionpass only passes traffic to .onion services")]
    Disallowed { destination: String },

    #[error("failed to dial {target}: {source}")]
    DialFailed {
        target: String,
        #[source]
        source: DialError,
    },
}

impl Rejection {
    /// RFC 4254 reason code for this rejection.
    pub fn reason(&self) -> OpenFailure {
        match self {
            Self::UnsupportedType(_) | Self::Disallowed { .. } => OpenFailure::AdministrativelyProhibited,
            Self::Malformed(_) => OpenFailure::UnknownChannelType,
            Self::DialFailed { .. } => OpenFailure::ConnectionFailed,
        }
    }
}

/// Screen a request without touching the network. Nothing is dialed unless
/// this returns `Ok`.
pub(super) fn screen(channel_type: &str, extra_data: &[u8]) -> Result<ForwardDescriptor, Rejection> {
    if channel_type != DIRECT_TCPIP {
        return Err(Rejection::UnsupportedType(channel_type.to_string()));
    }

    let forward = ForwardDescriptor::decode(extra_data).map_err(Rejection::Malformed)?;
    if !forward.is_permitted_target() {
        return Err(Rejection::Disallowed {
            destination: forward.destination(),
        });
    }
    Ok(forward)
}

impl ConnectionHandler {
    pub(super) async fn open_channel(&self, session: &SessionInfo, mut open: Box<dyn ChannelOpen>, relays: &mut JoinSet<()>) {
        let channel_type = open.channel_type().to_string();
        let forward = match screen(&channel_type, open.extra_data()) {
            Ok(forward) => forward,
            Err(rejection) => {
                refuse(self.events.as_ref(), session, &channel_type, open, rejection).await;
                return;
            }
        };

        let attempt = ForwardAttempt {
            dialer: self.dialer.clone(),
            events: self.events.clone(),
            dial_timeout: self.limits.dial_timeout,
            session: session.clone(),
            forward,
        };

        if open.confirm_before_dial().await {
            // The client already holds an open channel; later requests must not wait on this dial.
            relays.spawn(async move {
                if let Some((channel, upstream)) = attempt.establish(open).await {
                    attempt.relay_until_closed(channel, upstream).await;
                }
            });
        } else if let Some((channel, upstream)) = attempt.establish(open).await {
            relays.spawn(attempt.relay_until_closed(channel, upstream));
        }
    }
}

async fn refuse(events: &dyn ServerEvents, session: &SessionInfo, channel_type: &str, open: Box<dyn ChannelOpen>, rejection: Rejection) {
    events.channel_rejected(session, channel_type, &rejection);
    open.reject(rejection.reason(), rejection.to_string()).await;
}

/// A screened forward on its way to the relaying state.
struct ForwardAttempt {
    dialer: Arc<dyn Dialer>,
    events: Arc<dyn ServerEvents>,
    dial_timeout: Duration,
    session: SessionInfo,
    forward: ForwardDescriptor,
}

impl ForwardAttempt {
    /// Dial the destination, then accept the channel. `None` once the request
    /// has been refused or the channel vanished.
    async fn establish(&self, open: Box<dyn ChannelOpen>) -> Option<(ForwardStream, ForwardStream)> {
        let upstream = match self.dial().await {
            Ok(upstream) => upstream,
            Err(rejection) => {
                refuse(self.events.as_ref(), &self.session, DIRECT_TCPIP, open, rejection).await;
                return None;
            }
        };

        self.events.forward_started(&self.session, &self.forward);
        match open.accept().await {
            Ok(channel) => Some((channel, upstream)),
            Err(err) => {
                // Dropping `upstream` closes the dialed connection.
                warn!(peer = %self.session.peer, destination = %self.forward.destination(), error = %err, "could not accept forward channel");
                None
            }
        }
    }

    async fn dial(&self) -> Result<ForwardStream, Rejection> {
        let target = self.forward.destination();
        match dial_with_deadline(self.dialer.as_ref(), &target, self.dial_timeout).await {
            Ok(upstream) => Ok(upstream),
            Err(source) => Err(Rejection::DialFailed { target, source }),
        }
    }

    async fn relay_until_closed(self, channel: ForwardStream, upstream: ForwardStream) {
        let summary = relay(channel, upstream).await;
        self.events.forward_finished(&self.session, &self.forward, &summary);
    }
}

#[cfg(test)]
#[path = "channel_tests.rs"]
mod tests;
