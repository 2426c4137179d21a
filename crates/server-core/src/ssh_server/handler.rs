//! russh callbacks bridged onto the transport request streams.

use std::{net::SocketAddr, sync::Arc};

use async_trait::async_trait;
use op_types::{
    auth::{AuthDecision, AuthMethod}, ssh::{DIRECT_TCPIP, OpenFailure}
};
use russh::{
    Channel, keys::{HashAlg, PublicKey}, server::{Auth, Msg, Session}
};
use ssh_core::forwarding::{ForwardDescriptor, ForwardStream};
use tokio::sync::{mpsc::UnboundedSender, oneshot};
use tracing::{debug, info, warn};

use crate::{
    auth::AuthPolicy, error::{ServerError, ServerResult}, transport::{ChannelOpen, GlobalRequest, SessionInfo}
};

/// Per-connection russh handler. Lives inside the russh session task.
pub(super) struct ServerHandler {
    peer: SocketAddr,
    policy: Arc<dyn AuthPolicy>,
    /// Credentials of the last accepted auth attempt, reported on success.
    accepted: Option<(String, AuthMethod, Option<String>)>,
    authenticated: Option<oneshot::Sender<SessionInfo>>,
    global_requests: UnboundedSender<GlobalRequest>,
    channel_opens: UnboundedSender<Box<dyn ChannelOpen>>,
}

impl ServerHandler {
    pub(super) fn new(
        peer: SocketAddr,
        policy: Arc<dyn AuthPolicy>,
        authenticated: oneshot::Sender<SessionInfo>,
        global_requests: UnboundedSender<GlobalRequest>,
        channel_opens: UnboundedSender<Box<dyn ChannelOpen>>,
    ) -> Self {
        Self {
            peer,
            policy,
            accepted: None,
            authenticated: Some(authenticated),
            global_requests,
            channel_opens,
        }
    }

    fn decide(&mut self, decision: AuthDecision, user: &str, method: AuthMethod, fingerprint: Option<String>) -> Auth {
        match decision {
            AuthDecision::Accept => {
                self.accepted = Some((user.to_string(), method, fingerprint));
                Auth::Accept
            }
            AuthDecision::Reject => {
                info!(peer = %self.peer, user, %method, "authentication rejected");
                Auth::reject()
            }
        }
    }

    /// Queue a channel open for the connection handler and wait for its verdict.
    async fn offer_channel(&mut self, channel_type: &str, extra_data: Vec<u8>, channel: Channel<Msg>) -> Result<bool, russh::Error> {
        let (decision_tx, decision_rx) = oneshot::channel();
        let open = RusshChannelOpen {
            peer: self.peer,
            channel_type: channel_type.to_string(),
            extra_data,
            channel,
            decision: Some(decision_tx),
        };
        if self.channel_opens.send(Box::new(open)).is_err() {
            return Ok(false);
        }
        Ok(decision_rx.await.unwrap_or(false))
    }

    async fn offer_global(&mut self, request_type: &str) -> Result<bool, russh::Error> {
        let (request, reply) = GlobalRequest::new(request_type);
        if self.global_requests.send(request).is_err() {
            return Ok(false);
        }
        Ok(reply.await.unwrap_or(false))
    }
}

impl russh::server::Handler for ServerHandler {
    type Error = russh::Error;

    async fn auth_password(&mut self, user: &str, password: &str) -> Result<Auth, Self::Error> {
        let decision = self.policy.check_password(user, password, self.peer).await;
        Ok(self.decide(decision, user, AuthMethod::Password, None))
    }

    async fn auth_publickey(&mut self, user: &str, public_key: &PublicKey) -> Result<Auth, Self::Error> {
        let decision = self.policy.check_public_key(user, public_key, self.peer).await;
        let fingerprint = public_key.fingerprint(HashAlg::Sha256).to_string();
        Ok(self.decide(decision, user, AuthMethod::PublicKey, Some(fingerprint)))
    }

    async fn auth_succeeded(&mut self, _session: &mut Session) -> Result<(), Self::Error> {
        let Some((user, method, fingerprint)) = self.accepted.take() else {
            warn!(peer = %self.peer, "authentication succeeded without an accepted credential");
            return Err(russh::Error::NotAuthenticated);
        };
        if let Some(tx) = self.authenticated.take() {
            let info = SessionInfo {
                peer: self.peer,
                user,
                method,
                fingerprint,
            };
            // The receiver is gone once the authentication timeout fired.
            if tx.send(info).is_err() {
                return Err(russh::Error::Disconnect);
            }
        }
        Ok(())
    }

    async fn channel_open_session(&mut self, channel: Channel<Msg>, _session: &mut Session) -> Result<bool, Self::Error> {
        self.offer_channel("session", Vec::new(), channel).await
    }

    async fn channel_open_x11(
        &mut self,
        channel: Channel<Msg>,
        originator_address: &str,
        originator_port: u32,
        _session: &mut Session,
    ) -> Result<bool, Self::Error> {
        let mut extra_data = Vec::with_capacity(8 + originator_address.len());
        extra_data.extend_from_slice(&(originator_address.len() as u32).to_be_bytes());
        extra_data.extend_from_slice(originator_address.as_bytes());
        extra_data.extend_from_slice(&originator_port.to_be_bytes());
        self.offer_channel("x11", extra_data, channel).await
    }

    async fn channel_open_direct_tcpip(
        &mut self,
        channel: Channel<Msg>,
        host_to_connect: &str,
        port_to_connect: u32,
        originator_address: &str,
        originator_port: u32,
        _session: &mut Session,
    ) -> Result<bool, Self::Error> {
        let extra_data = ForwardDescriptor::new(host_to_connect, port_to_connect, originator_address, originator_port).encode();
        self.offer_channel(DIRECT_TCPIP, extra_data, channel).await
    }

    async fn channel_open_forwarded_tcpip(
        &mut self,
        channel: Channel<Msg>,
        host_to_connect: &str,
        port_to_connect: u32,
        originator_address: &str,
        originator_port: u32,
        _session: &mut Session,
    ) -> Result<bool, Self::Error> {
        // Same wire layout as direct-tcpip (RFC 4254 §7.2).
        let extra_data = ForwardDescriptor::new(host_to_connect, port_to_connect, originator_address, originator_port).encode();
        self.offer_channel("forwarded-tcpip", extra_data, channel).await
    }

    async fn tcpip_forward(&mut self, _address: &str, _port: &mut u32, _session: &mut Session) -> Result<bool, Self::Error> {
        self.offer_global("tcpip-forward").await
    }

    async fn cancel_tcpip_forward(&mut self, _address: &str, _port: u32, _session: &mut Session) -> Result<bool, Self::Error> {
        self.offer_global("cancel-tcpip-forward").await
    }

    async fn streamlocal_forward(&mut self, _socket_path: &str, _session: &mut Session) -> Result<bool, Self::Error> {
        self.offer_global("streamlocal-forward@openssh.com").await
    }

    async fn cancel_streamlocal_forward(&mut self, _socket_path: &str, _session: &mut Session) -> Result<bool, Self::Error> {
        self.offer_global("cancel-streamlocal-forward@openssh.com").await
    }
}

/// A russh channel waiting for the connection handler's decision.
struct RusshChannelOpen {
    peer: SocketAddr,
    channel_type: String,
    extra_data: Vec<u8>,
    channel: Channel<Msg>,
    /// Taken once the client has been answered.
    decision: Option<oneshot::Sender<bool>>,
}

#[async_trait]
impl ChannelOpen for RusshChannelOpen {
    fn channel_type(&self) -> &str {
        &self.channel_type
    }

    fn extra_data(&self) -> &[u8] {
        &self.extra_data
    }

    /// The open callback runs inside russh's session loop, so holding it across
    /// the dial would stall every other channel on the connection. Forwards are
    /// confirmed here instead; a failed dial then closes the channel.
    async fn confirm_before_dial(&mut self) -> bool {
        if let Some(decision) = self.decision.take() {
            let _ = decision.send(true);
        }
        true
    }

    async fn reject(self: Box<Self>, reason: OpenFailure, message: String) {
        let this = *self;
        match this.decision {
            Some(decision) => {
                // russh answers with its own failure code and text; ours only reaches the log.
                debug!(
                    peer = %this.peer,
                    channel_type = %this.channel_type,
                    code = reason.code(),
                    %reason,
                    text = %message,
                    "rejecting channel open"
                );
                let _ = decision.send(false);
            }
            None => {
                debug!(peer = %this.peer, %reason, text = %message, "closing confirmed channel");
                let _ = this.channel.close().await;
            }
        }
    }

    async fn accept(self: Box<Self>) -> ServerResult<ForwardStream> {
        let this = *self;
        if let Some(decision) = this.decision {
            if decision.send(true).is_err() {
                return Err(ServerError::ChannelClosed);
            }
        }
        Ok(Box::new(this.channel.into_stream()))
    }
}
