//! russh-backed [`Transport`].
//!
//! Each connection gets its own russh session task; this module turns its
//! callbacks into the request streams the connection handler consumes.

mod handler;
mod severable;

use std::{net::SocketAddr, sync::Arc, time::Duration};

use async_trait::async_trait;
use russh::{
    MethodKind, MethodSet, keys::PrivateKey, server as ssh_server
};
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

use self::{handler::ServerHandler, severable::severable};
use crate::{
    auth::AuthPolicy, error::{ServerError, ServerResult}, transport::{Established, RawConnection, Transport}
};

pub struct RusshTransport {
    config: Arc<ssh_server::Config>,
    policy: Arc<dyn AuthPolicy>,
}

impl RusshTransport {
    /// Server configuration with our crypto preferences and the methods `policy` accepts.
    pub fn new(host_key: PrivateKey, policy: Arc<dyn AuthPolicy>) -> Self {
        let mut config = ssh_server::Config {
            preferred: ssh_core::crypto::default_preferred(),
            auth_rejection_time: Duration::from_millis(250),
            auth_rejection_time_initial: Some(Duration::from_millis(0)),
            nodelay: true,
            ..Default::default()
        };

        config.methods = MethodSet::empty();
        config.methods.push(MethodKind::PublicKey);
        if policy.accepts_passwords() {
            config.methods.push(MethodKind::Password);
        }
        config.keys.push(host_key);

        Self::with_config(Arc::new(config), policy)
    }

    pub fn with_config(config: Arc<ssh_server::Config>, policy: Arc<dyn AuthPolicy>) -> Self {
        Self { config, policy }
    }
}

#[async_trait]
impl Transport for RusshTransport {
    async fn handshake(&self, stream: RawConnection, peer: SocketAddr) -> ServerResult<Established> {
        let (authenticated_tx, authenticated_rx) = oneshot::channel();
        let (global_tx, global_requests) = mpsc::unbounded_channel();
        let (open_tx, channel_opens) = mpsc::unbounded_channel();
        let handler = ServerHandler::new(peer, self.policy.clone(), authenticated_tx, global_tx, open_tx);

        // Version exchange happens here; the rest of the session runs in a russh task
        // that owns the stream. Dropping `guard` before authentication cuts it.
        let (stream, guard) = severable(stream);
        let mut running = ssh_server::run_stream(self.config.clone(), stream, handler).await?;

        tokio::select! {
            authenticated = authenticated_rx => {
                let session = authenticated
                    .map_err(|_| ServerError::handshake("session ended during authentication"))?;
                guard.keep();
                tokio::spawn(async move {
                    if let Err(error) = running.await {
                        debug!(%peer, %error, "ssh session ended with error");
                    }
                });
                Ok(Established {
                    session,
                    global_requests,
                    channel_opens,
                })
            }
            ended = &mut running => match ended {
                Ok(()) => Err(ServerError::handshake("client disconnected before authenticating")),
                Err(err) => Err(err.into()),
            },
        }
    }
}
