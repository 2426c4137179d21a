//! TCP accept loop that hands each connection to a [`ConnectionHandler`] task.

use std::{future::Future, io, sync::Arc, time::Duration};

use ssh_core::forwarding::Dialer;
use tokio::net::{TcpListener, ToSocketAddrs};

use crate::{
    error::{ServerError, ServerResult}, events::ServerEvents, handler::{ConnectionHandler, Limits}, transport::Transport
};

/// Pause after a failed `accept` before trying again.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// A listening forwarding gateway. Cheap to clone; all state is shared and read-only.
#[derive(Clone)]
pub struct Server {
    handler: Arc<ConnectionHandler>,
    events: Arc<dyn ServerEvents>,
}

impl Server {
    pub fn new(transport: Arc<dyn Transport>, dialer: Arc<dyn Dialer>, events: Arc<dyn ServerEvents>, limits: Limits) -> Self {
        let handler = ConnectionHandler::new(transport, dialer, events.clone(), limits);
        Self {
            handler: Arc::new(handler),
            events,
        }
    }

    /// Bind a listener, mapping failure to [`ServerError::Bind`].
    pub async fn bind<A>(addr: A) -> ServerResult<TcpListener>
    where
        A: ToSocketAddrs + std::fmt::Display,
    {
        let address = addr.to_string();
        TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::Bind { address, source })
    }

    /// Accept connections forever. Returns only if the listener becomes unusable.
    pub async fn listen(&self, listener: TcpListener) -> ServerResult<()> {
        self.listen_with_shutdown(listener, std::future::pending()).await
    }

    /// Accept connections until `shutdown` resolves. Connections already
    /// accepted keep running in their own tasks.
    pub async fn listen_with_shutdown<F>(&self, listener: TcpListener, shutdown: F) -> ServerResult<()>
    where
        F: Future<Output = ()> + Send,
    {
        if let Ok(addr) = listener.local_addr() {
            self.events.listening(addr);
        }
        tokio::pin!(shutdown);

        loop {
            let accepted = tokio::select! {
                _ = &mut shutdown => return Ok(()),
                accepted = listener.accept() => accepted,
            };

            match accepted {
                Ok((stream, peer)) => {
                    stream.set_nodelay(true).ok();
                    self.events.connection_accepted(peer);
                    let handler = self.handler.clone();
                    tokio::spawn(async move {
                        handler.run(Box::new(stream), peer).await;
                    });
                }
                Err(err) => {
                    self.events.accept_failed(&err);
                    if is_fatal_accept_error(&err) {
                        return Err(err.into());
                    }
                    tokio::time::sleep(ACCEPT_BACKOFF).await;
                }
            }
        }
    }
}

/// Per-connection failures (resets, descriptor exhaustion) are transient; an
/// invalid listening socket is not.
fn is_fatal_accept_error(err: &io::Error) -> bool {
    matches!(err.kind(), io::ErrorKind::InvalidInput)
}
