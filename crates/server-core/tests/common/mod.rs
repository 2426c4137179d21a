//! Test doubles for server-core tests: an in-memory transport driven from the
//! test body, a scripted dialer and an event recorder.
#![allow(dead_code)]

use std::{
    io, net::SocketAddr, sync::{Arc, Mutex}, time::Duration
};

use async_trait::async_trait;
use op_types::ssh::OpenFailure;
use server_core::{
    Rejection, ServerError, ServerEvents, ServerResult, transport::{ChannelOpen, Established, GlobalRequest, RawConnection, SessionInfo, Transport}
};
use ssh_core::{
    DialError, forwarding::{Dialer, ForwardDescriptor, ForwardStream, RelaySummary}
};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt, DuplexStream, duplex}, sync::{mpsc, oneshot}
};

pub fn peer() -> SocketAddr {
    "198.51.100.4:51000".parse().unwrap()
}

pub fn session_info() -> SessionInfo {
    SessionInfo {
        peer: peer(),
        user: "tester".into(),
        method: op_types::auth::AuthMethod::Password,
        fingerprint: None,
    }
}

/// Answer to a channel-open as seen by the in-memory client.
pub enum OpenOutcome {
    Accepted(DuplexStream),
    Rejected(OpenFailure, String),
}

impl OpenOutcome {
    pub fn accepted(self) -> DuplexStream {
        match self {
            Self::Accepted(stream) => stream,
            Self::Rejected(reason, message) => panic!("expected accept, got {reason}: {message}"),
        }
    }

    pub fn rejected(self) -> (OpenFailure, String) {
        match self {
            Self::Accepted(_) => panic!("expected rejection, channel was accepted"),
            Self::Rejected(reason, message) => (reason, message),
        }
    }
}

struct MemoryChannelOpen {
    channel_type: String,
    extra_data: Vec<u8>,
    outcome: Option<oneshot::Sender<OpenOutcome>>,
    /// Confirm screened forwards before the dial, as the russh transport does.
    confirms_early: bool,
    confirmed: Option<DuplexStream>,
}

#[async_trait]
impl ChannelOpen for MemoryChannelOpen {
    fn channel_type(&self) -> &str {
        &self.channel_type
    }

    fn extra_data(&self) -> &[u8] {
        &self.extra_data
    }

    async fn confirm_before_dial(&mut self) -> bool {
        if !self.confirms_early {
            return false;
        }
        let (client, server) = duplex(16 * 1024);
        if let Some(outcome) = self.outcome.take() {
            let _ = outcome.send(OpenOutcome::Accepted(client));
        }
        self.confirmed = Some(server);
        true
    }

    async fn reject(self: Box<Self>, reason: OpenFailure, message: String) {
        // A confirmed channel is closed by dropping its server half.
        if let Some(outcome) = self.outcome {
            let _ = outcome.send(OpenOutcome::Rejected(reason, message));
        }
    }

    async fn accept(self: Box<Self>) -> ServerResult<ForwardStream> {
        let this = *self;
        if let Some(server) = this.confirmed {
            return Ok(Box::new(server));
        }
        let (client, server) = duplex(16 * 1024);
        this.outcome
            .ok_or(ServerError::ChannelClosed)?
            .send(OpenOutcome::Accepted(client))
            .map_err(|_| ServerError::ChannelClosed)?;
        Ok(Box::new(server))
    }
}

/// Transport whose single session is driven by a [`MemoryClient`].
pub struct MemoryTransport {
    pending: Mutex<Option<Established>>,
}

/// The client end of a [`MemoryTransport`] session. Dropping it ends the session.
pub struct MemoryClient {
    global_tx: mpsc::UnboundedSender<GlobalRequest>,
    open_tx: mpsc::UnboundedSender<Box<dyn ChannelOpen>>,
}

impl MemoryTransport {
    pub fn new() -> (Arc<Self>, MemoryClient) {
        let (global_tx, global_requests) = mpsc::unbounded_channel();
        let (open_tx, channel_opens) = mpsc::unbounded_channel();
        let established = Established {
            session: session_info(),
            global_requests,
            channel_opens,
        };
        let transport = Arc::new(Self {
            pending: Mutex::new(Some(established)),
        });
        (transport, MemoryClient { global_tx, open_tx })
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn handshake(&self, _stream: RawConnection, _peer: SocketAddr) -> ServerResult<Established> {
        self.pending
            .lock()
            .unwrap()
            .take()
            .ok_or_else(|| ServerError::handshake("memory transport serves a single session"))
    }
}

impl MemoryClient {
    pub async fn open(&self, channel_type: &str, extra_data: Vec<u8>) -> OpenOutcome {
        self.send_open(channel_type, extra_data, false).await
    }

    /// Open a forward whose channel is confirmed as soon as it passes screening.
    pub async fn open_forward_confirmed_early(&self, host: &str, port: u32) -> OpenOutcome {
        let payload = ForwardDescriptor::new(host, port, "127.0.0.1", 40000).encode();
        self.send_open(op_types::ssh::DIRECT_TCPIP, payload, true).await
    }

    async fn send_open(&self, channel_type: &str, extra_data: Vec<u8>, confirms_early: bool) -> OpenOutcome {
        let (outcome_tx, outcome_rx) = oneshot::channel();
        let open = MemoryChannelOpen {
            channel_type: channel_type.to_string(),
            extra_data,
            outcome: Some(outcome_tx),
            confirms_early,
            confirmed: None,
        };
        self.open_tx.send(Box::new(open)).ok().expect("session is gone");
        outcome_rx.await.expect("channel open dropped without a decision")
    }

    pub async fn open_forward(&self, host: &str, port: u32) -> OpenOutcome {
        let payload = ForwardDescriptor::new(host, port, "127.0.0.1", 40000).encode();
        self.open(op_types::ssh::DIRECT_TCPIP, payload).await
    }

    pub async fn global(&self, request_type: &str) -> bool {
        let (request, reply) = GlobalRequest::new(request_type);
        self.global_tx.send(request).ok().expect("session is gone");
        reply.await.expect("global request dropped without a reply")
    }
}

/// Transport that never finishes the handshake but holds the connection open.
pub struct StalledTransport;

#[async_trait]
impl Transport for StalledTransport {
    async fn handshake(&self, stream: RawConnection, _peer: SocketAddr) -> ServerResult<Established> {
        let _held = stream;
        std::future::pending().await
    }
}

#[derive(Clone, Copy, Debug)]
pub enum DialBehavior {
    /// Connects to an in-memory echo service.
    Echo,
    /// Like `Echo`, but dials to `host` take `delay` first.
    EchoSlowly { host: &'static str, delay: Duration },
    Refuse,
    Stall,
}

/// Dialer that records every target and refuses to touch anything but `.onion`.
pub struct StubDialer {
    behavior: DialBehavior,
    targets: Mutex<Vec<String>>,
}

impl StubDialer {
    pub fn new(behavior: DialBehavior) -> Arc<Self> {
        Arc::new(Self {
            behavior,
            targets: Mutex::new(Vec::new()),
        })
    }

    pub fn targets(&self) -> Vec<String> {
        self.targets.lock().unwrap().clone()
    }
}

#[async_trait]
impl Dialer for StubDialer {
    async fn dial(&self, address: &str) -> Result<ForwardStream, DialError> {
        let (host, _port) = address.rsplit_once(':').expect("dial target must be host:port");
        assert!(host.ends_with(".onion"), "dialer reached for non-onion target {address}");
        self.targets.lock().unwrap().push(address.to_string());

        match self.behavior {
            DialBehavior::Echo => Ok(echo_service()),
            DialBehavior::EchoSlowly { host: slow, delay } => {
                if host == slow {
                    tokio::time::sleep(delay).await;
                }
                Ok(echo_service())
            }
            DialBehavior::Refuse => Err(DialError::Io(io::Error::from(io::ErrorKind::ConnectionRefused))),
            DialBehavior::Stall => std::future::pending().await,
        }
    }
}

fn echo_service() -> ForwardStream {
    let (ours, mut theirs) = duplex(16 * 1024);
    tokio::spawn(async move {
        let mut buf = [0u8; 1024];
        loop {
            match theirs.read(&mut buf).await {
                Ok(0) | Err(_) => break,
                Ok(n) => {
                    if theirs.write_all(&buf[..n]).await.is_err() {
                        break;
                    }
                }
            }
        }
    });
    Box::new(ours)
}

/// Lifecycle event, flattened for assertions.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event {
    Listening,
    Accepted,
    HandshakeFailed(String),
    SessionStarted,
    Global(String, bool),
    Rejected(String, String),
    ForwardStarted(String),
    ForwardFinished(String),
    SessionClosed,
}

#[derive(Default)]
pub struct RecordingEvents {
    events: Mutex<Vec<Event>>,
}

impl RecordingEvents {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn snapshot(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    fn push(&self, event: Event) {
        self.events.lock().unwrap().push(event);
    }
}

impl ServerEvents for RecordingEvents {
    fn listening(&self, _addr: SocketAddr) {
        self.push(Event::Listening);
    }

    fn connection_accepted(&self, _peer: SocketAddr) {
        self.push(Event::Accepted);
    }

    fn handshake_failed(&self, _peer: SocketAddr, error: &ServerError) {
        self.push(Event::HandshakeFailed(error.to_string()));
    }

    fn session_started(&self, _session: &SessionInfo) {
        self.push(Event::SessionStarted);
    }

    fn global_request(&self, _session: &SessionInfo, request_type: &str, accepted: bool) {
        self.push(Event::Global(request_type.to_string(), accepted));
    }

    fn channel_rejected(&self, _session: &SessionInfo, channel_type: &str, rejection: &Rejection) {
        self.push(Event::Rejected(channel_type.to_string(), rejection.to_string()));
    }

    fn forward_started(&self, _session: &SessionInfo, forward: &ForwardDescriptor) {
        self.push(Event::ForwardStarted(forward.destination()));
    }

    fn forward_finished(&self, _session: &SessionInfo, forward: &ForwardDescriptor, _summary: &RelaySummary) {
        self.push(Event::ForwardFinished(forward.destination()));
    }

    fn session_closed(&self, _session: &SessionInfo, _duration: Duration) {
        self.push(Event::SessionClosed);
    }
}
