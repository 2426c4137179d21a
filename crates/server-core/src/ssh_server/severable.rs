//! Raw connection wrapper that lets an abandoned handshake cut the socket.
//!
//! russh owns the stream inside its own session task once the version exchange
//! is done, and its `Handle::disconnect` is a no-op until keys are exchanged.
//! Failing the stream's I/O is what ends that task and drops the socket.

use std::{
    future::Future, io, pin::Pin, task::{Context, Poll}
};

use tokio::{
    io::{AsyncRead, AsyncWrite, ReadBuf}, sync::oneshot
};

enum State {
    Armed(oneshot::Receiver<()>),
    Severed,
    Kept,
}

pub(super) struct Severable<S> {
    inner: S,
    state: State,
}

/// Cuts its [`Severable`] when dropped, unless kept.
pub(super) struct SeverOnDrop(Option<oneshot::Sender<()>>);

impl SeverOnDrop {
    /// Leave the connection intact from now on.
    pub(super) fn keep(mut self) {
        // Dropping the sender unused tells the stream to stop watching.
        self.0.take();
    }
}

impl Drop for SeverOnDrop {
    fn drop(&mut self) {
        if let Some(cut) = self.0.take() {
            let _ = cut.send(());
        }
    }
}

pub(super) fn severable<S>(inner: S) -> (Severable<S>, SeverOnDrop) {
    let (tx, rx) = oneshot::channel();
    let stream = Severable {
        inner,
        state: State::Armed(rx),
    };
    (stream, SeverOnDrop(Some(tx)))
}

impl<S> Severable<S> {
    fn check(&mut self, cx: &mut Context<'_>) -> io::Result<()> {
        if let State::Armed(cut) = &mut self.state {
            match Pin::new(cut).poll(cx) {
                Poll::Ready(Ok(())) => self.state = State::Severed,
                Poll::Ready(Err(_)) => self.state = State::Kept,
                Poll::Pending => {}
            }
        }
        match self.state {
            State::Severed => Err(io::Error::new(io::ErrorKind::ConnectionAborted, "connection severed")),
            State::Armed(_) | State::Kept => Ok(()),
        }
    }
}

impl<S: AsyncRead + Unpin> AsyncRead for Severable<S> {
    fn poll_read(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        if let Err(err) = this.check(cx) {
            return Poll::Ready(Err(err));
        }
        Pin::new(&mut this.inner).poll_read(cx, buf)
    }
}

impl<S: AsyncWrite + Unpin> AsyncWrite for Severable<S> {
    fn poll_write(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &[u8]) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        if let Err(err) = this.check(cx) {
            return Poll::Ready(Err(err));
        }
        Pin::new(&mut this.inner).poll_write(cx, buf)
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        if let Err(err) = this.check(cx) {
            return Poll::Ready(Err(err));
        }
        Pin::new(&mut this.inner).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_shutdown(cx)
    }
}

#[cfg(test)]
mod tests {
    use tokio::io::{AsyncReadExt, AsyncWriteExt, duplex};

    use super::*;

    #[tokio::test]
    async fn severing_wakes_a_pending_read() {
        let (ours, _peer) = duplex(64);
        let (mut stream, guard) = severable(ours);

        let reader = tokio::spawn(async move {
            let mut buf = [0u8; 8];
            stream.read(&mut buf).await
        });
        tokio::task::yield_now().await;
        drop(guard);

        let err = reader.await.unwrap().unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::ConnectionAborted);
    }

    #[tokio::test]
    async fn kept_stream_keeps_working() {
        let (ours, mut peer) = duplex(64);
        let (mut stream, guard) = severable(ours);
        guard.keep();

        stream.write_all(b"ping").await.unwrap();
        let mut buf = [0u8; 4];
        peer.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"ping");

        peer.write_all(b"pong").await.unwrap();
        stream.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"pong");
    }
}
