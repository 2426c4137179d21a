use std::io;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::debug;

/// Bytes held in flight by one copy direction.
const COPY_BUF_SIZE: usize = 16 * 1024;

/// Which side of a relay stopped first.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Side {
    A,
    B,
}

/// Outcome of a finished [`relay`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RelaySummary {
    /// Bytes read from `a` and written to `b`.
    pub a_to_b: u64,
    /// Bytes read from `b` and written to `a`.
    pub b_to_a: u64,
    /// The side whose read ended (EOF or error) and triggered teardown.
    pub first_closed: Option<Side>,
}

/// Pipe bytes between `a` and `b` in both directions until either direction ends.
///
/// As soon as one direction stops, for any reason, both write halves are shut
/// down and both streams are dropped, so the opposite direction never waits on
/// a half-closed peer. Returns once both directions are finished. I/O errors
/// are the normal way a forward ends and are only logged.
pub async fn relay<A, B>(a: A, b: B) -> RelaySummary
where
    A: AsyncRead + AsyncWrite,
    B: AsyncRead + AsyncWrite,
{
    let (mut a_read, mut a_write) = tokio::io::split(a);
    let (mut b_read, mut b_write) = tokio::io::split(b);
    let mut summary = RelaySummary::default();

    let (side, result) = {
        let a_to_b = pump(&mut a_read, &mut b_write, &mut summary.a_to_b);
        let b_to_a = pump(&mut b_read, &mut a_write, &mut summary.b_to_a);
        tokio::select! {
            result = a_to_b => (Side::A, result),
            result = b_to_a => (Side::B, result),
        }
    };
    summary.first_closed = Some(side);

    if let Err(err) = result {
        debug!(?side, error = %err, "relay direction ended with error");
    }

    let _ = a_write.shutdown().await;
    let _ = b_write.shutdown().await;
    drop((a_read, a_write, b_read, b_write));

    summary
}

async fn pump<R, W>(reader: &mut R, writer: &mut W, moved: &mut u64) -> io::Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buf = vec![0u8; COPY_BUF_SIZE];
    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            return Ok(());
        }
        writer.write_all(&buf[..n]).await?;
        writer.flush().await?;
        *moved += n as u64;
    }
}

#[cfg(test)]
#[path = "relay_tests.rs"]
mod tests;
