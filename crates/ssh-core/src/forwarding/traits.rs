use tokio::io::{AsyncRead, AsyncWrite};

/// Trait for streams that can be used for forwarding.
pub trait ForwardStreamIo: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T> ForwardStreamIo for T where T: AsyncRead + AsyncWrite + Unpin + Send {}

/// Type alias for boxed forward streams: an accepted SSH channel or a dialed connection.
pub type ForwardStream = Box<dyn ForwardStreamIo>;
