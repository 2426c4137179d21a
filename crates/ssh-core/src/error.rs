use std::{path::PathBuf, time::Duration};
use thiserror::Error;

/// Errors that can occur in SSH core operations
#[derive(Error, Debug)]
pub enum SshCoreError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// SSH protocol error
    #[error("SSH protocol error: {0}")]
    Ssh(#[from] russh::Error),

    /// Host key could not be read, parsed or written
    #[error("host key {path}: {message}")]
    HostKey { path: PathBuf, message: String },

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

/// Result type alias for SSH core operations
pub type SshResult<T> = Result<T, SshCoreError>;

impl SshCoreError {
    /// Create a host key error
    pub fn host_key(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::HostKey {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// A `direct-tcpip` open payload that does not follow RFC 4254 §7.2.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("truncated {field}: need {needed} bytes, {remaining} remaining")]
    Truncated {
        field: &'static str,
        needed: usize,
        remaining: usize,
    },

    #[error("{field} is not valid UTF-8")]
    InvalidUtf8 { field: &'static str },

    #[error("{0} unexpected bytes after originator port")]
    TrailingBytes(usize),
}

/// Failure to establish the outbound side of a forward.
///
/// The display text is sent back to SSH clients in channel-open rejections.
#[derive(Error, Debug)]
pub enum DialError {
    #[error("dial timed out after {after:?}")]
    Timeout { after: Duration },

    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("socks5 proxy: {0}")]
    Socks(#[from] tokio_socks::Error),
}

impl DialError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}
