use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SSH error: {0}")]
    Ssh(#[from] russh::Error),

    #[error(transparent)]
    SshCore(#[from] ssh_core::SshCoreError),

    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to handshake: {0}")]
    Handshake(String),

    #[error("authentication not completed within {0:?}")]
    AuthTimeout(Duration),

    #[error("channel closed before it could be accepted")]
    ChannelClosed,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl ServerError {
    pub fn handshake(msg: impl Into<String>) -> Self {
        Self::Handshake(msg.into())
    }
}

pub type ServerResult<T> = Result<T, ServerError>;
