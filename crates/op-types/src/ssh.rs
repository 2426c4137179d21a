//! SSH connection-protocol names and codes shared by the core and its transports.
//!
//! Kept free of any protocol implementation so the forwarding logic can be
//! exercised against in-memory transports.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The only channel type this server will open.
pub const DIRECT_TCPIP: &str = "direct-tcpip";

/// Global request the connection handler answers positively; everything else is refused.
///
/// russh never forwards this one to its handler and replies `REQUEST_FAILURE` itself.
pub const KEEPALIVE_REQUEST: &str = "keepalive@openssh.com";

/// Hostname suffix a forward destination must carry.
pub const ONION_SUFFIX: &str = ".onion";

/// Reason codes for `SSH_MSG_CHANNEL_OPEN_FAILURE` (RFC 4254 §5.1).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum OpenFailure {
    AdministrativelyProhibited,
    ConnectionFailed,
    UnknownChannelType,
}

impl OpenFailure {
    /// Numeric reason code as sent on the wire.
    pub fn code(self) -> u32 {
        match self {
            Self::AdministrativelyProhibited => 1,
            Self::ConnectionFailed => 2,
            Self::UnknownChannelType => 3,
        }
    }
}

impl fmt::Display for OpenFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::AdministrativelyProhibited => "administratively prohibited",
            Self::ConnectionFailed => "connect failed",
            Self::UnknownChannelType => "unknown channel type",
        };
        f.write_str(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_failure_codes_match_rfc4254() {
        assert_eq!(OpenFailure::AdministrativelyProhibited.code(), 1);
        assert_eq!(OpenFailure::ConnectionFailed.code(), 2);
        assert_eq!(OpenFailure::UnknownChannelType.code(), 3);
    }
}
