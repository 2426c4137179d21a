//! Server-side `direct-tcpip` forwarding building blocks.
//!
//! This module provides functionality for:
//! - Decoding the RFC 4254 §7.2 payload of a `direct-tcpip` channel open
//! - Dialing the requested destination, directly or through SOCKS5
//! - Relaying bytes between the SSH channel and the dialed connection
//!
//! None of it depends on a particular SSH engine; channels arrive as plain
//! [`ForwardStream`]s.

mod dialer;
mod relay;
mod request;
mod traits;

// Re-export public API
pub use dialer::{Dialer, DirectDialer, SocksDialer, dial_with_deadline, dialer_from_config};
pub use relay::{RelaySummary, Side, relay};
pub use request::ForwardDescriptor;
pub use traits::{ForwardStream, ForwardStreamIo};
