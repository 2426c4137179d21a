pub mod crypto;
pub mod error;
pub mod forwarding;
pub mod keys;

pub use error::{DecodeError, DialError, SshCoreError, SshResult};
