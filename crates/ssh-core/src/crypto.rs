use russh::{Preferred, compression};
use std::borrow::Cow;

/// Algorithm preferences for inbound connections: russh's secure defaults,
/// without compression since forwarded payloads are usually encrypted already.
pub fn default_preferred() -> Preferred {
    Preferred {
        compression: Cow::Owned(vec![compression::NONE]),
        ..Preferred::DEFAULT.clone()
    }
}
