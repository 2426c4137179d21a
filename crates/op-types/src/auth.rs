use serde::{Deserialize, Serialize};

/// Simple auth decision enum used by the SSH server when validating credentials.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuthDecision {
    Accept,
    Reject,
}

impl AuthDecision {
    pub fn is_accept(self) -> bool {
        matches!(self, Self::Accept)
    }
}

/// Credential kind that completed authentication.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuthMethod {
    Password,
    PublicKey,
}

impl std::fmt::Display for AuthMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Password => f.write_str("password"),
            Self::PublicKey => f.write_str("publickey"),
        }
    }
}
