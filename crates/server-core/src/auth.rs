//! Pluggable client authentication.
//!
//! The gateway itself needs no identity; the policy only decides who may open
//! a session at all.

use std::{net::SocketAddr, path::Path, sync::Arc};

use async_trait::async_trait;
use op_types::{auth::AuthDecision, config::AuthConfig};
use russh::keys::PublicKey;
use tracing::{debug, warn};

use crate::error::{ServerError, ServerResult};

/// Key type prefixes recognised when skipping an options field in `authorized_keys`.
const KEY_TYPE_PREFIXES: &[&str] = &["ssh-", "ecdsa-", "sk-"];

#[async_trait]
pub trait AuthPolicy: Send + Sync + 'static {
    async fn check_password(&self, user: &str, password: &str, peer: SocketAddr) -> AuthDecision;

    async fn check_public_key(&self, user: &str, key: &PublicKey, peer: SocketAddr) -> AuthDecision;

    /// Whether the password method should be offered at all.
    fn accepts_passwords(&self) -> bool {
        true
    }
}

/// Accepts every credential.
#[derive(Clone, Copy, Debug, Default)]
pub struct AllowAll;

#[async_trait]
impl AuthPolicy for AllowAll {
    async fn check_password(&self, _user: &str, _password: &str, _peer: SocketAddr) -> AuthDecision {
        AuthDecision::Accept
    }

    async fn check_public_key(&self, _user: &str, _key: &PublicKey, _peer: SocketAddr) -> AuthDecision {
        AuthDecision::Accept
    }
}

/// Accepts public keys listed in an OpenSSH `authorized_keys` file, for any user name.
#[derive(Clone, Debug)]
pub struct AuthorizedKeys {
    keys: Vec<PublicKey>,
    allow_password: bool,
}

impl AuthorizedKeys {
    pub fn new(keys: Vec<PublicKey>, allow_password: bool) -> Self {
        Self { keys, allow_password }
    }

    pub fn load(path: &Path, allow_password: bool) -> ServerResult<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ServerError::InvalidConfig(format!("failed to read authorized keys {}: {e}", path.display())))?;
        let policy = Self::new(parse_authorized_keys(&contents), allow_password);
        if policy.is_empty() {
            warn!(path = %path.display(), "authorized keys file lists no usable keys; every public key will be rejected");
        }
        Ok(policy)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

#[async_trait]
impl AuthPolicy for AuthorizedKeys {
    async fn check_password(&self, _user: &str, _password: &str, _peer: SocketAddr) -> AuthDecision {
        if self.allow_password {
            AuthDecision::Accept
        } else {
            AuthDecision::Reject
        }
    }

    async fn check_public_key(&self, _user: &str, key: &PublicKey, _peer: SocketAddr) -> AuthDecision {
        if self.keys.iter().any(|known| known.key_data() == key.key_data()) {
            AuthDecision::Accept
        } else {
            AuthDecision::Reject
        }
    }

    fn accepts_passwords(&self) -> bool {
        self.allow_password
    }
}

/// Parse `authorized_keys` contents, skipping blank lines, comments and entries that fail to parse.
pub fn parse_authorized_keys(contents: &str) -> Vec<PublicKey> {
    contents
        .lines()
        .enumerate()
        .filter_map(|(idx, line)| {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                return None;
            }
            let key = parse_authorized_line(line);
            if key.is_none() {
                debug!(line = idx + 1, "skipping unparseable authorized_keys entry");
            }
            key
        })
        .collect()
}

fn parse_authorized_line(line: &str) -> Option<PublicKey> {
    if let Ok(key) = PublicKey::from_openssh(line) {
        return Some(key);
    }
    // Leading options, e.g. `no-pty,restrict ssh-ed25519 AAAA...`
    let start = line
        .char_indices()
        .filter(|(idx, _)| *idx > 0 && line[..*idx].ends_with(char::is_whitespace))
        .map(|(idx, _)| idx)
        .find(|&idx| KEY_TYPE_PREFIXES.iter().any(|prefix| line[idx..].starts_with(prefix)))?;
    PublicKey::from_openssh(&line[start..]).ok()
}

/// Build the policy selected by configuration.
pub fn policy_from_config(config: &AuthConfig) -> ServerResult<Arc<dyn AuthPolicy>> {
    match config {
        AuthConfig::AllowAll => {
            warn!("accepting any credential; pass --authorized-keys to restrict who may connect");
            Ok(Arc::new(AllowAll))
        }
        AuthConfig::AuthorizedKeys { path, allow_password } => {
            let policy = AuthorizedKeys::load(path, *allow_password)?;
            debug!(path = %path.display(), keys = policy.len(), allow_password, "loaded authorized keys");
            Ok(Arc::new(policy))
        }
    }
}

#[cfg(test)]
mod tests {
    use russh::keys::{Algorithm, PrivateKey, ssh_key::rand_core::OsRng};

    use super::*;

    fn peer() -> SocketAddr {
        "192.0.2.7:50000".parse().unwrap()
    }

    fn ed25519() -> PrivateKey {
        PrivateKey::random(&mut OsRng, Algorithm::Ed25519).unwrap()
    }

    #[tokio::test]
    async fn allow_all_accepts_anything() {
        let key = ed25519();
        assert!(AllowAll.check_password("anyone", "", peer()).await.is_accept());
        assert!(AllowAll.check_public_key("anyone", key.public_key(), peer()).await.is_accept());
    }

    #[tokio::test]
    async fn authorized_keys_matches_key_data_only() {
        let listed = ed25519();
        let stranger = ed25519();
        let line = listed.public_key().to_openssh().unwrap();
        let contents = format!("# operators\n\n{line}\nnot a key at all\n");

        let policy = AuthorizedKeys::new(parse_authorized_keys(&contents), false);
        assert_eq!(policy.len(), 1);
        assert!(policy.check_public_key("alice", listed.public_key(), peer()).await.is_accept());
        assert!(policy.check_public_key("bob", listed.public_key(), peer()).await.is_accept());
        assert!(!policy.check_public_key("alice", stranger.public_key(), peer()).await.is_accept());
    }

    #[tokio::test]
    async fn passwords_follow_the_flag() {
        let locked = AuthorizedKeys::new(Vec::new(), false);
        assert!(locked.is_empty());
        assert!(!locked.accepts_passwords());
        assert!(!locked.check_password("alice", "hunter2", peer()).await.is_accept());

        let open = AuthorizedKeys::new(Vec::new(), true);
        assert!(open.accepts_passwords());
        assert!(open.check_password("alice", "hunter2", peer()).await.is_accept());
    }

    #[test]
    fn options_prefix_is_skipped() {
        let key = ed25519();
        let line = key.public_key().to_openssh().unwrap();
        let contents = format!("no-pty,no-agent-forwarding {line}");
        let parsed = parse_authorized_keys(&contents);
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].key_data(), key.public_key().key_data());
    }

    #[test]
    fn load_reads_file_and_reports_missing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("authorized_keys");
        let key = ed25519();
        std::fs::write(&path, format!("{}\n", key.public_key().to_openssh().unwrap())).unwrap();

        let policy = AuthorizedKeys::load(&path, false).unwrap();
        assert_eq!(policy.len(), 1);

        let err = AuthorizedKeys::load(&dir.path().join("missing"), false).unwrap_err();
        assert!(matches!(err, ServerError::InvalidConfig(_)));
    }
}
