use rsa::{RsaPrivateKey, pkcs1::EncodeRsaPrivateKey, pkcs8::LineEnding};
use russh::keys::HashAlg;
use ssh_core::{SshCoreError, keys};

#[test]
fn loads_unencrypted_legacy_pem() {
    // ssh-keygen -m PEM style host key
    let mut rng = rand::thread_rng();
    let key = RsaPrivateKey::new(&mut rng, 1024).expect("generate");
    let pem = key.to_pkcs1_pem(LineEnding::LF).expect("pem");

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("id_rsa");
    std::fs::write(&path, pem.as_bytes()).unwrap();

    let loaded = keys::load_host_key(&path).expect("load legacy pem");
    assert!(loaded.algorithm().is_rsa());
}

#[test]
fn generates_missing_key_once_then_reloads_it() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("keys").join("host_ed25519");

    let first = keys::load_or_generate_host_key(&path).expect("generate");
    assert!(path.exists());
    let second = keys::load_or_generate_host_key(&path).expect("reload");
    assert_eq!(
        first.public_key().fingerprint(HashAlg::Sha256).to_string(),
        second.public_key().fingerprint(HashAlg::Sha256).to_string()
    );

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}

#[test]
fn missing_key_is_a_host_key_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent");
    match keys::load_host_key(&path) {
        Err(SshCoreError::HostKey { path: reported, message }) => {
            assert_eq!(reported, path);
            assert!(message.starts_with("failed to load private key"), "{message}");
        }
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("missing key must not load"),
    }
}

#[test]
fn garbage_key_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("id_rsa");
    std::fs::write(&path, "not a key").unwrap();
    let err = keys::load_host_key(&path).err().expect("garbage must not parse");
    assert!(err.to_string().contains("failed to parse private key"), "{err}");
}
