// Sealed payloads come back byte-for-byte through the runtime path

use crate::integration::common::{key, seal, vault_for, KEY, PLAINTEXT};
use promptvault::{decrypt, encrypt, ArtifactFormat, LoadState, Vault, VaultConfig};
use std::fs;
use tempfile::tempdir;

fn load_bytes(vault: &Vault) -> Vec<u8> {
    vault
        .load_secret()
        .unwrap()
        .with_bytes(|bytes| bytes.to_vec())
        .unwrap()
}

#[test]
fn test_free_functions_round_trip() {
    let blob = encrypt(PLAINTEXT, KEY).unwrap();
    assert_eq!(blob.len(), PLAINTEXT.len() + 28);
    assert_eq!(decrypt(&blob, KEY).unwrap().as_slice(), PLAINTEXT);
}

#[test]
fn test_sealed_artifact_loads_exactly() {
    let dir = tempdir().unwrap();
    let path = seal(dir.path(), PLAINTEXT);
    let vault = vault_for(&path);

    assert_eq!(load_bytes(&vault), PLAINTEXT);
    assert_eq!(vault.state(), LoadState::Loaded);

    let handle = vault.provider_handle().unwrap();
    assert_eq!(handle.activator(), "in-process");
    assert_eq!(handle.symbol(), None);
    assert_eq!(handle.secret_len(), PLAINTEXT.len());
}

#[test]
fn test_unit_format_through_vault() {
    let dir = tempdir().unwrap();
    let transient = tempdir().unwrap();
    let path = dir.path().join("prompt.unit.enc");
    promptvault::Encryptor::new(key())
        .with_format(ArtifactFormat::Unit)
        .seal_to_file(PLAINTEXT, &path)
        .unwrap();

    let vault = Vault::new(
        VaultConfig::new()
            .with_artifact_path(&path)
            .with_key(key())
            .with_format(ArtifactFormat::Unit)
            .with_transient_dir(transient.path()),
    )
    .unwrap();

    assert_eq!(load_bytes(&vault), PLAINTEXT);
    assert_eq!(vault.provider_handle().unwrap().symbol(), Some("get_data"));
    assert_eq!(fs::read_dir(transient.path()).unwrap().count(), 0);
}

#[test]
fn test_edge_payloads() {
    let large: Vec<u8> = (0..1024 * 1024).map(|i| (i % 251) as u8).collect();
    let utf8 = "Systemprompt: ünïcödé ✓ 秘密 🔐".as_bytes().to_vec();

    for payload in [Vec::new(), large, utf8] {
        let dir = tempdir().unwrap();
        let path = seal(dir.path(), &payload);
        let vault = vault_for(&path);

        let buffer = vault.load_secret().unwrap();
        assert_eq!(buffer.len(), payload.len());
        assert_eq!(buffer.is_empty(), payload.is_empty());
        assert_eq!(load_bytes(&vault), payload);
    }
}

#[test]
fn test_independent_vaults_coexist() {
    let first_dir = tempdir().unwrap();
    let second_dir = tempdir().unwrap();
    let first = vault_for(&seal(first_dir.path(), b"first secret"));
    let second = vault_for(&seal(second_dir.path(), b"second secret"));

    assert_eq!(load_bytes(&first), b"first secret");
    assert_eq!(load_bytes(&second), b"second secret");

    first.purge().unwrap();
    assert!(first.load_secret().is_err());
    assert_eq!(load_bytes(&second), b"second secret");
}
