// Any damage to the artifact is caught before a single byte is released

use crate::integration::common::{key, seal, vault_for, OTHER_KEY, PLAINTEXT};
use promptvault::{
    CipherBlob, EncryptionKey, Error, FailurePolicy, LoadState, Vault, VaultConfig,
};
use std::fs;
use tempfile::tempdir;

#[test]
fn test_flipped_last_byte_fails_authentication() {
    let dir = tempdir().unwrap();
    let path = seal(dir.path(), PLAINTEXT);

    let mut bytes = fs::read(&path).unwrap();
    let last = bytes.len() - 1;
    bytes[last] ^= 0x01;
    fs::write(&path, &bytes).unwrap();

    let vault = vault_for(&path);
    assert_eq!(vault.load_secret().unwrap_err(), Error::AuthenticationFailure);
    assert_eq!(vault.state(), LoadState::Failed);
}

#[test]
fn test_every_flipped_byte_is_detected() {
    let dir = tempdir().unwrap();
    let path = seal(dir.path(), PLAINTEXT);
    let original = fs::read(&path).unwrap();

    for index in 0..original.len() {
        let mut damaged = original.clone();
        damaged[index] ^= 0x80;
        let blob = CipherBlob::from_bytes(damaged).unwrap();

        let err = promptvault::decrypt(&blob, crate::integration::common::KEY).unwrap_err();
        assert_eq!(err, Error::AuthenticationFailure, "byte {index} went unnoticed");
    }
}

#[test]
fn test_wrong_key_fails_authentication() {
    let dir = tempdir().unwrap();
    let path = seal(dir.path(), PLAINTEXT);

    let vault = Vault::new(
        VaultConfig::new()
            .with_artifact_path(&path)
            .with_key(EncryptionKey::from_slice(OTHER_KEY).unwrap()),
    )
    .unwrap();
    assert_eq!(vault.load_secret().unwrap_err(), Error::AuthenticationFailure);
}

#[test]
fn test_truncated_artifact_is_corrupt() {
    let dir = tempdir().unwrap();
    let path = seal(dir.path(), PLAINTEXT);
    let bytes = fs::read(&path).unwrap();
    fs::write(&path, &bytes[..20]).unwrap();

    let err = vault_for(&path).load_secret().unwrap_err();
    assert!(matches!(err, Error::CorruptData(_)));
}

#[test]
fn test_permanent_failure_survives_a_fixed_artifact() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("prompt.bin.enc");
    fs::write(&path, [0_u8; 64]).unwrap();

    let vault = vault_for(&path);
    assert_eq!(vault.load_secret().unwrap_err(), Error::AuthenticationFailure);

    seal(dir.path(), PLAINTEXT);
    assert_eq!(vault.load_secret().unwrap_err(), Error::AuthenticationFailure);
    assert_eq!(vault.attempts(), 1);
}

#[test]
fn test_retry_policy_recovers_once_artifact_is_fixed() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("prompt.bin.enc");

    let vault = Vault::builder()
        .with_artifact_path(&path)
        .with_key(key())
        .with_failure_policy(FailurePolicy::Retry)
        .build()
        .unwrap();

    let err = vault.load_secret().unwrap_err();
    assert!(matches!(err, Error::NotFound { .. }));
    assert!(err.is_retriable());

    seal(dir.path(), PLAINTEXT);
    let buffer = vault.load_secret().unwrap();
    buffer
        .with_bytes(|bytes| assert_eq!(bytes, PLAINTEXT))
        .unwrap();
    assert_eq!(vault.attempts(), 2);
}
