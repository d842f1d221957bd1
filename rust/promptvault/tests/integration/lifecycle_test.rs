// Load, read and release behaviour of a single vault

use crate::integration::common::{counting_vault, seal, vault_for, CountingActivator, PLAINTEXT};
use promptvault::{Error, LoadState};
use std::io::Read;
use std::sync::Arc;
use tempfile::tempdir;

#[test]
fn test_missing_artifact_fails_fast() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("prompt.bin.enc");
    let activator = Arc::new(CountingActivator::new());
    let vault = counting_vault(&path, &activator);

    assert!(!vault.artifact_present());
    let err = vault.load_secret().unwrap_err();

    assert_eq!(err, Error::NotFound { path: path.clone() });
    assert!(err.to_string().contains("promptvault seal"));
    assert_eq!(activator.calls(), 0);
    assert_eq!(vault.state(), LoadState::Failed);
}

#[test]
fn test_preload_then_read_without_disk() {
    let dir = tempdir().unwrap();
    let path = seal(dir.path(), PLAINTEXT);
    let activator = Arc::new(CountingActivator::new());
    let vault = counting_vault(&path, &activator);
    assert_eq!(vault.state(), LoadState::Unloaded);

    vault.preload().unwrap();
    drop(dir);

    let mut read_back = Vec::new();
    vault
        .load_secret()
        .unwrap()
        .reader()
        .read_to_end(&mut read_back)
        .unwrap();
    assert_eq!(read_back, PLAINTEXT);
    assert_eq!(activator.calls(), 1);
}

#[test]
fn test_release_zeroes_the_region() {
    let dir = tempdir().unwrap();
    let vault = vault_for(&seal(dir.path(), PLAINTEXT));
    let buffer = vault.load_secret().unwrap();

    let mut observed = None;
    buffer
        .destroy_observed(|region| observed = Some(region.to_vec()))
        .unwrap();

    let observed = observed.unwrap();
    assert!(observed.len() >= PLAINTEXT.len());
    assert!(observed.iter().all(|&b| b == 0));
    assert!(buffer.is_destroyed());

    // the vault notices its cached buffer is gone and will not hand it out
    assert_eq!(vault.load_secret().unwrap_err(), Error::Purged);
    assert!(vault.is_purged());
}

#[test]
fn test_purge_is_idempotent() {
    let dir = tempdir().unwrap();
    let vault = vault_for(&seal(dir.path(), PLAINTEXT));
    vault.preload().unwrap();

    vault.purge().unwrap();
    vault.purge().unwrap();

    assert_eq!(vault.state(), LoadState::Loaded);
    assert_eq!(vault.load_secret().unwrap_err(), Error::Purged);
}
