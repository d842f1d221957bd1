// Many threads racing for the first load observe one activation

use crate::integration::common::{counting_vault, seal, CountingActivator, PLAINTEXT};
use promptvault::{Error, LoadState};
use securememory::SecureMemoryError;
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;
use tempfile::tempdir;

const THREADS: usize = 32;

#[test]
fn test_concurrent_first_load_activates_once() {
    let dir = tempdir().unwrap();
    let path = seal(dir.path(), PLAINTEXT);
    let activator = Arc::new(CountingActivator::with_delay(Duration::from_millis(50)));
    let vault = Arc::new(counting_vault(&path, &activator));
    let barrier = Arc::new(Barrier::new(THREADS));

    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let vault = Arc::clone(&vault);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                vault
                    .load_secret()
                    .unwrap()
                    .with_bytes(|bytes| bytes.to_vec())
                    .unwrap()
            })
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.join().unwrap(), PLAINTEXT);
    }
    assert_eq!(activator.calls(), 1);
    assert_eq!(vault.attempts(), 1);
    assert_eq!(vault.state(), LoadState::Loaded);
}

#[test]
fn test_concurrent_first_load_shares_failure() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("prompt.bin.enc");
    std::fs::write(&path, [7_u8; 40]).unwrap();
    let activator = Arc::new(CountingActivator::new());
    let vault = Arc::new(counting_vault(&path, &activator));
    let barrier = Arc::new(Barrier::new(THREADS));

    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let vault = Arc::clone(&vault);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                vault.load_secret().unwrap_err()
            })
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.join().unwrap(), Error::AuthenticationFailure);
    }
    assert_eq!(vault.attempts(), 1);
    assert_eq!(activator.calls(), 0);
}

#[test]
fn test_readers_during_purge() {
    let dir = tempdir().unwrap();
    let path = seal(dir.path(), PLAINTEXT);
    let activator = Arc::new(CountingActivator::new());
    let vault = Arc::new(counting_vault(&path, &activator));
    vault.preload().unwrap();

    let readers: Vec<_> = (0..8)
        .map(|_| {
            let vault = Arc::clone(&vault);
            thread::spawn(move || {
                for _ in 0..200 {
                    match vault.load_secret() {
                        Ok(buffer) => match buffer.with_bytes(|bytes| bytes.to_vec()) {
                            // never a partially wiped view
                            Ok(bytes) => assert_eq!(bytes, PLAINTEXT),
                            Err(e) => assert_eq!(e, SecureMemoryError::SecretClosed),
                        },
                        Err(e) => assert_eq!(e, Error::Purged),
                    }
                }
            })
        })
        .collect();

    thread::sleep(Duration::from_millis(5));
    vault.purge().unwrap();

    for reader in readers {
        reader.join().unwrap();
    }
    assert_eq!(vault.load_secret().unwrap_err(), Error::Purged);
    assert_eq!(activator.calls(), 1);
}
