use std::sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering},
    Arc, Barrier,
};
use std::thread;
use std::time::Duration;

use rayon::prelude::*;
use securememory::{ProtectedBuffer, SecureMemoryError};

const THREAD_COUNT: usize = 10;
const ITERATIONS: usize = 5;

/// Readers hammer the buffer while another thread destroys it. Every read
/// either sees the full original bytes or `SecretClosed`, never a partial
/// or zeroed view.
#[test]
fn test_race_concurrent_destroy() {
    for _ in 0..ITERATIONS {
        let mut orig = b"thisismy32bytesecretthatiwilluse".to_vec();
        let expected = orig.clone();

        let buffer = Arc::new(ProtectedBuffer::new(&mut orig).unwrap());
        let closed = Arc::new(AtomicBool::new(false));
        let barrier = Arc::new(Barrier::new(THREAD_COUNT));

        let mut handles = Vec::with_capacity(THREAD_COUNT);

        for _ in 0..THREAD_COUNT - 1 {
            let buffer = Arc::clone(&buffer);
            let barrier = Arc::clone(&barrier);
            let closed = Arc::clone(&closed);
            let expected = expected.clone();

            handles.push(thread::spawn(move || {
                barrier.wait();
                loop {
                    match buffer.with_bytes(|bytes| assert_eq!(bytes, expected.as_slice())) {
                        Ok(()) => {}
                        Err(SecureMemoryError::SecretClosed) => break,
                        Err(e) => panic!("Unexpected error: {:?}", e),
                    }
                    if closed.load(Ordering::SeqCst) && buffer.is_destroyed() {
                        break;
                    }
                    thread::yield_now();
                }
            }));
        }

        let closer = {
            let buffer = Arc::clone(&buffer);
            let barrier = Arc::clone(&barrier);
            let closed = Arc::clone(&closed);
            thread::spawn(move || {
                barrier.wait();
                thread::sleep(Duration::from_millis(5));
                buffer.destroy().unwrap();
                closed.store(true, Ordering::SeqCst);
            })
        };
        handles.push(closer);

        for handle in handles {
            handle.join().expect("thread panicked");
        }

        assert!(buffer.is_destroyed());
        assert!(matches!(
            buffer.with_bytes(|_| ()),
            Err(SecureMemoryError::SecretClosed)
        ));
    }
}

/// Destroy blocks until a reader that is already inside leaves.
#[test]
fn test_destroy_waits_for_reader() {
    let mut orig = b"slow reader".to_vec();
    let buffer = Arc::new(ProtectedBuffer::new(&mut orig).unwrap());
    let inside = Arc::new(Barrier::new(2));
    let finished_reading = Arc::new(AtomicBool::new(false));

    let reader = {
        let buffer = Arc::clone(&buffer);
        let inside = Arc::clone(&inside);
        let finished_reading = Arc::clone(&finished_reading);
        thread::spawn(move || {
            buffer
                .with_bytes(|bytes| {
                    inside.wait();
                    thread::sleep(Duration::from_millis(50));
                    assert_eq!(bytes, b"slow reader");
                    finished_reading.store(true, Ordering::SeqCst);
                })
                .unwrap();
        })
    };

    inside.wait();
    buffer.destroy().unwrap();
    assert!(
        finished_reading.load(Ordering::SeqCst),
        "destroy returned while a reader was still inside"
    );
    reader.join().unwrap();
}

#[test]
fn test_parallel_readers() {
    let mut orig = vec![0x5a_u8; 4096 * 3 + 17];
    let expected = orig.clone();
    let buffer = ProtectedBuffer::new(&mut orig).unwrap();
    let reads = AtomicUsize::new(0);

    (0..1000).into_par_iter().for_each(|_| {
        buffer
            .with_bytes(|bytes| assert_eq!(bytes, expected.as_slice()))
            .unwrap();
        reads.fetch_add(1, Ordering::Relaxed);
    });

    assert_eq!(reads.load(Ordering::Relaxed), 1000);
    buffer.destroy().unwrap();
}
