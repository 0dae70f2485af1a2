//! Integration tests for RwSynced under concurrent load.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use tether_core::RwSynced;

#[test]
fn test_ten_thousand_increments() {
    let counter = Arc::new(RwSynced::new(0u64).unwrap());
    let num_threads = 16;
    let increments_per_thread = 625;

    let handles: Vec<_> = (0..num_threads)
        .map(|_| {
            let counter = Arc::clone(&counter);
            thread::spawn(move || {
                for _ in 0..increments_per_thread {
                    counter.apply(|n| *n += 1).unwrap();
                }
            })
        })
        .collect();

    for h in handles {
        h.join().unwrap();
    }

    assert_eq!(counter.read().unwrap(), 10_000);
}

#[test]
fn test_many_short_lived_threads() {
    let counter = RwSynced::new(0usize).unwrap();

    thread::scope(|s| {
        for _ in 0..1_000 {
            s.spawn(|| {
                for _ in 0..10 {
                    counter.apply(|n| *n += 1).unwrap();
                }
            });
        }
    });

    assert_eq!(counter.into_inner(), 10_000);
}

#[test]
fn test_readers_never_see_partial_mutation() {
    let pair = Arc::new(RwSynced::new((0u64, 0u64)).unwrap());
    let done = Arc::new(AtomicBool::new(false));
    let reads = Arc::new(AtomicUsize::new(0));

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let pair = Arc::clone(&pair);
            let done = Arc::clone(&done);
            let reads = Arc::clone(&reads);
            thread::spawn(move || {
                while !done.load(Ordering::Acquire) {
                    let (a, b) = pair.read().unwrap();
                    assert_eq!(a, b, "torn read");
                    reads.fetch_add(1, Ordering::Relaxed);
                }
            })
        })
        .collect();

    let writers: Vec<_> = (0..4)
        .map(|_| {
            let pair = Arc::clone(&pair);
            thread::spawn(move || {
                for _ in 0..2_500 {
                    pair.apply(|(a, b)| {
                        *a += 1;
                        thread::yield_now();
                        *b += 1;
                    })
                    .unwrap();
                }
            })
        })
        .collect();

    for h in writers {
        h.join().unwrap();
    }
    done.store(true, Ordering::Release);
    for h in readers {
        h.join().unwrap();
    }

    assert_eq!(pair.read().unwrap(), (10_000, 10_000));
    assert!(reads.load(Ordering::Relaxed) > 0);
}

#[test]
fn test_panicking_writer_does_not_block_others() {
    let counter = Arc::new(RwSynced::new(0u32).unwrap());

    let failing = {
        let counter = Arc::clone(&counter);
        thread::spawn(move || {
            counter
                .apply(|n| {
                    *n += 1;
                    panic!("writer died holding the lock");
                })
                .unwrap();
        })
    };
    assert!(failing.join().is_err());

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let counter = Arc::clone(&counter);
            thread::spawn(move || {
                for _ in 0..100 {
                    counter.apply(|n| *n += 1).unwrap();
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    assert_eq!(counter.read().unwrap(), 801);
}
