//! E2E integration test: `SharedValueStream` under concurrent writers and
//! late-joining subscribers.
//!
//! Validates:
//! 1. Every subscriber observes a gap-free suffix of one global delivery
//!    order, with no duplicates.
//! 2. A late subscriber's first observation is its replay, and everything
//!    after it is a contiguous run of the early subscriber's log.
//! 3. No deadlocks when writers and subscribers race.

#![forbid(unsafe_code)]

use std::sync::{Arc, Barrier, Mutex};
use std::thread;

use callstream_reactive::SharedValueStream;

const WRITERS: u64 = 4;
const PUSHES_PER_WRITER: u64 = 500;

fn tag(writer: u64, seq: u64) -> u64 {
    writer * 1_000_000 + seq + 1
}

#[test]
fn e2e_concurrent_writers_and_late_subscriber() {
    let stream = SharedValueStream::new(0_u64);
    let early = Arc::new(Mutex::new(Vec::new()));
    let early_sink = Arc::clone(&early);
    let _early_sub = stream.subscribe(move |v: &u64| early_sink.lock().unwrap().push(*v));

    let barrier = Arc::new(Barrier::new(WRITERS as usize + 1));
    let writers: Vec<_> = (0..WRITERS)
        .map(|w| {
            let handle = stream.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                for i in 0..PUSHES_PER_WRITER {
                    handle.update(tag(w, i));
                }
            })
        })
        .collect();

    barrier.wait();
    let late = Arc::new(Mutex::new(Vec::new()));
    let late_sink = Arc::clone(&late);
    let _late_sub = stream.subscribe(move |v: &u64| late_sink.lock().unwrap().push(*v));

    for writer in writers {
        writer.join().unwrap();
    }

    let early = early.lock().unwrap().clone();
    let late = late.lock().unwrap().clone();

    // Early saw the initial value plus every push exactly once.
    assert_eq!(early.len() as u64, 1 + WRITERS * PUSHES_PER_WRITER);
    let mut sorted = early.clone();
    sorted.sort_unstable();
    sorted.dedup();
    assert_eq!(sorted.len(), early.len());

    // Per-writer order is preserved.
    for w in 0..WRITERS {
        let own: Vec<u64> = early
            .iter()
            .copied()
            .filter(|v| *v != 0 && (*v - 1) / 1_000_000 == w)
            .collect();
        let want: Vec<u64> = (0..PUSHES_PER_WRITER).map(|i| tag(w, i)).collect();
        assert_eq!(own, want, "writer {w} order");
    }

    // Late log is a contiguous suffix of the early log.
    assert!(!late.is_empty());
    let start = early
        .iter()
        .position(|v| *v == late[0])
        .expect("late replay value was delivered to early subscriber");
    assert_eq!(&early[start..], &late[..]);
    assert_eq!(stream.get(), *early.last().unwrap());
}

#[test]
fn e2e_subscribe_churn_while_writing() {
    let stream = SharedValueStream::new(0_u64);
    let writer = {
        let handle = stream.clone();
        thread::spawn(move || {
            for i in 1..=2_000_u64 {
                handle.update(i);
            }
        })
    };

    let mut runs = Vec::new();
    for _ in 0..50 {
        let log = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&log);
        let mut sub = stream.subscribe(move |v: &u64| sink.lock().unwrap().push(*v));
        thread::yield_now();
        sub.unsubscribe();
        runs.push(log);
    }
    writer.join().unwrap();

    for log in runs {
        let log = log.lock().unwrap();
        assert!(!log.is_empty());
        // Strictly increasing and gap-free after the replay.
        for pair in log.windows(2) {
            assert_eq!(pair[1], pair[0] + 1);
        }
    }
    assert_eq!(stream.get(), 2_000);
    assert_eq!(stream.subscriber_count(), 0);
}
