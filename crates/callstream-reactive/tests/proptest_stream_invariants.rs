//! Property-based invariant tests for `ValueStream` and `StreamCache`.
//!
//! Verifies:
//!
//! 1. Replay: a subscriber's first observation is the value current at
//!    subscribe time.
//! 2. No duplicate emission: consecutive identical pushes emit once.
//! 3. Every subscriber sees exactly the de-duplicated push sequence from the
//!    point it joined, in push order.
//! 4. Version equals the number of emitted values.
//! 5. Unsubscribed callbacks never fire again.
//! 6. Cache idempotence regardless of later initial values.

use std::cell::RefCell;
use std::rc::Rc;

use callstream_reactive::{OwnerId, StreamCache, Subscription, ValueStream};
use proptest::prelude::*;

// ── Helpers ──────────────────────────────────────────────────────────

fn recording(stream: &ValueStream<u8>) -> (Rc<RefCell<Vec<u8>>>, Subscription) {
    let log = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&log);
    let sub = stream.subscribe(move |v: &u8| sink.borrow_mut().push(*v));
    (log, sub)
}

/// Expected observations for a subscriber that joined with `current` and
/// then saw `pushes`.
fn expected(current: u8, pushes: &[u8]) -> Vec<u8> {
    let mut out = vec![current];
    let mut last = current;
    for &v in pushes {
        if v != last {
            out.push(v);
            last = v;
        }
    }
    out
}

// Small alphabet so repeats are common.
fn arb_pushes() -> impl Strategy<Value = Vec<u8>> {
    proptest::collection::vec(0u8..4, 0..=64)
}

// ═════════════════════════════════════════════════════════════════════════
// 1–4. Replay, de-duplication, ordering, version
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn subscriber_sees_deduplicated_sequence(initial in 0u8..4, pushes in arb_pushes()) {
        let stream = ValueStream::new(initial);
        let (log, _sub) = recording(&stream);
        for &v in &pushes {
            stream.update(v);
        }
        let want = expected(initial, &pushes);
        prop_assert_eq!(stream.version() as usize, want.len() - 1);
        prop_assert_eq!(log.borrow().clone(), want);
    }
}

proptest! {
    #[test]
    fn late_subscriber_starts_from_current(
        initial in 0u8..4,
        before in arb_pushes(),
        after in arb_pushes(),
    ) {
        let stream = ValueStream::new(initial);
        let (early, _early_sub) = recording(&stream);
        for &v in &before {
            stream.update(v);
        }
        let joined_with = stream.get();
        let (late, _late_sub) = recording(&stream);
        for &v in &after {
            stream.update(v);
        }

        let late_log = late.borrow().clone();
        prop_assert_eq!(late_log[0], joined_with);
        prop_assert_eq!(late_log.clone(), expected(joined_with, &after));

        // The early subscriber's tail matches the late subscriber exactly.
        let early_log = early.borrow().clone();
        let tail = &early_log[early_log.len() - (late_log.len() - 1)..];
        prop_assert_eq!(tail, &late_log[1..]);
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 5. Unsubscribe stops delivery
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn unsubscribed_never_fires(pushes in arb_pushes(), cut in 0usize..64) {
        let stream = ValueStream::new(0u8);
        let (log, mut sub) = recording(&stream);
        let cut = cut.min(pushes.len());
        for &v in &pushes[..cut] {
            stream.update(v);
        }
        sub.unsubscribe();
        let frozen = log.borrow().len();
        for &v in &pushes[cut..] {
            stream.update(v);
        }
        prop_assert_eq!(log.borrow().len(), frozen);
        prop_assert_eq!(stream.subscriber_count(), 0);
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 6. Cache idempotence
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn cache_returns_same_instance(initials in proptest::collection::vec(any::<u8>(), 1..=16)) {
        let mut cache = StreamCache::new();
        let owner = OwnerId::next();
        let first = cache.get_or_create(owner, initials[0]);
        for &init in &initials[1..] {
            let again = cache.get_or_create(owner, init);
            prop_assert!(ValueStream::ptr_eq(&first, &again));
        }
        prop_assert_eq!(first.get(), initials[0]);
        prop_assert_eq!(cache.len(), 1);
    }
}

proptest! {
    #[test]
    fn observe_matches_manual_passes(pushes in proptest::collection::vec(0u8..4, 1..=32)) {
        let mut cache = StreamCache::new();
        let owner = OwnerId::next();
        let stream = cache.observe(owner, pushes[0]);
        let (log, _sub) = recording(&stream);
        for &v in &pushes[1..] {
            cache.observe(owner, v);
        }
        prop_assert_eq!(log.borrow().clone(), expected(pushes[0], &pushes[1..]));
    }
}
