#![no_main]

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use arbitrary::Arbitrary;
use callstream_reactive::{Subscription, ValueStream};
use libfuzzer_sys::fuzz_target;

#[derive(Arbitrary, Debug)]
enum Op {
    Update(u8),
    Subscribe,
    Unsubscribe(u8),
    /// Subscriber that pushes `value` back into the stream the first time
    /// it sees `trigger`.
    Echo { trigger: u8, value: u8 },
}

struct Tracked {
    log: Rc<RefCell<Vec<u8>>>,
    sub: Subscription,
    /// Model of what the log should contain.
    expected: Vec<u8>,
}

fuzz_target!(|ops: Vec<Op>| {
    let stream = ValueStream::new(0u8);
    let mut tracked: Vec<Tracked> = Vec::new();
    let mut echoes: Vec<Subscription> = Vec::new();
    let mut has_echo = false;

    for op in ops.into_iter().take(256) {
        match op {
            Op::Update(v) => {
                let before = stream.get();
                let emitted = stream.update(v);
                assert_eq!(emitted, v != before);
                if !has_echo && emitted {
                    for t in tracked.iter_mut().filter(|t| t.sub.is_active()) {
                        t.expected.push(v);
                    }
                }
            }
            Op::Subscribe => {
                let log = Rc::new(RefCell::new(Vec::new()));
                let sink = Rc::clone(&log);
                let sub = stream.subscribe(move |v: &u8| sink.borrow_mut().push(*v));
                let expected = log.borrow().clone();
                assert_eq!(expected.len(), 1);
                tracked.push(Tracked { log, sub, expected });
            }
            Op::Unsubscribe(i) => {
                if !tracked.is_empty() {
                    let idx = usize::from(i) % tracked.len();
                    let t = &mut tracked[idx];
                    let was_active = t.sub.is_active();
                    assert_eq!(t.sub.unsubscribe(), was_active);
                }
            }
            Op::Echo { trigger, value } => {
                let handle = stream.clone();
                let fired = Cell::new(false);
                echoes.push(stream.subscribe(move |v: &u8| {
                    if *v == trigger && !fired.replace(true) {
                        handle.update(value);
                    }
                }));
                has_echo = true;
            }
        }
    }

    for t in &tracked {
        let log = t.log.borrow();
        // Never two identical values in a row.
        assert!(log.windows(2).all(|w| w[0] != w[1]));
        if !has_echo {
            assert_eq!(*log, t.expected);
        }
    }
    drop(echoes);
});
