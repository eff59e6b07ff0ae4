#![forbid(unsafe_code)]

//! Single-threaded replaying value stream.
//!
//! # Design
//!
//! [`ValueStream<T>`] keeps its current value and its subscribers in shared,
//! reference-counted storage. Cloning a stream creates a new handle to the
//! **same** stream; use [`ValueStream::ptr_eq`] to check instance identity.
//!
//! Subscriber callbacks always run with no internal borrow held, so a
//! callback may read the stream, subscribe, unsubscribe or push a new value.
//! Values pushed while a notification pass is running are queued and
//! delivered in FIFO order once the pass completes.
//!
//! # Invariants
//!
//! 1. `version` increments exactly once per emitted value.
//! 2. A value that [`is_same`](Identity::is_same) as the current value is
//!    never emitted.
//! 3. Each pass iterates a snapshot of the subscriber list. A subscriber
//!    removed mid-pass is not called again; nobody else is skipped or called
//!    twice.
//! 4. A subscriber added mid-pass receives only its replay for that pass.
//!
//! # Failure Modes
//!
//! - **Callback panics**: the pass is abandoned, queued values are dropped
//!   and the stream returns to idle. The current value stays at the value
//!   that was being delivered.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fmt;
use std::rc::{Rc, Weak};

use crate::identity::Identity;

/// A registered callback plus the liveness flag shared with its guard.
struct Entry<T> {
    id: u64,
    active: Rc<Cell<bool>>,
    callback: Box<dyn Fn(&T)>,
}

struct StreamInner<T> {
    current: T,
    version: u64,
    subscribers: Vec<Rc<Entry<T>>>,
    next_id: u64,
    /// True while a notification pass (or a replay) is in progress.
    notifying: bool,
    /// Values pushed during a pass, delivered after it.
    pending: VecDeque<T>,
}

/// A push-based stream over a value that is otherwise only available by
/// recomputation.
///
/// # Example
///
/// ```
/// use std::cell::RefCell;
/// use std::rc::Rc;
/// use callstream_reactive::ValueStream;
///
/// let stream = ValueStream::new(0);
/// let seen = Rc::new(RefCell::new(Vec::new()));
///
/// let log = Rc::clone(&seen);
/// let sub = stream.subscribe(move |v: &i32| log.borrow_mut().push(*v));
/// assert_eq!(*seen.borrow(), vec![0]);
///
/// stream.update(5);
/// stream.update(5);
/// drop(sub);
/// stream.update(7);
/// assert_eq!(*seen.borrow(), vec![0, 5]);
/// ```
pub struct ValueStream<T> {
    inner: Rc<RefCell<StreamInner<T>>>,
}

impl<T> Clone for ValueStream<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for ValueStream<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("ValueStream")
            .field("current", &inner.current)
            .field("version", &inner.version)
            .field("subscribers", &inner.subscribers.len())
            .finish()
    }
}

impl<T> ValueStream<T> {
    /// Whether two handles point at the same stream instance.
    #[must_use]
    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        Rc::ptr_eq(&a.inner, &b.inner)
    }

    /// Number of emitted values since creation.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.inner.borrow().version
    }

    /// Number of live subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.inner
            .borrow()
            .subscribers
            .iter()
            .filter(|entry| entry.active.get())
            .count()
    }

    /// Access the current value by reference.
    ///
    /// # Panics
    ///
    /// Panics if the closure pushes a value into this same stream
    /// (re-entrant borrow).
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.inner.borrow().current)
    }
}

impl<T: Identity + Clone + 'static> ValueStream<T> {
    /// Create a stream seeded with `initial`.
    #[must_use]
    pub fn new(initial: T) -> Self {
        Self {
            inner: Rc::new(RefCell::new(StreamInner {
                current: initial,
                version: 0,
                subscribers: Vec::new(),
                next_id: 0,
                notifying: false,
                pending: VecDeque::new(),
            })),
        }
    }

    /// Clone of the current value.
    #[must_use]
    pub fn get(&self) -> T {
        self.inner.borrow().current.clone()
    }

    /// Push a candidate value.
    ///
    /// If `value` is not the same as the current value it becomes current
    /// and every subscriber is called with it, synchronously and in
    /// subscription order. Returns `false` when the value was suppressed.
    ///
    /// Called from inside a subscriber callback, the value is queued and
    /// `true` is returned; it is compared and delivered after the running
    /// pass.
    pub fn update(&self, value: T) -> bool {
        let current = {
            let mut inner = self.inner.borrow_mut();
            if inner.notifying {
                inner.pending.push_back(value);
                #[cfg(feature = "tracing")]
                tracing::trace!(message = "stream.queue", pending = inner.pending.len());
                return true;
            }
            if inner.current.is_same(&value) {
                #[cfg(feature = "tracing")]
                tracing::trace!(message = "stream.suppress", version = inner.version);
                return false;
            }
            inner.current = value;
            inner.version += 1;
            inner.notifying = true;
            inner.current.clone()
        };

        let _guard = PassGuard { inner: &self.inner };
        self.run_pass(current);
        true
    }

    /// Register `callback`, calling it with the current value before
    /// returning.
    ///
    /// The returned [`Subscription`] removes the callback when dropped or
    /// when [`Subscription::unsubscribe`] is called.
    #[must_use = "dropping the Subscription unsubscribes immediately"]
    pub fn subscribe(&self, callback: impl Fn(&T) + 'static) -> Subscription {
        let active = Rc::new(Cell::new(true));
        let (entry, current, nested) = {
            let mut inner = self.inner.borrow_mut();
            let id = inner.next_id;
            inner.next_id += 1;
            let entry = Rc::new(Entry {
                id,
                active: Rc::clone(&active),
                callback: Box::new(callback),
            });
            inner.subscribers.push(Rc::clone(&entry));
            let nested = inner.notifying;
            inner.notifying = true;
            (entry, inner.current.clone(), nested)
        };

        #[cfg(feature = "tracing")]
        tracing::trace!(message = "stream.subscribe", id = entry.id, nested);

        if nested {
            (entry.callback)(&current);
        } else {
            // Values pushed by the replay itself are delivered afterwards,
            // including to this subscriber.
            let _guard = PassGuard { inner: &self.inner };
            (entry.callback)(&current);
            if let Some(next) = self.next_pending() {
                self.run_pass(next);
            }
        }

        let weak = Rc::downgrade(&self.inner);
        let stream: Weak<dyn SubscriberSet> = weak;
        Subscription {
            id: entry.id,
            active,
            stream: Some(stream),
        }
    }

    fn run_pass(&self, mut value: T) {
        loop {
            let snapshot = {
                let mut inner = self.inner.borrow_mut();
                inner.subscribers.retain(|entry| entry.active.get());
                inner.subscribers.clone()
            };

            #[cfg(feature = "tracing")]
            tracing::trace!(message = "stream.emit", subscribers = snapshot.len());

            for entry in &snapshot {
                if entry.active.get() {
                    (entry.callback)(&value);
                }
            }

            match self.next_pending() {
                Some(next) => value = next,
                None => return,
            }
        }
    }

    /// Pop queued values until one differs from the current value, making it
    /// current.
    fn next_pending(&self) -> Option<T> {
        let mut inner = self.inner.borrow_mut();
        while let Some(next) = inner.pending.pop_front() {
            if inner.current.is_same(&next) {
                continue;
            }
            inner.current = next;
            inner.version += 1;
            return Some(inner.current.clone());
        }
        None
    }
}

/// Returns the stream to idle when a pass ends, including by unwinding.
struct PassGuard<'a, T> {
    inner: &'a RefCell<StreamInner<T>>,
}

impl<T> Drop for PassGuard<'_, T> {
    fn drop(&mut self) {
        if let Ok(mut inner) = self.inner.try_borrow_mut() {
            inner.notifying = false;
            inner.pending.clear();
        }
    }
}

/// Type-erased view of a stream used by [`Subscription`].
trait SubscriberSet {
    fn remove(&self, id: u64) -> bool;
}

impl<T> SubscriberSet for RefCell<StreamInner<T>> {
    fn remove(&self, id: u64) -> bool {
        // A failed borrow leaves the inactive entry for the next pass to prune.
        let Ok(mut inner) = self.try_borrow_mut() else {
            return false;
        };
        match inner.subscribers.iter().position(|entry| entry.id == id) {
            Some(pos) => {
                inner.subscribers.remove(pos);
                true
            }
            None => false,
        }
    }
}

/// RAII guard for a [`ValueStream`] subscriber.
///
/// Dropping the guard unsubscribes. [`unsubscribe`](Self::unsubscribe) does
/// the same explicitly; calling it again is a no-op.
pub struct Subscription {
    id: u64,
    active: Rc<Cell<bool>>,
    stream: Option<Weak<dyn SubscriberSet>>,
}

impl Subscription {
    /// Subscriber id, unique within its stream.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Whether the callback is still registered.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active.get()
    }

    /// Stop delivery to this subscriber.
    ///
    /// Takes effect immediately, even in the middle of a notification pass.
    /// Returns `false` if the subscription was already released.
    pub fn unsubscribe(&mut self) -> bool {
        let Some(stream) = self.stream.take() else {
            #[cfg(feature = "tracing")]
            tracing::debug!(message = "stream.unsubscribe.repeat", id = self.id);
            return false;
        };
        self.active.set(false);
        if let Some(stream) = stream.upgrade() {
            stream.remove(self.id);
        }
        #[cfg(feature = "tracing")]
        tracing::trace!(message = "stream.unsubscribe", id = self.id);
        true
    }

    /// Release the guard without unsubscribing. The callback stays
    /// registered for the lifetime of the stream.
    pub fn detach(mut self) {
        self.stream = None;
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("active", &self.active.get())
            .finish()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if self.stream.is_some() {
            self.unsubscribe();
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
