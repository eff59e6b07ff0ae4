#![forbid(unsafe_code)]

//! Thread-safe replaying value stream.
//!
//! [`SharedValueStream<T>`] has the same contract as
//! [`ValueStream`](crate::ValueStream) but may be pushed to and subscribed
//! from any thread. The current value and the subscriber list sit behind a
//! `Mutex`; callbacks never run while it is held.
//!
//! # Delivery
//!
//! At most one thread delivers at a time (the dispatcher). `update` always
//! enqueues; a caller that finds the stream idle becomes the dispatcher and
//! drains the queue before returning. A caller that finds another thread
//! dispatching returns right away and its value is delivered by that thread,
//! so every subscriber observes values in the global push order.
//!
//! `subscribe` from a thread that is not dispatching waits until the stream
//! is idle, so the replay always precedes any later value. From inside a
//! callback on the dispatching thread it replays immediately.
//!
//! # Failure Modes
//!
//! - **Callback panics**: dispatcher ownership is released during unwind and
//!   queued values are dropped. A poisoned lock is recovered, not propagated.
//! - **Callback blocks on another thread that subscribes to the same
//!   stream**: deadlock. Callbacks should not wait on other stream users.

use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError, Weak};
use std::thread::{self, ThreadId};

use crate::identity::Identity;

type SharedCallback<T> = Box<dyn Fn(&T) + Send + Sync>;

struct SharedEntry<T> {
    id: u64,
    active: Arc<AtomicBool>,
    callback: SharedCallback<T>,
}

struct SharedState<T> {
    current: T,
    version: u64,
    subscribers: Vec<Arc<SharedEntry<T>>>,
    next_id: u64,
    pending: VecDeque<T>,
    dispatcher: Option<ThreadId>,
}

struct SharedInner<T> {
    state: Mutex<SharedState<T>>,
    idle: Condvar,
}

impl<T> SharedInner<T> {
    fn lock(&self) -> MutexGuard<'_, SharedState<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A [`ValueStream`](crate::ValueStream) that is `Send + Sync`.
pub struct SharedValueStream<T> {
    inner: Arc<SharedInner<T>>,
}

impl<T> Clone for SharedValueStream<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for SharedValueStream<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.lock();
        f.debug_struct("SharedValueStream")
            .field("current", &state.current)
            .field("version", &state.version)
            .field("subscribers", &state.subscribers.len())
            .field("pending", &state.pending.len())
            .finish()
    }
}

impl<T> SharedValueStream<T> {
    #[must_use]
    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        Arc::ptr_eq(&a.inner, &b.inner)
    }

    #[must_use]
    pub fn version(&self) -> u64 {
        self.inner.lock().version
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.inner
            .lock()
            .subscribers
            .iter()
            .filter(|entry| entry.active.load(Ordering::Acquire))
            .count()
    }
}

impl<T: Identity + Clone + Send + 'static> SharedValueStream<T> {
    #[must_use]
    pub fn new(initial: T) -> Self {
        Self {
            inner: Arc::new(SharedInner {
                state: Mutex::new(SharedState {
                    current: initial,
                    version: 0,
                    subscribers: Vec::new(),
                    next_id: 0,
                    pending: VecDeque::new(),
                    dispatcher: None,
                }),
                idle: Condvar::new(),
            }),
        }
    }

    /// Clone of the current value.
    #[must_use]
    pub fn get(&self) -> T {
        self.inner.lock().current.clone()
    }

    /// Push a candidate value.
    ///
    /// Returns `false` only when the stream was idle and `value` was the
    /// same as the current value. While another pass is running the value
    /// is queued, `true` is returned, and the identity check happens when
    /// the value is dequeued.
    pub fn update(&self, value: T) -> bool {
        let current = {
            let mut state = self.inner.lock();
            if state.dispatcher.is_some() {
                state.pending.push_back(value);
                return true;
            }
            if state.current.is_same(&value) {
                return false;
            }
            state.current = value;
            state.version += 1;
            state.dispatcher = Some(thread::current().id());
            state.current.clone()
        };

        let _guard = DispatchGuard { inner: &self.inner };
        self.run_pass(current);
        true
    }

    /// Register `callback`, calling it with the current value before
    /// returning.
    #[must_use = "dropping the SharedSubscription unsubscribes immediately"]
    pub fn subscribe(&self, callback: impl Fn(&T) + Send + Sync + 'static) -> SharedSubscription {
        let me = thread::current().id();
        let active = Arc::new(AtomicBool::new(true));

        let (entry, current, nested) = {
            let mut state = self.inner.lock();
            while let Some(owner) = state.dispatcher {
                if owner == me {
                    break;
                }
                state = self
                    .inner
                    .idle
                    .wait(state)
                    .unwrap_or_else(PoisonError::into_inner);
            }
            let id = state.next_id;
            state.next_id += 1;
            let entry = Arc::new(SharedEntry {
                id,
                active: Arc::clone(&active),
                callback: Box::new(callback),
            });
            state.subscribers.push(Arc::clone(&entry));
            let nested = state.dispatcher.is_some();
            state.dispatcher = Some(me);
            (entry, state.current.clone(), nested)
        };

        if nested {
            (entry.callback)(&current);
        } else {
            let _guard = DispatchGuard { inner: &self.inner };
            (entry.callback)(&current);
            if let Some(next) = self.next_pending() {
                self.run_pass(next);
            }
        }

        let weak = Arc::downgrade(&self.inner);
        let stream: Weak<dyn SharedSubscriberSet> = weak;
        SharedSubscription {
            id: entry.id,
            active,
            stream: Some(stream),
        }
    }

    fn run_pass(&self, mut value: T) {
        loop {
            let snapshot = {
                let mut state = self.inner.lock();
                state
                    .subscribers
                    .retain(|entry| entry.active.load(Ordering::Acquire));
                state.subscribers.clone()
            };

            for entry in &snapshot {
                if entry.active.load(Ordering::Acquire) {
                    (entry.callback)(&value);
                }
            }

            match self.next_pending() {
                Some(next) => value = next,
                None => return,
            }
        }
    }

    /// Dequeue the next distinct value, or give up dispatcher ownership when
    /// the queue is empty. Both happen under one lock so no pushed value can
    /// be stranded.
    fn next_pending(&self) -> Option<T> {
        let mut state = self.inner.lock();
        while let Some(next) = state.pending.pop_front() {
            if state.current.is_same(&next) {
                continue;
            }
            state.current = next;
            state.version += 1;
            return Some(state.current.clone());
        }
        state.dispatcher = None;
        drop(state);
        self.inner.idle.notify_all();
        None
    }
}

/// Releases dispatcher ownership if a callback unwinds.
struct DispatchGuard<'a, T> {
    inner: &'a SharedInner<T>,
}

impl<T> Drop for DispatchGuard<'_, T> {
    fn drop(&mut self) {
        if thread::panicking() {
            let mut state = self.inner.lock();
            state.dispatcher = None;
            state.pending.clear();
            drop(state);
            self.inner.idle.notify_all();
        }
    }
}

trait SharedSubscriberSet: Send + Sync {
    fn remove(&self, id: u64) -> bool;
}

impl<T: Send> SharedSubscriberSet for SharedInner<T> {
    fn remove(&self, id: u64) -> bool {
        let mut state = self.lock();
        match state.subscribers.iter().position(|entry| entry.id == id) {
            Some(pos) => {
                state.subscribers.remove(pos);
                true
            }
            None => false,
        }
    }
}

/// RAII guard for a [`SharedValueStream`] subscriber.
pub struct SharedSubscription {
    id: u64,
    active: Arc<AtomicBool>,
    stream: Option<Weak<dyn SharedSubscriberSet>>,
}

impl SharedSubscription {
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Stop delivery to this subscriber. Returns `false` if already released.
    pub fn unsubscribe(&mut self) -> bool {
        let Some(stream) = self.stream.take() else {
            #[cfg(feature = "tracing")]
            tracing::debug!(message = "shared_stream.unsubscribe.repeat", id = self.id);
            return false;
        };
        self.active.store(false, Ordering::Release);
        if let Some(stream) = stream.upgrade() {
            stream.remove(self.id);
        }
        true
    }

    /// Release the guard without unsubscribing.
    pub fn detach(mut self) {
        self.stream = None;
    }
}

impl fmt::Debug for SharedSubscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedSubscription")
            .field("id", &self.id)
            .field("active", &self.is_active())
            .finish()
    }
}

impl Drop for SharedSubscription {
    fn drop(&mut self) {
        if self.stream.is_some() {
            self.unsubscribe();
        }
    }
}
