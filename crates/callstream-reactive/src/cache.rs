#![forbid(unsafe_code)]

//! Owner-keyed stream storage.
//!
//! An owner is whatever recurring evaluation unit produces a value once per
//! pass (a view, a session, a widget). [`StreamCache`] gives each owner
//! exactly one [`ValueStream`], created lazily on first use and reused on
//! every later pass. Owners call [`StreamCache::dispose`] when they are torn
//! down; nothing is cleaned up implicitly.
//!
//! Callers that share a cache behind `Rc<RefCell<..>>` should take the
//! stream handle out with [`get_or_create`](StreamCache::get_or_create) and
//! push through [`ValueStream::update`] after releasing the borrow, so
//! subscribers are free to touch the cache.

use std::fmt;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};

use ahash::AHashMap;

use crate::error::{Result, StreamError};
use crate::identity::Identity;
use crate::stream::ValueStream;

static NEXT_OWNER_ID: AtomicU64 = AtomicU64::new(1);

/// Opaque, process-unique owner handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OwnerId(u64);

impl OwnerId {
    /// Allocate a fresh owner id.
    #[must_use]
    pub fn next() -> Self {
        Self(NEXT_OWNER_ID.fetch_add(1, Ordering::Relaxed))
    }

    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "owner#{}", self.0)
    }
}

/// One [`ValueStream`] per owner.
pub struct StreamCache<K, T> {
    streams: AHashMap<K, ValueStream<T>>,
}

impl<K, T> Default for StreamCache<K, T> {
    fn default() -> Self {
        Self {
            streams: AHashMap::new(),
        }
    }
}

impl<K: fmt::Debug, T: fmt::Debug> fmt::Debug for StreamCache<K, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.streams.iter()).finish()
    }
}

impl<K, T> StreamCache<K, T>
where
    K: Eq + Hash + fmt::Debug,
    T: Identity + Clone + 'static,
{
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The stream for `owner`, creating it seeded with `initial` on first
    /// use. Later calls return the same instance and ignore `initial`.
    pub fn get_or_create(&mut self, owner: K, initial: T) -> ValueStream<T> {
        self.streams
            .entry(owner)
            .or_insert_with_key(|_owner| {
                #[cfg(feature = "tracing")]
                tracing::debug!(message = "cache.create", owner = ?_owner);
                ValueStream::new(initial)
            })
            .clone()
    }

    /// Push `value` into the stream for `owner`.
    ///
    /// Returns whether the value was emitted (see [`ValueStream::update`]).
    ///
    /// # Errors
    ///
    /// [`StreamError::UnknownOwner`] if no stream was created for `owner`.
    pub fn update(&self, owner: &K, value: T) -> Result<bool> {
        let stream = self
            .streams
            .get(owner)
            .ok_or_else(|| StreamError::unknown_owner(owner))?;
        Ok(stream.update(value))
    }

    /// One evaluation pass: create the stream on first use, otherwise push
    /// `value` into it.
    pub fn observe(&mut self, owner: K, value: T) -> ValueStream<T> {
        if let Some(stream) = self.streams.get(&owner) {
            stream.update(value);
            return stream.clone();
        }
        self.get_or_create(owner, value)
    }

    /// The stream for `owner`, if one exists.
    #[must_use]
    pub fn get(&self, owner: &K) -> Option<ValueStream<T>> {
        self.streams.get(owner).cloned()
    }

    #[must_use]
    pub fn contains(&self, owner: &K) -> bool {
        self.streams.contains_key(owner)
    }

    /// Forget the stream for `owner`. Existing handles and subscriptions keep
    /// working; the next `get_or_create` starts a new stream.
    pub fn dispose(&mut self, owner: &K) -> bool {
        let removed = self.streams.remove(owner).is_some();
        #[cfg(feature = "tracing")]
        if removed {
            tracing::debug!(message = "cache.dispose", ?owner);
        }
        removed
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.streams.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }

    pub fn clear(&mut self) {
        self.streams.clear();
    }
}
