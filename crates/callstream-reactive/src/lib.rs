#![forbid(unsafe_code)]

//! Replaying value streams for callstream.
//!
//! This crate bridges a "recompute and compare" value-production model, where
//! a candidate value is produced once per evaluation pass, to a push-based
//! subscription model:
//!
//! - [`ValueStream`]: a single-threaded stream holding a current value. New
//!   subscribers receive the current value synchronously, then every later
//!   distinct value.
//! - [`Subscription`]: RAII guard that unsubscribes on drop.
//! - [`StreamCache`]: lazily creates one stream per owner and reuses it across
//!   passes, with explicit disposal when the owner goes away.
//! - [`SharedValueStream`]: the same contract behind a mutex, for owners that
//!   live on more than one thread.
//! - [`Identity`]: the "is this logically a new value" test. Value types
//!   compare by value, `Rc`/`Arc` compare by pointer.
//!
//! # Invariants
//!
//! 1. The current value is always the most recently pushed value, or the
//!    initial value if nothing was pushed.
//! 2. Subscribing replays the current value before any later value.
//! 3. Pushing a value identical to the current one is a no-op (no version
//!    bump, no notifications).
//! 4. Every distinct pushed value reaches every subscriber exactly once, in
//!    push order, and subscribers are notified in registration order.
//! 5. Updates pushed from inside a subscriber callback are queued and
//!    delivered after the current notification pass completes.
//!
//! # Example
//!
//! ```
//! use std::cell::RefCell;
//! use std::rc::Rc;
//! use callstream_reactive::{OwnerId, StreamCache};
//!
//! let mut cache = StreamCache::new();
//! let owner = OwnerId::next();
//!
//! let seen = Rc::new(RefCell::new(Vec::new()));
//! let stream = cache.get_or_create(owner, 0);
//! let log = Rc::clone(&seen);
//! let _sub = stream.subscribe(move |v: &i32| log.borrow_mut().push(*v));
//!
//! cache.update(&owner, 5).unwrap();
//! cache.update(&owner, 5).unwrap();
//! assert_eq!(*seen.borrow(), vec![0, 5]);
//! ```

pub mod cache;
pub mod error;
pub mod identity;
pub mod shared;
pub mod stream;

pub use cache::{OwnerId, StreamCache};
pub use error::{Result, StreamError};
pub use identity::Identity;
pub use shared::{SharedSubscription, SharedValueStream};
pub use stream::{Subscription, ValueStream};
