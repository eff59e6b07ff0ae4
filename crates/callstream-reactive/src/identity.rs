#![forbid(unsafe_code)]

//! The "is this logically a new value" test used to suppress re-emission.
//!
//! Streams never compare contents deeply. Plain values (numbers, `bool`,
//! `char`, strings, unit) compare by value. Shared handles (`Rc`, `Arc`)
//! compare by pointer, so two structurally equal but distinct allocations are
//! treated as a change and a clone of the same handle is not.
//!
//! Owned collections such as `Vec` deliberately have no impl: wrap them in
//! `Rc`/`Arc` to give them identity.

use std::rc::Rc;
use std::sync::Arc;

/// Identity comparison for values pushed through a stream.
pub trait Identity {
    /// Whether `other` is the same logical value as `self`.
    fn is_same(&self, other: &Self) -> bool;
}

/// Implement [`Identity`] with `PartialEq` semantics for value-like types.
///
/// ```
/// use callstream_reactive::{value_identity, Identity};
///
/// #[derive(Debug, Clone, PartialEq)]
/// enum Phase {
///     Idle,
///     Busy(u8),
/// }
/// value_identity!(Phase);
///
/// assert!(Phase::Busy(1).is_same(&Phase::Busy(1)));
/// assert!(!Phase::Idle.is_same(&Phase::Busy(0)));
/// ```
#[macro_export]
macro_rules! value_identity {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl $crate::Identity for $ty {
                #[inline]
                fn is_same(&self, other: &Self) -> bool {
                    self == other
                }
            }
        )+
    };
}

value_identity!(
    (),
    bool,
    char,
    u8,
    u16,
    u32,
    u64,
    u128,
    usize,
    i8,
    i16,
    i32,
    i64,
    i128,
    isize,
    String,
);

// NaN is never the same as itself, so pushing NaN twice emits twice.
value_identity!(f32, f64);

impl Identity for &str {
    #[inline]
    fn is_same(&self, other: &Self) -> bool {
        self == other
    }
}

impl<T: ?Sized> Identity for Rc<T> {
    #[inline]
    fn is_same(&self, other: &Self) -> bool {
        Rc::ptr_eq(self, other)
    }
}

impl<T: ?Sized> Identity for Arc<T> {
    #[inline]
    fn is_same(&self, other: &Self) -> bool {
        Arc::ptr_eq(self, other)
    }
}

impl<T: Identity> Identity for Option<T> {
    fn is_same(&self, other: &Self) -> bool {
        match (self, other) {
            (None, None) => true,
            (Some(a), Some(b)) => a.is_same(b),
            _ => false,
        }
    }
}

macro_rules! tuple_identity {
    ($($name:ident $idx:tt),+) => {
        impl<$($name: Identity),+> Identity for ($($name,)+) {
            fn is_same(&self, other: &Self) -> bool {
                $(self.$idx.is_same(&other.$idx))&&+
            }
        }
    };
}

tuple_identity!(A 0, B 1);
tuple_identity!(A 0, B 1, C 2);
tuple_identity!(A 0, B 1, C 2, D 3);
