/*
This Source Code Form is subject to the terms of the Mozilla Public License, v. 2.0.
If a copy of the MPL was not distributed with this file,
You can obtain one at https://mozilla.org/MPL/2.0/.
*/
//! An abstraction over whatever thread-safe shared pointer type (i.e. Arc<T>-like)
//! the library has decided to use.
//!
//! Used for data that is shared read-only between many graphs: the class hierarchy
//! directory and the asset templates that runtime instances are duplicated from.

use std::sync::Arc;

type ThreadSafeRefValue<T> = Arc<T>;

/// A cheaply clonable, immutable, shared handle.
///
/// The backing pointer type is an implementation detail. Equality is by value
/// (like `Arc`); use `ThreadSafeRef::ptr_eq()` to compare identities.
#[derive(Debug, Default)]
pub struct ThreadSafeRef<T: ?Sized> {
    wrapped: ThreadSafeRefValue<T>
}

impl<T> ThreadSafeRef<T> {
    #[inline]
    pub fn new(val: T) -> Self {
        Self { wrapped: Arc::new(val) }
    }
}

impl<T: ?Sized> ThreadSafeRef<T> {
    /// True if both handles point at the very same allocation.
    #[inline]
    pub fn ptr_eq(this: &Self, other: &Self) -> bool {
        Arc::ptr_eq(&this.wrapped, &other.wrapped)
    }
}

impl<T: ?Sized> Clone for ThreadSafeRef<T> {
    fn clone(&self) -> Self {
        Self { wrapped: self.wrapped.clone() }
    }
}

impl<T: ?Sized> From<Arc<T>> for ThreadSafeRef<T> {
    fn from(value: Arc<T>) -> Self {
        Self { wrapped: value }
    }
}

impl<T: ?Sized> core::ops::Deref for ThreadSafeRef<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.wrapped
    }
}

impl<T: PartialEq + ?Sized> PartialEq for ThreadSafeRef<T> {
    fn eq(&self, other: &Self) -> bool {
        self.wrapped == other.wrapped
    }
}
