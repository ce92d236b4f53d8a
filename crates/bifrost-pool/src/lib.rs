//! Object-pooling fabric for the hot per-request objects: request envelopes,
//! reply channels, response shells. An optimization, not a correctness
//! mechanism: losing a pooled item just means the next `get()` falls
//! back to a fresh allocation.

use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use crossbeam_queue::ArrayQueue;

/// Implemented by anything kept in a [`Pool`]. `reset` is the caller's last
/// chance to scrub secret fields before an item goes back on the free list;
/// the pool never inspects contents itself.
pub trait Poolable: Send + 'static {
    fn reset(&mut self);
}

/// A lock-free bounded cache of pre-built `T`s.
///
/// `initial_size` is how many items are pre-warmed at construction, not a
/// hard ceiling: `soft_cap` bounds how many idle items the free list will
/// hold, and `get` always succeeds (via fresh allocation) even when the free
/// list is empty.
pub struct Pool<T: Poolable> {
    free: ArrayQueue<T>,
    factory: fn() -> T,
}

impl<T: Poolable> Pool<T> {
    pub fn new(initial_size: usize, soft_cap: usize, factory: fn() -> T) -> Arc<Self> {
        let capacity = soft_cap.max(initial_size).max(1);
        let free = ArrayQueue::new(capacity);
        for _ in 0..initial_size.min(capacity) {
            // capacity >= initial_size by construction, push cannot fail.
            let _ = free.push(factory());
        }
        Arc::new(Self { free, factory })
    }

    /// Non-blocking; returns a zeroed item, either reclaimed from the free
    /// list or freshly allocated.
    pub fn get(self: &Arc<Self>) -> Pooled<T> {
        let item = self.free.pop().unwrap_or_else(|| (self.factory)());
        Pooled {
            pool: Arc::clone(self),
            item: Some(item),
        }
    }

    fn put(&self, mut item: T) {
        item.reset();
        // Overflow beyond soft_cap is dropped; the pool is a cache.
        let _ = self.free.push(item);
    }

    pub fn len(&self) -> usize {
        self.free.len()
    }

    pub fn is_empty(&self) -> bool {
        self.free.is_empty()
    }
}

/// RAII handle returned by [`Pool::get`]. Returns its item to the pool
/// exactly once, on drop, satisfying "Put is called exactly once per Get."
pub struct Pooled<T: Poolable> {
    pool: Arc<Pool<T>>,
    item: Option<T>,
}

impl<T: Poolable> Deref for Pooled<T> {
    type Target = T;

    fn deref(&self) -> &T {
        self.item.as_ref().expect("item taken before drop")
    }
}

impl<T: Poolable> DerefMut for Pooled<T> {
    fn deref_mut(&mut self) -> &mut T {
        self.item.as_mut().expect("item taken before drop")
    }
}

impl<T: Poolable> Drop for Pooled<T> {
    fn drop(&mut self) {
        if let Some(item) = self.item.take() {
            self.pool.put(item);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Scratch {
        value: u32,
        secret: Option<String>,
    }

    impl Poolable for Scratch {
        fn reset(&mut self) {
            self.value = 0;
            self.secret = None;
        }
    }

    #[test]
    fn get_reuses_returned_items() {
        let pool = Pool::new(1, 4, Scratch::default);
        assert_eq!(pool.len(), 1);
        {
            let mut item = pool.get();
            assert_eq!(pool.len(), 0);
            item.value = 7;
            item.secret = Some("shh".into());
        }
        assert_eq!(pool.len(), 1);
        let reused = pool.get();
        assert_eq!(reused.value, 0);
        assert!(reused.secret.is_none());
    }

    #[test]
    fn get_never_blocks_when_empty() {
        let pool = Pool::new(0, 1, Scratch::default);
        let first = pool.get();
        let second = pool.get();
        assert_eq!(first.value, 0);
        assert_eq!(second.value, 0);
    }

    #[test]
    fn overflow_past_soft_cap_is_dropped_not_error() {
        let pool = Pool::new(0, 1, Scratch::default);
        let a = pool.get();
        let b = pool.get();
        drop(a);
        drop(b);
        assert_eq!(pool.len(), 1);
    }
}
