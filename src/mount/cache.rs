//! mount::cache
//!
//! Per-generation object cache with at-most-one concurrent construction.
//!
//! # Design
//!
//! [`ObjectCache`] maps normalized paths to [`CacheItem`]s. Insertion is
//! idempotent: concurrent `get_or_create` calls for one key always yield the
//! same item. Existing keys are found under the shared read lock; a miss
//! takes the write lock and checks again before inserting.
//!
//! A cache can be *fixed*: after an eager pre-population walk the key set is
//! closed. Fixing snapshots the keys, so a lookup for an unknown key returns
//! `None` from the snapshot alone, without inserting anything or taking any
//! lock. Known keys are still found under the read lock.
//!
//! [`CacheItem`] is a single-assignment slot, not a general mutex:
//!
//! ```text
//! Vacant --claim--> Pending --fill--> Ready
//!    ^                 |
//!    +---- abandon ----+
//! ```
//!
//! Exactly one thread holds the claim on a pending item. Every other reader
//! blocks until the value is ready. A filler that gives up (the backend
//! lookup failed) returns the item to `Vacant` and wakes the waiters, one of
//! which becomes the next filler. Content is written at most once and never
//! overwritten.
//!
//! # Example
//!
//! ```
//! use gitmod::mount::cache::{Claim, ObjectCache};
//! use std::sync::Arc;
//!
//! let cache: ObjectCache<String> = ObjectCache::new();
//! let item = cache.get_or_create("/README").unwrap().unwrap();
//!
//! let value = match item.claim() {
//!     Claim::Ready(value) => value,
//!     Claim::Fill(slot) => slot.fill(Arc::new("contents".to_string())),
//! };
//! assert_eq!(value.as_str(), "contents");
//! assert_eq!(item.get().as_str(), "contents");
//! ```

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Condvar, Mutex, OnceLock, PoisonError, RwLock};

use thiserror::Error;

/// Errors from cache operations.
#[derive(Debug, Error)]
pub enum CacheError {
    /// The mapping could not grow.
    #[error("cannot grow object cache: {0}")]
    ResourceExhausted(String),
}

/// Fill state of a [`CacheItem`] whose value is not yet set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FillState {
    Vacant,
    Pending,
}

/// A single-assignment slot for one cached value.
#[derive(Debug)]
pub struct CacheItem<T> {
    value: OnceLock<Arc<T>>,
    state: Mutex<FillState>,
    ready: Condvar,
}

/// Outcome of [`CacheItem::claim`].
pub enum Claim<'a, T> {
    /// The value is already present.
    Ready(Arc<T>),
    /// The caller now owns construction of the value.
    Fill(FillSlot<'a, T>),
}

/// Exclusive right to fill a [`CacheItem`].
///
/// Dropping the slot without calling [`FillSlot::fill`] abandons the claim.
pub struct FillSlot<'a, T> {
    item: &'a CacheItem<T>,
    filled: bool,
}

impl<T> CacheItem<T> {
    /// Create an empty, unclaimed item.
    pub fn new() -> Self {
        Self {
            value: OnceLock::new(),
            state: Mutex::new(FillState::Vacant),
            ready: Condvar::new(),
        }
    }

    /// The value, if it has been set. Never blocks.
    pub fn peek(&self) -> Option<Arc<T>> {
        self.value.get().cloned()
    }

    /// Whether the value has been set.
    pub fn is_ready(&self) -> bool {
        self.value.get().is_some()
    }

    /// Store `value` if the item is still empty.
    ///
    /// Returns `true` if this call set the content. A later call is a no-op
    /// and returns `false`; content is never overwritten.
    pub fn set(&self, value: Arc<T>) -> bool {
        let stored = self.value.set(value).is_ok();
        if stored {
            let _state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            self.ready.notify_all();
        }
        stored
    }

    /// The value, blocking until it has been set.
    ///
    /// Only call this when some thread holds or will take the claim.
    pub fn get(&self) -> Arc<T> {
        if let Some(value) = self.value.get() {
            return Arc::clone(value);
        }
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        loop {
            if let Some(value) = self.value.get() {
                return Arc::clone(value);
            }
            state = self
                .ready
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Take the value, or the exclusive right to construct it.
    ///
    /// Blocks while another thread holds the claim.
    pub fn claim(&self) -> Claim<'_, T> {
        if let Some(value) = self.value.get() {
            return Claim::Ready(Arc::clone(value));
        }
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        loop {
            if let Some(value) = self.value.get() {
                return Claim::Ready(Arc::clone(value));
            }
            match *state {
                FillState::Vacant => {
                    *state = FillState::Pending;
                    return Claim::Fill(FillSlot {
                        item: self,
                        filled: false,
                    });
                }
                FillState::Pending => {
                    state = self
                        .ready
                        .wait(state)
                        .unwrap_or_else(PoisonError::into_inner);
                }
            }
        }
    }

    fn abandon(&self) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        *state = FillState::Vacant;
        self.ready.notify_all();
    }
}

impl<T> Default for CacheItem<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a, T> FillSlot<'a, T> {
    /// Publish the value and wake every waiting reader.
    pub fn fill(mut self, value: Arc<T>) -> Arc<T> {
        self.filled = true;
        self.item.set(value);
        // set() is a no-op only if the value already existed, which a held
        // claim excludes
        self.item.get()
    }
}

impl<T> Drop for FillSlot<'_, T> {
    fn drop(&mut self) {
        if !self.filled {
            self.item.abandon();
        }
    }
}

/// Thread-safe mapping from path to [`CacheItem`].
#[derive(Debug)]
pub struct ObjectCache<T> {
    items: RwLock<HashMap<String, Arc<CacheItem<T>>>>,
    /// Key set closed by [`ObjectCache::fix`].
    fixed_keys: OnceLock<HashSet<String>>,
}

impl<T> ObjectCache<T> {
    /// Create an empty, open cache.
    pub fn new() -> Self {
        Self {
            items: RwLock::new(HashMap::new()),
            fixed_keys: OnceLock::new(),
        }
    }

    /// Find the item for `key`, creating it unless the cache is fixed.
    ///
    /// Returns `Ok(None)` for a key unknown to a fixed cache; nothing is
    /// inserted in that case.
    ///
    /// # Errors
    ///
    /// [`CacheError::ResourceExhausted`] if the mapping cannot grow.
    pub fn get_or_create(&self, key: &str) -> Result<Option<Arc<CacheItem<T>>>, CacheError> {
        if let Some(keys) = self.fixed_keys.get() {
            if !keys.contains(key) {
                return Ok(None);
            }
            return Ok(self.get(key));
        }
        if let Some(item) = self.get(key) {
            return Ok(Some(item));
        }

        let mut items = self.items.write().unwrap_or_else(PoisonError::into_inner);
        // another thread may have inserted, or fixed the cache, while we
        // waited for the write lock
        if let Some(item) = items.get(key) {
            return Ok(Some(Arc::clone(item)));
        }
        if self.is_fixed() {
            return Ok(None);
        }
        items
            .try_reserve(1)
            .map_err(|e| CacheError::ResourceExhausted(e.to_string()))?;
        let item = Arc::new(CacheItem::new());
        items.insert(key.to_string(), Arc::clone(&item));
        Ok(Some(item))
    }

    /// Find the item for `key` without ever inserting.
    pub fn get(&self, key: &str) -> Option<Arc<CacheItem<T>>> {
        let items = self.items.read().unwrap_or_else(PoisonError::into_inner);
        items.get(key).cloned()
    }

    /// Number of keys.
    pub fn len(&self) -> usize {
        self.items
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether the cache has no keys.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of items whose value has been set.
    pub fn ready_count(&self) -> usize {
        self.items
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|item| item.is_ready())
            .count()
    }

    /// Close the key set for good.
    ///
    /// Later calls have no effect.
    pub fn fix(&self) {
        // the write lock keeps inserts out while the keys are copied
        let items = self.items.write().unwrap_or_else(PoisonError::into_inner);
        self.fixed_keys.get_or_init(|| items.keys().cloned().collect());
    }

    /// Whether the key set is closed.
    pub fn is_fixed(&self) -> bool {
        self.fixed_keys.get().is_some()
    }

    /// Drop every item and key. Returns how many keys were held.
    pub fn clear(&self) -> usize {
        let mut items = self.items.write().unwrap_or_else(PoisonError::into_inner);
        let count = items.len();
        items.clear();
        items.shrink_to_fit();
        count
    }
}

impl<T> Default for ObjectCache<T> {
    fn default() -> Self {
        Self::new()
    }
}
