//! Lazily computed, engine-owned caches.
//!
//! One algorithm serves single-threaded and thread-shared engines: the locking is
//! chosen by the [`LockStrategy`] type parameter. Values are computed outside the lock,
//! so a computation may itself consult the cache for other keys. A computation that
//! asks for its own key on the same thread is reported as an error instead of
//! deadlocking or recursing forever. When two threads miss the same key at once, both
//! compute and the first stored value wins.

use std::cell::RefCell;
use std::fmt;
use std::hash::Hash;
use std::sync::Mutex;
use std::thread::{self, ThreadId};

use ahash::{AHashMap, AHashSet};
use tracing::trace;

use crate::error::Error;

/// How cache state is guarded.
pub trait LockStrategy: 'static {
    type Cell<T>;

    fn new_cell<T>(value: T) -> Self::Cell<T>;

    fn with<T, R>(cell: &Self::Cell<T>, f: impl FnOnce(&mut T) -> R) -> R;
}

/// Single-threaded caches (`RefCell`).
#[derive(Clone, Copy, Debug, Default)]
pub struct Local;

/// Caches shared between threads (`Mutex`).
#[derive(Clone, Copy, Debug, Default)]
pub struct Shared;

impl LockStrategy for Local {
    type Cell<T> = RefCell<T>;

    fn new_cell<T>(value: T) -> RefCell<T> {
        RefCell::new(value)
    }

    fn with<T, R>(cell: &RefCell<T>, f: impl FnOnce(&mut T) -> R) -> R {
        f(&mut cell.borrow_mut())
    }
}

impl LockStrategy for Shared {
    type Cell<T> = Mutex<T>;

    fn new_cell<T>(value: T) -> Mutex<T> {
        Mutex::new(value)
    }

    fn with<T, R>(cell: &Mutex<T>, f: impl FnOnce(&mut T) -> R) -> R {
        // Slots stay consistent even if a holder panicked: every update is a single insert.
        let mut guard = cell.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut guard)
    }
}

struct Slots<K, V> {
    ready: AHashMap<K, V>,
    computing: AHashSet<(K, ThreadId)>,
}

/// Map from keys to lazily computed values.
pub struct Cache<K, V, L: LockStrategy> {
    slots: L::Cell<Slots<K, V>>,
}

impl<K, V, L> Default for Cache<K, V, L>
where
    K: Eq + Hash + Clone,
    V: Clone,
    L: LockStrategy,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V, L: LockStrategy> fmt::Debug for Cache<K, V, L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cache").finish_non_exhaustive()
    }
}

impl<K, V, L> Cache<K, V, L>
where
    K: Eq + Hash + Clone,
    V: Clone,
    L: LockStrategy,
{
    pub fn new() -> Self {
        Self {
            slots: L::new_cell(Slots {
                ready: AHashMap::new(),
                computing: AHashSet::new(),
            }),
        }
    }

    pub fn get(&self, key: &K) -> Option<V> {
        L::with(&self.slots, |slots| slots.ready.get(key).cloned())
    }

    pub fn len(&self) -> usize {
        L::with(&self.slots, |slots| slots.ready.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Return the cached value for `key`, computing and storing it on a miss.
    pub fn get_or_try_insert_with<F>(&self, key: &K, compute: F) -> Result<V, Error>
    where
        F: FnOnce() -> Result<V, Error>,
    {
        let me = thread::current().id();
        let hit = L::with(&self.slots, |slots| {
            if let Some(v) = slots.ready.get(key) {
                return Ok(Some(v.clone()));
            }
            if !slots.computing.insert((key.clone(), me)) {
                return Err(Error::configuration(
                    "re-entrant computation of a cached entry on the same thread",
                ));
            }
            Ok(None)
        })?;
        if let Some(v) = hit {
            return Ok(v);
        }

        trace!("cache miss, computing entry");
        let claim = Claim::<K, V, L> {
            slots: &self.slots,
            claim: (key.clone(), me),
        };
        let computed = compute();
        drop(claim);
        let v = computed?;
        L::with(&self.slots, |slots| {
            Ok(slots.ready.entry(key.clone()).or_insert(v).clone())
        })
    }
}

/// The computing mark of one key on one thread. Dropping it, also while unwinding
/// from a panicking computation, clears the mark.
struct Claim<'c, K: Eq + Hash, V, L: LockStrategy> {
    slots: &'c L::Cell<Slots<K, V>>,
    claim: (K, ThreadId),
}

impl<K: Eq + Hash, V, L: LockStrategy> Drop for Claim<'_, K, V, L> {
    fn drop(&mut self) {
        L::with(self.slots, |slots| slots.computing.remove(&self.claim));
    }
}
