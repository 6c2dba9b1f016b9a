//! An append-only hash table with lock-free reads.
//!
//! [`AppendSafeTable`] backs the name indices of every member kind cache and the
//! per-definition instantiation tables. Entries are never removed or replaced: the first
//! value stored for a key stays the value for that key for the lifetime of the table.
//!
//! # Layout
//!
//! Open addressing with linear probing over a prime number of buckets. The published
//! bucket array never changes its size. A write that would push the load factor over 50%
//! builds a complete new bucket array, re-inserts every entry and publishes the new array
//! with a single atomic swap, so readers observe either the old or the new array and
//! never one that is half rebuilt.
//!
//! Inside one bucket the value is written before the key. Readers probe by key and stop
//! at the first empty key; a key they can see always comes with its value.
//!
//! # Thread Safety
//!
//! Readers never lock. Writers serialize on a mutex that only guards the entry count and
//! the rebuild.
//!
//! # Example
//!
//! ```rust
//! use memberscope::utils::AppendSafeTable;
//!
//! let table: AppendSafeTable<String, u32> = AppendSafeTable::new();
//! assert_eq!(table.get_or_insert("answer".to_string(), 42)?, 42);
//! assert_eq!(table.get_or_insert("answer".to_string(), 7)?, 42);
//! assert_eq!(table.get("answer"), Some(42));
//! # Ok::<(), memberscope::Error>(())
//! ```

use std::{
    borrow::Borrow,
    collections::hash_map::RandomState,
    hash::{BuildHasher, Hash},
    sync::{Mutex, OnceLock},
};

use arc_swap::ArcSwap;
use std::sync::Arc;

use crate::Result;

/// Bucket count of a table created without a capacity hint
const DEFAULT_BUCKETS: usize = 7;

/// One bucket; `key` is published after `value`
struct Slot<K, V> {
    key: OnceLock<K>,
    value: OnceLock<V>,
}

impl<K, V> Slot<K, V> {
    fn empty() -> Self {
        Slot {
            key: OnceLock::new(),
            value: OnceLock::new(),
        }
    }
}

/// A published, fixed-size bucket array
struct Buckets<K, V> {
    slots: Box<[Slot<K, V>]>,
}

impl<K, V> Buckets<K, V> {
    fn with_len(len: usize) -> Self {
        Buckets {
            slots: (0..len).map(|_| Slot::empty()).collect(),
        }
    }

    fn len(&self) -> usize {
        self.slots.len()
    }
}

/// Append-only open-addressing hash table with lock-free reads and atomic growth.
pub struct AppendSafeTable<K, V, S = RandomState> {
    buckets: ArcSwap<Buckets<K, V>>,
    /// Number of stored entries, held by the writer for the whole insert
    writer: Mutex<usize>,
    hasher: S,
}

impl<K, V> AppendSafeTable<K, V, RandomState>
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    /// Create an empty table
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_BUCKETS)
    }

    /// Create an empty table that holds `capacity` entries before it grows
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_capacity_and_hasher(capacity, RandomState::new())
    }
}

impl<K, V> Default for AppendSafeTable<K, V, RandomState>
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V, S> AppendSafeTable<K, V, S>
where
    K: Hash + Eq + Clone,
    V: Clone,
    S: BuildHasher,
{
    /// Create an empty table with an explicit hasher
    pub fn with_capacity_and_hasher(capacity: usize, hasher: S) -> Self {
        let buckets = next_prime(capacity.saturating_mul(2).max(DEFAULT_BUCKETS));
        AppendSafeTable {
            buckets: ArcSwap::from_pointee(Buckets::with_len(buckets)),
            writer: Mutex::new(0),
            hasher,
        }
    }

    /// Look up the value stored for `key`
    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let buckets = self.buckets.load();
        Self::probe(&buckets, self.start(key, buckets.len()), key)
    }

    /// Returns `true` if a value is stored for `key`
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.get(key).is_some()
    }

    /// Store `value` for `key` unless a value is already present.
    ///
    /// Returns the value that is stored for `key` after the call: either the one passed in
    /// or the one a previous writer stored.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::LockError`] if a writer panicked while holding the write lock.
    pub fn get_or_insert(&self, key: K, value: V) -> Result<V> {
        self.get_or_insert_with(key, || value)
    }

    /// Store the value produced by `init` for `key` unless a value is already present.
    ///
    /// `init` runs under the write lock and only if no value is present for `key`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::LockError`] if a writer panicked while holding the write lock.
    pub fn get_or_insert_with<F>(&self, key: K, init: F) -> Result<V>
    where
        F: FnOnce() -> V,
    {
        if let Some(existing) = self.get(&key) {
            return Ok(existing);
        }

        let mut count = lock!(self.writer);
        if let Some(existing) = self.get(&key) {
            return Ok(existing);
        }

        let value = init();
        if (*count + 1) * 2 > self.buckets.load().len() {
            self.grow(*count + 1);
        }

        let buckets = self.buckets.load();
        let len = buckets.len();
        let mut index = self.start(&key, len);
        for _ in 0..len {
            let slot = &buckets.slots[index];
            if slot.key.get().is_none() {
                let _ = slot.value.set(value.clone());
                let _ = slot.key.set(key);
                *count += 1;
                return Ok(value);
            }
            index = (index + 1) % len;
        }

        // The load bound keeps at least half of the buckets empty
        Err(crate::Error::CacheInvariant(
            "append table has no empty bucket".to_string(),
        ))
    }

    /// Number of stored entries
    pub fn len(&self) -> usize {
        match self.writer.lock() {
            Ok(count) => *count,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    /// Returns `true` if no entry is stored
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of buckets of the currently published array
    pub fn capacity(&self) -> usize {
        self.buckets.load().len()
    }

    /// Snapshot of all stored entries
    pub fn entries(&self) -> Vec<(K, V)> {
        let buckets = self.buckets.load();
        buckets
            .slots
            .iter()
            .filter_map(|slot| {
                let key = slot.key.get()?;
                let value = slot.value.get()?;
                Some((key.clone(), value.clone()))
            })
            .collect()
    }

    fn start<Q: Hash + ?Sized>(&self, key: &Q, len: usize) -> usize {
        (self.hasher.hash_one(key) % len as u64) as usize
    }

    fn probe<Q>(buckets: &Buckets<K, V>, mut index: usize, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let len = buckets.len();
        for _ in 0..len {
            let slot = &buckets.slots[index];
            match slot.key.get() {
                None => return None,
                Some(stored) if stored.borrow() == key => return slot.value.get().cloned(),
                Some(_) => index = (index + 1) % len,
            }
        }
        None
    }

    /// Rebuild into a larger bucket array and publish it; caller holds the write lock
    fn grow(&self, required: usize) {
        let old = self.buckets.load_full();
        let len = next_prime(required.saturating_mul(2).max(old.len()).saturating_mul(2));
        let rebuilt = Buckets::with_len(len);

        for slot in old.slots.iter() {
            let (Some(key), Some(value)) = (slot.key.get(), slot.value.get()) else {
                continue;
            };
            let mut index = self.start(key, len);
            while rebuilt.slots[index].key.get().is_some() {
                index = (index + 1) % len;
            }
            let _ = rebuilt.slots[index].value.set(value.clone());
            let _ = rebuilt.slots[index].key.set(key.clone());
        }

        self.buckets.store(Arc::new(rebuilt));
    }
}

/// Returns the smallest prime that is greater or equal to `n`
#[must_use]
pub fn next_prime(n: usize) -> usize {
    let mut candidate = n.max(2);
    while !is_prime(candidate) {
        candidate += 1;
    }
    candidate
}

fn is_prime(n: usize) -> bool {
    if n < 4 {
        return n >= 2;
    }
    if n % 2 == 0 {
        return false;
    }
    let mut divisor = 3;
    while divisor * divisor <= n {
        if n % divisor == 0 {
            return false;
        }
        divisor += 2;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_next_prime() {
        assert_eq!(next_prime(0), 2);
        assert_eq!(next_prime(7), 7);
        assert_eq!(next_prime(8), 11);
        assert_eq!(next_prime(24), 29);
    }

    #[test]
    fn test_first_writer_wins() {
        let table: AppendSafeTable<Box<str>, u32> = AppendSafeTable::new();
        assert!(table.is_empty());
        assert_eq!(table.get_or_insert("a".into(), 1).unwrap(), 1);
        assert_eq!(table.get_or_insert("a".into(), 2).unwrap(), 1);
        assert_eq!(table.get_or_insert_with("a".into(), || panic!("not called")).unwrap(), 1);
        assert_eq!(table.get("a"), Some(1));
        assert_eq!(table.get("b"), None);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_growth_keeps_entries() {
        let table: AppendSafeTable<u32, u32> = AppendSafeTable::with_capacity(1);
        let initial = table.capacity();
        for i in 0..500 {
            table.get_or_insert(i, i * 10).unwrap();
            assert!(table.len() * 2 <= table.capacity());
        }
        assert!(table.capacity() > initial);
        assert!(is_prime(table.capacity()));
        for i in 0..500 {
            assert_eq!(table.get(&i), Some(i * 10));
        }
        assert_eq!(table.entries().len(), 500);
        assert_eq!(table.len(), 500);
        table.get_or_insert(7, 0).unwrap();
        assert_eq!(table.len(), 500);
    }

    #[test]
    fn test_concurrent_readers_and_writers() {
        let table: Arc<AppendSafeTable<u32, Arc<u32>>> = Arc::new(AppendSafeTable::new());

        let handles: Vec<_> = (0..8)
            .map(|t| {
                let table = table.clone();
                thread::spawn(move || {
                    let mut seen = Vec::new();
                    for i in 0..200 {
                        let value = table.get_or_insert(i, Arc::new(i + t * 1000)).unwrap();
                        seen.push((i, value));
                    }
                    seen
                })
            })
            .collect();

        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        for (i, stored) in &results[0] {
            for other in &results[1..] {
                assert!(Arc::ptr_eq(stored, &other[*i as usize].1));
            }
            assert!(Arc::ptr_eq(stored, &table.get(i).unwrap()));
        }
    }
}
