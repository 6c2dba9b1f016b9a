//! Default-constructor invoker cache.
//!
//! Creating instances through reflection is dominated by finding and binding the
//! parameterless constructor. [`ConstructionCache`] remembers the bound invokers of the
//! last [`CONSTRUCTION_CACHE_SIZE`] types in a ring that is read without locking. New
//! entries overwrite the slot under the rotating cursor (FIFO, not LRU).

use std::sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering},
    Arc, OnceLock,
};

use arc_swap::ArcSwapOption;
use log::trace;

use crate::{
    metadata::{
        reflection::provider::{ConstructorInvoker, Instance, MetadataProvider},
        token::Token,
        typesystem::TypeHandle,
    },
    Result,
};

/// Number of slots of the construction ring
pub const CONSTRUCTION_CACHE_SIZE: usize = 16;

/// A type together with its lazily bound default constructor
pub struct ConstructionEntry {
    ty: TypeHandle,
    constructor: Option<Token>,
    needs_access_check: bool,
    invoker: OnceLock<ConstructorInvoker>,
    initialized: AtomicBool,
}

impl ConstructionEntry {
    /// Create an entry; `constructor` is `None` for value types without one
    #[must_use]
    pub fn new(ty: TypeHandle, constructor: Option<Token>, needs_access_check: bool) -> Self {
        ConstructionEntry {
            ty,
            constructor,
            needs_access_check,
            invoker: OnceLock::new(),
            initialized: AtomicBool::new(false),
        }
    }

    /// The constructed type
    #[must_use]
    pub fn ty(&self) -> TypeHandle {
        self.ty
    }

    /// The constructor token
    #[must_use]
    pub fn constructor(&self) -> Option<Token> {
        self.constructor
    }

    /// Returns `true` if the constructor is not public
    #[must_use]
    pub fn needs_access_check(&self) -> bool {
        self.needs_access_check
    }

    /// Returns `true` once the invoker is bound
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    /// The bound invoker, binding it through `provider` on first use.
    ///
    /// Concurrent first calls may each bind an invoker; only one is kept and every
    /// caller gets that one.
    ///
    /// # Errors
    ///
    /// Propagates binding errors of the provider.
    pub fn initialize(&self, provider: &dyn MetadataProvider) -> Result<ConstructorInvoker> {
        if let Some(invoker) = self.invoker.get() {
            return Ok(invoker.clone());
        }
        let bound = provider.bind_constructor(self.ty, self.constructor)?;
        let invoker = self.invoker.get_or_init(|| bound).clone();
        self.initialized.store(true, Ordering::Release);
        Ok(invoker)
    }

    /// Create an instance
    ///
    /// # Errors
    ///
    /// Propagates binding and constructor errors.
    pub fn invoke(&self, provider: &dyn MetadataProvider) -> Result<Instance> {
        let invoker = self.initialize(provider)?;
        invoker()
    }
}

/// Fixed-size ring of construction entries
pub struct ConstructionCache {
    slots: [ArcSwapOption<ConstructionEntry>; CONSTRUCTION_CACHE_SIZE],
    cursor: AtomicUsize,
}

impl Default for ConstructionCache {
    fn default() -> Self {
        Self::new()
    }
}

impl ConstructionCache {
    /// Create an empty ring
    #[must_use]
    pub fn new() -> Self {
        ConstructionCache {
            slots: std::array::from_fn(|_| ArcSwapOption::empty()),
            cursor: AtomicUsize::new(0),
        }
    }

    /// Look up the entry of `ty`, starting with the most recent insertion
    pub fn get(&self, ty: TypeHandle) -> Option<Arc<ConstructionEntry>> {
        let start = self.cursor.load(Ordering::Acquire);
        for offset in 1..=CONSTRUCTION_CACHE_SIZE {
            let index = (start + offset) % CONSTRUCTION_CACHE_SIZE;
            if let Some(entry) = self.slots[index].load_full() {
                if entry.ty == ty {
                    trace!("Construction cache hit for {} in slot {}", ty, index);
                    return Some(entry);
                }
            }
        }
        None
    }

    /// Store `entry` in the slot under the cursor and move the cursor backwards
    pub fn insert(&self, entry: Arc<ConstructionEntry>) -> Arc<ConstructionEntry> {
        let index = match self.cursor.fetch_update(Ordering::AcqRel, Ordering::Acquire, |c| {
            Some((c + CONSTRUCTION_CACHE_SIZE - 1) % CONSTRUCTION_CACHE_SIZE)
        }) {
            Ok(previous) | Err(previous) => previous,
        };
        trace!("Construction cache insert of {} into slot {}", entry.ty, index);
        self.slots[index].store(Some(entry.clone()));
        entry
    }

    /// The entry of `ty`, created through `create` and inserted on a miss
    ///
    /// # Errors
    ///
    /// Propagates errors of `create`.
    pub fn get_or_init<F>(&self, ty: TypeHandle, create: F) -> Result<Arc<ConstructionEntry>>
    where
        F: FnOnce() -> Result<ConstructionEntry>,
    {
        if let Some(entry) = self.get(ty) {
            return Ok(entry);
        }
        Ok(self.insert(Arc::new(create()?)))
    }

    /// Remove every entry of `ty`
    pub fn evict(&self, ty: TypeHandle) {
        for slot in &self.slots {
            let matches = slot.load().as_ref().is_some_and(|entry| entry.ty == ty);
            if matches {
                slot.store(None);
            }
        }
    }

    /// Number of occupied slots
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.load().is_some()).count()
    }

    /// Returns `true` if no slot is occupied
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ty(row: u32) -> TypeHandle {
        TypeHandle::new(Token::from_parts(Token::TYPE_DEF, row))
    }

    #[test]
    fn test_fifo_eviction() {
        let cache = ConstructionCache::new();
        for row in 1..=CONSTRUCTION_CACHE_SIZE as u32 {
            cache.insert(Arc::new(ConstructionEntry::new(ty(row), None, false)));
        }
        assert_eq!(cache.len(), CONSTRUCTION_CACHE_SIZE);
        assert!(cache.get(ty(1)).is_some());

        // Looking an entry up does not protect it from eviction
        cache.insert(Arc::new(ConstructionEntry::new(ty(100), None, false)));
        assert!(cache.get(ty(1)).is_none());
        assert!(cache.get(ty(2)).is_some());
        assert!(cache.get(ty(100)).is_some());
        assert_eq!(cache.len(), CONSTRUCTION_CACHE_SIZE);
    }

    #[test]
    fn test_get_or_init_and_evict() {
        let cache = ConstructionCache::new();
        let first = cache
            .get_or_init(ty(1), || Ok(ConstructionEntry::new(ty(1), None, true)))
            .unwrap();
        let second = cache
            .get_or_init(ty(1), || panic!("entry is cached"))
            .unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert!(second.needs_access_check());

        cache.evict(ty(1));
        assert!(cache.get(ty(1)).is_none());
        assert!(cache.is_empty());
    }
}
