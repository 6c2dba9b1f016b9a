//! A bit set over virtual dispatch slot indices.
//!
//! Method and property population walks a type hierarchy from the most derived type to
//! its bases. Every virtual member seen marks its slot; a base member whose slot is
//! already marked has been overridden and is skipped.
//!
//! # Example
//!
//! ```rust
//! use memberscope::utils::SlotSet;
//!
//! let mut slots = SlotSet::new(10);
//! assert!(slots.mark(3));
//! assert!(!slots.mark(3));
//! assert!(slots.contains(3));
//! assert!(!slots.contains(42));
//! ```

/// A fixed-capacity bit set keyed by virtual slot index.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct SlotSet {
    /// The bits, stored as a vector of words.
    words: Vec<u64>,
    /// The number of slots covered by the set.
    len: usize,
}

impl SlotSet {
    /// Creates a new empty slot set covering `capacity` slots.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let num_words = capacity.div_ceil(64);
        Self {
            words: vec![0; num_words],
            len: capacity,
        }
    }

    /// Returns the number of slots covered by this set.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if no slot is marked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|&w| w == 0)
    }

    /// Returns `true` if `index` lies inside the covered range.
    #[must_use]
    pub const fn covers(&self, index: usize) -> bool {
        index < self.len
    }

    /// Marks the slot at `index`.
    ///
    /// Returns `true` if the slot was not marked before. Slots outside the covered range
    /// are never marked and return `false`.
    pub fn mark(&mut self, index: usize) -> bool {
        if index >= self.len {
            return false;
        }
        let word = index / 64;
        let bit = 1u64 << (index % 64);
        let fresh = self.words[word] & bit == 0;
        self.words[word] |= bit;
        fresh
    }

    /// Returns `true` if the slot at `index` is marked.
    ///
    /// Slots outside the covered range are never marked.
    #[must_use]
    pub fn contains(&self, index: usize) -> bool {
        if index >= self.len {
            return false;
        }
        (self.words[index / 64] & (1u64 << (index % 64))) != 0
    }

    /// Returns the number of marked slots.
    #[must_use]
    pub fn count(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// Returns an iterator over the indices of marked slots.
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.len).filter(|&i| self.contains(i))
    }
}

impl std::fmt::Debug for SlotSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{{")?;
        let mut first = true;
        for i in self.iter() {
            if !first {
                write!(f, ", ")?;
            }
            write!(f, "{i}")?;
            first = false;
        }
        write!(f, "}}")
    }
}
