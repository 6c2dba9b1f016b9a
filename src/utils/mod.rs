//! Data structures shared by the reflection cache.
//!
//! # Key Components
//!
//! - [`CompactList`] - sequence with inline storage for zero or one element
//! - [`AppendSafeTable`] - append-only hash table with lock-free reads
//! - [`SlotSet`] - bit set over virtual slot indices
//! - [`folded_hash`], [`eq_ignore_case`] - case-folded name comparison

mod appendtable;
mod bitset;
mod compactlist;
mod hash;

pub use appendtable::{next_prime, AppendSafeTable};
pub use bitset::SlotSet;
pub use compactlist::CompactList;
pub use hash::{eq_ignore_case, fold_case, folded_hash};
