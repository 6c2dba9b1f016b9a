//! Per-kind member cache with identity-preserving merge.
//!
//! A [`MemberKindCache`] holds the members of one kind of one reflected type. It answers
//! three shapes of query:
//!
//! - case-sensitive name lookups, through a name index keyed by the exact name
//! - case-insensitive name lookups, through a name index keyed by the folded name
//! - the complete member list, through a published array guarded by a "complete" flag
//!
//! Whatever the query, every record handed out is also part of the cache's global list,
//! and a member that is found by several queries is always represented by the same `Arc`.
//! Population runs without holding any lock; only merging the result into the global
//! list and storing it in the name index happen under the cache lock, and the first
//! result stored for a key wins.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex, OnceLock,
};

use log::trace;

use crate::{
    metadata::reflection::{
        filter::{MatchMode, NameFilter},
        records::Member,
    },
    utils::{fold_case, AppendSafeTable, CompactList},
    Error, Result,
};

/// An immutable, shared array of member records
pub type MemberArray<T> = Arc<[Arc<T>]>;

/// The output of one population run
#[derive(Debug)]
pub struct Population<T> {
    /// The members found, in population order
    pub members: Vec<Arc<T>>,
    /// Index pairs into `members` that must not be resolved to a single member
    pub ambiguous: Vec<(usize, usize)>,
}

impl<T> Population<T> {
    /// A population result without ambiguous pairs
    #[must_use]
    pub fn new(members: Vec<Arc<T>>) -> Self {
        Population {
            members,
            ambiguous: Vec::new(),
        }
    }
}

impl<T> Default for Population<T> {
    fn default() -> Self {
        Population::new(Vec::new())
    }
}

/// Cached members of one kind of one reflected type
pub struct MemberKindCache<T: Member> {
    case_sensitive: AppendSafeTable<Box<str>, MemberArray<T>>,
    case_insensitive: AppendSafeTable<Box<str>, MemberArray<T>>,
    state: Mutex<CompactList<Arc<T>>>,
    complete: AtomicBool,
    published: OnceLock<MemberArray<T>>,
    /// Locked after `state` when both are needed
    ambiguous: Mutex<Vec<(Arc<T>, Arc<T>)>>,
}

impl<T: Member> MemberKindCache<T> {
    /// Create an empty cache whose name indices start out with room for `capacity` names
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        MemberKindCache {
            case_sensitive: AppendSafeTable::with_capacity(capacity),
            case_insensitive: AppendSafeTable::with_capacity(capacity),
            state: Mutex::new(CompactList::new()),
            complete: AtomicBool::new(false),
            published: OnceLock::new(),
            ambiguous: Mutex::new(Vec::new()),
        }
    }

    /// Return the members selected by `filter`, populating through `populate` on a miss.
    ///
    /// `populate` receives the filter it has to honor and runs without any lock held.
    /// Prefix filters are answered from the complete list.
    ///
    /// # Errors
    ///
    /// Propagates population errors, [`Error::LockError`] on a poisoned lock and
    /// [`Error::CacheInvariant`] if a complete list would have to grow.
    pub fn get_list<F>(&self, filter: &NameFilter, populate: F) -> Result<MemberArray<T>>
    where
        F: FnOnce(&NameFilter) -> Result<Population<T>>,
    {
        if filter.is_indexed() {
            return self.get_named(filter, populate);
        }

        let all = self.get_all(populate)?;
        if filter.is_prefix() {
            return Ok(all
                .iter()
                .filter(|member| filter.matches_name(member.member_name()))
                .cloned()
                .collect());
        }
        Ok(all)
    }

    fn get_named<F>(&self, filter: &NameFilter, populate: F) -> Result<MemberArray<T>>
    where
        F: FnOnce(&NameFilter) -> Result<Population<T>>,
    {
        let (table, key) = match (filter.mode(), filter.name()) {
            (MatchMode::CaseSensitive, Some(name)) => (&self.case_sensitive, Box::from(name)),
            (MatchMode::CaseInsensitive, Some(name)) => {
                (&self.case_insensitive, fold_case(name).into_boxed_str())
            }
            _ => return self.get_all(populate),
        };

        if let Some(hit) = table.get(&key) {
            trace!("{} cache hit for '{}'", T::KIND, key);
            return Ok(hit);
        }

        // A complete list already holds every member; select from it instead
        if let Some(all) = self.published_if_complete() {
            let selected: MemberArray<T> = all
                .iter()
                .filter(|member| filter.matches_name(member.member_name()))
                .cloned()
                .collect();
            return table.get_or_insert(key, selected);
        }

        let population = populate(filter)?;

        let mut state = lock!(self.state);
        if let Some(stored) = table.get(&key) {
            return Ok(stored);
        }
        let complete = self.complete.load(Ordering::Acquire);
        let merged = Self::merge_with_global(&mut state, population.members, complete)?;
        self.record_ambiguous(&merged, &population.ambiguous)?;
        table.get_or_insert(key, merged.into())
    }

    fn get_all<F>(&self, populate: F) -> Result<MemberArray<T>>
    where
        F: FnOnce(&NameFilter) -> Result<Population<T>>,
    {
        if let Some(all) = self.published_if_complete() {
            trace!("{} complete list hit", T::KIND);
            return Ok(all);
        }

        let population = populate(&NameFilter::all())?;

        let mut state = lock!(self.state);
        if let Some(all) = self.published_if_complete() {
            return Ok(all);
        }

        let mut merged = Self::merge_with_global(&mut state, population.members, false)?;
        self.record_ambiguous(&merged, &population.ambiguous)?;

        // Members only reachable through earlier name queries stay part of the list
        for existing in state.iter() {
            if !merged.iter().any(|m| Arc::ptr_eq(m, existing)) {
                merged.push(existing.clone());
            }
        }

        // The complete list never grows again, so it is sized exactly
        let mut global = CompactList::with_capacity(merged.len());
        for (index, member) in merged.iter().enumerate() {
            global.add_exact(member.clone(), merged.len() - index);
        }
        global.truncate_capacity();
        *state = global;

        let array: MemberArray<T> = merged.into();
        let published = self.published.get_or_init(|| array.clone()).clone();
        self.complete.store(true, Ordering::Release);
        Ok(published)
    }

    /// Replace every record of `new` that the global list already holds by the held
    /// instance and append the others, doubling the list when it is full.
    fn merge_with_global(
        global: &mut CompactList<Arc<T>>,
        new: Vec<Arc<T>>,
        complete: bool,
    ) -> Result<Vec<Arc<T>>> {
        let mut merged = Vec::with_capacity(new.len());
        for record in new {
            if let Some(existing) = global.iter().find(|g| g.same_member(&record)) {
                merged.push(existing.clone());
                continue;
            }

            if complete {
                debug_assert!(false, "growing a complete {} list", T::KIND);
                return Err(Error::CacheInvariant(format!(
                    "{} '{}' added to a complete member list",
                    T::KIND,
                    record.name()
                )));
            }

            global.add(record.clone());
            merged.push(record);
        }
        Ok(merged)
    }

    fn record_ambiguous(&self, merged: &[Arc<T>], pairs: &[(usize, usize)]) -> Result<()> {
        if pairs.is_empty() {
            return Ok(());
        }

        let mut ambiguous = lock!(self.ambiguous);
        for &(a, b) in pairs {
            let (Some(first), Some(second)) = (merged.get(a), merged.get(b)) else {
                return Err(malformed_error!(
                    "ambiguous pair ({}, {}) outside of {} members",
                    a,
                    b,
                    merged.len()
                ));
            };
            let known = ambiguous.iter().any(|(x, y)| {
                (Arc::ptr_eq(x, first) && Arc::ptr_eq(y, second))
                    || (Arc::ptr_eq(x, second) && Arc::ptr_eq(y, first))
            });
            if !known {
                ambiguous.push((first.clone(), second.clone()));
            }
        }
        Ok(())
    }

    fn published_if_complete(&self) -> Option<MemberArray<T>> {
        if self.complete.load(Ordering::Acquire) {
            self.published.get().cloned()
        } else {
            None
        }
    }

    /// Returns `true` once the complete member list has been published
    pub fn is_complete(&self) -> bool {
        self.complete.load(Ordering::Acquire)
    }

    /// Returns `true` if `a` and `b` were recorded as an ambiguous pair
    ///
    /// # Errors
    ///
    /// Returns [`Error::LockError`] if the lock is poisoned.
    pub fn is_ambiguous_pair(&self, a: &Arc<T>, b: &Arc<T>) -> Result<bool> {
        let ambiguous = lock!(self.ambiguous);
        Ok(ambiguous.iter().any(|(x, y)| {
            (Arc::ptr_eq(x, a) && Arc::ptr_eq(y, b)) || (Arc::ptr_eq(x, b) && Arc::ptr_eq(y, a))
        }))
    }

    /// Number of members in the global list
    ///
    /// # Errors
    ///
    /// Returns [`Error::LockError`] if the lock is poisoned.
    pub fn global_len(&self) -> Result<usize> {
        Ok(lock!(self.state).len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::fixtures::record;
    use std::{
        sync::atomic::AtomicUsize,
        thread,
    };

    #[test]
    fn test_named_query_is_stored_once() {
        let cache = MemberKindCache::new(4);
        let calls = AtomicUsize::new(0);
        let populate = |filter: &NameFilter| {
            calls.fetch_add(1, Ordering::SeqCst);
            assert_eq!(filter.name(), Some("Run"));
            Ok(Population::new(vec![record("Run", 1)]))
        };

        let first = cache.get_list(&NameFilter::exact("Run"), populate).unwrap();
        let second = cache
            .get_list(&NameFilter::exact("Run"), |_| panic!("must hit the index"))
            .unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.global_len().unwrap(), 1);
    }

    #[test]
    fn test_all_query_reuses_named_instances() {
        let cache = MemberKindCache::new(4);
        let named = cache
            .get_list(&NameFilter::case_insensitive("RUN"), |_| {
                Ok(Population::new(vec![record("Run", 1)]))
            })
            .unwrap();

        let all = cache
            .get_list(&NameFilter::all(), |_| {
                Ok(Population::new(vec![record("Stop", 2), record("Run", 1)]))
            })
            .unwrap();

        assert!(cache.is_complete());
        assert_eq!(all.len(), 2);
        assert!(Arc::ptr_eq(&all[1], &named[0]));
        assert_eq!(all[0].name(), "Stop");

        // Complete lists answer new names without populating
        let stop = cache
            .get_list(&NameFilter::exact("Stop"), |_| panic!("list is complete"))
            .unwrap();
        assert!(Arc::ptr_eq(&stop[0], &all[0]));

        let again = cache
            .get_list(&NameFilter::all(), |_| panic!("list is complete"))
            .unwrap();
        assert!(Arc::ptr_eq(&again, &all));
    }

    #[test]
    fn test_prefix_query() {
        let cache = MemberKindCache::new(4);
        let found = cache
            .get_list(&NameFilter::parse("Get*", MatchMode::CaseSensitive), |filter| {
                assert_eq!(filter.mode(), MatchMode::All);
                Ok(Population::new(vec![
                    record("GetValue", 1),
                    record("SetValue", 2),
                    record("GetHashCode", 3),
                ]))
            })
            .unwrap();
        assert_eq!(found.len(), 2);
    }

    #[test]
    fn test_global_list_doubles_while_incomplete() {
        let cache = MemberKindCache::new(16);
        let mut capacity = 0;
        let mut reallocations = 0;
        for row in 1..=12u32 {
            let name = format!("Method{row}");
            cache
                .get_list(&NameFilter::exact(&name), |_| {
                    Ok(Population::new(vec![record(&name, row)]))
                })
                .unwrap();

            let state = cache.state.lock().unwrap();
            assert_eq!(state.len(), row as usize);
            if state.capacity() != capacity {
                assert!(state.capacity() >= capacity * 2);
                reallocations += 1;
            }
            capacity = state.capacity();
        }
        // inline, 4, 8, 16
        assert_eq!(reallocations, 4);
        assert!(!cache.is_complete());

        let all = cache
            .get_list(&NameFilter::all(), |_| {
                Ok(Population::new(
                    (1..=12u32)
                        .map(|row| record(&format!("Method{row}"), row))
                        .collect(),
                ))
            })
            .unwrap();
        assert_eq!(all.len(), 12);

        // Complete lists are sized exactly
        let state = cache.state.lock().unwrap();
        assert_eq!(state.len(), 12);
        assert_eq!(state.capacity(), 12);
    }

    #[test]
    fn test_named_query_merges_into_completed_list() {
        let cache = MemberKindCache::new(4);
        let mut completed = None;
        let named = cache
            .get_list(&NameFilter::exact("Run"), |_| {
                // Another caller completes the list while this population runs
                let all = cache.get_list(&NameFilter::all(), |_| {
                    Ok(Population::new(vec![record("Run", 1), record("Stop", 2)]))
                })?;
                completed = Some(all);
                Ok(Population::new(vec![record("Run", 1)]))
            })
            .unwrap();

        let all = completed.unwrap();
        assert!(cache.is_complete());
        assert_eq!(named.len(), 1);
        assert!(Arc::ptr_eq(&named[0], &all[0]));
        assert_eq!(cache.global_len().unwrap(), 2);
    }

    #[test]
    fn test_named_query_cannot_grow_completed_list() {
        let cache = MemberKindCache::new(4);
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            cache.get_list(&NameFilter::exact("Late"), |_| {
                cache.get_list(&NameFilter::all(), |_| {
                    Ok(Population::new(vec![record("Run", 1)]))
                })?;
                Ok(Population::new(vec![record("Late", 9)]))
            })
        }));
        if cfg!(debug_assertions) {
            assert!(result.is_err());
        } else {
            assert!(matches!(result, Ok(Err(Error::CacheInvariant(_)))));
        }
        assert!(cache.is_complete());
    }

    #[test]
    fn test_merge_into_complete_list_fails() {
        let mut global = CompactList::new();
        global.add(record("Run", 1));
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            MemberKindCache::merge_with_global(&mut global, vec![record("Stop", 2)], true)
        }));
        if cfg!(debug_assertions) {
            assert!(result.is_err());
        } else {
            assert!(matches!(result, Ok(Err(Error::CacheInvariant(_)))));
        }
    }

    #[test]
    fn test_ambiguous_pairs() {
        let cache = MemberKindCache::new(4);
        let all = cache
            .get_list(&NameFilter::all(), |_| {
                Ok(Population {
                    members: vec![record("Value", 1), record("Value", 2)],
                    ambiguous: vec![(0, 1)],
                })
            })
            .unwrap();
        assert!(cache.is_ambiguous_pair(&all[1], &all[0]).unwrap());
        assert!(!cache.is_ambiguous_pair(&all[0], &all[0]).unwrap());
    }

    #[test]
    fn test_concurrent_first_queries_agree() {
        let cache = Arc::new(MemberKindCache::new(4));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = cache.clone();
                thread::spawn(move || {
                    let named = cache
                        .get_list(&NameFilter::exact("Run"), |_| {
                            Ok(Population::new(vec![record("Run", 1)]))
                        })
                        .unwrap();
                    let all = cache
                        .get_list(&NameFilter::all(), |_| {
                            Ok(Population::new(vec![record("Run", 1), record("Stop", 2)]))
                        })
                        .unwrap();
                    (named, all)
                })
            })
            .collect();

        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let (named, all) = &results[0];
        for (other_named, other_all) in &results[1..] {
            assert!(Arc::ptr_eq(named, other_named));
            assert!(Arc::ptr_eq(all, other_all));
        }
        assert!(all.iter().any(|m| Arc::ptr_eq(m, &named[0])));
    }
}
