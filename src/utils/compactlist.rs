//! A growable sequence that stays off the heap while it holds zero or one element.
//!
//! Most member scans produce no or exactly one candidate (a name query for a method that
//! is not overloaded, a type without nested types). [`CompactList`] keeps that case
//! allocation free and switches to a heap buffer on the second element.
//!
//! # Growth
//!
//! | State    | `add`                                                         |
//! |----------|---------------------------------------------------------------|
//! | `Empty`  | stores the element inline                                     |
//! | `One`    | allocates `max(4, 2 * 1)` slots and moves the inline element  |
//! | `Many`   | appends, doubling the buffer when it is full                  |
//!
//! # Example
//!
//! ```rust
//! use memberscope::utils::CompactList;
//!
//! let mut list = CompactList::new();
//! list.add("a");
//! assert_eq!(list.capacity(), 1);
//!
//! list.add("b");
//! assert_eq!(list.capacity(), 4);
//! assert_eq!(list.get(1), Some(&"b"));
//! assert_eq!(&*list.to_array(), &["a", "b"]);
//! ```

/// Minimum buffer size once a list outgrows its inline element
const MIN_HEAP_CAPACITY: usize = 4;

/// Sequence with inline storage for zero or one element.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CompactList<T> {
    /// No element
    Empty,
    /// Exactly one element, stored inline
    One(T),
    /// Two or more elements in a heap buffer
    Many(Vec<T>),
}

impl<T> Default for CompactList<T> {
    fn default() -> Self {
        CompactList::Empty
    }
}

impl<T> CompactList<T> {
    /// Creates an empty list
    #[must_use]
    pub const fn new() -> Self {
        CompactList::Empty
    }

    /// Creates a list that can hold `capacity` elements without reallocating
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        if capacity <= 1 {
            CompactList::Empty
        } else {
            CompactList::Many(Vec::with_capacity(capacity))
        }
    }

    /// Appends `item`
    pub fn add(&mut self, item: T) {
        match self {
            CompactList::Empty => *self = CompactList::One(item),
            CompactList::One(_) => {
                let CompactList::One(first) = std::mem::replace(self, CompactList::Empty) else {
                    return;
                };
                let mut buffer = Vec::with_capacity(MIN_HEAP_CAPACITY.max(2));
                buffer.push(first);
                buffer.push(item);
                *self = CompactList::Many(buffer);
            }
            CompactList::Many(buffer) => {
                if buffer.len() == buffer.capacity() {
                    let grow = buffer.capacity().max(MIN_HEAP_CAPACITY);
                    buffer.reserve_exact(grow);
                }
                buffer.push(item);
            }
        }
    }

    /// Appends `item`, growing the buffer by exactly the number of `remaining` elements
    /// the caller still intends to add when it runs out of room.
    pub fn add_exact(&mut self, item: T, remaining: usize) {
        if let CompactList::Many(buffer) = self {
            if buffer.len() == buffer.capacity() {
                buffer.reserve_exact(remaining.max(1));
            }
            buffer.push(item);
        } else {
            self.add(item);
        }
    }

    /// Returns the element at `index`
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&T> {
        self.as_slice().get(index)
    }

    /// Replaces the element at `index`, returning the previous one
    ///
    /// # Panics
    ///
    /// Panics if `index >= self.len()`.
    pub fn set(&mut self, index: usize, item: T) -> T {
        assert!(index < self.len(), "index out of bounds");
        std::mem::replace(&mut self.as_mut_slice()[index], item)
    }

    /// Number of elements
    #[must_use]
    pub fn len(&self) -> usize {
        self.as_slice().len()
    }

    /// Returns `true` if the list holds no element
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of elements the list can hold without reallocating
    #[must_use]
    pub fn capacity(&self) -> usize {
        match self {
            CompactList::Empty | CompactList::One(_) => 1,
            CompactList::Many(buffer) => buffer.capacity(),
        }
    }

    /// Drops unused buffer capacity
    pub fn truncate_capacity(&mut self) {
        if let CompactList::Many(buffer) = self {
            buffer.shrink_to_fit();
        }
    }

    /// View the elements as a slice
    #[must_use]
    pub fn as_slice(&self) -> &[T] {
        match self {
            CompactList::Empty => &[],
            CompactList::One(item) => std::slice::from_ref(item),
            CompactList::Many(buffer) => buffer.as_slice(),
        }
    }

    fn as_mut_slice(&mut self) -> &mut [T] {
        match self {
            CompactList::Empty => &mut [],
            CompactList::One(item) => std::slice::from_mut(item),
            CompactList::Many(buffer) => buffer.as_mut_slice(),
        }
    }

    /// Iterate the elements in insertion order
    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.as_slice().iter()
    }
}

impl<T: Clone> CompactList<T> {
    /// Copy the elements into a right-sized array
    #[must_use]
    pub fn to_array(&self) -> Box<[T]> {
        self.as_slice().into()
    }

    /// Copy the elements into `dest`, starting at `offset`
    ///
    /// # Panics
    ///
    /// Panics if `dest` is too small to hold all elements after `offset`.
    pub fn copy_into(&self, dest: &mut [T], offset: usize) {
        let items = self.as_slice();
        assert!(
            offset + items.len() <= dest.len(),
            "destination too small"
        );
        dest[offset..offset + items.len()].clone_from_slice(items);
    }
}

impl<'a, T> IntoIterator for &'a CompactList<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<T> FromIterator<T> for CompactList<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut list = CompactList::new();
        for item in iter {
            list.add(item);
        }
        list
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inline_states() {
        let mut list = CompactList::new();
        assert!(list.is_empty());
        assert_eq!(list.len(), 0);
        assert_eq!(list.get(0), None);
        assert!(list.to_array().is_empty());

        list.add(7);
        assert!(matches!(list, CompactList::One(7)));
        assert_eq!(list.len(), 1);
        assert_eq!(&*list.to_array(), &[7]);
    }

    #[test]
    fn test_growth() {
        let mut list = CompactList::new();
        list.add(1);
        list.add(2);
        assert_eq!(list.capacity(), 4);

        list.add(3);
        list.add(4);
        assert_eq!(list.capacity(), 4);

        list.add(5);
        assert!(list.capacity() >= 8);
        assert_eq!(list.iter().copied().collect::<Vec<_>>(), vec![1, 2, 3, 4, 5]);

        list.truncate_capacity();
        assert!(list.capacity() >= 5);
        assert_eq!(list.len(), 5);
    }

    #[test]
    fn test_set_and_copy() {
        let mut list: CompactList<u32> = [10, 20, 30].into_iter().collect();
        assert_eq!(list.set(1, 21), 20);
        assert_eq!(list.get(1), Some(&21));

        let mut dest = [0u32; 5];
        list.copy_into(&mut dest, 2);
        assert_eq!(dest, [0, 0, 10, 21, 30]);
    }

    #[test]
    fn test_add_exact() {
        let mut list: CompactList<u32> = [1, 2, 3, 4].into_iter().collect();
        list.add_exact(5, 1);
        assert_eq!(list.len(), 5);
        assert!(list.capacity() >= 5);
    }

    #[test]
    #[should_panic(expected = "index out of bounds")]
    fn test_set_out_of_bounds() {
        let mut list = CompactList::new();
        list.add(1);
        list.set(1, 2);
    }
}
