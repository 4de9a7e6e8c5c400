//! Specialized collection types
//!
//! [`HandleTable`] gives every stored record a small, densely packed `u32`
//! handle that stays stable while the record lives. Records themselves are
//! kept packed at the front of the backing storage, so a whole-table sweep is
//! a plain walk over `0..count()`.
//!
//! ```text
//! slots:  [ A | C | B | - | - ]      count = 3
//!           ^ dense index 0..3 are live
//! handle -> index lookup lives in the same slots
//! ```
//!
//! Handles are recycled: once a record is removed its handle becomes the next
//! handle returned by [`HandleTable::add`]. A handle is therefore unique among
//! the live records of one table, never across all time.

use thiserror::Error;

/// Handle type handed out by a [`HandleTable`]
pub type Handle = u32;

/// Number of slots added whenever the table runs out of room
const GROW_BY: u32 = 32;

/// Handle table lookup errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum HandleTableError {
    /// The handle is unknown or was already freed
    #[error("Handle {0} is out of range")]
    OutOfRange(Handle),

    /// The dense index is not below the live record count
    #[error("Index {index} is out of range (count: {count})")]
    IndexOutOfRange {
        /// Requested dense index
        index: u32,
        /// Live record count at the time of the request
        count: u32,
    },
}

#[derive(Debug, Clone)]
struct Slot<T> {
    /// Dense index of the record that owns the handle equal to this slot position
    handle_to_index: u32,
    /// Handle of the record stored at this dense index
    handle: Handle,
    element: Option<T>,
}

/// Arena that maps opaque integer handles to records
///
/// Lookups and removals by handle are O(1). Removal swaps the last live
/// record into the freed dense index, so dense indices are not stable across
/// removals while handles are.
#[derive(Debug, Clone)]
pub struct HandleTable<T> {
    slots: Vec<Slot<T>>,
    count: u32,
}

impl<T> HandleTable<T> {
    /// Create an empty table
    pub const fn new() -> Self {
        Self {
            slots: Vec::new(),
            count: 0,
        }
    }

    /// Create an empty table with room for `capacity` records
    pub fn with_capacity(capacity: u32) -> Self {
        let mut table = Self::new();
        table.reserve(capacity);
        table
    }

    /// Number of live records
    pub const fn count(&self) -> u32 {
        self.count
    }

    /// True if no records are stored
    pub const fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Number of slots currently allocated
    #[allow(clippy::cast_possible_truncation)]
    pub fn capacity(&self) -> u32 {
        self.slots.len() as u32
    }

    /// Grow the table so it can hold at least `capacity` records
    pub fn reserve(&mut self, capacity: u32) {
        let old_capacity = self.capacity();
        if capacity <= old_capacity {
            return;
        }
        self.slots.reserve((capacity - old_capacity) as usize);
        for i in old_capacity..capacity {
            self.slots.push(Slot {
                handle_to_index: i,
                handle: i,
                element: None,
            });
        }
    }

    /// Store a record and return its handle (amortized O(1))
    pub fn add(&mut self, element: T) -> Handle {
        if self.count >= self.capacity() {
            self.reserve(self.capacity() + GROW_BY);
        }
        let index = self.count as usize;
        let handle = self.slots[index].handle;
        debug_assert_eq!(self.slots[handle as usize].handle_to_index, self.count);
        self.slots[index].element = Some(element);
        self.count += 1;
        handle
    }

    /// Store a record built from the handle it is about to receive
    ///
    /// Lets a record and a side value (typically a tracker) carry their own
    /// handle without a second lookup.
    pub fn add_with<R>(&mut self, build: impl FnOnce(Handle) -> (T, R)) -> (Handle, R) {
        if self.count >= self.capacity() {
            self.reserve(self.capacity() + GROW_BY);
        }
        let next = self.slots[self.count as usize].handle;
        let (element, extra) = build(next);
        let handle = self.add(element);
        debug_assert_eq!(handle, next);
        (handle, extra)
    }

    /// True if `handle` refers to a live record
    pub fn is_valid_handle(&self, handle: Handle) -> bool {
        self.slots
            .get(handle as usize)
            .is_some_and(|slot| slot.handle_to_index < self.count)
    }

    /// True if `index` is a live dense index
    pub const fn is_valid_index(&self, index: u32) -> bool {
        index < self.count
    }

    /// Look up a record, failing if the handle is unknown or freed
    pub fn get(&self, handle: Handle) -> Result<&T, HandleTableError> {
        self.try_get(handle).ok_or(HandleTableError::OutOfRange(handle))
    }

    /// Mutable variant of [`HandleTable::get`]
    pub fn get_mut(&mut self, handle: Handle) -> Result<&mut T, HandleTableError> {
        self.try_get_mut(handle).ok_or(HandleTableError::OutOfRange(handle))
    }

    /// Look up a record, returning `None` if the handle is unknown or freed
    pub fn try_get(&self, handle: Handle) -> Option<&T> {
        if !self.is_valid_handle(handle) {
            return None;
        }
        let index = self.slots[handle as usize].handle_to_index as usize;
        self.slots[index].element.as_ref()
    }

    /// Mutable variant of [`HandleTable::try_get`]
    pub fn try_get_mut(&mut self, handle: Handle) -> Option<&mut T> {
        if !self.is_valid_handle(handle) {
            return None;
        }
        let index = self.slots[handle as usize].handle_to_index as usize;
        self.slots[index].element.as_mut()
    }

    /// Free the record behind `handle`. Returns false if it was already invalid.
    pub fn remove(&mut self, handle: Handle) -> bool {
        self.take(handle).is_some()
    }

    /// Free the record behind `handle` and hand it back to the caller
    pub fn take(&mut self, handle: Handle) -> Option<T> {
        if !self.is_valid_handle(handle) {
            return None;
        }
        let index = self.slots[handle as usize].handle_to_index;
        self.fast_remove_at(index)
    }

    /// Free the record stored at dense `index` and hand it back
    pub fn remove_at(&mut self, index: u32) -> Result<T, HandleTableError> {
        if !self.is_valid_index(index) {
            return Err(HandleTableError::IndexOutOfRange {
                index,
                count: self.count,
            });
        }
        self.fast_remove_at(index).ok_or(HandleTableError::IndexOutOfRange {
            index,
            count: self.count,
        })
    }

    /// Record stored at dense `index`
    pub fn get_at(&self, index: u32) -> Option<&T> {
        if !self.is_valid_index(index) {
            return None;
        }
        self.slots[index as usize].element.as_ref()
    }

    /// Mutable record stored at dense `index`
    pub fn get_at_mut(&mut self, index: u32) -> Option<&mut T> {
        if !self.is_valid_index(index) {
            return None;
        }
        self.slots[index as usize].element.as_mut()
    }

    /// Handle of the record stored at dense `index`
    pub fn fast_index_to_handle(&self, index: u32) -> Handle {
        debug_assert!(self.is_valid_index(index));
        self.slots[index as usize].handle
    }

    /// Dense index of the record behind `handle`
    pub fn fast_handle_to_index(&self, handle: Handle) -> u32 {
        debug_assert!(self.is_valid_handle(handle));
        self.slots[handle as usize].handle_to_index
    }

    /// Iterate over `(handle, record)` pairs in dense order
    pub fn iter(&self) -> impl Iterator<Item = (Handle, &T)> {
        self.slots[..self.count as usize]
            .iter()
            .filter_map(|slot| slot.element.as_ref().map(|element| (slot.handle, element)))
    }

    /// Iterate mutably over `(handle, record)` pairs in dense order
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (Handle, &mut T)> {
        self.slots[..self.count as usize]
            .iter_mut()
            .filter_map(|slot| slot.element.as_mut().map(|element| (slot.handle, element)))
    }

    /// Remove every record, returning them with their handles
    pub fn drain(&mut self) -> Vec<(Handle, T)> {
        let drained = self.slots[..self.count as usize]
            .iter_mut()
            .filter_map(|slot| slot.element.take().map(|element| (slot.handle, element)))
            .collect();
        self.count = 0;
        drained
    }

    /// Remove every record
    pub fn clear(&mut self) {
        for slot in &mut self.slots[..self.count as usize] {
            slot.element = None;
        }
        self.count = 0;
    }

    fn fast_remove_at(&mut self, index: u32) -> Option<T> {
        debug_assert!(self.count > 0);
        self.count -= 1;
        let last = self.count;
        let element = self.slots[index as usize].element.take();
        if index != last {
            let removed_handle = self.slots[index as usize].handle;
            let last_handle = self.slots[last as usize].handle;

            self.slots[index as usize].element = self.slots[last as usize].element.take();
            self.slots[index as usize].handle = last_handle;
            self.slots[last as usize].handle = removed_handle;

            self.slots[last_handle as usize].handle_to_index = index;
            self.slots[removed_handle as usize].handle_to_index = last;
        }
        element
    }
}

impl<T> Default for HandleTable<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_then_get_returns_record() {
        let mut table = HandleTable::new();
        let a = table.add("a");
        let b = table.add("b");

        assert_ne!(a, b);
        assert_eq!(table.count(), 2);
        assert_eq!(table.get(a), Ok(&"a"));
        assert_eq!(table.get(b), Ok(&"b"));
    }

    #[test]
    fn test_get_unknown_handle_is_out_of_range() {
        let table: HandleTable<u8> = HandleTable::new();
        assert_eq!(table.get(7), Err(HandleTableError::OutOfRange(7)));
        assert!(table.try_get(7).is_none());
    }

    #[test]
    fn test_remove_then_try_get_is_none() {
        let mut table = HandleTable::new();
        let a = table.add(10);

        assert!(table.remove(a));
        assert!(table.try_get(a).is_none());
        assert!(table.get(a).is_err());
        assert!(table.is_empty());
    }

    #[test]
    fn test_remove_twice_returns_false() {
        let mut table = HandleTable::new();
        let a = table.add(1);
        assert!(table.remove(a));
        assert!(!table.remove(a));
        assert!(!table.remove(12345));
    }

    #[test]
    fn test_handles_are_unique_while_live() {
        let mut table = HandleTable::new();
        let mut handles: Vec<Handle> = (0..100).map(|i| table.add(i)).collect();
        handles.sort_unstable();
        handles.dedup();
        assert_eq!(handles.len(), 100);
    }

    #[test]
    fn test_handle_reused_only_after_remove() {
        let mut table = HandleTable::new();
        let a = table.add('a');
        let b = table.add('b');
        let c = table.add('c');
        assert!(a != b && b != c && a != c);

        assert!(table.remove(b));
        let d = table.add('d');
        assert_eq!(d, b);
        assert_eq!(table.get(d), Ok(&'d'));
        assert_eq!(table.get(a), Ok(&'a'));
        assert_eq!(table.get(c), Ok(&'c'));
    }

    #[test]
    fn test_remove_keeps_other_handles_valid() {
        let mut table = HandleTable::new();
        let handles: Vec<Handle> = (0..10).map(|i| table.add(i * 10)).collect();

        for &handle in handles.iter().step_by(2) {
            assert!(table.remove(handle));
        }

        assert_eq!(table.count(), 5);
        for (i, &handle) in handles.iter().enumerate() {
            if i % 2 == 0 {
                assert!(table.try_get(handle).is_none());
            } else {
                assert_eq!(table.try_get(handle), Some(&(i * 10)));
            }
        }
    }

    #[test]
    fn test_dense_index_round_trip() {
        let mut table = HandleTable::new();
        let a = table.add(1);
        let b = table.add(2);
        table.remove(a);

        assert_eq!(table.count(), 1);
        assert_eq!(table.fast_index_to_handle(0), b);
        assert_eq!(table.fast_handle_to_index(b), 0);
        assert_eq!(table.get_at(0), Some(&2));
        assert!(table.get_at(1).is_none());
    }

    #[test]
    fn test_remove_at_invalid_index() {
        let mut table: HandleTable<u8> = HandleTable::new();
        assert_eq!(
            table.remove_at(0),
            Err(HandleTableError::IndexOutOfRange { index: 0, count: 0 })
        );
    }

    #[test]
    fn test_grows_past_initial_capacity() {
        let mut table = HandleTable::with_capacity(2);
        for i in 0..(GROW_BY * 3) {
            table.add(i);
        }
        assert_eq!(table.count(), GROW_BY * 3);
        assert!(table.capacity() >= GROW_BY * 3);
    }

    #[test]
    fn test_drain_empties_table() {
        let mut table = HandleTable::new();
        let a = table.add("x");
        let b = table.add("y");

        let drained = table.drain();
        assert_eq!(drained, vec![(a, "x"), (b, "y")]);
        assert!(table.is_empty());
        assert!(!table.is_valid_handle(a));
    }

    #[test]
    fn test_clear_then_add_recycles() {
        let mut table = HandleTable::new();
        table.add(1);
        table.add(2);
        table.clear();

        assert!(table.is_empty());
        let h = table.add(3);
        assert_eq!(table.get(h), Ok(&3));
        assert_eq!(table.iter().count(), 1);
    }

    #[test]
    fn test_add_with_sees_final_handle() {
        let mut table = HandleTable::new();
        let first = table.add(0u32);
        table.remove(first);

        let (handle, seen) = table.add_with(|handle| (handle + 100, handle));
        assert_eq!(handle, seen);
        assert_eq!(handle, first);
        assert_eq!(table.get(handle), Ok(&(first + 100)));
    }
}
