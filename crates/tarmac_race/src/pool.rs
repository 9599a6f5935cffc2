//! # Slot Pool
//!
//! Slot storage for objects that are registered and removed at runtime.
//! Handles carry a generation so a handle to a removed object never
//! resolves to whatever reuses its slot.

/// Handle to an object stored in a [`SlotPool`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SlotHandle {
    /// Index into the pool.
    index: u32,
    /// Generation of the slot when the handle was issued.
    generation: u32,
}

impl SlotHandle {
    /// Slot index, stable for the handle's lifetime.
    #[inline]
    #[must_use]
    pub const fn index(self) -> u32 {
        self.index
    }
}

struct Slot<T> {
    generation: u32,
    value: Option<T>,
}

/// A growable pool with O(1) insert and remove.
///
/// # Thread Safety
///
/// This pool is NOT thread-safe. It is owned by whoever runs the tick loop.
///
/// # Example
///
/// ```rust
/// use tarmac_race::pool::SlotPool;
///
/// let mut pool = SlotPool::new();
/// let handle = pool.insert("car");
/// assert_eq!(pool.get(handle), Some(&"car"));
///
/// pool.remove(handle);
/// assert!(pool.get(handle).is_none());
/// ```
pub struct SlotPool<T> {
    /// The storage array.
    slots: Vec<Slot<T>>,
    /// Free list - indices of vacated slots.
    free_list: Vec<u32>,
    /// Number of live objects.
    len: usize,
}

impl<T> Default for SlotPool<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> SlotPool<T> {
    /// Creates an empty pool.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            slots: Vec::new(),
            free_list: Vec::new(),
            len: 0,
        }
    }

    /// Returns the number of live objects.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Returns true if the pool holds nothing.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Stores the object, reusing a vacated slot when one exists.
    pub fn insert(&mut self, value: T) -> SlotHandle {
        self.len += 1;

        if let Some(index) = self.free_list.pop() {
            let slot = &mut self.slots[index as usize];
            slot.value = Some(value);
            return SlotHandle {
                index,
                generation: slot.generation,
            };
        }

        let index = u32::try_from(self.slots.len()).unwrap_or(u32::MAX);
        self.slots.push(Slot {
            generation: 0,
            value: Some(value),
        });
        SlotHandle { index, generation: 0 }
    }

    /// Removes an object.
    ///
    /// # Returns
    ///
    /// The removed object, or None if the handle was stale.
    pub fn remove(&mut self, handle: SlotHandle) -> Option<T> {
        let slot = self.slots.get_mut(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }

        let value = slot.value.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free_list.push(handle.index);
        self.len -= 1;

        Some(value)
    }

    /// Returns true if the handle still resolves.
    #[inline]
    #[must_use]
    pub fn contains(&self, handle: SlotHandle) -> bool {
        self.get(handle).is_some()
    }

    /// Gets a reference to a live object.
    #[inline]
    #[must_use]
    pub fn get(&self, handle: SlotHandle) -> Option<&T> {
        let slot = self.slots.get(handle.index as usize)?;
        if slot.generation == handle.generation {
            slot.value.as_ref()
        } else {
            None
        }
    }

    /// Gets a mutable reference to a live object.
    #[inline]
    pub fn get_mut(&mut self, handle: SlotHandle) -> Option<&mut T> {
        let slot = self.slots.get_mut(handle.index as usize)?;
        if slot.generation == handle.generation {
            slot.value.as_mut()
        } else {
            None
        }
    }

    /// Drops every object. Outstanding handles become stale.
    pub fn clear(&mut self) {
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if slot.value.take().is_some() {
                slot.generation = slot.generation.wrapping_add(1);
                self.free_list.push(index as u32);
            }
        }
        self.len = 0;
    }

    /// Iterates over all live objects in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (SlotHandle, &T)> {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            slot.value.as_ref().map(|v| {
                (
                    SlotHandle {
                        index: index as u32,
                        generation: slot.generation,
                    },
                    v,
                )
            })
        })
    }

    /// Iterates mutably over all live objects in slot order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (SlotHandle, &mut T)> {
        self.slots.iter_mut().enumerate().filter_map(|(index, slot)| {
            let generation = slot.generation;
            slot.value.as_mut().map(|v| {
                (
                    SlotHandle {
                        index: index as u32,
                        generation,
                    },
                    v,
                )
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_insert_remove() {
        let mut pool: SlotPool<u32> = SlotPool::new();

        let h1 = pool.insert(42);
        assert_eq!(*pool.get(h1).unwrap(), 42);
        assert_eq!(pool.len(), 1);

        assert_eq!(pool.remove(h1), Some(42));
        assert!(pool.is_empty());
        assert!(pool.get(h1).is_none());
    }

    #[test]
    fn test_pool_stale_handle_after_reuse() {
        let mut pool = SlotPool::new();

        let old = pool.insert("a");
        pool.remove(old);
        let new = pool.insert("b");

        assert_eq!(old.index(), new.index());
        assert!(pool.get(old).is_none());
        assert!(pool.remove(old).is_none());
        assert_eq!(pool.get(new), Some(&"b"));
    }

    #[test]
    fn test_pool_clear_invalidates_handles() {
        let mut pool = SlotPool::new();
        let handles: Vec<_> = (0..4).map(|i| pool.insert(i)).collect();

        pool.clear();

        assert!(pool.is_empty());
        assert!(handles.iter().all(|h| !pool.contains(*h)));
        let h = pool.insert(9);
        assert_eq!(pool.get(h), Some(&9));
    }

    #[test]
    fn test_pool_iter_skips_holes() {
        let mut pool = SlotPool::new();
        let a = pool.insert(1);
        let _b = pool.insert(2);
        let _c = pool.insert(3);
        pool.remove(a);

        let values: Vec<_> = pool.iter().map(|(_, v)| *v).collect();
        assert_eq!(values, vec![2, 3]);

        for (_, v) in pool.iter_mut() {
            *v *= 10;
        }
        let values: Vec<_> = pool.iter().map(|(_, v)| *v).collect();
        assert_eq!(values, vec![20, 30]);
    }
}
