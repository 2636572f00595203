use std::mem::MaybeUninit;

/// Index-stable storage with slot reuse.
///
/// A `Slab` keeps values in a contiguous array and hands out indices that
/// stay valid until the value is removed. Freed slots are recycled by later
/// insertions, so a long-running server that keeps connecting and evicting
/// clients does not grow without bound.
///
/// # Safety
///
/// This type uses `unsafe` internally but provides a safe API: every access
/// checks the `used` bitmap before touching a slot.
pub(crate) struct Slab<T> {
    /// Storage for items (may contain uninitialized slots).
    items: Vec<MaybeUninit<T>>,
    /// Stack of free indices that can be reused.
    free: Vec<usize>,
    /// Marks whether a slot is currently initialized.
    used: Vec<bool>,
    /// Number of initialized slots.
    len: usize,
}

impl<T> Slab<T> {
    /// Creates a slab with `size` free slots.
    pub(crate) fn new(size: usize) -> Self {
        let items = (0..size).map(|_| MaybeUninit::<T>::uninit()).collect();
        // Popped from the back, so reverse to hand out low indices first.
        let free = (0..size).rev().collect();
        let used = vec![false; size];

        Self {
            items,
            free,
            used,
            len: 0,
        }
    }

    /// Stores `item` and returns its index.
    ///
    /// A free slot is reused when available; otherwise the slab doubles.
    pub(crate) fn insert(&mut self, item: T) -> usize {
        let index = if let Some(i) = self.free.pop() {
            i
        } else {
            let len = self.items.len();
            let new_len = if len == 0 { 1 } else { 2 * len };

            self.items
                .extend((len..new_len).map(|_| MaybeUninit::<T>::uninit()));
            self.free.extend(((len + 1)..new_len).rev());
            self.used.resize(new_len, false);

            len
        };

        self.items[index] = MaybeUninit::new(item);
        self.used[index] = true;
        self.len += 1;

        index
    }

    /// Removes and returns the value stored at `index`, if any.
    pub(crate) fn remove(&mut self, index: usize) -> Option<T> {
        if !self.used.get(index).copied().unwrap_or(false) {
            return None;
        }

        self.free.push(index);
        self.used[index] = false;
        self.len -= 1;

        let item = unsafe { self.items[index].assume_init_read() };
        self.items[index] = MaybeUninit::uninit();

        Some(item)
    }

    /// Returns a reference to the value at `index`, if the slot is in use.
    pub(crate) fn get(&self, index: usize) -> Option<&T> {
        if self.used.get(index).copied().unwrap_or(false) {
            Some(unsafe { self.items[index].assume_init_ref() })
        } else {
            None
        }
    }

    /// Returns the number of stored values.
    pub(crate) fn len(&self) -> usize {
        self.len
    }
}

impl<T> Drop for Slab<T> {
    /// Drops all initialized elements stored in the slab.
    fn drop(&mut self) {
        for (slot, &used) in self.items.iter_mut().zip(self.used.iter()) {
            if used {
                unsafe {
                    slot.assume_init_drop();
                }
            }
        }
    }
}
