use std::alloc::{self, Layout};
use std::cell::Cell;
use std::ops::{Deref, DerefMut};
use std::ptr::NonNull;
use std::slice;

/// Alignment of every scratch buffer.
///
/// Large enough for the 8-byte fields of the poll records and for the
/// pointer words of a native `struct iovec`.
const ALIGN: usize = 8;

thread_local! {
    static ALLOCATED: Cell<usize> = const { Cell::new(0) };
    static RELEASED: Cell<usize> = const { Cell::new(0) };
}

/// Allocation counters for the scratch buffers of the current thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScratchStats {
    /// Number of buffers allocated so far.
    pub allocated: usize,

    /// Number of buffers released so far.
    pub released: usize,
}

impl ScratchStats {
    /// Returns the number of buffers currently alive.
    pub fn live(&self) -> usize {
        self.allocated - self.released
    }
}

/// Returns the scratch allocation counters of the current thread.
///
/// Empty buffers never touch the allocator and are not counted.
pub fn stats() -> ScratchStats {
    ScratchStats {
        allocated: ALLOCATED.with(Cell::get),
        released: RELEASED.with(Cell::get),
    }
}

/// A zero-initialized buffer scoped to one host call.
///
/// A `Scratch` owns a heap block whose address is handed to the host. The
/// block is released when the value is dropped, so every exit path of the
/// owning call (including `?` on an error) frees it.
///
/// The buffer dereferences to `[u8]` for encoding and decoding.
pub struct Scratch {
    ptr: NonNull<u8>,
    len: usize,
}

impl Scratch {
    /// Allocates a zeroed buffer of `len` bytes.
    ///
    /// # Panics
    ///
    /// Panics if `len` overflows the address space, and aborts through
    /// [`alloc::handle_alloc_error`] if the allocator fails.
    pub fn zeroed(len: usize) -> Self {
        if len == 0 {
            return Self {
                ptr: NonNull::<u64>::dangling().cast(),
                len: 0,
            };
        }

        let layout = Self::layout(len);
        let raw = unsafe { alloc::alloc_zeroed(layout) };

        let Some(ptr) = NonNull::new(raw) else {
            alloc::handle_alloc_error(layout);
        };

        ALLOCATED.with(|count| count.set(count.get() + 1));

        Self { ptr, len }
    }

    fn layout(len: usize) -> Layout {
        match Layout::from_size_align(len, ALIGN) {
            Ok(layout) => layout,
            Err(_) => panic!("scratch buffer of {len} bytes exceeds the address space"),
        }
    }

    /// Returns the address handed to the host for reading.
    pub fn as_ptr(&self) -> *const u8 {
        self.ptr.as_ptr()
    }

    /// Returns the address handed to the host for writing.
    pub fn as_mut_ptr(&mut self) -> *mut u8 {
        self.ptr.as_ptr()
    }
}

impl Deref for Scratch {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        unsafe { slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }
}

impl DerefMut for Scratch {
    fn deref_mut(&mut self) -> &mut [u8] {
        unsafe { slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) }
    }
}

impl Drop for Scratch {
    /// Returns the block to the allocator.
    fn drop(&mut self) {
        if self.len == 0 {
            return;
        }

        unsafe { alloc::dealloc(self.ptr.as_ptr(), Self::layout(self.len)) };

        RELEASED.with(|count| count.set(count.get() + 1));
    }
}
