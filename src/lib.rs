//! A fixed arena free list allocator.
//!
//! One preallocated buffer is handed out as variable sized byte ranges. Free blocks carry a
//! `size` and `next` header and form an address ordered singly linked list threaded through
//! the buffer itself; allocated blocks carry a single `size` header in front of the payload.
//! Allocation is first fit with splitting, release coalesces with touching free neighbors.
//!
//! ```
//! use freelist_arena::{ArenaConfig, FreeListAllocator};
//!
//! let mut heap = FreeListAllocator::new(ArenaConfig::default()).unwrap();
//! let handle = heap.allocate(100).unwrap();
//! heap.payload_mut(handle).unwrap()[0] = 42;
//! assert_eq!(heap.free_remaining(), 65532 - 104);
//!
//! heap.deallocate(handle).unwrap();
//! assert_eq!(heap.largest_free(), Some(65532));
//! ```

#![no_std]
#![deny(
    missing_docs,
    trivial_casts,
    trivial_numeric_casts,
    unstable_features,
    unused_import_braces,
    unused_qualifications
)]
#![allow(unstable_name_collisions)]

extern crate alloc;

mod arena;
/// The main allocator
mod block;
mod config;
mod diagnostics;
mod error;
mod free_list;

pub use block::{Block, Blocks, FreeListAllocator, Handle};
pub use config::{ArenaConfig, HeaderWidth, OomHook, DEFAULT_CAPACITY};
pub use error::{AllocatorError, ConfigError};
pub use free_list::{FreeBlock, FreeBlocks};

use spin::Mutex;

/// An allocator shared between threads, every call is serialized by the lock
pub type SharedAllocator = Locked<FreeListAllocator>;

/// Allows putting a type behind a Mutex
#[derive(Debug)]
pub struct Locked<T> {
    inner: Mutex<T>,
}

impl<T> Locked<T> {
    /// Create a new Mutex locked type
    pub const fn new(inner: T) -> Self {
        Self {
            inner: Mutex::new(inner),
        }
    }

    /// Get the interior
    pub fn lock(&self) -> spin::MutexGuard<'_, T> {
        self.inner.lock()
    }

    /// Take the interior back out
    pub fn into_inner(self) -> T {
        self.inner.into_inner()
    }
}
