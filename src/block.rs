use bitflags::bitflags;
use core::fmt;
use sptr::Strict;

use crate::arena::{Arena, NIL};
use crate::config::{ArenaConfig, OomHook};
use crate::error::{AllocatorError, ConfigError};

/// An opaque reference to an allocation, the offset of its payload inside the arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Handle(usize);

impl Handle {
    /// Offset of the first payload byte inside the arena
    pub const fn offset(self) -> usize {
        self.0
    }
}

/// A first fit free list allocator over one fixed arena.
///
/// Free blocks are threaded through the arena itself as an address ordered singly linked
/// list; the only state outside the arena is the arena's own buffer.
pub struct FreeListAllocator {
    pub(crate) arena: Arena,
    on_out_of_memory: Option<OomHook>,
}

bitflags! {
    /// Where the free neighbors of a released block sit
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    struct Neighbors: u8 {
        /// A free block starts before the released block
        const PREVIOUS = 0b1;
        /// A free block starts after the released block
        const NEXT = 0b10;
        /// The previous free block ends exactly where the released block starts
        const TOUCHES_PREVIOUS = 0b100;
        /// The released block ends exactly where the next free block starts
        const TOUCHES_NEXT = 0b1000;
    }
}

/// A block as seen from a walk over the whole arena
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Block {
    /// Offset of the header
    pub offset: usize,
    /// Size in bytes, header included
    pub size: usize,
    /// Whether the block is on the free list
    pub free: bool,
}

/// Iterator over every block in address order, free and allocated
pub struct Blocks<'a> {
    arena: &'a Arena,
    offset: usize,
    next_free: usize,
}

impl Iterator for Blocks<'_> {
    type Item = Block;

    fn next(&mut self) -> Option<Self::Item> {
        let capacity = self.arena.capacity();
        if self.offset + self.arena.min_block() > capacity {
            return None;
        }

        let offset = self.offset;
        let free = offset == self.next_free;
        // SAFETY: checked above that a full free header fits at offset
        let size = unsafe {
            if free {
                self.next_free = self.arena.read_free_next(offset);
                self.arena.read_free_size(offset)
            } else {
                self.arena.read_alloc_size(offset)
            }
        };

        if size < self.arena.min_block() || size > capacity - offset {
            // a corrupted header ends the walk
            log::warn!("bad block header at {:#x}: size {}", offset, size);
            self.offset = capacity;
            return None;
        }

        self.offset += size;
        Some(Block { offset, size, free })
    }
}

impl FreeListAllocator {
    /// Create an allocator owning a fresh arena and initialize it
    pub fn new(config: ArenaConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let mut allocator = Self {
            arena: Arena::new(config.capacity, config.header),
            on_out_of_memory: config.on_out_of_memory,
        };
        allocator.initialize();
        Ok(allocator)
    }

    /// Reset the arena to a single free block covering everything after the head slot.
    /// Every outstanding handle becomes invalid.
    pub fn initialize(&mut self) {
        self.arena.initialize();
        log::debug!(
            "initialized arena of {} bytes, {} byte headers",
            self.arena.capacity(),
            self.arena.header()
        );
    }

    /// Total size of the arena in bytes
    pub fn capacity(&self) -> usize {
        self.arena.capacity()
    }

    /// Per block header overhead in bytes
    pub fn header_size(&self) -> usize {
        self.arena.header()
    }

    /// Walk every block in the arena in address order
    pub fn blocks(&self) -> Blocks<'_> {
        Blocks {
            arena: &self.arena,
            offset: self.arena.header(),
            next_free: self.arena.head(),
        }
    }

    /// Allocate `size` bytes with first fit.
    ///
    /// A block is taken whole when it is exactly `size + H` bytes, and split when the
    /// remainder after the allocation is larger than `2H`. Blocks in between are skipped.
    /// Payloads smaller than `H` are rounded up to `H` so the block can later be freed.
    pub fn allocate(&mut self, size: usize) -> Result<Handle, AllocatorError> {
        if size == 0 {
            return Err(AllocatorError::ZeroSize);
        }

        let header = self.arena.header();
        let payload = size.max(header);
        let needed = match payload.checked_add(header) {
            Some(needed) if needed <= self.arena.capacity() => needed,
            _ => return Err(self.out_of_memory(size)),
        };
        // a remainder must be able to store both size and next
        let split_above = needed + self.arena.min_block();

        let mut previous = NIL;
        let mut current = self.arena.head();

        while current != NIL {
            // SAFETY: current is on the free list so its header is inside the arena
            let (block_size, next) = unsafe {
                (
                    self.arena.read_free_size(current),
                    self.arena.read_free_next(current),
                )
            };

            let replacement = if block_size == needed {
                Some(next)
            } else if block_size > split_above {
                let remainder = current + needed;
                // SAFETY: the remainder is more than 2H bytes and ends where the block ends
                unsafe {
                    self.arena
                        .write_free_header(remainder, block_size - needed, next)
                };
                Some(remainder)
            } else {
                None
            };

            if let Some(replacement) = replacement {
                self.relink(previous, replacement);
                // SAFETY: current is the start of the block being handed out
                unsafe { self.arena.write_alloc_header(current, payload) };

                log::trace!(
                    "allocate({}) -> block {:#x} of {} bytes, {}",
                    size,
                    current,
                    needed,
                    if block_size == needed { "exact" } else { "split" }
                );
                return Ok(Handle(current + header));
            }

            previous = current;
            current = next;
        }

        Err(self.out_of_memory(size))
    }

    /// Make `replacement` follow `previous`, or become the head when there is no previous block
    fn relink(&mut self, previous: usize, replacement: usize) {
        if previous == NIL {
            self.arena.set_head(replacement);
        } else {
            // SAFETY: previous is on the free list
            unsafe {
                let size = self.arena.read_free_size(previous);
                self.arena.write_free_header(previous, size, replacement);
            }
        }
    }

    fn out_of_memory(&self, requested: usize) -> AllocatorError {
        log::warn!("out of memory: cannot allocate {} bytes", requested);
        if let Some(hook) = self.on_out_of_memory {
            hook(requested);
        }
        AllocatorError::OutOfMemory { requested }
    }

    /// Release an allocation, merging it with touching free neighbors.
    ///
    /// The handle is checked against the arena bounds and the current block layout, so
    /// double frees and pointers that never came from [`allocate`](Self::allocate) are
    /// reported instead of corrupting the free list.
    pub fn deallocate(&mut self, handle: Handle) -> Result<(), AllocatorError> {
        let block = self.check_handle(handle)?;
        // SAFETY: check_handle found an allocated block at this offset
        unsafe { self.release(block) };
        Ok(())
    }

    /// Release an allocation without validating the handle.
    ///
    /// # Safety
    ///
    /// `handle` must have been returned by [`allocate`](Self::allocate) on this allocator
    /// and must not have been released since.
    pub unsafe fn deallocate_unchecked(&mut self, handle: Handle) {
        self.release(handle.0 - self.arena.header());
    }

    /// Map a handle to its block offset, rejecting anything that is not a live allocation
    fn check_handle(&self, handle: Handle) -> Result<usize, AllocatorError> {
        let header = self.arena.header();
        let block = handle
            .0
            .checked_sub(header)
            .filter(|&block| {
                block >= header && block <= self.arena.capacity() - self.arena.min_block()
            })
            .ok_or_else(|| {
                log::warn!("rejected handle {:#x}: out of bounds", handle.0);
                AllocatorError::OutOfBounds { handle: handle.0 }
            })?;

        if self
            .blocks()
            .take_while(|b| b.offset <= block)
            .any(|b| b.offset == block && !b.free)
        {
            Ok(block)
        } else {
            log::warn!("rejected handle {:#x}: not allocated", handle.0);
            Err(AllocatorError::NotAllocated { handle: handle.0 })
        }
    }

    /// Put the allocated block at `block` back on the free list.
    ///
    /// # Safety
    ///
    /// `block` must be the header offset of a live allocation.
    unsafe fn release(&mut self, block: usize) {
        let block_size = self.arena.read_alloc_size(block);
        let previous = self.arena.previous_free_block(block).unwrap_or(NIL);
        let next = self.arena.next_free_block(block).unwrap_or(NIL);

        let mut neighbors = Neighbors::empty();
        if previous != NIL {
            neighbors |= Neighbors::PREVIOUS;
            if previous + self.arena.read_free_size(previous) == block {
                neighbors |= Neighbors::TOUCHES_PREVIOUS;
            }
        }
        if next != NIL {
            neighbors |= Neighbors::NEXT;
            if block + block_size == next {
                neighbors |= Neighbors::TOUCHES_NEXT;
            }
        }

        log::trace!(
            "deallocate block {:#x} of {} bytes, {:?}",
            block,
            block_size,
            neighbors
        );

        let touches_previous = neighbors.contains(Neighbors::TOUCHES_PREVIOUS);
        let touches_next = neighbors.contains(Neighbors::TOUCHES_NEXT);
        let arena = &mut self.arena;

        if !neighbors.intersects(Neighbors::PREVIOUS | Neighbors::NEXT) {
            // the list was empty
            arena.write_free_header(block, block_size, NIL);
            arena.set_head(block);
        } else if !neighbors.contains(Neighbors::NEXT) {
            let previous_size = arena.read_free_size(previous);
            let previous_next = arena.read_free_next(previous);
            if touches_previous {
                arena.write_free_header(previous, previous_size + block_size, previous_next);
            } else {
                arena.write_free_header(block, block_size, previous_next);
                arena.write_free_header(previous, previous_size, block);
            }
        } else if !neighbors.contains(Neighbors::PREVIOUS) {
            // the block becomes the new head
            if touches_next {
                let next_size = arena.read_free_size(next);
                let next_next = arena.read_free_next(next);
                arena.write_free_header(block, block_size + next_size, next_next);
            } else {
                arena.write_free_header(block, block_size, next);
            }
            arena.set_head(block);
        } else {
            let previous_size = arena.read_free_size(previous);
            let next_size = arena.read_free_size(next);
            let next_next = arena.read_free_next(next);
            match (touches_previous, touches_next) {
                (true, true) => {
                    arena.write_free_header(
                        previous,
                        previous_size + block_size + next_size,
                        next_next,
                    );
                }
                (false, true) => {
                    arena.write_free_header(block, block_size + next_size, next_next);
                    arena.write_free_header(previous, previous_size, block);
                }
                // previous still points past the released block to next
                (true, false) => {
                    arena.write_free_header(previous, previous_size + block_size, next);
                }
                (false, false) => {
                    arena.write_free_header(previous, previous_size, block);
                    arena.write_free_header(block, block_size, next);
                }
            }
        }
    }

    /// The payload bytes of a live allocation
    pub fn payload(&self, handle: Handle) -> Result<&[u8], AllocatorError> {
        let block = self.check_handle(handle)?;
        // SAFETY: block is a live allocation
        let end = block + unsafe { self.arena.read_alloc_size(block) };
        Ok(&self.arena.bytes()[handle.0..end])
    }

    /// The payload bytes of a live allocation, mutably
    pub fn payload_mut(&mut self, handle: Handle) -> Result<&mut [u8], AllocatorError> {
        let block = self.check_handle(handle)?;
        // SAFETY: block is a live allocation
        let end = block + unsafe { self.arena.read_alloc_size(block) };
        Ok(&mut self.arena.bytes_mut()[handle.0..end])
    }

    /// Recover the handle of a payload pointer previously taken from this arena.
    ///
    /// Pointers outside the arena buffer are reported as [`AllocatorError::ForeignPointer`].
    pub fn handle_from_ptr(&self, ptr: *const u8) -> Result<Handle, AllocatorError> {
        let base = Strict::addr(self.arena.bytes().as_ptr());
        let address = Strict::addr(ptr);
        let offset = address
            .checked_sub(base)
            .filter(|&offset| offset < self.arena.capacity())
            .ok_or(AllocatorError::ForeignPointer { address })?;
        let handle = Handle(offset);
        self.check_handle(handle)?;
        Ok(handle)
    }
}

impl fmt::Debug for FreeListAllocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        #[derive(Debug)]
        #[allow(dead_code)]
        struct Entry {
            offset: Hex,
            size: usize,
            free: bool,
        }

        struct Hex(usize);

        impl fmt::Debug for Hex {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{:#X}", self.0)
            }
        }

        f.debug_list()
            .entries(self.blocks().map(|block| Entry {
                offset: Hex(block.offset),
                size: block.size,
                free: block.free,
            }))
            .finish()
    }
}
