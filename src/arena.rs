use alloc::boxed::Box;
use alloc::vec;

use crate::config::HeaderWidth;

/// Offset of the free list head pointer
const HEAD: usize = 0;

/// The sentinel stored in the head slot and in `next` fields for "no block"
pub(crate) const NIL: usize = 0;

/// The fixed backing buffer and the encoding of header fields inside it.
///
/// Layout:
///
/// ```text
/// | head | free: size, next | alloc: size, payload ... | free: size, next | ...
/// 0      H
/// ```
///
/// Every field is `H` bytes wide and little endian. Field access is unchecked, callers
/// guarantee that `offset + field width` never runs past the buffer.
pub(crate) struct Arena {
    bytes: Box<[u8]>,
    width: HeaderWidth,
}

impl Arena {
    /// Allocate a zeroed arena. The layout is not valid until [`Arena::initialize`] runs.
    pub(crate) fn new(capacity: usize, width: HeaderWidth) -> Self {
        debug_assert!(capacity >= width.bytes() * 3);
        Self {
            bytes: vec![0u8; capacity].into_boxed_slice(),
            width,
        }
    }

    /// Point the head at one free block spanning everything after the head slot
    pub(crate) fn initialize(&mut self) {
        let header = self.header();
        self.set_head(header);
        // SAFETY: capacity is at least 3H so a free header fits at offset H
        unsafe { self.write_free_header(header, self.capacity() - header, NIL) };
    }

    /// Total size in bytes
    #[inline]
    pub(crate) fn capacity(&self) -> usize {
        self.bytes.len()
    }

    /// Per block header overhead, `H`
    #[inline]
    pub(crate) fn header(&self) -> usize {
        self.width.bytes()
    }

    /// The smallest block that can later host a free header
    #[inline]
    pub(crate) fn min_block(&self) -> usize {
        self.header() * 2
    }

    pub(crate) fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub(crate) fn bytes_mut(&mut self) -> &mut [u8] {
        &mut self.bytes
    }

    /// Read one field.
    ///
    /// # Safety
    ///
    /// `offset + H` must not exceed the capacity.
    #[inline]
    unsafe fn read_field(&self, offset: usize) -> usize {
        debug_assert!(offset + self.header() <= self.capacity());
        let ptr = self.bytes.as_ptr().add(offset);
        match self.width {
            HeaderWidth::U32 => u32::from_le_bytes(ptr.cast::<[u8; 4]>().read_unaligned()) as usize,
            HeaderWidth::U64 => u64::from_le_bytes(ptr.cast::<[u8; 8]>().read_unaligned()) as usize,
        }
    }

    /// Write one field.
    ///
    /// # Safety
    ///
    /// `offset + H` must not exceed the capacity.
    #[inline]
    unsafe fn write_field(&mut self, offset: usize, value: usize) {
        debug_assert!(offset + self.header() <= self.capacity());
        debug_assert!(value as u64 <= self.width.max_value());
        let ptr = self.bytes.as_mut_ptr().add(offset);
        match self.width {
            HeaderWidth::U32 => ptr
                .cast::<[u8; 4]>()
                .write_unaligned((value as u32).to_le_bytes()),
            HeaderWidth::U64 => ptr
                .cast::<[u8; 8]>()
                .write_unaligned((value as u64).to_le_bytes()),
        }
    }

    /// Store the offset of the first free block, [`NIL`] for an empty list
    pub(crate) fn set_head(&mut self, offset: usize) {
        // SAFETY: the head slot always fits, capacity >= 3H
        unsafe { self.write_field(HEAD, offset) }
    }

    /// Offset of the first free block, [`NIL`] for an empty list
    pub(crate) fn head(&self) -> usize {
        // SAFETY: the head slot always fits, capacity >= 3H
        unsafe { self.read_field(HEAD) }
    }

    /// Write an allocation header, the stored size is `payload + H`.
    ///
    /// # Safety
    ///
    /// `offset + H` must not exceed the capacity.
    pub(crate) unsafe fn write_alloc_header(&mut self, offset: usize, payload: usize) {
        self.write_field(offset, payload + self.header());
    }

    /// Total block size recorded in an allocation header.
    ///
    /// # Safety
    ///
    /// `offset + H` must not exceed the capacity.
    pub(crate) unsafe fn read_alloc_size(&self, offset: usize) -> usize {
        self.read_field(offset)
    }

    /// Write a free header, `size` includes the header itself.
    ///
    /// # Safety
    ///
    /// `offset + 2H` must not exceed the capacity.
    pub(crate) unsafe fn write_free_header(&mut self, offset: usize, size: usize, next: usize) {
        let header = self.header();
        self.write_field(offset, size);
        self.write_field(offset + header, next);
    }

    /// # Safety
    ///
    /// `offset + H` must not exceed the capacity.
    pub(crate) unsafe fn read_free_size(&self, offset: usize) -> usize {
        self.read_field(offset)
    }

    /// # Safety
    ///
    /// `offset + 2H` must not exceed the capacity.
    pub(crate) unsafe fn read_free_next(&self, offset: usize) -> usize {
        self.read_field(offset + self.header())
    }
}
