use crate::arena::{Arena, NIL};

/// A free block as seen from the free list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FreeBlock {
    /// Offset of the block header inside the arena
    pub offset: usize,
    /// Size of the block in bytes, header included
    pub size: usize,
}

/// Iterator over the free list in address order
pub struct FreeBlocks<'a> {
    arena: &'a Arena,
    current: usize,
}

impl Iterator for FreeBlocks<'_> {
    type Item = FreeBlock;

    fn next(&mut self) -> Option<Self::Item> {
        if self.current == NIL {
            return None;
        }
        let offset = self.current;
        // SAFETY: every offset reachable from the head is a free header inside the arena
        let (size, next) = unsafe {
            (
                self.arena.read_free_size(offset),
                self.arena.read_free_next(offset),
            )
        };
        self.current = next;
        Some(FreeBlock { offset, size })
    }
}

impl Arena {
    /// Walk the free list starting from the head
    pub(crate) fn free_list(&self) -> FreeBlocks<'_> {
        FreeBlocks {
            arena: self,
            current: self.head(),
        }
    }

    /// The last free block that starts strictly before `address`
    pub(crate) fn previous_free_block(&self, address: usize) -> Option<usize> {
        // the list is address ordered, stop at the first block past the address
        self.free_list()
            .take_while(|block| block.offset < address)
            .last()
            .map(|block| block.offset)
    }

    /// The first free block that starts strictly after `address`
    pub(crate) fn next_free_block(&self, address: usize) -> Option<usize> {
        self.free_list()
            .find(|block| block.offset > address)
            .map(|block| block.offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HeaderWidth;
    use alloc::vec::Vec;

    /// Build an arena with free blocks at (offset, size) linked in the given order
    fn arena_with(blocks: &[(usize, usize)]) -> Arena {
        let mut arena = Arena::new(1024, HeaderWidth::U32);
        arena.set_head(blocks.first().map_or(NIL, |b| b.0));
        for (i, &(offset, size)) in blocks.iter().enumerate() {
            let next = blocks.get(i + 1).map_or(NIL, |b| b.0);
            unsafe { arena.write_free_header(offset, size, next) };
        }
        arena
    }

    /// Test that the iterator follows the links
    #[test]
    fn walk() {
        let arena = arena_with(&[(4, 16), (100, 32), (500, 524)]);
        let blocks: Vec<_> = arena.free_list().map(|b| (b.offset, b.size)).collect();
        assert_eq!(blocks, [(4, 16), (100, 32), (500, 524)]);
    }

    /// Test that nothing is found on an empty list
    #[test]
    fn empty() {
        let arena = arena_with(&[]);
        assert_eq!(arena.free_list().count(), 0);
        assert_eq!(arena.previous_free_block(200), None);
        assert_eq!(arena.next_free_block(200), None);
    }

    /// Test the bracket around an address with a single block
    #[test]
    fn single_block() {
        let arena = arena_with(&[(100, 32)]);
        assert_eq!(arena.previous_free_block(50), None);
        assert_eq!(arena.next_free_block(50), Some(100));
        assert_eq!(arena.previous_free_block(200), Some(100));
        assert_eq!(arena.next_free_block(200), None);
    }

    /// Test the bracket around addresses between several blocks
    #[test]
    fn bracket() {
        let arena = arena_with(&[(4, 16), (100, 32), (500, 524)]);

        assert_eq!(arena.previous_free_block(60), Some(4));
        assert_eq!(arena.next_free_block(60), Some(100));

        assert_eq!(arena.previous_free_block(300), Some(100));
        assert_eq!(arena.next_free_block(300), Some(500));

        assert_eq!(arena.previous_free_block(700), Some(500));
        assert_eq!(arena.next_free_block(700), None);
    }

    /// Test that the comparisons are strict
    #[test]
    fn strict_bounds() {
        let arena = arena_with(&[(4, 16), (100, 32)]);
        assert_eq!(arena.previous_free_block(4), None);
        assert_eq!(arena.previous_free_block(100), Some(4));
        assert_eq!(arena.next_free_block(100), None);
        assert_eq!(arena.next_free_block(4), Some(100));
    }
}
