//! Read only scans over the free list

use crate::arena::NIL;
use crate::free_list::FreeBlocks;
use crate::FreeListAllocator;

impl FreeListAllocator {
    /// Walk the free list in address order
    pub fn free_blocks(&self) -> FreeBlocks<'_> {
        self.arena.free_list()
    }

    /// Offset of the first free block, `None` when nothing is free
    pub fn head(&self) -> Option<usize> {
        Some(self.arena.head()).filter(|&head| head != NIL)
    }

    /// Total bytes held by free blocks, headers included. Logs every free block it visits.
    pub fn free_remaining(&self) -> usize {
        self.free_blocks()
            .inspect(|block| log::debug!("free block at {}: {} bytes", block.offset, block.size))
            .map(|block| block.size)
            .sum()
    }

    /// Size of the largest free block, `None` when nothing is free
    pub fn largest_free(&self) -> Option<usize> {
        let largest = self.free_blocks().map(|block| block.size).max();
        log::debug!("largest free block: {:?}", largest);
        largest
    }

    /// Size of the smallest free block, `None` when nothing is free
    pub fn smallest_free(&self) -> Option<usize> {
        let smallest = self.free_blocks().map(|block| block.size).min();
        log::debug!("smallest free block: {:?}", smallest);
        smallest
    }
}

#[cfg(test)]
mod tests {
    use crate::{ArenaConfig, FreeBlock, FreeListAllocator};
    extern crate std;
    use std::cell::RefCell;
    use std::string::{String, ToString};
    use std::sync::Once;
    use std::vec::Vec;

    std::thread_local! {
        static CAPTURED: RefCell<Vec<(log::Level, String)>> = const { RefCell::new(Vec::new()) };
    }

    /// Keeps every record on the logging thread, tests run on their own threads
    struct CaptureLogger;

    impl log::Log for CaptureLogger {
        fn enabled(&self, _metadata: &log::Metadata<'_>) -> bool {
            true
        }

        fn log(&self, record: &log::Record<'_>) {
            CAPTURED.with(|captured| {
                captured
                    .borrow_mut()
                    .push((record.level(), record.args().to_string()))
            });
        }

        fn flush(&self) {}
    }

    static LOGGER: CaptureLogger = CaptureLogger;
    static INSTALL: Once = Once::new();

    fn capture_logs() {
        INSTALL.call_once(|| {
            log::set_logger(&LOGGER).unwrap();
            log::set_max_level(log::LevelFilter::Trace);
        });
        CAPTURED.with(|captured| captured.borrow_mut().clear());
    }

    /// Debug lines describing single free blocks, in the order they were logged
    fn free_block_lines() -> Vec<String> {
        CAPTURED.with(|captured| {
            captured
                .borrow()
                .iter()
                .filter(|(level, line)| *level == log::Level::Debug && line.starts_with("free block at"))
                .map(|(_, line)| line.clone())
                .collect()
        })
    }

    fn new_heap() -> FreeListAllocator {
        FreeListAllocator::new(ArenaConfig::default()).unwrap()
    }

    /// Test the state right after initialization
    #[test]
    fn initial() {
        let heap = new_heap();
        assert_eq!(heap.free_remaining(), 65532);
        assert_eq!(heap.head(), Some(4));
        assert_eq!(heap.largest_free(), Some(65532));
        assert_eq!(heap.smallest_free(), Some(65532));

        let mut blocks = heap.free_blocks();
        assert_eq!(
            blocks.next(),
            Some(FreeBlock {
                offset: 4,
                size: 65532
            })
        );
        assert_eq!(blocks.next(), None);
    }

    /// Test extremes over several free blocks
    #[test]
    fn extremes() {
        let mut heap = new_heap();
        let a = heap.allocate(100).unwrap();
        heap.allocate(8).unwrap();
        let c = heap.allocate(20).unwrap();
        heap.allocate(8).unwrap();
        heap.deallocate(a).unwrap();
        heap.deallocate(c).unwrap();

        assert_eq!(heap.smallest_free(), Some(24));
        assert_eq!(heap.largest_free(), Some(65532 - 104 - 12 - 24 - 12));
        assert_eq!(heap.free_remaining(), 65532 - 24);
    }

    /// Test that an empty free list reports no space instead of reading the head slot
    #[test]
    fn empty_list() {
        let mut heap = new_heap();
        heap.allocate(65528).unwrap();
        assert_eq!(heap.head(), None);
        assert_eq!(heap.free_remaining(), 0);
        assert_eq!(heap.largest_free(), None);
        assert_eq!(heap.smallest_free(), None);
        assert_eq!(heap.free_blocks().count(), 0);
    }

    /// Test that repeated queries return the same results
    #[test]
    fn idempotent() {
        let mut heap = new_heap();
        let a = heap.allocate(300).unwrap();
        heap.allocate(50).unwrap();
        heap.deallocate(a).unwrap();

        let first = (heap.free_remaining(), heap.largest_free(), heap.smallest_free());
        for _ in 0..3 {
            let again = (heap.free_remaining(), heap.largest_free(), heap.smallest_free());
            assert_eq!(first, again);
        }
    }

    /// Test that free_remaining logs one line per free block it visits
    #[test]
    fn free_remaining_logs_blocks() {
        let mut heap = new_heap();
        let a = heap.allocate(100).unwrap();
        heap.allocate(8).unwrap();
        let c = heap.allocate(20).unwrap();
        heap.allocate(8).unwrap();
        heap.deallocate(a).unwrap();
        heap.deallocate(c).unwrap();

        capture_logs();
        assert_eq!(heap.free_remaining(), 65532 - 24);
        assert_eq!(
            free_block_lines(),
            [
                "free block at 4: 104 bytes",
                "free block at 120: 24 bytes",
                "free block at 156: 65380 bytes",
            ]
        );

        // nothing free, nothing logged
        capture_logs();
        heap.initialize();
        heap.allocate(65528).unwrap();
        assert_eq!(heap.free_remaining(), 0);
        assert!(free_block_lines().is_empty());
    }
}
