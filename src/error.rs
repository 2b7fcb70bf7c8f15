use thiserror::Error;

/// Errors returned by the allocator
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocatorError {
    /// A zero byte allocation was requested
    #[error("allocation size must be non-zero")]
    ZeroSize,

    /// No free block can hold the request
    #[error("out of memory: no free block can hold {requested} bytes")]
    OutOfMemory {
        /// Requested payload size
        requested: usize,
    },

    /// The handle cannot point at a payload inside the arena
    #[error("handle {handle:#x} is outside the arena")]
    OutOfBounds {
        /// Offending payload offset
        handle: usize,
    },

    /// A raw pointer does not point into the arena buffer
    #[error("pointer {address:#x} does not point into the arena")]
    ForeignPointer {
        /// Machine address of the pointer
        address: usize,
    },

    /// The handle is inside the arena but does not start a live allocation
    #[error("handle {handle:#x} does not refer to an allocated block")]
    NotAllocated {
        /// Offending payload offset
        handle: usize,
    },
}

/// Errors returned when building an allocator
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// The arena cannot hold the head slot and a single free block
    #[error("arena capacity {capacity} is below the minimum of {minimum} bytes")]
    CapacityTooSmall {
        /// Requested capacity
        capacity: usize,
        /// Smallest usable capacity
        minimum: usize,
    },

    /// The capacity does not fit into a header field
    #[error("arena capacity {capacity} does not fit in a header field (max {maximum})")]
    CapacityTooLarge {
        /// Requested capacity
        capacity: usize,
        /// Largest value a header field holds
        maximum: u64,
    },
}
