use crate::error::ConfigError;

/// The reference arena capacity in bytes
pub const DEFAULT_CAPACITY: usize = 65536;

/// Called with the requested payload size whenever an allocation cannot be satisfied
pub type OomHook = fn(requested: usize);

/// Width of every header field stored inside the arena. Fields are always little endian.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HeaderWidth {
    /// 4 byte fields, the reference layout
    #[default]
    U32,
    /// 8 byte fields
    U64,
}

impl HeaderWidth {
    /// Number of bytes a single field occupies
    pub const fn bytes(self) -> usize {
        match self {
            Self::U32 => 4,
            Self::U64 => 8,
        }
    }

    /// Largest value a field can hold
    pub const fn max_value(self) -> u64 {
        match self {
            Self::U32 => u32::MAX as u64,
            Self::U64 => u64::MAX,
        }
    }
}

/// Construction parameters of a [`FreeListAllocator`](crate::FreeListAllocator)
#[derive(Debug, Clone, Copy)]
pub struct ArenaConfig {
    /// Total size of the arena in bytes, head slot included
    pub capacity: usize,
    /// Width of the header fields
    pub header: HeaderWidth,
    /// Optional hook run once for every failed allocation
    pub on_out_of_memory: Option<OomHook>,
}

impl ArenaConfig {
    /// Reference configuration: 64 KiB arena with 4 byte headers
    pub const fn new() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            header: HeaderWidth::U32,
            on_out_of_memory: None,
        }
    }

    /// Set the arena capacity
    pub const fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Set the header field width
    pub const fn with_header(mut self, header: HeaderWidth) -> Self {
        self.header = header;
        self
    }

    /// Install a hook that observes out of memory failures
    pub const fn with_oom_hook(mut self, hook: OomHook) -> Self {
        self.on_out_of_memory = Some(hook);
        self
    }

    /// The smallest arena that can hold the head slot and one free block
    pub const fn minimum_capacity(&self) -> usize {
        self.header.bytes() * 3
    }

    /// Check that the arena can be laid out with this configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        let minimum = self.minimum_capacity();
        if self.capacity < minimum {
            return Err(ConfigError::CapacityTooSmall {
                capacity: self.capacity,
                minimum,
            });
        }

        // every offset and size must fit into one field
        let maximum = self.header.max_value();
        if self.capacity as u64 > maximum {
            return Err(ConfigError::CapacityTooLarge {
                capacity: self.capacity,
                maximum,
            });
        }

        Ok(())
    }
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self::new()
    }
}
