/// Buffer descriptor types

/// What the buffer is bound as
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferType {
    Vertex,
    Index,
    Uniform,
    Storage,
}

/// Memory residency class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferUsage {
    /// Device-local after a one-time upload, never mapped afterwards
    Static,
    /// Host-visible and persistently mapped, updated by the CPU every frame
    Dynamic,
}

/// Descriptor for creating a buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferDesc {
    /// Size in bytes (must be > 0)
    pub size: u64,
    pub buffer_type: BufferType,
    pub usage: BufferUsage,
}

impl BufferDesc {
    pub fn new(buffer_type: BufferType, size: u64, usage: BufferUsage) -> Self {
        Self { size, buffer_type, usage }
    }

    /// Size of `count` records of `T`
    pub fn for_records<T>(buffer_type: BufferType, count: usize, usage: BufferUsage) -> Self {
        Self::new(buffer_type, (std::mem::size_of::<T>() * count) as u64, usage)
    }
}

#[cfg(test)]
#[path = "buffer_tests.rs"]
mod tests;
