/// GPU buffers and the staging upload protocol
///
/// Every buffer starts as a host-visible staging buffer. Dynamic buffers stay
/// there (persistently mapped); static buffers are copied into device-local
/// memory through the device's temp command buffer, and the staging buffer
/// is released before `create_buffer` returns.

use ash::vk;
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme};
use gpu_allocator::MemoryLocation;
use lumen_engine::lumen::resource::{BufferDesc, BufferType, BufferUsage};
use lumen_engine::lumen::{Error, Result};
use lumen_engine::{engine_bail_warn, engine_err, engine_error, engine_warn};
use std::ptr::NonNull;

use crate::vulkan_device::GraphicsDevice;

const SOURCE: &str = "lumen::vulkan";

/// A buffer handle with its memory
pub struct GpuBuffer {
    pub(crate) buffer: vk::Buffer,
    size: u64,
    buffer_type: BufferType,
    usage: BufferUsage,
    allocation: Option<Allocation>,
}

impl GpuBuffer {
    pub fn handle(&self) -> vk::Buffer {
        self.buffer
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn buffer_type(&self) -> BufferType {
        self.buffer_type
    }

    pub fn usage(&self) -> BufferUsage {
        self.usage
    }

    /// Persistent CPU mapping. Present exactly for dynamic buffers.
    pub fn mapped_ptr(&self) -> Option<NonNull<u8>> {
        if self.usage != BufferUsage::Dynamic {
            return None;
        }
        self.allocation
            .as_ref()
            .and_then(|allocation| allocation.mapped_ptr())
            .map(|ptr| ptr.cast::<u8>())
    }

    /// Copy `data` into the mapping at `offset`
    pub fn write(&self, offset: u64, data: &[u8]) -> Result<()> {
        let Some(mapped) = self.mapped_ptr() else {
            engine_bail_warn!(SOURCE, "write() on a buffer without CPU mapping (usage {:?})", self.usage);
        };
        let in_bounds = offset
            .checked_add(data.len() as u64)
            .is_some_and(|end| end <= self.size);
        if !in_bounds {
            engine_bail_warn!(SOURCE, "write of {} bytes at offset {} exceeds buffer size {}",
                data.len(), offset, self.size);
        }

        unsafe {
            std::ptr::copy_nonoverlapping(
                data.as_ptr(),
                mapped.as_ptr().add(offset as usize),
                data.len(),
            );
        }
        Ok(())
    }

    /// Write GPU records starting at record `first`
    pub fn write_records<T: bytemuck::Pod>(&self, first: usize, records: &[T]) -> Result<()> {
        let Some(offset) = record_offset(first, std::mem::size_of::<T>()) else {
            engine_bail_warn!(SOURCE, "Record index {} overflows the buffer offset range", first);
        };
        self.write(offset, bytemuck::cast_slice(records))
    }

    /// Release the buffer and its memory
    pub fn destroy(mut self, device: &GraphicsDevice) -> Result<()> {
        let allocation = self.allocation.take();
        let buffer = std::mem::replace(&mut self.buffer, vk::Buffer::null());
        release_buffer(device, buffer, allocation)
    }
}

/// Byte offset of record `first`, `None` on overflow
pub(crate) fn record_offset(first: usize, record_size: usize) -> Option<u64> {
    first
        .checked_mul(record_size)
        .and_then(|offset| u64::try_from(offset).ok())
}

impl Drop for GpuBuffer {
    fn drop(&mut self) {
        if self.allocation.is_some() {
            engine_warn!(SOURCE, "GpuBuffer ({} bytes, {:?}) dropped without destroy(); its memory leaks",
                self.size, self.buffer_type);
        }
    }
}

fn type_usage_flags(buffer_type: BufferType) -> vk::BufferUsageFlags {
    match buffer_type {
        BufferType::Vertex => vk::BufferUsageFlags::VERTEX_BUFFER,
        BufferType::Index => vk::BufferUsageFlags::INDEX_BUFFER,
        BufferType::Uniform => vk::BufferUsageFlags::UNIFORM_BUFFER,
        BufferType::Storage => vk::BufferUsageFlags::STORAGE_BUFFER,
    }
}

/// Create a buffer and bind freshly allocated memory to it
pub(crate) fn allocate_buffer(
    device: &GraphicsDevice,
    size: u64,
    usage: vk::BufferUsageFlags,
    location: MemoryLocation,
    name: &str,
) -> Result<(vk::Buffer, Allocation)> {
    let vk_device = device.device();
    unsafe {
        let buffer_create_info = vk::BufferCreateInfo::default()
            .size(size)
            .usage(usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);

        let buffer = vk_device.create_buffer(&buffer_create_info, None)
            .map_err(|e| engine_err!(SOURCE, "Failed to create buffer of size {} bytes: {:?}", size, e))?;

        let requirements = vk_device.get_buffer_memory_requirements(buffer);

        let allocated = device.allocator().and_then(|mut allocator| {
            allocator.allocate(&AllocationCreateDesc {
                name,
                requirements,
                location,
                linear: true,
                allocation_scheme: AllocationScheme::GpuAllocatorManaged,
            })
            .map_err(|_e| {
                let size_mb = requirements.size as f64 / (1024.0 * 1024.0);
                engine_error!(SOURCE, "Out of GPU memory for buffer '{}' (required: {:.2} MB)", name, size_mb);
                Error::OutOfMemory
            })
        });
        let allocation = match allocated {
            Ok(allocation) => allocation,
            Err(e) => {
                vk_device.destroy_buffer(buffer, None);
                return Err(e);
            }
        };

        if let Err(e) = vk_device.bind_buffer_memory(buffer, allocation.memory(), allocation.offset()) {
            release_buffer(device, buffer, Some(allocation))?;
            return Err(engine_err!(SOURCE, "Failed to bind buffer memory: {:?}", e));
        }

        Ok((buffer, allocation))
    }
}

/// Free the allocation (if any) and destroy the handle
pub(crate) fn release_buffer(
    device: &GraphicsDevice,
    buffer: vk::Buffer,
    allocation: Option<Allocation>,
) -> Result<()> {
    let freed = match allocation {
        Some(allocation) => device.allocator().and_then(|mut allocator| {
            allocator.free(allocation)
                .map_err(|e| engine_err!(SOURCE, "Failed to free buffer memory: {:?}", e))
        }),
        None => Ok(()),
    };
    unsafe {
        device.device().destroy_buffer(buffer, None);
    }
    freed
}

/// Create a buffer, uploading `initial_data` when given
///
/// Blocks until a static upload has completed on the GPU.
pub fn create_buffer(
    device: &GraphicsDevice,
    desc: &BufferDesc,
    initial_data: Option<&[u8]>,
) -> Result<GpuBuffer> {
    if desc.size == 0 {
        engine_bail_warn!(SOURCE, "Cannot create a zero-sized {:?} buffer", desc.buffer_type);
    }
    if let Some(data) = initial_data {
        if data.len() as u64 > desc.size {
            engine_bail_warn!(SOURCE, "Initial data ({} bytes) exceeds buffer size ({} bytes)",
                data.len(), desc.size);
        }
    }

    let type_usage = type_usage_flags(desc.buffer_type);
    let (staging, staging_allocation) = allocate_buffer(
        device,
        desc.size,
        vk::BufferUsageFlags::TRANSFER_SRC | vk::BufferUsageFlags::TRANSFER_DST | type_usage,
        MemoryLocation::CpuToGpu,
        "staging buffer",
    )?;

    let staging = GpuBuffer {
        buffer: staging,
        size: desc.size,
        buffer_type: desc.buffer_type,
        usage: BufferUsage::Dynamic,
        allocation: Some(staging_allocation),
    };
    if let Some(data) = initial_data {
        if let Err(e) = staging.write(0, data) {
            staging.destroy(device)?;
            return Err(e);
        }
    }

    if desc.usage == BufferUsage::Dynamic {
        return Ok(staging);
    }

    let (buffer, allocation) = match allocate_buffer(
        device,
        desc.size,
        vk::BufferUsageFlags::TRANSFER_DST | vk::BufferUsageFlags::TRANSFER_SRC | type_usage,
        MemoryLocation::GpuOnly,
        "device buffer",
    ) {
        Ok(created) => created,
        Err(e) => {
            staging.destroy(device)?;
            return Err(e);
        }
    };
    let gpu_buffer = GpuBuffer {
        buffer,
        size: desc.size,
        buffer_type: desc.buffer_type,
        usage: BufferUsage::Static,
        allocation: Some(allocation),
    };

    let uploaded = match initial_data {
        Some(data) => device.submit_one_off(|command_buffer| {
            let region = vk::BufferCopy::default().size(data.len() as u64);
            unsafe {
                device.device().cmd_copy_buffer(command_buffer, staging.buffer, gpu_buffer.buffer, &[region]);
            }
            Ok(())
        }),
        None => Ok(()),
    };

    let released = staging.destroy(device);
    if let Err(e) = uploaded.and(released) {
        gpu_buffer.destroy(device)?;
        return Err(e);
    }

    Ok(gpu_buffer)
}

/// Copy the whole contents of `buffer` back to the CPU
pub fn download_buffer(device: &GraphicsDevice, buffer: &GpuBuffer) -> Result<Vec<u8>> {
    let (readback, allocation) = allocate_buffer(
        device,
        buffer.size,
        vk::BufferUsageFlags::TRANSFER_DST,
        MemoryLocation::GpuToCpu,
        "readback buffer",
    )?;

    let copied = device.submit_one_off(|command_buffer| {
        let region = vk::BufferCopy::default().size(buffer.size);
        unsafe {
            device.device().cmd_copy_buffer(command_buffer, buffer.buffer, readback, &[region]);
        }
        Ok(())
    });

    let bytes = copied.and_then(|_| read_mapped(&allocation, buffer.size as usize));
    release_buffer(device, readback, Some(allocation))?;
    bytes
}

/// Copy `len` bytes out of a host-visible allocation
pub(crate) fn read_mapped(allocation: &Allocation, len: usize) -> Result<Vec<u8>> {
    let Some(slice) = allocation.mapped_slice() else {
        return Err(engine_err!(SOURCE, "Readback memory is not host visible"));
    };
    match slice.get(..len) {
        Some(bytes) => Ok(bytes.to_vec()),
        None => Err(engine_err!(SOURCE, "Readback of {} bytes exceeds mapping of {} bytes", len, slice.len())),
    }
}

#[cfg(test)]
#[path = "vulkan_buffer_tests.rs"]
mod tests;
