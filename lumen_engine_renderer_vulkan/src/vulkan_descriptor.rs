/// Descriptor pool, set allocation and descriptor writes

use ash::vk;
use lumen_engine::lumen::Result;
use lumen_engine::{engine_bail_warn, engine_err, engine_warn};

use crate::vulkan_buffer::GpuBuffer;
use crate::vulkan_device::GraphicsDevice;

const SOURCE: &str = "lumen::vulkan";

/// Descriptors of each type available in an engine pool
const DESCRIPTORS_PER_TYPE: u32 = 100;

/// Pool sizes of the engine descriptor pool
pub fn descriptor_pool_sizes() -> [vk::DescriptorPoolSize; 6] {
    [
        vk::DescriptorType::UNIFORM_BUFFER,
        vk::DescriptorType::STORAGE_BUFFER,
        vk::DescriptorType::STORAGE_IMAGE,
        vk::DescriptorType::SAMPLED_IMAGE,
        vk::DescriptorType::SAMPLER,
        vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
    ]
    .map(|ty| vk::DescriptorPoolSize {
        ty,
        descriptor_count: DESCRIPTORS_PER_TYPE,
    })
}

/// A descriptor pool; its sets are freed with it
pub struct DescriptorPool {
    pool: vk::DescriptorPool,
    max_sets: u32,
}

impl DescriptorPool {
    pub fn handle(&self) -> vk::DescriptorPool {
        self.pool
    }

    pub fn max_sets(&self) -> u32 {
        self.max_sets
    }

    pub fn destroy(mut self, device: &GraphicsDevice) {
        unsafe {
            device.device().destroy_descriptor_pool(self.pool, None);
        }
        self.pool = vk::DescriptorPool::null();
    }
}

impl Drop for DescriptorPool {
    fn drop(&mut self) {
        if self.pool != vk::DescriptorPool::null() {
            engine_warn!(SOURCE, "DescriptorPool dropped without destroy(); pool leaks");
        }
    }
}

pub fn create_descriptor_pool(device: &GraphicsDevice, max_sets: u32) -> Result<DescriptorPool> {
    let pool_sizes = descriptor_pool_sizes();
    let create_info = vk::DescriptorPoolCreateInfo::default()
        .max_sets(max_sets)
        .pool_sizes(&pool_sizes);

    let pool = unsafe {
        device.device().create_descriptor_pool(&create_info, None)
            .map_err(|e| engine_err!(SOURCE, "Failed to create descriptor pool: {:?}", e))?
    };

    Ok(DescriptorPool { pool, max_sets })
}

/// Allocate `count` sets sharing one layout
pub fn allocate_descriptor_sets(
    device: &GraphicsDevice,
    pool: &DescriptorPool,
    layout: vk::DescriptorSetLayout,
    count: u32,
) -> Result<Vec<vk::DescriptorSet>> {
    if count == 0 {
        engine_bail_warn!(SOURCE, "allocate_descriptor_sets: count must be at least 1");
    }

    let layouts = vec![layout; count as usize];
    let alloc_info = vk::DescriptorSetAllocateInfo::default()
        .descriptor_pool(pool.pool)
        .set_layouts(&layouts);

    unsafe {
        device.device().allocate_descriptor_sets(&alloc_info)
            .map_err(|e| engine_err!(SOURCE, "Failed to allocate {} descriptor sets: {:?}", count, e))
    }
}

/// Point `binding` of `set` at the whole of `buffer`
pub fn write_buffer_descriptor(
    device: &GraphicsDevice,
    set: vk::DescriptorSet,
    binding: u32,
    descriptor_type: vk::DescriptorType,
    buffer: &GpuBuffer,
) {
    let buffer_info = [vk::DescriptorBufferInfo {
        buffer: buffer.handle(),
        offset: 0,
        range: vk::WHOLE_SIZE,
    }];
    let write = vk::WriteDescriptorSet::default()
        .dst_set(set)
        .dst_binding(binding)
        .dst_array_element(0)
        .descriptor_type(descriptor_type)
        .buffer_info(&buffer_info);

    unsafe {
        device.device().update_descriptor_sets(&[write], &[]);
    }
}

/// Point `binding` of `set` at an image view (and sampler, for sampler types)
pub fn write_image_descriptor(
    device: &GraphicsDevice,
    set: vk::DescriptorSet,
    binding: u32,
    descriptor_type: vk::DescriptorType,
    view: vk::ImageView,
    layout: vk::ImageLayout,
    sampler: vk::Sampler,
) {
    let image_info = [vk::DescriptorImageInfo {
        sampler,
        image_view: view,
        image_layout: layout,
    }];
    let write = vk::WriteDescriptorSet::default()
        .dst_set(set)
        .dst_binding(binding)
        .dst_array_element(0)
        .descriptor_type(descriptor_type)
        .image_info(&image_info);

    unsafe {
        device.device().update_descriptor_sets(&[write], &[]);
    }
}

#[cfg(test)]
#[path = "vulkan_descriptor_tests.rs"]
mod tests;
