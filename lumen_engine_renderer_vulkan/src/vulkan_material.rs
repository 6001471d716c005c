/// MaterialManager - material records and the samplers they index

use ash::vk;
use lumen_engine::glam::Vec3;
use lumen_engine::lumen::resource::Material;
use lumen_engine::lumen::Result;
use lumen_engine::{engine_debug, engine_err, engine_warn};

use crate::vulkan_device::GraphicsDevice;

const SOURCE: &str = "lumen::vulkan";

/// Repeat addressing, nearest minification, linear magnification and mip
/// blending, LOD range covering `mip_levels` levels
pub fn sampler_create_info(mip_levels: u32) -> vk::SamplerCreateInfo<'static> {
    vk::SamplerCreateInfo::default()
        .mag_filter(vk::Filter::LINEAR)
        .min_filter(vk::Filter::NEAREST)
        .mipmap_mode(vk::SamplerMipmapMode::LINEAR)
        .address_mode_u(vk::SamplerAddressMode::REPEAT)
        .address_mode_v(vk::SamplerAddressMode::REPEAT)
        .address_mode_w(vk::SamplerAddressMode::REPEAT)
        .mip_lod_bias(0.0)
        .min_lod(0.0)
        .max_lod(mip_levels.max(1) as f32)
        .anisotropy_enable(false)
        .max_anisotropy(1.0)
        .compare_enable(false)
        .compare_op(vk::CompareOp::ALWAYS)
        .border_color(vk::BorderColor::FLOAT_OPAQUE_BLACK)
        .unnormalized_coordinates(false)
}

/// Owns the samplers referenced by `Material::sampler_index`
#[derive(Default)]
pub struct MaterialManager {
    samplers: Vec<vk::Sampler>,
}

impl MaterialManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Untextured material with the given factors
    pub fn create_material(
        &self,
        roughness: f32,
        metalness: f32,
        base_color: Vec3,
        emissive_color: Vec3,
    ) -> Material {
        Material::new(roughness, metalness, base_color, emissive_color)
    }

    pub fn default_material(&self) -> Material {
        Material::default()
    }

    /// Create a sampler for images with up to `mip_levels` levels.
    /// Returns its index, the value stored in `Material::sampler_index`.
    pub fn create_sampler(&mut self, device: &GraphicsDevice, mip_levels: u32) -> Result<i32> {
        let create_info = sampler_create_info(mip_levels);
        let sampler = unsafe {
            device.device().create_sampler(&create_info, None)
                .map_err(|e| engine_err!(SOURCE, "Failed to create sampler: {:?}", e))?
        };
        self.samplers.push(sampler);
        engine_debug!(SOURCE, "Sampler {} created ({} mip levels)", self.samplers.len() - 1, mip_levels);
        Ok((self.samplers.len() - 1) as i32)
    }

    pub fn sampler(&self, index: i32) -> Option<vk::Sampler> {
        usize::try_from(index).ok().and_then(|i| self.samplers.get(i)).copied()
    }

    pub fn samplers(&self) -> &[vk::Sampler] {
        &self.samplers
    }

    /// Destroy every sampler. The GPU must be done with them.
    pub fn destroy(mut self, device: &GraphicsDevice) {
        unsafe {
            for sampler in self.samplers.drain(..) {
                device.device().destroy_sampler(sampler, None);
            }
        }
    }
}

impl Drop for MaterialManager {
    fn drop(&mut self) {
        if !self.samplers.is_empty() {
            engine_warn!(SOURCE, "MaterialManager dropped without destroy(); {} samplers leak",
                self.samplers.len());
        }
    }
}

#[cfg(test)]
#[path = "vulkan_material_tests.rs"]
mod tests;
