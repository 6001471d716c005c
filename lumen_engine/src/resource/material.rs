/// Material record as stored in the material storage buffer

use bytemuck::{Pod, Zeroable};
use glam::{Vec3, Vec4};

/// Texture slot index meaning "no map bound"
pub const NO_MAP: i32 = -1;

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct Material {
    pub base_color_map_index: i32,
    pub roughness_map_index: i32,
    pub metalic_map_index: i32,
    pub emissive_map_index: i32,
    pub normal_map_index: i32,
    pub roughness: f32,
    pub metalness: f32,
    pub sampler_index: i32,
    pub base_color: Vec4,
    pub emissive_color: Vec4,
}

impl Material {
    /// Untextured material; colors are stored with w = 0
    pub fn new(roughness: f32, metalness: f32, base_color: Vec3, emissive_color: Vec3) -> Self {
        Self {
            base_color_map_index: NO_MAP,
            roughness_map_index: NO_MAP,
            metalic_map_index: NO_MAP,
            emissive_map_index: NO_MAP,
            normal_map_index: NO_MAP,
            roughness,
            metalness,
            sampler_index: 0,
            base_color: base_color.extend(0.0),
            emissive_color: emissive_color.extend(0.0),
        }
    }

    pub fn has_textures(&self) -> bool {
        [
            self.base_color_map_index,
            self.roughness_map_index,
            self.metalic_map_index,
            self.emissive_map_index,
            self.normal_map_index,
        ]
        .iter()
        .any(|&index| index != NO_MAP)
    }
}

impl Default for Material {
    /// White, fully rough, fully metallic, no emission
    fn default() -> Self {
        Self {
            base_color: Vec4::ONE,
            emissive_color: Vec4::ZERO,
            ..Self::new(1.0, 1.0, Vec3::ONE, Vec3::ZERO)
        }
    }
}

#[cfg(test)]
#[path = "material_tests.rs"]
mod tests;
