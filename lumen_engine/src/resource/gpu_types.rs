/// GPU-visible record layouts
///
/// All types are `#[repr(C)]` + `Pod` so they can be copied byte-for-byte into
/// mapped buffers. Layouts match the std430 structs of the engine shaders.

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec2, Vec3, Vec4};

/// Vertex of binding 0: position (location 0), normal (1), uv (2)
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable)]
pub struct Vertex {
    pub position: Vec3,
    pub normal: Vec3,
    pub uv: Vec2,
}

impl Vertex {
    pub const POSITION_OFFSET: u32 = 0;
    pub const NORMAL_OFFSET: u32 = 12;
    pub const UV_OFFSET: u32 = 24;

    pub fn new(position: Vec3, normal: Vec3, uv: Vec2) -> Self {
        Self { position, normal, uv }
    }
}

/// One drawable: world transform plus index into the material array
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct RenderObject {
    pub transform: Mat4,
    pub material_index: i32,
    pub _pad: [i32; 3],
}

impl RenderObject {
    pub fn new(transform: Mat4, material_index: i32) -> Self {
        Self { transform, material_index, _pad: [0; 3] }
    }
}

/// Light kind stored in [`Light::light_type`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum LightType {
    Directional = 0,
    Point = 1,
    Spot = 2,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct Light {
    pub light_type: i32,
    pub inner_cutoff: f32,
    pub outer_cutoff: f32,
    pub attenuation_radius: f32,
    pub position: Vec4,
    pub spot_light_dir: Vec4,
    /// Color premultiplied by intensity
    pub color: Vec4,
}

impl Light {
    /// Directional light: `direction` goes in `position.xyz` with w = 0
    pub fn directional(direction: Vec3, color: Vec3, intensity: f32) -> Self {
        Self {
            light_type: LightType::Directional as i32,
            inner_cutoff: 0.0,
            outer_cutoff: 0.0,
            attenuation_radius: 0.0,
            position: direction.extend(0.0),
            spot_light_dir: Vec4::ZERO,
            color: (color * intensity).extend(1.0),
        }
    }
}

/// Per-frame camera block
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct CameraBuffer {
    pub camera_pos: Vec4,
    pub view: Mat4,
    pub proj: Mat4,
    pub inv_view: Mat4,
    pub inv_proj: Mat4,
    pub fov: f32,
    pub znear: f32,
    pub aspect: f32,
    pub samples_per_pixel: i32,
}

impl CameraBuffer {
    /// Build the block from a view/projection pair; inverses are computed here
    pub fn new(position: Vec3, view: Mat4, proj: Mat4, fov: f32, znear: f32, aspect: f32) -> Self {
        Self {
            camera_pos: position.extend(1.0),
            view,
            proj,
            inv_view: view.inverse(),
            inv_proj: proj.inverse(),
            fov,
            znear,
            aspect,
            samples_per_pixel: 1,
        }
    }
}

/// Per-frame scene block
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct SceneBuffer {
    pub num_lights: i32,
    pub max_ray_depth: f32,
}

impl Default for SceneBuffer {
    fn default() -> Self {
        Self { num_lights: 0, max_ray_depth: f32::MAX }
    }
}

#[cfg(test)]
#[path = "gpu_types_tests.rs"]
mod tests;
