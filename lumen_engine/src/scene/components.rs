/// Scene components

use glam::{EulerRot, Mat4, Quat, Vec3};
use slotmap::SecondaryMap;
use crate::resource::{Material, Vertex};
use super::scene::{EntityKey, Scene};

/// Position, Euler rotation in degrees (x = pitch, y = yaw, z = roll) and scale
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Vec3,
    pub scale: Vec3,
}

impl Transform {
    pub fn from_position(position: Vec3) -> Self {
        Self { position, ..Self::default() }
    }

    /// translate * rotate(yaw, pitch, roll) * scale
    pub fn model_matrix(&self) -> Mat4 {
        let rotation = Quat::from_euler(
            EulerRot::YXZ,
            self.rotation.y.to_radians(),
            self.rotation.x.to_radians(),
            self.rotation.z.to_radians(),
        );
        Mat4::from_scale_rotation_translation(self.scale, rotation, self.position)
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Vec3::ZERO,
            scale: Vec3::ONE,
        }
    }
}

/// Index into the application's table of GPU buffers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferHandle(pub u32);

/// Geometry plus the GPU buffers it was uploaded to, once uploaded
#[derive(Debug, Clone, Default)]
pub struct Mesh {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
    pub vertex_buffer: Option<BufferHandle>,
    pub index_buffer: Option<BufferHandle>,
}

impl Mesh {
    pub fn new(vertices: Vec<Vertex>, indices: Vec<u32>) -> Self {
        Self { vertices, indices, vertex_buffer: None, index_buffer: None }
    }

    pub fn is_uploaded(&self) -> bool {
        self.vertex_buffer.is_some() && self.index_buffer.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DirectionLight {
    pub color: Vec3,
    pub intensity: f32,
}

impl Default for DirectionLight {
    fn default() -> Self {
        Self { color: Vec3::ONE, intensity: 1.0 }
    }
}

/// A type stored in one of the scene's component columns
pub trait Component: Sized {
    fn column(scene: &Scene) -> &SecondaryMap<EntityKey, Self>;
    fn column_mut(scene: &mut Scene) -> &mut SecondaryMap<EntityKey, Self>;
}

macro_rules! impl_component {
    ($ty:ty, $field:ident) => {
        impl Component for $ty {
            fn column(scene: &Scene) -> &SecondaryMap<EntityKey, Self> {
                &scene.$field
            }

            fn column_mut(scene: &mut Scene) -> &mut SecondaryMap<EntityKey, Self> {
                &mut scene.$field
            }
        }
    };
}

impl_component!(Transform, transforms);
impl_component!(Mesh, meshes);
impl_component!(Material, materials);
impl_component!(DirectionLight, direction_lights);
