/// Scene: entity arena and component columns
///
/// Entity keys stay valid until the entity is destroyed; a destroyed key is
/// never reused for another entity (generational index).

use glam::Vec3;
use slotmap::{new_key_type, SecondaryMap, SlotMap};
use crate::resource::{Light, Material, RenderObject};
use crate::engine_debug;
use super::components::{Component, DirectionLight, Mesh, Transform};

new_key_type! {
    /// Stable entity identifier
    pub struct EntityKey;
}

/// A drawable gathered for this frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MeshObject {
    pub entity: EntityKey,
    pub render_object_index: usize,
}

/// Flattened per-frame arrays ready to be copied into GPU buffers
#[derive(Debug, Clone, Default)]
pub struct FrameData {
    pub render_objects: Vec<RenderObject>,
    pub materials: Vec<Material>,
    pub lights: Vec<Light>,
    pub mesh_objects: Vec<MeshObject>,
}

pub struct Scene {
    entities: SlotMap<EntityKey, ()>,
    pub(super) transforms: SecondaryMap<EntityKey, Transform>,
    pub(super) meshes: SecondaryMap<EntityKey, Mesh>,
    pub(super) materials: SecondaryMap<EntityKey, Material>,
    pub(super) direction_lights: SecondaryMap<EntityKey, DirectionLight>,
}

impl Scene {
    pub fn new() -> Self {
        Self {
            entities: SlotMap::with_key(),
            transforms: SecondaryMap::new(),
            meshes: SecondaryMap::new(),
            materials: SecondaryMap::new(),
            direction_lights: SecondaryMap::new(),
        }
    }

    /// Create an entity with a default [`Transform`]
    pub fn create_entity(&mut self) -> EntityKey {
        let key = self.entities.insert(());
        self.transforms.insert(key, Transform::default());
        key
    }

    /// Destroy an entity and all its components. Returns false if the key is stale.
    pub fn destroy_entity(&mut self, key: EntityKey) -> bool {
        if self.entities.remove(key).is_none() {
            return false;
        }
        self.transforms.remove(key);
        self.meshes.remove(key);
        self.materials.remove(key);
        self.direction_lights.remove(key);
        engine_debug!("lumen::scene", "Destroyed entity {:?}", key);
        true
    }

    pub fn is_alive(&self, key: EntityKey) -> bool {
        self.entities.contains_key(key)
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// Add or replace a component. Returns false if the entity does not exist.
    pub fn add_component<C: Component>(&mut self, key: EntityKey, component: C) -> bool {
        if !self.is_alive(key) {
            return false;
        }
        C::column_mut(self).insert(key, component);
        true
    }

    pub fn remove_component<C: Component>(&mut self, key: EntityKey) -> Option<C> {
        C::column_mut(self).remove(key)
    }

    pub fn component<C: Component>(&self, key: EntityKey) -> Option<&C> {
        C::column(self).get(key)
    }

    pub fn component_mut<C: Component>(&mut self, key: EntityKey) -> Option<&mut C> {
        C::column_mut(self).get_mut(key)
    }

    pub fn has_component<C: Component>(&self, key: EntityKey) -> bool {
        C::column(self).contains_key(key)
    }

    /// Entities having {Mesh, Material, Transform}
    pub fn drawables(&self) -> impl Iterator<Item = (EntityKey, &Mesh, &Material, &Transform)> + '_ {
        self.meshes.iter().filter_map(move |(key, mesh)| {
            let material = self.materials.get(key)?;
            let transform = self.transforms.get(key)?;
            Some((key, mesh, material, transform))
        })
    }

    /// Entities having {DirectionLight, Transform}
    pub fn direction_lights(&self) -> impl Iterator<Item = (EntityKey, &DirectionLight, &Transform)> + '_ {
        self.direction_lights.iter().filter_map(move |(key, light)| {
            let transform = self.transforms.get(key)?;
            Some((key, light, transform))
        })
    }

    /// Flatten the scene into per-frame arrays.
    ///
    /// Each drawable contributes one material and one render object whose
    /// `material_index` points at it. A directional light's direction is its
    /// position rotated by its model matrix.
    pub fn gather_frame_data(&self) -> FrameData {
        let mut data = FrameData::default();

        for (entity, _mesh, material, transform) in self.drawables() {
            data.materials.push(*material);
            data.render_objects.push(RenderObject::new(
                transform.model_matrix(),
                (data.materials.len() - 1) as i32,
            ));
            data.mesh_objects.push(MeshObject {
                entity,
                render_object_index: data.render_objects.len() - 1,
            });
        }

        for (_entity, light, transform) in self.direction_lights() {
            let direction: Vec3 = transform
                .model_matrix()
                .transform_vector3(transform.position);
            data.lights.push(Light::directional(direction, light.color, light.intensity));
        }

        data
    }
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "scene_tests.rs"]
mod tests;
