//! Entity-component scene store
//!
//! Entities are generational keys into a SlotMap; each component type lives
//! in its own SecondaryMap column. The renderer consumes the scene only
//! through the typed views and [`Scene::gather_frame_data`].

mod components;
mod scene;

pub use components::{Transform, Mesh, BufferHandle, DirectionLight, Component};
pub use scene::{Scene, EntityKey, FrameData, MeshObject};
