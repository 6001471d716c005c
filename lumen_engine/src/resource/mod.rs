//! Backend-agnostic resource descriptions
//!
//! GPU-visible record layouts, buffer/image descriptors and mip math. The
//! Vulkan backend turns these into device objects.

pub mod gpu_types;
pub mod buffer;
pub mod image;
pub mod material;

pub use gpu_types::{Vertex, RenderObject, Light, LightType, CameraBuffer, SceneBuffer};
pub use buffer::{BufferType, BufferUsage, BufferDesc};
pub use image::{
    TextureFormat, TextureType, ImageDesc,
    calculate_mip_levels, mip_extent,
};
pub use material::Material;
