//! Configuration types
//!
//! - [`DeviceConfig`]: graphics device bootstrap options (validation, debug output)
//! - [`GraphicsPassConfig`]: declarative pipeline-state document
//! - [`CubeMapDesc`]: six-face cube-map document

mod device_config;
mod pipeline_config;
mod cube_map;

pub use device_config::{
    DeviceConfig, DebugSeverity, DebugOutput, DebugMessageFilter, ValidationStats,
};
pub use pipeline_config::{
    GraphicsPassConfig, ColorAttachmentDesc,
    InputRate, Topology, CullMode, FrontFace, PolygonMode,
};
pub use cube_map::CubeMapDesc;
