/// Declarative graphics pipeline-state document
///
/// ```json
/// {
///     "vertSpvFilePath": "shaders/composite.vert.spv",
///     "fragSpvFilePath": "shaders/composite.frag.spv",
///     "inputRate": "vertex",
///     "enableVertexAttribs": false,
///     "topology": "triangle",
///     "cullMode": "none",
///     "frontFace": "counterClockWise",
///     "polygonMode": "fill",
///     "depthTest": false,
///     "colorAttachmentDescs": [ { "numColorComponent": 4 } ]
/// }
/// ```
///
/// Every key is required. String values outside the recognized set fall back
/// to the documented default for that key.

use std::path::{Path, PathBuf};
use serde::Deserialize;
use crate::error::Result;
use crate::engine_error;

/// Vertex input rate of binding 0
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub enum InputRate {
    /// "vertex"
    Vertex,
    /// any other value
    Instance,
}

impl From<String> for InputRate {
    fn from(value: String) -> Self {
        match value.as_str() {
            "vertex" => InputRate::Vertex,
            _ => InputRate::Instance,
        }
    }
}

/// Primitive topology
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub enum Topology {
    /// "triangle"
    TriangleList,
    /// Unrecognized value, built as a triangle list
    Unrecognized(String),
}

impl From<String> for Topology {
    fn from(value: String) -> Self {
        match value.as_str() {
            "triangle" => Topology::TriangleList,
            _ => Topology::Unrecognized(value),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub enum CullMode {
    None,
    Back,
    Front,
}

impl From<String> for CullMode {
    fn from(value: String) -> Self {
        match value.as_str() {
            "back" => CullMode::Back,
            "front" => CullMode::Front,
            _ => CullMode::None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub enum FrontFace {
    CounterClockwise,
    Clockwise,
}

impl From<String> for FrontFace {
    fn from(value: String) -> Self {
        match value.as_str() {
            "clockWise" => FrontFace::Clockwise,
            _ => FrontFace::CounterClockwise,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub enum PolygonMode {
    Fill,
    Wireframe,
}

impl From<String> for PolygonMode {
    fn from(value: String) -> Self {
        match value.as_str() {
            "wireframe" => PolygonMode::Wireframe,
            _ => PolygonMode::Fill,
        }
    }
}

/// One color attachment of the pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColorAttachmentDesc {
    /// Number of written channels: 1 = R, 2 = RG, 3 = RGB, anything else = RGBA
    pub num_color_component: u32,
}

/// Parsed pipeline-state document
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphicsPassConfig {
    pub vert_spv_file_path: PathBuf,
    pub frag_spv_file_path: PathBuf,
    pub input_rate: InputRate,
    pub enable_vertex_attribs: bool,
    pub topology: Topology,
    pub cull_mode: CullMode,
    pub front_face: FrontFace,
    pub polygon_mode: PolygonMode,
    pub depth_test: bool,
    pub color_attachment_descs: Vec<ColorAttachmentDesc>,
}

impl GraphicsPassConfig {
    /// Build from an already parsed document
    pub fn from_value(value: serde_json::Value) -> Result<Self> {
        serde_json::from_value(value).map_err(|e| {
            engine_error!("lumen::config", "Invalid pipeline document: {}", e);
            e.into()
        })
    }

    pub fn from_json_str(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| {
            engine_error!("lumen::config", "Invalid pipeline document: {}", e);
            e.into()
        })
    }

    /// Read and parse a pipeline document from disk
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            engine_error!("lumen::config", "Failed to read '{}': {}", path.display(), e);
            crate::error::Error::from(e)
        })?;
        Self::from_json_str(&text)
    }
}

#[cfg(test)]
#[path = "pipeline_config_tests.rs"]
mod tests;
