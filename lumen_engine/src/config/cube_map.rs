/// Cube-map document: one image path per face
///
/// Faces are uploaded in layer order right, left, top, bottom, forward, backward.

use std::path::{Path, PathBuf};
use serde::Deserialize;
use crate::error::{Error, Result};
use crate::engine_error;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CubeMapDesc {
    pub right: PathBuf,
    pub left: PathBuf,
    pub top: PathBuf,
    pub bottom: PathBuf,
    pub forward: PathBuf,
    pub backward: PathBuf,
}

impl CubeMapDesc {
    /// Face paths in array-layer order
    pub fn faces(&self) -> [&Path; 6] {
        [
            &self.right,
            &self.left,
            &self.top,
            &self.bottom,
            &self.forward,
            &self.backward,
        ]
    }

    pub fn from_value(value: serde_json::Value) -> Result<Self> {
        serde_json::from_value(value).map_err(|e| {
            engine_error!("lumen::config", "Invalid cube map document: {}", e);
            e.into()
        })
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            engine_error!("lumen::config", "Failed to read '{}': {}", path.display(), e);
            Error::from(e)
        })?;
        serde_json::from_str(&text).map_err(|e| {
            engine_error!("lumen::config", "Invalid cube map document '{}': {}", path.display(), e);
            e.into()
        })
    }
}

#[cfg(test)]
#[path = "cube_map_tests.rs"]
mod tests;
