/*!
# Lumen Engine

Core types for the Lumen real-time rendering engine.

This crate is backend-agnostic. It provides:

- **log**: the engine logger and the `engine_*!` macros
- **error**: the engine error type
- **config**: device options and the declarative pipeline / cube-map documents
- **resource**: GPU record layouts, buffer/image descriptors, mip math
- **frame**: the frames-in-flight state machine, driven through `FrameBackend`
- **layer**: application layers and the frame lifecycle
- **scene**: the entity-component store the renderer reads from

The Vulkan backend lives in `lumen_engine_renderer_vulkan`.
*/

mod error;
pub mod log;
pub mod config;
pub mod resource;
pub mod frame;
pub mod layer;
pub mod scene;

// Main lumen namespace module
pub mod lumen {
    pub use crate::error::{Error, Result};

    pub mod log {
        pub use crate::log::{
            Logger, LogEntry, LogSeverity, DefaultLogger,
            set_logger, reset_logger,
        };
    }

    pub mod config {
        pub use crate::config::*;
    }

    pub mod resource {
        pub use crate::resource::*;
    }

    pub mod frame {
        pub use crate::frame::*;
    }

    pub mod layer {
        pub use crate::layer::*;
    }

    pub mod scene {
        pub use crate::scene::*;
    }
}

// Re-export math library at crate root
pub use glam;
