//! Application layers and the frame lifecycle
//!
//! A [`Layer`] is the application's hook into the frame loop. The
//! [`LayerStack`] drives every hook across all layers in a fixed order and
//! routes window events top-down until one layer handles them.

mod layer;
mod layer_stack;
mod frame_clock;

pub use layer::{Layer, LayerEvent};
pub use layer_stack::LayerStack;
pub use frame_clock::FrameClock;
