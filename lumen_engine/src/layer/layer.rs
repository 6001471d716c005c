/// Layer trait and the event wrapper passed to it

use winit::event::WindowEvent;
use crate::error::Result;

/// A window event travelling down the layer stack
#[derive(Debug, Clone)]
pub struct LayerEvent {
    pub event: WindowEvent,
    handled: bool,
}

impl LayerEvent {
    pub fn new(event: WindowEvent) -> Self {
        Self { event, handled: false }
    }

    /// Stop propagation to lower layers
    pub fn mark_handled(&mut self) {
        self.handled = true;
    }

    pub fn is_handled(&self) -> bool {
        self.handled
    }
}

/// Frame-lifecycle hooks
///
/// Per frame, [`LayerStack::run_frame`] calls `on_frame_begin` on every layer,
/// then `on_update`, `on_render`, `on_imgui_render` and `on_frame_end`, each
/// across all layers in push order. Every hook has a no-op default.
///
/// [`LayerStack::run_frame`]: super::LayerStack::run_frame
pub trait Layer {
    /// Name used in logs
    fn name(&self) -> &str {
        "Layer"
    }

    fn on_frame_begin(&mut self) -> Result<()> {
        Ok(())
    }

    /// `dt` is the duration of the previous frame in seconds
    fn on_update(&mut self, _dt: f32) -> Result<()> {
        Ok(())
    }

    fn on_render(&mut self) -> Result<()> {
        Ok(())
    }

    fn on_imgui_render(&mut self) -> Result<()> {
        Ok(())
    }

    fn on_frame_end(&mut self) -> Result<()> {
        Ok(())
    }

    /// Called top-down until a layer marks the event handled
    fn on_event(&mut self, _event: &mut LayerEvent) {}
}
