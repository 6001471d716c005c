/// Ordered collection of layers

use winit::event::WindowEvent;
use crate::error::Result;
use crate::engine_info;
use super::layer::{Layer, LayerEvent};

pub struct LayerStack {
    layers: Vec<Box<dyn Layer>>,
    running: bool,
}

impl LayerStack {
    pub fn new() -> Self {
        Self {
            layers: Vec::new(),
            running: true,
        }
    }

    /// Push a layer on top. Top layers see events first.
    pub fn push<L: Layer + 'static>(&mut self, layer: L) {
        engine_info!("lumen::layer", "Pushed layer '{}'", layer.name());
        self.layers.push(Box::new(layer));
    }

    /// Remove and return the top layer
    pub fn pop(&mut self) -> Option<Box<dyn Layer>> {
        self.layers.pop()
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// False once a close request has been dispatched
    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn request_exit(&mut self) {
        self.running = false;
    }

    /// Run one frame's hooks. Stops at the first failing hook.
    pub fn run_frame(&mut self, dt: f32) -> Result<()> {
        for layer in self.layers.iter_mut() {
            layer.on_frame_begin()?;
        }
        for layer in self.layers.iter_mut() {
            layer.on_update(dt)?;
        }
        for layer in self.layers.iter_mut() {
            layer.on_render()?;
        }
        for layer in self.layers.iter_mut() {
            layer.on_imgui_render()?;
        }
        for layer in self.layers.iter_mut() {
            layer.on_frame_end()?;
        }
        Ok(())
    }

    /// Route a window event. A close request stops the loop and is still
    /// forwarded so layers can react. Returns true if a layer handled it.
    pub fn dispatch_event(&mut self, event: WindowEvent) -> bool {
        if matches!(event, WindowEvent::CloseRequested) {
            engine_info!("lumen::layer", "Close requested");
            self.running = false;
        }

        let mut event = LayerEvent::new(event);
        for layer in self.layers.iter_mut().rev() {
            if event.is_handled() {
                break;
            }
            layer.on_event(&mut event);
        }
        event.is_handled()
    }
}

impl Default for LayerStack {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "layer_stack_tests.rs"]
mod tests;
