#![allow(dead_code)]
//! GPU test utilities - one GraphicsDevice shared by every GPU test
//!
//! `ash-window` refuses to create a second surface for the same window on
//! some platforms, and a real application owns a single device anyway, so
//! the tests share one device created lazily on a hidden window.

use lumen_engine::lumen::config::DeviceConfig;
use lumen_engine_renderer_vulkan::GraphicsDevice;
use std::sync::{Mutex, MutexGuard, OnceLock};
use winit::event_loop::{EventLoop, EventLoopBuilder};
use winit::window::Window;

// Platform-specific imports for EventLoop threading
#[cfg(target_os = "windows")]
use winit::platform::windows::EventLoopBuilderExtWindows;
#[cfg(target_os = "linux")]
use winit::platform::x11::EventLoopBuilderExtX11;

/// Shared device (initialized once)
static GPU_DEVICE: OnceLock<Mutex<GraphicsDevice>> = OnceLock::new();

/// Window kept alive for the device's surface.
/// The EventLoop is leaked with mem::forget since it cannot live in a static.
static GPU_WINDOW: OnceLock<Window> = OnceLock::new();

/// Lock the shared device, creating it on first use
///
/// A test that panicked while holding the lock does not poison the others.
pub fn test_device() -> MutexGuard<'static, GraphicsDevice> {
    GPU_DEVICE
        .get_or_init(|| {
            let (window, event_loop) = create_test_window();

            let config = DeviceConfig {
                app_name: "Lumen GPU tests".to_string(),
                ..DeviceConfig::default()
            };
            let device = GraphicsDevice::new(&window, config)
                .expect("Failed to create GraphicsDevice for tests");

            std::mem::forget(event_loop);
            GPU_WINDOW.set(window).ok();

            Mutex::new(device)
        })
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Create a hidden 800x600 window on an event loop usable off the main thread
#[allow(deprecated)]
pub fn create_test_window() -> (Window, EventLoop<()>) {
    let event_loop = {
        #[cfg(any(target_os = "windows", target_os = "linux"))]
        {
            EventLoopBuilder::new()
                .with_any_thread(true)
                .build()
                .unwrap()
        }
        #[cfg(not(any(target_os = "windows", target_os = "linux")))]
        {
            EventLoopBuilder::new().build().unwrap()
        }
    };

    let window_attrs = Window::default_attributes()
        .with_title("GPU Test Window")
        .with_inner_size(winit::dpi::LogicalSize::new(800, 600))
        .with_visible(false);

    let window = event_loop.create_window(window_attrs).unwrap();
    (window, event_loop)
}

/// Write an RGBA8 PNG to the temp directory and return its path
pub fn write_temp_png(name: &str, width: u32, height: u32, pixel: impl Fn(u32, u32) -> [u8; 4]) -> std::path::PathBuf {
    let path = std::env::temp_dir().join(name);
    let img = image::RgbaImage::from_fn(width, height, |x, y| image::Rgba(pixel(x, y)));
    img.save(&path).unwrap();
    path
}

/// Compile a WGSL module whose single entry point is `main` into SPIR-V words
pub fn compile_wgsl(source: &str, stage: naga::ShaderStage) -> Vec<u32> {
    let module = naga::front::wgsl::parse_str(source)
        .unwrap_or_else(|e| panic!("WGSL parse error: {}", e));

    let mut validator = naga::valid::Validator::new(
        naga::valid::ValidationFlags::all(),
        naga::valid::Capabilities::all(),
    );
    let info = validator.validate(&module)
        .unwrap_or_else(|e| panic!("WGSL validation error: {:?}", e));

    let options = naga::back::spv::Options {
        lang_version: (1, 3),
        flags: naga::back::spv::WriterFlags::empty(),
        capabilities: None,
        bounds_check_policies: naga::proc::BoundsCheckPolicies::default(),
        binding_map: Default::default(),
        debug_info: None,
        zero_initialize_workgroup_memory:
            naga::back::spv::ZeroInitializeWorkgroupMemoryMode::None,
    };
    let pipeline_options = naga::back::spv::PipelineOptions {
        shader_stage: stage,
        entry_point: "main".to_string(),
    };

    naga::back::spv::write_vec(&module, &info, &options, Some(&pipeline_options))
        .unwrap_or_else(|e| panic!("SPIR-V generation error: {}", e))
}

/// Compile WGSL and write the SPIR-V to the temp directory
pub fn write_temp_spv(name: &str, source: &str, stage: naga::ShaderStage) -> std::path::PathBuf {
    let words = compile_wgsl(source, stage);
    let path = std::env::temp_dir().join(name);
    std::fs::write(&path, bytemuck::cast_slice::<u32, u8>(&words)).unwrap();
    path
}
