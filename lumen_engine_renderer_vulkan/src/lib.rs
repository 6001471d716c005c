/*!
# Lumen Engine - Vulkan Backend

Vulkan implementation of the Lumen rendering core.

This crate owns every Vulkan object of the engine, using `ash` for the API
bindings, `gpu-allocator` for memory and `spirq` for shader reflection:

- **device**: adapter selection, logical device, queues, allocator, one-off submissions
- **resources**: staged buffers, images with tracked layouts, mip generation, readback
- **presentation**: swapchain, depth + framebuffers, the compute/composite frame recording
- **pipelines**: SPIR-V reflection, descriptor layouts, graphics/compute pipelines
- **frames**: the Vulkan [`FrameBackend`](lumen_engine::lumen::frame::FrameBackend)

Resources never hold a reference back to the device. Each one is released
with an explicit `destroy(&device)`; a resource dropped without it logs a
leak warning. Teardown order is the caller's contract: wait for the device
to be idle, destroy swapchain dependents, then everything else, then drop
the device.

```no_run
use lumen_engine::lumen::config::DeviceConfig;
use lumen_engine_renderer_vulkan::GraphicsDevice;
# fn run(window: &winit::window::Window) -> lumen_engine::lumen::Result<()> {
let device = GraphicsDevice::new(window, DeviceConfig::default())?;
device.wait_idle()?;
# Ok(())
# }
```
*/

mod debug;
mod vulkan_adapter;
mod vulkan_device;
mod vulkan_buffer;
mod vulkan_image;
mod vulkan_swapchain;
mod vulkan_frame;
mod vulkan_shader;
mod vulkan_pipeline;
mod vulkan_material;
mod vulkan_descriptor;
mod vulkan_present;

pub use vulkan_adapter::{
    GraphicsAdapter, QueueFamilyIndices, AdapterCandidate,
    score_device_type, select_best_candidate, vendor_name,
};
pub use vulkan_device::GraphicsDevice;
pub use vulkan_buffer::{GpuBuffer, create_buffer, download_buffer};
pub use vulkan_image::{
    GpuImage,
    create_image_2d, create_image_cube,
    load_image_2d_from_file, load_hdr_image_2d_from_file, load_image_cube_from_file,
    create_image_view, cmd_transition_layout, cmd_generate_mip_levels,
    download_image_level, vk_format,
};
pub use vulkan_swapchain::{
    Swapchain, choose_swap_extent, choose_present_mode, choose_surface_format, choose_image_count,
};
pub use vulkan_frame::{Frame, VulkanFrameBackend};
pub use vulkan_shader::{
    ShaderEffect, ShaderStageBindings, ReflectedBinding,
    build_graphics_shader_effect, build_compute_shader_effect,
    merge_stage_bindings, load_spv, reflect_stage_bindings,
    PUSH_CONSTANT_SIZE, MAX_DESCRIPTOR_SETS,
};
pub use vulkan_pipeline::{
    ShaderPass, build_graphics_shader_pass, build_compute_shader_pass,
    vertex_input_rate, primitive_topology, cull_mode_flags, front_face, polygon_mode,
    color_write_mask,
};
pub use vulkan_material::{MaterialManager, sampler_create_info};
pub use vulkan_descriptor::{
    DescriptorPool, create_descriptor_pool, allocate_descriptor_sets,
    write_buffer_descriptor, write_image_descriptor, descriptor_pool_sizes,
};
pub use vulkan_present::{PresentTargets, Compositor, DEPTH_FORMAT_CANDIDATES};

pub use debug::{validation_stats, print_validation_stats_report};

/// Re-exported so applications can name Vulkan types without a direct `ash` dependency
pub use ash::vk;
