//! GPU tests for the swapchain, present targets and frames in flight
//!
//! All tests require a GPU and a display, and are marked with #[ignore].
//!
//! Run with: cargo test -p lumen_engine_renderer_vulkan --test presentation_gpu_tests -- --ignored

mod gpu_test_utils;

use gpu_test_utils::{test_device, write_temp_spv};
use lumen_engine::lumen::frame::{FrameScheduler, FrameSlotState, PerFrame, MAX_FRAMES_IN_FLIGHT};
use lumen_engine::lumen::resource::{ImageDesc, TextureFormat};
use lumen_engine_renderer_vulkan::{
    allocate_descriptor_sets, build_compute_shader_effect, build_compute_shader_pass,
    build_graphics_shader_effect, build_graphics_shader_pass, create_descriptor_pool,
    create_image_2d, download_image_level, vk, write_image_descriptor, Compositor, Frame,
    GraphicsDevice, MaterialManager, PresentTargets, Swapchain, VulkanFrameBackend,
};
use serial_test::serial;
use std::cell::Cell;

const DESIRED_EXTENT: vk::Extent2D = vk::Extent2D { width: 800, height: 600 };

fn destroy_frames(device: &GraphicsDevice, frames: PerFrame<Frame>) {
    for frame in frames.into_values() {
        frame.destroy(device);
    }
}

/// Begin and end the render pass so the image reaches PRESENT_SRC
fn record_clear(device: &GraphicsDevice, command_buffer: vk::CommandBuffer, targets: &PresentTargets, image_index: u32) {
    let clear_values = [
        vk::ClearValue { color: vk::ClearColorValue { float32: [0.1, 0.2, 0.3, 1.0] } },
        vk::ClearValue { depth_stencil: vk::ClearDepthStencilValue { depth: 0.0, stencil: 0 } },
    ];
    let begin_info = vk::RenderPassBeginInfo::default()
        .render_pass(targets.render_pass())
        .framebuffer(targets.framebuffer(image_index).unwrap())
        .render_area(vk::Rect2D { offset: vk::Offset2D { x: 0, y: 0 }, extent: targets.extent() })
        .clear_values(&clear_values);
    unsafe {
        device.device().cmd_begin_render_pass(command_buffer, &begin_info, vk::SubpassContents::INLINE);
        device.device().cmd_end_render_pass(command_buffer);
    }
}

#[test]
#[ignore] // Requires GPU
#[serial]
fn test_swapchain_creation() {
    let device = test_device();

    let swapchain = Swapchain::new(&device, DESIRED_EXTENT).unwrap();
    assert!(swapchain.image_count() >= 2);
    assert_eq!(swapchain.images().len(), swapchain.image_views().len());
    assert!(swapchain.extent().width > 0 && swapchain.extent().height > 0);

    swapchain.destroy(&device);
}

#[test]
#[ignore] // Requires GPU
#[serial]
fn test_present_targets_one_framebuffer_per_image() {
    let device = test_device();

    let swapchain = Swapchain::new(&device, DESIRED_EXTENT).unwrap();
    let targets = PresentTargets::new(&device, &swapchain).unwrap();

    assert_eq!(targets.framebuffers().len(), swapchain.image_count());
    assert_eq!(targets.extent(), swapchain.extent());
    assert_ne!(targets.depth_format(), vk::Format::UNDEFINED);

    targets.destroy(&device).unwrap();
    swapchain.destroy(&device);
}

#[test]
#[ignore] // Requires GPU
#[serial]
fn test_frames_in_flight_cycle_through_slots() {
    let device = test_device();

    let mut swapchain = Swapchain::new(&device, DESIRED_EXTENT).unwrap();
    let mut targets = PresentTargets::new(&device, &swapchain).unwrap();
    let frames = Frame::create_all(&device).unwrap();
    let mut scheduler = FrameScheduler::new();

    let frame_count = MAX_FRAMES_IN_FLIGHT as u64 * 3;
    let mut recreations = 0;
    while scheduler.frame_counter() < frame_count && recreations < 3 {
        let mut backend = VulkanFrameBackend::new(&device, &swapchain, &frames);
        let Some(frame) = scheduler.begin_frame(&mut backend).unwrap() else {
            drop(backend);
            let extent = swapchain.extent();
            targets.recreate(&device, &mut swapchain, extent).unwrap();
            recreations += 1;
            continue;
        };
        assert_eq!(scheduler.slot_state(frame.slot), FrameSlotState::Recording);

        record_clear(&device, frame.command_buffer, &targets, frame.image_index);

        let slot = frame.slot;
        scheduler.end_frame(&mut backend, frame).unwrap();
        assert_eq!(scheduler.slot_state(slot), FrameSlotState::Submitted);
    }

    device.wait_idle().unwrap();
    scheduler.reset_after_idle();

    destroy_frames(&device, frames);
    targets.destroy(&device).unwrap();
    swapchain.destroy(&device);
}

#[test]
#[ignore] // Requires GPU
#[serial]
fn test_present_targets_recreate_keeps_framebuffer_count() {
    let device = test_device();

    let mut swapchain = Swapchain::new(&device, DESIRED_EXTENT).unwrap();
    let mut targets = PresentTargets::new(&device, &swapchain).unwrap();
    let render_pass = targets.render_pass();

    let extent = swapchain.extent();
    targets.recreate(&device, &mut swapchain, extent).unwrap();

    assert_eq!(targets.framebuffers().len(), swapchain.image_count());
    assert_eq!(targets.render_pass(), render_pass);

    targets.destroy(&device).unwrap();
    swapchain.destroy(&device);
}

// ============================================================================
// COMPOSITOR
// ============================================================================

const FILL_TARGET_WGSL: &str = r#"
@group(0) @binding(0) var output_image: texture_storage_2d<rgba8unorm, write>;

@compute @workgroup_size(32, 32)
fn main(@builtin(global_invocation_id) id: vec3<u32>) {
    let size = textureDimensions(output_image);
    if (id.x < size.x && id.y < size.y) {
        textureStore(output_image, vec2<i32>(id.xy), vec4<f32>(0.25, 0.5, 0.75, 1.0));
    }
}
"#;

const FULLSCREEN_WGSL: &str = r#"
struct VertexOutput {
    @builtin(position) position: vec4<f32>,
    @location(0) uv: vec2<f32>,
};

@vertex
fn main(@builtin(vertex_index) index: u32) -> VertexOutput {
    var corners = array<vec2<f32>, 6>(
        vec2<f32>(-1.0, -1.0), vec2<f32>(1.0, -1.0), vec2<f32>(1.0, 1.0),
        vec2<f32>(-1.0, -1.0), vec2<f32>(1.0, 1.0), vec2<f32>(-1.0, 1.0),
    );
    let corner = corners[index];
    var out: VertexOutput;
    out.position = vec4<f32>(corner, 0.0, 1.0);
    out.uv = corner * 0.5 + vec2<f32>(0.5, 0.5);
    return out;
}
"#;

const SAMPLE_TARGET_WGSL: &str = r#"
@group(0) @binding(0) var source: texture_2d<f32>;
@group(0) @binding(1) var source_sampler: sampler;

@fragment
fn main(@location(0) uv: vec2<f32>) -> @location(0) vec4<f32> {
    return textureSample(source, source_sampler, uv);
}
"#;

/// Write the composite shaders and their pipeline document; returns every path written
fn write_composite_pipeline() -> Vec<std::path::PathBuf> {
    let vert = write_temp_spv("lumen_composite.vert.spv", FULLSCREEN_WGSL, naga::ShaderStage::Vertex);
    let frag = write_temp_spv("lumen_composite.frag.spv", SAMPLE_TARGET_WGSL, naga::ShaderStage::Fragment);
    let document = serde_json::json!({
        "vertSpvFilePath": vert.display().to_string(),
        "fragSpvFilePath": frag.display().to_string(),
        "inputRate": "vertex",
        "enableVertexAttribs": false,
        "topology": "triangle",
        "cullMode": "none",
        "frontFace": "counterClockWise",
        "polygonMode": "fill",
        "depthTest": false,
        "colorAttachmentDescs": [ { "numColorComponent": 4 } ]
    });
    let json_path = std::env::temp_dir().join("lumen_composite.json");
    std::fs::write(&json_path, document.to_string()).unwrap();
    vec![vert, frag, json_path]
}

#[test]
#[ignore] // Requires GPU
#[serial]
fn test_compositor_fills_target_and_runs_overlay() {
    let device = test_device();

    let mut swapchain = Swapchain::new(&device, DESIRED_EXTENT).unwrap();
    let mut targets = PresentTargets::new(&device, &swapchain).unwrap();
    let frames = Frame::create_all(&device).unwrap();
    let mut scheduler = FrameScheduler::new();

    let comp_path = write_temp_spv("lumen_fill_target.comp.spv", FILL_TARGET_WGSL, naga::ShaderStage::Compute);
    let compute_effect = build_compute_shader_effect(&device, &comp_path).unwrap();
    std::fs::remove_file(&comp_path).ok();
    let compute_pass = build_compute_shader_pass(&device, &compute_effect).unwrap();

    let pipeline_paths = write_composite_pipeline();
    let composite_effect = build_graphics_shader_effect(&device, &pipeline_paths[2]).unwrap();
    for path in &pipeline_paths {
        std::fs::remove_file(path).ok();
    }
    let composite_pass = build_graphics_shader_pass(&device, &composite_effect, targets.render_pass(), 0).unwrap();

    let mut desc = ImageDesc::new_2d(64, 64, TextureFormat::RgbaU8, false);
    desc.storage = true;
    let mut target = create_image_2d(&device, &desc).unwrap();

    let mut materials = MaterialManager::new();
    let sampler_index = materials.create_sampler(&device, 1).unwrap();
    let sampler = materials.sampler(sampler_index).unwrap();

    let pool = create_descriptor_pool(&device, 2).unwrap();
    let compute_set = allocate_descriptor_sets(&device, &pool, compute_effect.set_layout(0).unwrap(), 1).unwrap()[0];
    let composite_set = allocate_descriptor_sets(&device, &pool, composite_effect.set_layout(0).unwrap(), 1).unwrap()[0];
    write_image_descriptor(
        &device, compute_set, 0, vk::DescriptorType::STORAGE_IMAGE,
        target.view(), vk::ImageLayout::GENERAL, vk::Sampler::null(),
    );
    write_image_descriptor(
        &device, composite_set, 0, vk::DescriptorType::SAMPLED_IMAGE,
        target.view(), vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL, vk::Sampler::null(),
    );
    write_image_descriptor(
        &device, composite_set, 1, vk::DescriptorType::SAMPLER,
        vk::ImageView::null(), vk::ImageLayout::UNDEFINED, sampler,
    );

    let compositor = Compositor {
        compute_effect: &compute_effect,
        compute_pass: &compute_pass,
        compute_set,
        composite_effect: &composite_effect,
        composite_pass: &composite_pass,
        composite_set,
    };

    let overlay_ran = Cell::new(false);
    let mut recreations = 0;
    while scheduler.frame_counter() == 0 && recreations < 3 {
        let mut backend = VulkanFrameBackend::new(&device, &swapchain, &frames);
        let Some(frame) = scheduler.begin_frame(&mut backend).unwrap() else {
            drop(backend);
            let extent = swapchain.extent();
            targets.recreate(&device, &mut swapchain, extent).unwrap();
            recreations += 1;
            continue;
        };

        compositor
            .record(&device, frame.command_buffer, &mut target, &targets, frame.image_index, |_| {
                overlay_ran.set(true)
            })
            .unwrap();
        scheduler.end_frame(&mut backend, frame).unwrap();
    }
    assert_eq!(scheduler.frame_counter(), 1);

    device.wait_idle().unwrap();
    scheduler.reset_after_idle();

    assert!(overlay_ran.get());
    assert_eq!(target.layout(), Some(vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL));

    let pixels = download_image_level(&device, &mut target, 0, 0).unwrap();
    assert_eq!(pixels.len(), 64 * 64 * 4);
    for texel in pixels.chunks_exact(4) {
        for (got, want) in texel.iter().zip([64u8, 128, 191, 255]) {
            assert!(got.abs_diff(want) <= 1, "texel {:?} was not written by the compute pass", texel);
        }
    }

    pool.destroy(&device);
    materials.destroy(&device);
    target.destroy(&device).unwrap();
    composite_pass.destroy(&device);
    composite_effect.destroy(&device);
    compute_pass.destroy(&device);
    compute_effect.destroy(&device);
    destroy_frames(&device, frames);
    targets.destroy(&device).unwrap();
    swapchain.destroy(&device);
}
