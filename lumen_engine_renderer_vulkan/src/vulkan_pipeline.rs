/// Graphics and compute pipelines built from a [`ShaderEffect`]
///
/// Fixed-function state comes from the effect's pipeline-state document; the
/// translation of each document value lives in its own function below.

use ash::vk;
use lumen_engine::lumen::config::{CullMode, FrontFace, InputRate, PolygonMode, Topology};
use lumen_engine::lumen::resource::Vertex;
use lumen_engine::lumen::Result;
use lumen_engine::{engine_bail_warn, engine_debug, engine_err, engine_warn};
use std::ffi::CStr;

use crate::vulkan_device::GraphicsDevice;
use crate::vulkan_shader::ShaderEffect;

const SOURCE: &str = "lumen::vulkan";

const ENTRY_POINT: &CStr = c"main";

/// A pipeline and the point it binds to
pub struct ShaderPass {
    pipeline: vk::Pipeline,
    bind_point: vk::PipelineBindPoint,
}

impl ShaderPass {
    pub fn pipeline(&self) -> vk::Pipeline {
        self.pipeline
    }

    pub fn bind_point(&self) -> vk::PipelineBindPoint {
        self.bind_point
    }

    /// Bind the pipeline into a command buffer
    pub fn bind(&self, device: &GraphicsDevice, command_buffer: vk::CommandBuffer) {
        unsafe {
            device.device().cmd_bind_pipeline(command_buffer, self.bind_point, self.pipeline);
        }
    }

    pub fn destroy(mut self, device: &GraphicsDevice) {
        unsafe {
            device.device().destroy_pipeline(self.pipeline, None);
        }
        self.pipeline = vk::Pipeline::null();
    }
}

impl Drop for ShaderPass {
    fn drop(&mut self) {
        if self.pipeline != vk::Pipeline::null() {
            engine_warn!(SOURCE, "ShaderPass ({:?}) dropped without destroy(); pipeline leaks",
                self.bind_point);
        }
    }
}

pub fn vertex_input_rate(rate: InputRate) -> vk::VertexInputRate {
    match rate {
        InputRate::Vertex => vk::VertexInputRate::VERTEX,
        InputRate::Instance => vk::VertexInputRate::INSTANCE,
    }
}

/// Triangle list; unrecognized values are built as a triangle list as well
pub fn primitive_topology(topology: &Topology) -> vk::PrimitiveTopology {
    if let Topology::Unrecognized(value) = topology {
        engine_warn!(SOURCE, "Unrecognized topology '{}', using a triangle list", value);
    }
    vk::PrimitiveTopology::TRIANGLE_LIST
}

pub fn cull_mode_flags(mode: CullMode) -> vk::CullModeFlags {
    match mode {
        CullMode::None => vk::CullModeFlags::NONE,
        CullMode::Back => vk::CullModeFlags::BACK,
        CullMode::Front => vk::CullModeFlags::FRONT,
    }
}

pub fn front_face(face: FrontFace) -> vk::FrontFace {
    match face {
        FrontFace::CounterClockwise => vk::FrontFace::COUNTER_CLOCKWISE,
        FrontFace::Clockwise => vk::FrontFace::CLOCKWISE,
    }
}

pub fn polygon_mode(mode: PolygonMode) -> vk::PolygonMode {
    match mode {
        PolygonMode::Fill => vk::PolygonMode::FILL,
        PolygonMode::Wireframe => vk::PolygonMode::LINE,
    }
}

/// Channels written by an attachment with `components` color components
pub fn color_write_mask(components: u32) -> vk::ColorComponentFlags {
    match components {
        1 => vk::ColorComponentFlags::R,
        2 => vk::ColorComponentFlags::R | vk::ColorComponentFlags::G,
        3 => vk::ColorComponentFlags::R | vk::ColorComponentFlags::G | vk::ColorComponentFlags::B,
        _ => vk::ColorComponentFlags::RGBA,
    }
}

/// Position, normal and uv of [`Vertex`] on binding 0
pub(crate) fn vertex_attributes() -> [vk::VertexInputAttributeDescription; 3] {
    [
        vk::VertexInputAttributeDescription {
            location: 0,
            binding: 0,
            format: vk::Format::R32G32B32_SFLOAT,
            offset: Vertex::POSITION_OFFSET,
        },
        vk::VertexInputAttributeDescription {
            location: 1,
            binding: 0,
            format: vk::Format::R32G32B32_SFLOAT,
            offset: Vertex::NORMAL_OFFSET,
        },
        vk::VertexInputAttributeDescription {
            location: 2,
            binding: 0,
            format: vk::Format::R32G32_SFLOAT,
            offset: Vertex::UV_OFFSET,
        },
    ]
}

/// Build the graphics pipeline of `effect` for `subpass` of `render_pass`
pub fn build_graphics_shader_pass(
    device: &GraphicsDevice,
    effect: &ShaderEffect,
    render_pass: vk::RenderPass,
    subpass: u32,
) -> Result<ShaderPass> {
    let Some(config) = effect.config() else {
        engine_bail_warn!(SOURCE, "build_graphics_shader_pass: effect has no pipeline-state document (compute effect?)");
    };

    let shader_stages: Vec<vk::PipelineShaderStageCreateInfo> = effect
        .stages()
        .iter()
        .map(|stage| {
            vk::PipelineShaderStageCreateInfo::default()
                .stage(stage.stage)
                .module(stage.module)
                .name(ENTRY_POINT)
        })
        .collect();

    // Vertex input state
    let vertex_bindings = [vk::VertexInputBindingDescription {
        binding: 0,
        stride: std::mem::size_of::<Vertex>() as u32,
        input_rate: vertex_input_rate(config.input_rate),
    }];
    let attributes = vertex_attributes();
    let vertex_input_state = if config.enable_vertex_attribs {
        vk::PipelineVertexInputStateCreateInfo::default()
            .vertex_binding_descriptions(&vertex_bindings)
            .vertex_attribute_descriptions(&attributes)
    } else {
        vk::PipelineVertexInputStateCreateInfo::default()
    };

    let input_assembly_state = vk::PipelineInputAssemblyStateCreateInfo::default()
        .topology(primitive_topology(&config.topology))
        .primitive_restart_enable(false);

    // Viewport and scissor are dynamic
    let viewport_state = vk::PipelineViewportStateCreateInfo::default()
        .viewport_count(1)
        .scissor_count(1);

    let rasterization_state = vk::PipelineRasterizationStateCreateInfo::default()
        .depth_clamp_enable(false)
        .rasterizer_discard_enable(false)
        .polygon_mode(polygon_mode(config.polygon_mode))
        .line_width(1.0)
        .cull_mode(cull_mode_flags(config.cull_mode))
        .front_face(front_face(config.front_face))
        .depth_bias_enable(false);

    let multisample_state = vk::PipelineMultisampleStateCreateInfo::default()
        .sample_shading_enable(false)
        .rasterization_samples(vk::SampleCountFlags::TYPE_1);

    let depth_stencil_state = vk::PipelineDepthStencilStateCreateInfo::default()
        .depth_test_enable(config.depth_test)
        .depth_write_enable(true)
        .depth_compare_op(vk::CompareOp::GREATER_OR_EQUAL)
        .depth_bounds_test_enable(false)
        .stencil_test_enable(false);

    let color_blend_attachments: Vec<vk::PipelineColorBlendAttachmentState> = config
        .color_attachment_descs
        .iter()
        .map(|attachment| {
            vk::PipelineColorBlendAttachmentState::default()
                .color_write_mask(color_write_mask(attachment.num_color_component))
                .blend_enable(false)
        })
        .collect();
    let color_blend_state = vk::PipelineColorBlendStateCreateInfo::default()
        .logic_op_enable(false)
        .attachments(&color_blend_attachments);

    let dynamic_states = [vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR];
    let dynamic_state = vk::PipelineDynamicStateCreateInfo::default()
        .dynamic_states(&dynamic_states);

    let pipeline_create_info = vk::GraphicsPipelineCreateInfo::default()
        .stages(&shader_stages)
        .vertex_input_state(&vertex_input_state)
        .input_assembly_state(&input_assembly_state)
        .viewport_state(&viewport_state)
        .rasterization_state(&rasterization_state)
        .multisample_state(&multisample_state)
        .depth_stencil_state(&depth_stencil_state)
        .color_blend_state(&color_blend_state)
        .dynamic_state(&dynamic_state)
        .layout(effect.pipeline_layout())
        .render_pass(render_pass)
        .subpass(subpass);

    let pipelines = unsafe {
        device.device()
            .create_graphics_pipelines(vk::PipelineCache::null(), &[pipeline_create_info], None)
            .map_err(|e| engine_err!(SOURCE, "Failed to create graphics pipeline: {:?}", e.1))?
    };

    engine_debug!(SOURCE, "Graphics pipeline created ({} color attachments, depth test {})",
        color_blend_attachments.len(), config.depth_test);

    Ok(ShaderPass {
        pipeline: pipelines[0],
        bind_point: vk::PipelineBindPoint::GRAPHICS,
    })
}

/// Build the compute pipeline of a single-stage compute effect
pub fn build_compute_shader_pass(device: &GraphicsDevice, effect: &ShaderEffect) -> Result<ShaderPass> {
    let compute_stage = match effect.stages() {
        [stage] if stage.stage == vk::ShaderStageFlags::COMPUTE => *stage,
        stages => {
            engine_bail_warn!(SOURCE, "build_compute_shader_pass: expected one compute stage, got {:?}",
                stages.iter().map(|s| s.stage).collect::<Vec<_>>());
        }
    };

    let stage_info = vk::PipelineShaderStageCreateInfo::default()
        .stage(vk::ShaderStageFlags::COMPUTE)
        .module(compute_stage.module)
        .name(ENTRY_POINT);

    let pipeline_create_info = vk::ComputePipelineCreateInfo::default()
        .stage(stage_info)
        .layout(effect.pipeline_layout());

    let pipelines = unsafe {
        device.device()
            .create_compute_pipelines(vk::PipelineCache::null(), &[pipeline_create_info], None)
            .map_err(|e| engine_err!(SOURCE, "Failed to create compute pipeline: {:?}", e.1))?
    };

    Ok(ShaderPass {
        pipeline: pipelines[0],
        bind_point: vk::PipelineBindPoint::COMPUTE,
    })
}

#[cfg(test)]
#[path = "vulkan_pipeline_tests.rs"]
mod tests;
