/// Presentation targets and the per-frame composite recording
///
/// [`PresentTargets`] owns what hangs off the swapchain images: a depth
/// image, the render pass and one framebuffer per image. [`Compositor`]
/// records a frame: compute writes the offscreen target, a full-screen pass
/// samples it into the swapchain image, then the overlay draws on top.

use ash::vk;
use lumen_engine::lumen::{Error, Result};
use lumen_engine::{engine_bail_warn, engine_err, engine_error, engine_info, engine_warn};

use crate::vulkan_device::GraphicsDevice;
use crate::vulkan_image::{cmd_transition_layout, create_image, GpuImage, ImageSpec};
use crate::vulkan_pipeline::ShaderPass;
use crate::vulkan_shader::ShaderEffect;
use crate::vulkan_swapchain::Swapchain;

const SOURCE: &str = "lumen::vulkan";

/// Depth formats in order of preference
pub const DEPTH_FORMAT_CANDIDATES: [vk::Format; 3] = [
    vk::Format::D32_SFLOAT,
    vk::Format::D32_SFLOAT_S8_UINT,
    vk::Format::D24_UNORM_S8_UINT,
];

/// Compute workgroup edge of the offscreen pass
const WORKGROUP_SIZE: u32 = 32;

/// Depth image, render pass and framebuffers for a swapchain
pub struct PresentTargets {
    render_pass: vk::RenderPass,
    depth_format: vk::Format,
    depth: Option<GpuImage>,
    framebuffers: Vec<vk::Framebuffer>,
    extent: vk::Extent2D,
}

impl PresentTargets {
    pub fn new(device: &GraphicsDevice, swapchain: &Swapchain) -> Result<Self> {
        let depth_format = device.find_supported_format(
            &DEPTH_FORMAT_CANDIDATES,
            vk::ImageTiling::OPTIMAL,
            vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT,
        );
        if depth_format == vk::Format::UNDEFINED {
            engine_error!(SOURCE, "No supported depth format among {:?}", DEPTH_FORMAT_CANDIDATES);
            return Err(Error::InitializationFailed("No supported depth format".to_string()));
        }

        let render_pass = create_render_pass(device, swapchain.format(), depth_format)?;
        let mut targets = Self {
            render_pass,
            depth_format,
            depth: None,
            framebuffers: Vec::new(),
            extent: swapchain.extent(),
        };

        if let Err(e) = targets.build_size_dependent(device, swapchain) {
            targets.release(device);
            return Err(e);
        }

        engine_info!(SOURCE, "Present targets ready: {} framebuffers, depth {:?}",
            targets.framebuffers.len(), depth_format);
        Ok(targets)
    }

    fn build_size_dependent(&mut self, device: &GraphicsDevice, swapchain: &Swapchain) -> Result<()> {
        let extent = swapchain.extent();
        let depth = create_image(device, &ImageSpec {
            extent,
            format: self.depth_format,
            mip_levels: 1,
            array_layers: 1,
            usage: vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT,
            cube: false,
        })?;
        let depth_view = depth.view();
        self.depth = Some(depth);

        for &view in swapchain.image_views() {
            let attachments = [view, depth_view];
            let create_info = vk::FramebufferCreateInfo::default()
                .render_pass(self.render_pass)
                .attachments(&attachments)
                .width(extent.width)
                .height(extent.height)
                .layers(1);
            let framebuffer = unsafe {
                device.device().create_framebuffer(&create_info, None)
                    .map_err(|e| engine_err!(SOURCE, "Failed to create framebuffer: {:?}", e))?
            };
            self.framebuffers.push(framebuffer);
        }

        self.extent = extent;
        Ok(())
    }

    fn release_size_dependent(&mut self, device: &GraphicsDevice) -> Result<()> {
        unsafe {
            for framebuffer in self.framebuffers.drain(..) {
                device.device().destroy_framebuffer(framebuffer, None);
            }
        }
        match self.depth.take() {
            Some(depth) => depth.destroy(device),
            None => Ok(()),
        }
    }

    fn release(&mut self, device: &GraphicsDevice) {
        if let Err(e) = self.release_size_dependent(device) {
            engine_warn!(SOURCE, "Failed to release depth image: {}", e);
        }
        unsafe {
            device.device().destroy_render_pass(self.render_pass, None);
        }
        self.render_pass = vk::RenderPass::null();
    }

    pub fn render_pass(&self) -> vk::RenderPass {
        self.render_pass
    }

    pub fn depth_format(&self) -> vk::Format {
        self.depth_format
    }

    pub fn framebuffers(&self) -> &[vk::Framebuffer] {
        &self.framebuffers
    }

    pub fn framebuffer(&self, image_index: u32) -> Option<vk::Framebuffer> {
        self.framebuffers.get(image_index as usize).copied()
    }

    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    /// Rebuild the swapchain at `extent` along with the depth image and framebuffers
    ///
    /// The render pass is kept; the surface format chosen for a given surface
    /// does not change across recreation.
    pub fn recreate(
        &mut self,
        device: &GraphicsDevice,
        swapchain: &mut Swapchain,
        extent: vk::Extent2D,
    ) -> Result<()> {
        device.wait_idle()?;
        self.release_size_dependent(device)?;
        swapchain.recreate(device, extent)?;
        self.build_size_dependent(device, swapchain)?;

        engine_info!(SOURCE, "Present targets recreated at {}x{}",
            self.extent.width, self.extent.height);
        Ok(())
    }

    /// Destroy framebuffers, depth image and render pass. The GPU must be done with them.
    pub fn destroy(mut self, device: &GraphicsDevice) -> Result<()> {
        let released = self.release_size_dependent(device);
        unsafe {
            device.device().destroy_render_pass(self.render_pass, None);
        }
        self.render_pass = vk::RenderPass::null();
        released
    }
}

impl Drop for PresentTargets {
    fn drop(&mut self) {
        if self.render_pass != vk::RenderPass::null() {
            engine_warn!(SOURCE, "PresentTargets dropped without destroy(); {} framebuffers leak",
                self.framebuffers.len());
        }
    }
}

/// Color cleared and presented; depth cleared and discarded
fn create_render_pass(
    device: &GraphicsDevice,
    color_format: vk::Format,
    depth_format: vk::Format,
) -> Result<vk::RenderPass> {
    let attachments = [
        vk::AttachmentDescription::default()
            .format(color_format)
            .samples(vk::SampleCountFlags::TYPE_1)
            .load_op(vk::AttachmentLoadOp::CLEAR)
            .store_op(vk::AttachmentStoreOp::STORE)
            .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
            .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
            .initial_layout(vk::ImageLayout::UNDEFINED)
            .final_layout(vk::ImageLayout::PRESENT_SRC_KHR),
        vk::AttachmentDescription::default()
            .format(depth_format)
            .samples(vk::SampleCountFlags::TYPE_1)
            .load_op(vk::AttachmentLoadOp::CLEAR)
            .store_op(vk::AttachmentStoreOp::DONT_CARE)
            .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
            .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
            .initial_layout(vk::ImageLayout::UNDEFINED)
            .final_layout(vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL),
    ];

    let color_refs = [vk::AttachmentReference {
        attachment: 0,
        layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
    }];
    let depth_ref = vk::AttachmentReference {
        attachment: 1,
        layout: vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
    };
    let subpasses = [vk::SubpassDescription::default()
        .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
        .color_attachments(&color_refs)
        .depth_stencil_attachment(&depth_ref)];

    let attachment_stages = vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT
        | vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS;
    let dependencies = [vk::SubpassDependency::default()
        .src_subpass(vk::SUBPASS_EXTERNAL)
        .dst_subpass(0)
        .src_stage_mask(attachment_stages)
        .src_access_mask(vk::AccessFlags::empty())
        .dst_stage_mask(attachment_stages)
        .dst_access_mask(
            vk::AccessFlags::COLOR_ATTACHMENT_WRITE | vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
        )];

    let create_info = vk::RenderPassCreateInfo::default()
        .attachments(&attachments)
        .subpasses(&subpasses)
        .dependencies(&dependencies);

    unsafe {
        device.device().create_render_pass(&create_info, None)
            .map_err(|e| engine_err!(SOURCE, "Failed to create render pass: {:?}", e))
    }
}

/// Workgroups covering an image with 32x32 groups
pub(crate) fn dispatch_group_count(extent: vk::Extent2D) -> (u32, u32, u32) {
    (extent.width / WORKGROUP_SIZE + 1, extent.height / WORKGROUP_SIZE + 1, 1)
}

/// Viewport with +Y up: origin at the bottom edge, negative height
pub(crate) fn flipped_viewport(extent: vk::Extent2D) -> vk::Viewport {
    vk::Viewport {
        x: 0.0,
        y: extent.height as f32,
        width: extent.width as f32,
        height: -(extent.height as f32),
        min_depth: 0.0,
        max_depth: 1.0,
    }
}

/// The two passes of a frame and their descriptor sets
pub struct Compositor<'a> {
    pub compute_effect: &'a ShaderEffect,
    pub compute_pass: &'a ShaderPass,
    pub compute_set: vk::DescriptorSet,
    pub composite_effect: &'a ShaderEffect,
    pub composite_pass: &'a ShaderPass,
    pub composite_set: vk::DescriptorSet,
}

impl Compositor<'_> {
    /// Record one frame into `command_buffer`
    ///
    /// `target` is written by the compute pass in GENERAL layout, then moved
    /// to SHADER_READ_ONLY for the composite pass. `overlay` records inside
    /// the render pass, after the composite draw.
    pub fn record<F>(
        &self,
        device: &GraphicsDevice,
        command_buffer: vk::CommandBuffer,
        target: &mut GpuImage,
        targets: &PresentTargets,
        image_index: u32,
        overlay: F,
    ) -> Result<()>
    where
        F: FnOnce(vk::CommandBuffer),
    {
        let Some(framebuffer) = targets.framebuffer(image_index) else {
            engine_bail_warn!(SOURCE, "Compositor: image_index {} out of range ({} framebuffers)",
                image_index, targets.framebuffers().len());
        };
        let vk_device = device.device();
        let extent = targets.extent();

        cmd_transition_layout(device, command_buffer, target, vk::ImageLayout::GENERAL)?;

        let (groups_x, groups_y, groups_z) = dispatch_group_count(target.extent());
        unsafe {
            self.compute_pass.bind(device, command_buffer);
            vk_device.cmd_bind_descriptor_sets(
                command_buffer,
                vk::PipelineBindPoint::COMPUTE,
                self.compute_effect.pipeline_layout(),
                0,
                &[self.compute_set],
                &[],
            );
            vk_device.cmd_dispatch(command_buffer, groups_x, groups_y, groups_z);
        }

        cmd_transition_layout(device, command_buffer, target, vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL)?;

        // Reverse depth: the far plane is 0
        let clear_values = [
            vk::ClearValue {
                color: vk::ClearColorValue { float32: [0.0, 0.0, 0.0, 1.0] },
            },
            vk::ClearValue {
                depth_stencil: vk::ClearDepthStencilValue { depth: 0.0, stencil: 0 },
            },
        ];
        let render_area = vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent,
        };
        let begin_info = vk::RenderPassBeginInfo::default()
            .render_pass(targets.render_pass())
            .framebuffer(framebuffer)
            .render_area(render_area)
            .clear_values(&clear_values);

        unsafe {
            vk_device.cmd_begin_render_pass(command_buffer, &begin_info, vk::SubpassContents::INLINE);
            vk_device.cmd_set_viewport(command_buffer, 0, &[flipped_viewport(extent)]);
            vk_device.cmd_set_scissor(command_buffer, 0, &[render_area]);

            self.composite_pass.bind(device, command_buffer);
            vk_device.cmd_bind_descriptor_sets(
                command_buffer,
                vk::PipelineBindPoint::GRAPHICS,
                self.composite_effect.pipeline_layout(),
                0,
                &[self.composite_set],
                &[],
            );
            vk_device.cmd_draw(command_buffer, 6, 1, 0, 0);
        }

        overlay(command_buffer);

        unsafe {
            vk_device.cmd_end_render_pass(command_buffer);
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "vulkan_present_tests.rs"]
mod tests;
