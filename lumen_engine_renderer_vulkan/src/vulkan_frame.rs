/// Frames in flight: per-slot Vulkan objects and the Vulkan [`FrameBackend`]
///
/// The ordering of waits, resets and submissions belongs to
/// [`FrameScheduler`](lumen_engine::lumen::frame::FrameScheduler); this
/// module only performs each step on the slot it is given.

use ash::vk;
use lumen_engine::lumen::frame::{AcquireOutcome, FrameBackend, PerFrame, PresentStatus};
use lumen_engine::lumen::{Error, Result};
use lumen_engine::{engine_err, engine_error, engine_warn};

use crate::vulkan_device::GraphicsDevice;
use crate::vulkan_swapchain::Swapchain;

const SOURCE: &str = "lumen::frame";

/// Synchronization objects and command storage of one frame slot
pub struct Frame {
    command_pool: vk::CommandPool,
    command_buffer: vk::CommandBuffer,
    image_ready: vk::Semaphore,
    render_finished: vk::Semaphore,
    /// Created signaled so the first wait on the slot returns at once
    in_flight: vk::Fence,
}

impl Frame {
    pub fn new(device: &GraphicsDevice) -> Result<Self> {
        let vk_device = device.device();
        unsafe {
            let pool_info = vk::CommandPoolCreateInfo::default()
                .queue_family_index(device.graphics_queue_family())
                .flags(vk::CommandPoolCreateFlags::TRANSIENT);
            let command_pool = vk_device.create_command_pool(&pool_info, None)
                .map_err(|e| {
                    engine_error!(SOURCE, "Failed to create frame command pool: {:?}", e);
                    Error::InitializationFailed(format!("Failed to create frame command pool: {:?}", e))
                })?;

            let mut frame = Self {
                command_pool,
                command_buffer: vk::CommandBuffer::null(),
                image_ready: vk::Semaphore::null(),
                render_finished: vk::Semaphore::null(),
                in_flight: vk::Fence::null(),
            };
            if let Err(e) = frame.create_sync_objects(device) {
                frame.destroy(device);
                return Err(e);
            }
            Ok(frame)
        }
    }

    fn create_sync_objects(&mut self, device: &GraphicsDevice) -> Result<()> {
        let vk_device = device.device();
        unsafe {
            let alloc_info = vk::CommandBufferAllocateInfo::default()
                .command_pool(self.command_pool)
                .level(vk::CommandBufferLevel::PRIMARY)
                .command_buffer_count(1);
            self.command_buffer = vk_device.allocate_command_buffers(&alloc_info)
                .map_err(|e| engine_err!(SOURCE, "Failed to allocate frame command buffer: {:?}", e))?[0];

            let semaphore_info = vk::SemaphoreCreateInfo::default();
            self.image_ready = vk_device.create_semaphore(&semaphore_info, None)
                .map_err(|e| engine_err!(SOURCE, "Failed to create image-ready semaphore: {:?}", e))?;
            self.render_finished = vk_device.create_semaphore(&semaphore_info, None)
                .map_err(|e| engine_err!(SOURCE, "Failed to create render-finished semaphore: {:?}", e))?;

            let fence_info = vk::FenceCreateInfo::default().flags(vk::FenceCreateFlags::SIGNALED);
            self.in_flight = vk_device.create_fence(&fence_info, None)
                .map_err(|e| engine_err!(SOURCE, "Failed to create in-flight fence: {:?}", e))?;
        }
        Ok(())
    }

    /// Build all slots, releasing the already built ones if one fails
    pub fn create_all(device: &GraphicsDevice) -> Result<PerFrame<Frame>> {
        PerFrame::try_from_fn(|_| Frame::new(device), |frame| frame.destroy(device))
    }

    pub fn command_buffer(&self) -> vk::CommandBuffer {
        self.command_buffer
    }

    pub fn image_ready(&self) -> vk::Semaphore {
        self.image_ready
    }

    pub fn render_finished(&self) -> vk::Semaphore {
        self.render_finished
    }

    pub fn in_flight_fence(&self) -> vk::Fence {
        self.in_flight
    }

    /// Destroy the slot's objects. The device must be idle.
    pub fn destroy(mut self, device: &GraphicsDevice) {
        let vk_device = device.device();
        unsafe {
            vk_device.destroy_fence(self.in_flight, None);
            vk_device.destroy_semaphore(self.render_finished, None);
            vk_device.destroy_semaphore(self.image_ready, None);
            vk_device.destroy_command_pool(self.command_pool, None);
        }
        self.command_pool = vk::CommandPool::null();
    }
}

impl Drop for Frame {
    fn drop(&mut self) {
        if self.command_pool != vk::CommandPool::null() {
            engine_warn!(SOURCE, "Frame dropped without destroy(); its pool, semaphores and fence leak");
        }
    }
}

/// [`FrameBackend`] over a device, a swapchain and the frame ring
pub struct VulkanFrameBackend<'a> {
    device: &'a GraphicsDevice,
    swapchain: &'a Swapchain,
    frames: &'a PerFrame<Frame>,
}

impl<'a> VulkanFrameBackend<'a> {
    pub fn new(device: &'a GraphicsDevice, swapchain: &'a Swapchain, frames: &'a PerFrame<Frame>) -> Self {
        Self { device, swapchain, frames }
    }
}

impl FrameBackend for VulkanFrameBackend<'_> {
    type CommandBuffer = vk::CommandBuffer;

    fn wait_for_slot(&mut self, slot: usize) -> Result<()> {
        let fences = [self.frames[slot].in_flight];
        unsafe {
            self.device.device().wait_for_fences(&fences, true, u64::MAX)
                .map_err(|e| engine_err!(SOURCE, "Failed to wait for frame fence {}: {:?}", slot, e))
        }
    }

    fn acquire_image(&mut self, slot: usize) -> Result<AcquireOutcome> {
        self.swapchain.acquire_next_image(self.device, self.frames[slot].image_ready)
    }

    fn reset_slot_fence(&mut self, slot: usize) -> Result<()> {
        let fences = [self.frames[slot].in_flight];
        unsafe {
            self.device.device().reset_fences(&fences)
                .map_err(|e| engine_err!(SOURCE, "Failed to reset frame fence {}: {:?}", slot, e))
        }
    }

    fn begin_commands(&mut self, slot: usize) -> Result<vk::CommandBuffer> {
        let frame = &self.frames[slot];
        let vk_device = self.device.device();
        unsafe {
            // Recycles the slot's command buffer as well
            vk_device.reset_command_pool(frame.command_pool, vk::CommandPoolResetFlags::empty())
                .map_err(|e| engine_err!(SOURCE, "Failed to reset frame command pool {}: {:?}", slot, e))?;

            let begin_info = vk::CommandBufferBeginInfo::default()
                .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
            vk_device.begin_command_buffer(frame.command_buffer, &begin_info)
                .map_err(|e| engine_err!(SOURCE, "Failed to begin frame command buffer {}: {:?}", slot, e))?;
        }
        Ok(frame.command_buffer)
    }

    fn submit(&mut self, slot: usize, command_buffer: vk::CommandBuffer) -> Result<()> {
        let frame = &self.frames[slot];
        let vk_device = self.device.device();
        unsafe {
            vk_device.end_command_buffer(command_buffer)
                .map_err(|e| engine_err!(SOURCE, "Failed to end frame command buffer {}: {:?}", slot, e))?;

            let wait_semaphores = [frame.image_ready];
            let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
            let command_buffers = [command_buffer];
            let signal_semaphores = [frame.render_finished];

            let submit_info = vk::SubmitInfo::default()
                .wait_semaphores(&wait_semaphores)
                .wait_dst_stage_mask(&wait_stages)
                .command_buffers(&command_buffers)
                .signal_semaphores(&signal_semaphores);

            vk_device.queue_submit(self.device.graphics_queue(), &[submit_info], frame.in_flight)
                .map_err(|e| engine_err!(SOURCE, "Failed to submit frame {}: {:?}", slot, e))
        }
    }

    fn present(&mut self, slot: usize, image_index: u32) -> Result<PresentStatus> {
        self.swapchain.present(self.device, self.frames[slot].render_finished, image_index)
    }
}
