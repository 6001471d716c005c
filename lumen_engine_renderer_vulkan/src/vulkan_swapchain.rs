/// Swapchain - presentable images for the device's surface
///
/// Creation policy lives in the `choose_*` functions so it can be checked
/// without a GPU. Staleness (out-of-date / suboptimal) is logged and reported
/// back as [`AcquireOutcome`] / [`PresentStatus`]; recreating the chain is the
/// caller's decision.

use ash::vk;
use lumen_engine::lumen::frame::{AcquireOutcome, PresentStatus};
use lumen_engine::lumen::{Error, Result};
use lumen_engine::{engine_bail_warn, engine_err, engine_error, engine_info, engine_warn};

use crate::vulkan_device::GraphicsDevice;
use crate::vulkan_image::create_image_view;

const SOURCE: &str = "lumen::vulkan";

/// Surface extent: the surface's own when it reports one, else `desired`
/// clamped to the supported range
pub fn choose_swap_extent(
    capabilities: &vk::SurfaceCapabilitiesKHR,
    desired: vk::Extent2D,
) -> vk::Extent2D {
    if capabilities.current_extent.width != u32::MAX {
        return capabilities.current_extent;
    }
    vk::Extent2D {
        width: desired.width.clamp(
            capabilities.min_image_extent.width,
            capabilities.max_image_extent.width,
        ),
        height: desired.height.clamp(
            capabilities.min_image_extent.height,
            capabilities.max_image_extent.height,
        ),
    }
}

/// MAILBOX when offered, otherwise FIFO (always supported)
pub fn choose_present_mode(available: &[vk::PresentModeKHR]) -> vk::PresentModeKHR {
    if available.contains(&vk::PresentModeKHR::MAILBOX) {
        vk::PresentModeKHR::MAILBOX
    } else {
        vk::PresentModeKHR::FIFO
    }
}

/// B8G8R8A8_UNORM / SRGB_NONLINEAR when offered, otherwise the first format reported
pub fn choose_surface_format(available: &[vk::SurfaceFormatKHR]) -> Option<vk::SurfaceFormatKHR> {
    available
        .iter()
        .find(|format| {
            format.format == vk::Format::B8G8R8A8_UNORM
                && format.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR
        })
        .or_else(|| available.first())
        .copied()
}

/// One more than the minimum, capped by the maximum (0 means no maximum)
pub fn choose_image_count(capabilities: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let count = capabilities.min_image_count + 1;
    if capabilities.max_image_count > 0 {
        count.min(capabilities.max_image_count)
    } else {
        count
    }
}

/// Create one object per item; on the first failure release those already created
pub(crate) fn create_all_or_release<T, U>(
    items: &[T],
    mut create: impl FnMut(&T) -> Result<U>,
    mut release: impl FnMut(U),
) -> Result<Vec<U>> {
    let mut created = Vec::with_capacity(items.len());
    for item in items {
        match create(item) {
            Ok(object) => created.push(object),
            Err(e) => {
                for object in created {
                    release(object);
                }
                return Err(e);
            }
        }
    }
    Ok(created)
}

/// The swapchain and one 2D view per image
pub struct Swapchain {
    swapchain: vk::SwapchainKHR,
    images: Vec<vk::Image>,
    image_views: Vec<vk::ImageView>,
    surface_format: vk::SurfaceFormatKHR,
    present_mode: vk::PresentModeKHR,
    extent: vk::Extent2D,
}

impl Swapchain {
    pub fn new(device: &GraphicsDevice, desired_extent: vk::Extent2D) -> Result<Self> {
        Self::build(device, desired_extent, vk::SwapchainKHR::null())
    }

    fn build(
        device: &GraphicsDevice,
        desired_extent: vk::Extent2D,
        old_swapchain: vk::SwapchainKHR,
    ) -> Result<Self> {
        let surface_loader = device.surface_loader();
        let physical_device = device.physical_device();
        let surface = device.surface();

        let (capabilities, formats, present_modes) = unsafe {
            let capabilities = surface_loader
                .get_physical_device_surface_capabilities(physical_device, surface)
                .map_err(|e| {
                    engine_error!(SOURCE, "Failed to get surface capabilities: {:?}", e);
                    Error::InitializationFailed(format!("Failed to get surface capabilities: {:?}", e))
                })?;
            let formats = surface_loader
                .get_physical_device_surface_formats(physical_device, surface)
                .map_err(|e| {
                    engine_error!(SOURCE, "Failed to query surface formats: {:?}", e);
                    Error::InitializationFailed(format!("Failed to get surface formats: {:?}", e))
                })?;
            let present_modes = surface_loader
                .get_physical_device_surface_present_modes(physical_device, surface)
                .map_err(|e| {
                    engine_error!(SOURCE, "Failed to query present modes: {:?}", e);
                    Error::InitializationFailed(format!("Failed to get present modes: {:?}", e))
                })?;
            (capabilities, formats, present_modes)
        };

        let Some(surface_format) = choose_surface_format(&formats) else {
            engine_error!(SOURCE, "Surface reports no formats");
            return Err(Error::InitializationFailed("Surface reports no formats".to_string()));
        };
        let present_mode = choose_present_mode(&present_modes);
        let extent = choose_swap_extent(&capabilities, desired_extent);
        if extent.width == 0 || extent.height == 0 {
            engine_bail_warn!(SOURCE, "Cannot create a {}x{} swapchain (window minimized?)",
                extent.width, extent.height);
        }

        let create_info = vk::SwapchainCreateInfoKHR::default()
            .surface(surface)
            .min_image_count(choose_image_count(&capabilities))
            .image_format(surface_format.format)
            .image_color_space(surface_format.color_space)
            .image_extent(extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .image_sharing_mode(vk::SharingMode::EXCLUSIVE)
            .pre_transform(capabilities.current_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(present_mode)
            .clipped(true)
            .old_swapchain(old_swapchain);

        let loader = device.swapchain_loader();
        let swapchain = unsafe {
            loader.create_swapchain(&create_info, None)
                .map_err(|e| engine_err!(SOURCE, "Failed to create swapchain: {:?}", e))?
        };

        let images = match unsafe { loader.get_swapchain_images(swapchain) } {
            Ok(images) => images,
            Err(e) => {
                unsafe { loader.destroy_swapchain(swapchain, None) };
                return Err(engine_err!(SOURCE, "Failed to get swapchain images: {:?}", e));
            }
        };

        let views = create_all_or_release(
            &images,
            |&image| {
                create_image_view(
                    device,
                    image,
                    vk::ImageViewType::TYPE_2D,
                    surface_format.format,
                    vk::ImageAspectFlags::COLOR,
                    0, 1, 0, 1,
                )
            },
            |view| unsafe { device.device().destroy_image_view(view, None) },
        );
        let image_views = match views {
            Ok(views) => views,
            Err(e) => {
                unsafe { loader.destroy_swapchain(swapchain, None) };
                return Err(e);
            }
        };

        engine_info!(SOURCE, "Swapchain {}x{}, {} images, {:?}, {:?}",
            extent.width, extent.height, images.len(), surface_format.format, present_mode);

        Ok(Self {
            swapchain,
            images,
            image_views,
            surface_format,
            present_mode,
            extent,
        })
    }

    pub fn handle(&self) -> vk::SwapchainKHR {
        self.swapchain
    }

    pub fn format(&self) -> vk::Format {
        self.surface_format.format
    }

    pub fn surface_format(&self) -> vk::SurfaceFormatKHR {
        self.surface_format
    }

    pub fn present_mode(&self) -> vk::PresentModeKHR {
        self.present_mode
    }

    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    pub fn images(&self) -> &[vk::Image] {
        &self.images
    }

    pub fn image_views(&self) -> &[vk::ImageView] {
        &self.image_views
    }

    /// Rebuild the chain at `new_extent`, handing the old chain to the driver
    ///
    /// Framebuffers and other views of the old images must already be destroyed.
    pub fn recreate(&mut self, device: &GraphicsDevice, new_extent: vk::Extent2D) -> Result<()> {
        device.wait_idle()?;

        let fresh = Self::build(device, new_extent, self.swapchain)?;
        let old = std::mem::replace(self, fresh);
        old.destroy(device);
        Ok(())
    }

    /// Acquire the next image, signaling `semaphore`. Blocks without timeout.
    pub fn acquire_next_image(
        &self,
        device: &GraphicsDevice,
        semaphore: vk::Semaphore,
    ) -> Result<AcquireOutcome> {
        let acquired = unsafe {
            device.swapchain_loader().acquire_next_image(
                self.swapchain,
                u64::MAX,
                semaphore,
                vk::Fence::null(),
            )
        };

        match acquired {
            Ok((image_index, suboptimal)) => {
                if suboptimal {
                    engine_warn!(SOURCE, "Swapchain is suboptimal (acquire)");
                }
                Ok(AcquireOutcome::Acquired { image_index, suboptimal })
            }
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
                engine_warn!(SOURCE, "Swapchain out of date during acquire");
                Ok(AcquireOutcome::OutOfDate)
            }
            Err(e) => Err(engine_err!(SOURCE, "Failed to acquire next swapchain image: {:?}", e)),
        }
    }

    /// Queue `image_index` for presentation once `wait_semaphore` is signaled
    pub fn present(
        &self,
        device: &GraphicsDevice,
        wait_semaphore: vk::Semaphore,
        image_index: u32,
    ) -> Result<PresentStatus> {
        if image_index as usize >= self.images.len() {
            engine_bail_warn!(SOURCE, "present: image_index {} out of range (count: {})",
                image_index, self.images.len());
        }

        let wait_semaphores = [wait_semaphore];
        let swapchains = [self.swapchain];
        let image_indices = [image_index];
        let present_info = vk::PresentInfoKHR::default()
            .wait_semaphores(&wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        let presented = unsafe {
            device.swapchain_loader().queue_present(device.present_queue(), &present_info)
        };

        match presented {
            Ok(false) => Ok(PresentStatus::Optimal),
            Ok(true) => {
                engine_warn!(SOURCE, "Swapchain is suboptimal (present)");
                Ok(PresentStatus::Suboptimal)
            }
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
                engine_warn!(SOURCE, "Swapchain out of date during present");
                Ok(PresentStatus::OutOfDate)
            }
            Err(e) => Err(engine_err!(SOURCE, "Failed to present swapchain image: {:?}", e)),
        }
    }

    /// Destroy the views and the chain. The GPU must be done with them.
    pub fn destroy(mut self, device: &GraphicsDevice) {
        unsafe {
            for view in self.image_views.drain(..) {
                device.device().destroy_image_view(view, None);
            }
            device.swapchain_loader().destroy_swapchain(self.swapchain, None);
        }
        self.swapchain = vk::SwapchainKHR::null();
    }
}

impl Drop for Swapchain {
    fn drop(&mut self) {
        if self.swapchain != vk::SwapchainKHR::null() {
            engine_warn!(SOURCE, "Swapchain dropped without destroy(); {} views leak", self.image_views.len());
        }
    }
}

#[cfg(test)]
#[path = "vulkan_swapchain_tests.rs"]
mod tests;
