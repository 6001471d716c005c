/// Graphics device: instance, surface, adapter, logical device, queues and allocator
///
/// The device is the root of every Vulkan object in the crate. Resources
/// borrow it for creation and destruction; it must be dropped last, after
/// everything built from it has been destroyed.

use ash::vk;
use gpu_allocator::vulkan::{Allocator, AllocatorCreateDesc};
use lumen_engine::lumen::config::DeviceConfig;
use lumen_engine::lumen::{Error, Result};
use lumen_engine::{engine_err, engine_error, engine_info, engine_warn};
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use std::ffi::CString;
use std::mem::ManuallyDrop;
use std::sync::{Mutex, MutexGuard};

use crate::vulkan_adapter::{GraphicsAdapter, REQUIRED_DEVICE_EXTENSIONS};

const SOURCE: &str = "lumen::vulkan";
const VALIDATION_LAYER: &std::ffi::CStr = c"VK_LAYER_KHRONOS_validation";

/// Command pool + buffer reused by every synchronous one-off submission
struct TempCommands {
    pool: vk::CommandPool,
    buffer: vk::CommandBuffer,
}

/// Objects built so far by [`GraphicsDevice::new`], destroyed in reverse
/// order if a later step fails
#[derive(Default)]
struct PartialInit {
    instance: Option<ash::Instance>,
    debug_config: bool,
    debug_utils: Option<(ash::ext::debug_utils::Instance, vk::DebugUtilsMessengerEXT)>,
    surface: Option<(ash::khr::surface::Instance, vk::SurfaceKHR)>,
    device: Option<ash::Device>,
    temp_pool: Option<vk::CommandPool>,
}

impl PartialInit {
    /// Hand ownership to the finished device
    fn complete(mut self) {
        self.temp_pool = None;
        self.device = None;
        self.surface = None;
        self.debug_utils = None;
        self.debug_config = false;
        self.instance = None;
    }
}

impl Drop for PartialInit {
    fn drop(&mut self) {
        unsafe {
            if let Some(device) = self.device.take() {
                if let Some(pool) = self.temp_pool.take() {
                    device.destroy_command_pool(pool, None);
                }
                device.destroy_device(None);
            }
            if let Some((loader, surface)) = self.surface.take() {
                loader.destroy_surface(surface, None);
            }
            if self.debug_config {
                crate::debug::cleanup_debug_config();
            }
            if let Some((loader, messenger)) = self.debug_utils.take() {
                loader.destroy_debug_utils_messenger(messenger, None);
            }
            if let Some(instance) = self.instance.take() {
                instance.destroy_instance(None);
            }
        }
    }
}

/// Vulkan graphics device
pub struct GraphicsDevice {
    _entry: ash::Entry,
    instance: ash::Instance,
    debug_utils: Option<(ash::ext::debug_utils::Instance, vk::DebugUtilsMessengerEXT)>,
    surface_loader: ash::khr::surface::Instance,
    surface: vk::SurfaceKHR,
    adapter: GraphicsAdapter,
    device: ash::Device,
    swapchain_loader: ash::khr::swapchain::Device,
    graphics_queue: vk::Queue,
    present_queue: vk::Queue,
    transfer_queue: vk::Queue,
    compute_queue: Option<vk::Queue>,
    /// Dropped explicitly before the device is destroyed
    allocator: ManuallyDrop<Mutex<Allocator>>,
    temp_commands: Mutex<TempCommands>,
}

impl GraphicsDevice {
    /// Create the device for a window
    ///
    /// Validation layers are enabled only when the crate is built with the
    /// `vulkan-validation` feature and `config.enable_validation` is set.
    /// On failure every object created so far is destroyed.
    pub fn new<W: HasDisplayHandle + HasWindowHandle>(
        window: &W,
        config: DeviceConfig,
    ) -> Result<Self> {
        let enable_validation = cfg!(feature = "vulkan-validation") && config.enable_validation;
        if config.enable_validation && !enable_validation {
            engine_info!(SOURCE, "Validation requested but the backend was built without `vulkan-validation`");
        }

        unsafe {
            let entry = ash::Entry::load()
                .map_err(|e| {
                    engine_error!(SOURCE, "Failed to load Vulkan library: {:?}", e);
                    Error::InitializationFailed(format!("Failed to load Vulkan library: {:?}", e))
                })?;

            let app_name = CString::new(config.app_name.as_str())
                .map_err(|e| Error::ConfigError(format!("Invalid application name: {}", e)))?;
            let (major, minor, patch) = config.app_version;
            let app_info = vk::ApplicationInfo::default()
                .application_name(&app_name)
                .application_version(vk::make_api_version(0, major, minor, patch))
                .engine_name(c"Lumen")
                .engine_version(vk::make_api_version(0, 0, 1, 0))
                .api_version(vk::API_VERSION_1_2);

            let display_handle = window.display_handle()
                .map_err(|e| {
                    engine_error!(SOURCE, "Failed to get display handle: {}", e);
                    Error::InitializationFailed(format!("Failed to get display handle: {}", e))
                })?;
            let mut extension_names = ash_window::enumerate_required_extensions(display_handle.as_raw())
                .map_err(|e| {
                    engine_error!(SOURCE, "Failed to get required instance extensions: {}", e);
                    Error::InitializationFailed(format!("Failed to get required extensions: {}", e))
                })?
                .to_vec();

            let layer_names = if enable_validation {
                let available = entry.enumerate_instance_layer_properties()
                    .map_err(|e| engine_err!(SOURCE, "Failed to enumerate instance layers: {:?}", e))?;
                let found = available.iter().any(|layer| {
                    layer.layer_name_as_c_str().is_ok_and(|name| name == VALIDATION_LAYER)
                });
                if !found {
                    engine_error!(SOURCE, "Validation layer {:?} is not installed", VALIDATION_LAYER);
                    return Err(Error::InitializationFailed(
                        "VK_LAYER_KHRONOS_validation is not available".to_string(),
                    ));
                }
                extension_names.push(ash::ext::debug_utils::NAME.as_ptr());
                vec![VALIDATION_LAYER.as_ptr()]
            } else {
                vec![]
            };

            let create_info = vk::InstanceCreateInfo::default()
                .application_info(&app_info)
                .enabled_layer_names(&layer_names)
                .enabled_extension_names(&extension_names);

            let instance = entry
                .create_instance(&create_info, None)
                .map_err(|e| {
                    engine_error!(SOURCE, "Failed to create Vulkan instance: {:?}", e);
                    Error::InitializationFailed(format!("Failed to create instance: {:?}", e))
                })?;
            // Declared before the allocator so an early return drops the allocator first
            let mut partial = PartialInit {
                instance: Some(instance.clone()),
                debug_config: false,
                debug_utils: None,
                surface: None,
                device: None,
                temp_pool: None,
            };

            let debug_utils = if enable_validation {
                let loader = ash::ext::debug_utils::Instance::new(&entry, &instance);

                crate::debug::init_debug_config(crate::debug::Config {
                    severity: config.debug_severity,
                    output: config.debug_output.clone(),
                    message_filter: config.debug_message_filter,
                    enable_stats: config.enable_validation_stats,
                });
                partial.debug_config = true;

                let debug_info = vk::DebugUtilsMessengerCreateInfoEXT::default()
                    .message_severity(crate::debug::severity_flags(config.debug_severity))
                    .message_type(
                        vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                            | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                            | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE
                    )
                    .pfn_user_callback(Some(crate::debug::vulkan_debug_callback));

                let messenger = loader
                    .create_debug_utils_messenger(&debug_info, None)
                    .map_err(|e| {
                        engine_error!(SOURCE, "Failed to create debug messenger: {:?}", e);
                        Error::InitializationFailed(format!("Failed to create debug messenger: {:?}", e))
                    })?;

                partial.debug_utils = Some((loader.clone(), messenger));
                Some((loader, messenger))
            } else {
                None
            };

            let window_handle = window.window_handle()
                .map_err(|e| {
                    engine_error!(SOURCE, "Failed to get window handle: {}", e);
                    Error::InitializationFailed(format!("Failed to get window handle: {}", e))
                })?;
            let surface = ash_window::create_surface(
                &entry,
                &instance,
                display_handle.as_raw(),
                window_handle.as_raw(),
                None,
            )
            .map_err(|e| {
                engine_error!(SOURCE, "Failed to create surface: {:?}", e);
                Error::InitializationFailed(format!("Failed to create surface: {:?}", e))
            })?;
            let surface_loader = ash::khr::surface::Instance::new(&entry, &instance);
            partial.surface = Some((surface_loader.clone(), surface));

            let adapter = GraphicsAdapter::select(&instance, &surface_loader, surface)?;
            let families = adapter.queue_families;
            let (Some(graphics_family), Some(present_family), Some(transfer_family)) =
                (families.graphics, families.present, families.transfer)
            else {
                return Err(Error::InitializationFailed(
                    "Selected adapter lacks a required queue family".to_string(),
                ));
            };

            let queue_priorities = [1.0];
            let queue_create_infos: Vec<vk::DeviceQueueCreateInfo> = families
                .unique_families()
                .into_iter()
                .map(|family| {
                    vk::DeviceQueueCreateInfo::default()
                        .queue_family_index(family)
                        .queue_priorities(&queue_priorities)
                })
                .collect();

            let device_extension_names: Vec<*const std::ffi::c_char> =
                REQUIRED_DEVICE_EXTENSIONS.iter().map(|name| name.as_ptr()).collect();

            let device_features = vk::PhysicalDeviceFeatures::default()
                .fill_mode_non_solid(true);

            let device_create_info = vk::DeviceCreateInfo::default()
                .queue_create_infos(&queue_create_infos)
                .enabled_extension_names(&device_extension_names)
                .enabled_features(&device_features);

            let device = instance
                .create_device(adapter.physical_device, &device_create_info, None)
                .map_err(|e| {
                    engine_error!(SOURCE, "Failed to create logical device: {:?}", e);
                    Error::InitializationFailed(format!("Failed to create device: {:?}", e))
                })?;
            partial.device = Some(device.clone());

            let graphics_queue = device.get_device_queue(graphics_family, 0);
            let present_queue = device.get_device_queue(present_family, 0);
            let transfer_queue = device.get_device_queue(transfer_family, 0);
            let compute_queue = families.compute.map(|family| device.get_device_queue(family, 0));

            let allocator = Allocator::new(&AllocatorCreateDesc {
                instance: instance.clone(),
                device: device.clone(),
                physical_device: adapter.physical_device,
                debug_settings: Default::default(),
                buffer_device_address: false,
                allocation_sizes: Default::default(),
            })
            .map_err(|e| {
                engine_error!(SOURCE, "Failed to create GPU allocator: {:?}", e);
                Error::InitializationFailed(format!("Failed to create allocator: {:?}", e))
            })?;

            let pool_create_info = vk::CommandPoolCreateInfo::default()
                .queue_family_index(graphics_family)
                .flags(vk::CommandPoolCreateFlags::TRANSIENT | vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER);
            let temp_pool = device.create_command_pool(&pool_create_info, None)
                .map_err(|e| {
                    engine_error!(SOURCE, "Failed to create temp command pool: {:?}", e);
                    Error::InitializationFailed(format!("Failed to create temp command pool: {:?}", e))
                })?;
            partial.temp_pool = Some(temp_pool);

            let alloc_info = vk::CommandBufferAllocateInfo::default()
                .command_pool(temp_pool)
                .level(vk::CommandBufferLevel::PRIMARY)
                .command_buffer_count(1);
            let temp_buffer = device.allocate_command_buffers(&alloc_info)
                .map_err(|e| {
                    engine_error!(SOURCE, "Failed to allocate temp command buffer: {:?}", e);
                    Error::InitializationFailed(format!("Failed to allocate temp command buffer: {:?}", e))
                })?[0];

            let swapchain_loader = ash::khr::swapchain::Device::new(&instance, &device);
            partial.complete();

            engine_info!(SOURCE, "Graphics device ready (queue families: graphics {}, present {}, transfer {}, compute {:?})",
                graphics_family, present_family, transfer_family, families.compute);

            Ok(Self {
                _entry: entry,
                instance,
                debug_utils,
                surface_loader,
                surface,
                adapter,
                device,
                swapchain_loader,
                graphics_queue,
                present_queue,
                transfer_queue,
                compute_queue,
                allocator: ManuallyDrop::new(Mutex::new(allocator)),
                temp_commands: Mutex::new(TempCommands { pool: temp_pool, buffer: temp_buffer }),
            })
        }
    }

    pub fn device(&self) -> &ash::Device {
        &self.device
    }

    pub fn instance(&self) -> &ash::Instance {
        &self.instance
    }

    pub fn adapter(&self) -> &GraphicsAdapter {
        &self.adapter
    }

    pub fn physical_device(&self) -> vk::PhysicalDevice {
        self.adapter.physical_device
    }

    pub fn surface(&self) -> vk::SurfaceKHR {
        self.surface
    }

    pub fn surface_loader(&self) -> &ash::khr::surface::Instance {
        &self.surface_loader
    }

    pub fn swapchain_loader(&self) -> &ash::khr::swapchain::Device {
        &self.swapchain_loader
    }

    pub fn graphics_queue(&self) -> vk::Queue {
        self.graphics_queue
    }

    pub fn present_queue(&self) -> vk::Queue {
        self.present_queue
    }

    pub fn transfer_queue(&self) -> vk::Queue {
        self.transfer_queue
    }

    /// `None` when the adapter exposes no compute-capable family
    pub fn compute_queue(&self) -> Option<vk::Queue> {
        self.compute_queue
    }

    pub fn graphics_queue_family(&self) -> u32 {
        self.adapter.queue_families.graphics.unwrap_or_default()
    }

    /// Lock the GPU memory allocator
    pub(crate) fn allocator(&self) -> Result<MutexGuard<'_, Allocator>> {
        self.allocator
            .lock()
            .map_err(|_| engine_err!(SOURCE, "GPU allocator mutex poisoned"))
    }

    /// First of `candidates` supporting `features`, or `vk::Format::UNDEFINED` (logged)
    pub fn find_supported_format(
        &self,
        candidates: &[vk::Format],
        tiling: vk::ImageTiling,
        features: vk::FormatFeatureFlags,
    ) -> vk::Format {
        self.adapter.find_supported_format(&self.instance, candidates, tiling, features)
    }

    /// Block until the GPU has finished all submitted work
    pub fn wait_idle(&self) -> Result<()> {
        unsafe {
            self.device.device_wait_idle()
                .map_err(|e| engine_err!(SOURCE, "Failed to wait for device idle: {:?}", e))
        }
    }

    /// Record into the temp command buffer, submit it on the graphics queue and
    /// wait on a fresh fence. Serialized by the temp-commands lock.
    pub fn submit_one_off<F>(&self, record: F) -> Result<()>
    where
        F: FnOnce(vk::CommandBuffer) -> Result<()>,
    {
        let temp = self.temp_commands
            .lock()
            .map_err(|_| engine_err!(SOURCE, "Temp command buffer mutex poisoned"))?;
        let command_buffer = temp.buffer;

        unsafe {
            self.device.reset_command_buffer(command_buffer, vk::CommandBufferResetFlags::empty())
                .map_err(|e| engine_err!(SOURCE, "Failed to reset temp command buffer: {:?}", e))?;

            let begin_info = vk::CommandBufferBeginInfo::default()
                .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
            self.device.begin_command_buffer(command_buffer, &begin_info)
                .map_err(|e| engine_err!(SOURCE, "Failed to begin temp command buffer: {:?}", e))?;
        }

        let recorded = record(command_buffer);

        unsafe {
            self.device.end_command_buffer(command_buffer)
                .map_err(|e| engine_err!(SOURCE, "Failed to end temp command buffer: {:?}", e))?;
        }
        recorded?;

        unsafe {
            let fence = self.device.create_fence(&vk::FenceCreateInfo::default(), None)
                .map_err(|e| engine_err!(SOURCE, "Failed to create upload fence: {:?}", e))?;

            let command_buffers = [command_buffer];
            let submit_info = vk::SubmitInfo::default().command_buffers(&command_buffers);

            let result = self.device
                .queue_submit(self.graphics_queue, &[submit_info], fence)
                .map_err(|e| engine_err!(SOURCE, "Failed to submit one-off commands: {:?}", e))
                .and_then(|_| {
                    self.device.wait_for_fences(&[fence], true, u64::MAX)
                        .map_err(|e| engine_err!(SOURCE, "Failed to wait for upload fence: {:?}", e))
                });

            self.device.destroy_fence(fence, None);
            result
        }
    }
}

impl Drop for GraphicsDevice {
    fn drop(&mut self) {
        unsafe {
            if let Err(e) = self.device.device_wait_idle() {
                engine_warn!(SOURCE, "device_wait_idle failed during teardown: {:?}", e);
            }

            if let Ok(temp) = self.temp_commands.lock() {
                self.device.destroy_command_pool(temp.pool, None);
            }

            // Allocator memory blocks must go before the device
            ManuallyDrop::drop(&mut self.allocator);

            self.device.destroy_device(None);
            self.surface_loader.destroy_surface(self.surface, None);

            if let Some((loader, messenger)) = self.debug_utils.take() {
                crate::debug::cleanup_debug_config();
                loader.destroy_debug_utils_messenger(messenger, None);
            }

            self.instance.destroy_instance(None);
        }
    }
}

#[cfg(test)]
#[path = "vulkan_device_tests.rs"]
mod tests;
