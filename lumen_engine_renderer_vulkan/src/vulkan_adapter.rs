/// Physical adapter discovery and selection
///
/// Every enumerated adapter becomes an [`AdapterCandidate`]; candidates that
/// miss a required device extension or a graphics / transfer / present queue
/// family are excluded, the rest are ranked by device type.

use ash::vk;
use lumen_engine::lumen::{Error, Result};
use lumen_engine::{engine_err, engine_error, engine_info, engine_warn};
use std::ffi::CStr;

const SOURCE: &str = "lumen::vulkan";

/// Device extensions every adapter must expose
pub(crate) const REQUIRED_DEVICE_EXTENSIONS: [&CStr; 2] = [
    ash::khr::swapchain::NAME,
    ash::khr::maintenance3::NAME,
];

/// First queue family found for each role. One family may fill several roles.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueFamilyIndices {
    pub graphics: Option<u32>,
    pub present: Option<u32>,
    pub transfer: Option<u32>,
    pub compute: Option<u32>,
}

impl QueueFamilyIndices {
    /// Walk the families once, keeping the first match per role
    pub fn discover(
        families: &[vk::QueueFamilyProperties],
        mut supports_present: impl FnMut(u32) -> bool,
    ) -> Self {
        let mut indices = Self::default();

        for (index, family) in families.iter().enumerate() {
            let index = index as u32;
            if family.queue_count == 0 {
                continue;
            }
            if indices.graphics.is_none() && family.queue_flags.contains(vk::QueueFlags::GRAPHICS) {
                indices.graphics = Some(index);
            }
            if indices.transfer.is_none() && family.queue_flags.contains(vk::QueueFlags::TRANSFER) {
                indices.transfer = Some(index);
            }
            if indices.compute.is_none() && family.queue_flags.contains(vk::QueueFlags::COMPUTE) {
                indices.compute = Some(index);
            }
            if indices.present.is_none() && supports_present(index) {
                indices.present = Some(index);
            }
        }

        indices
    }

    /// Graphics, transfer and present are mandatory; compute is optional
    pub fn is_complete(&self) -> bool {
        self.graphics.is_some() && self.transfer.is_some() && self.present.is_some()
    }

    /// Distinct family indices in role order (graphics, present, transfer, compute)
    pub fn unique_families(&self) -> Vec<u32> {
        let mut unique = Vec::with_capacity(4);
        for family in [self.graphics, self.present, self.transfer, self.compute].into_iter().flatten() {
            if !unique.contains(&family) {
                unique.push(family);
            }
        }
        unique
    }
}

/// Discrete GPUs first, integrated second, everything else last
pub fn score_device_type(device_type: vk::PhysicalDeviceType) -> u32 {
    match device_type {
        vk::PhysicalDeviceType::DISCRETE_GPU => 100,
        vk::PhysicalDeviceType::INTEGRATED_GPU => 10,
        _ => 0,
    }
}

/// Human-readable vendor from the PCI vendor id
pub fn vendor_name(vendor_id: u32) -> &'static str {
    match vendor_id {
        0x8086 => "Intel",
        0x10DE => "NVIDIA",
        0x1002 => "AMD",
        _ => "Unknown vendor",
    }
}

/// What selection needs to know about one enumerated adapter
#[derive(Debug, Clone, Copy)]
pub struct AdapterCandidate {
    pub device_type: vk::PhysicalDeviceType,
    pub has_required_extensions: bool,
    pub queue_families: QueueFamilyIndices,
}

impl AdapterCandidate {
    pub fn is_suitable(&self) -> bool {
        self.has_required_extensions && self.queue_families.is_complete()
    }
}

/// Index of the highest scoring suitable candidate. Ties keep the first enumerated.
pub fn select_best_candidate(candidates: &[AdapterCandidate]) -> Option<usize> {
    let mut best: Option<(usize, u32)> = None;

    for (index, candidate) in candidates.iter().enumerate() {
        if !candidate.is_suitable() {
            continue;
        }
        let score = score_device_type(candidate.device_type);
        match best {
            Some((_, best_score)) if best_score >= score => {}
            _ => best = Some((index, score)),
        }
    }

    best.map(|(index, _)| index)
}

/// First memory type allowed by `type_bits` that has all of `properties`
pub fn find_memory_type_index(
    memory_properties: &vk::PhysicalDeviceMemoryProperties,
    type_bits: u32,
    properties: vk::MemoryPropertyFlags,
) -> Option<u32> {
    (0..memory_properties.memory_type_count).find(|&index| {
        type_bits & (1 << index) != 0
            && memory_properties.memory_types[index as usize]
                .property_flags
                .contains(properties)
    })
}

/// The selected physical adapter
#[derive(Clone)]
pub struct GraphicsAdapter {
    pub(crate) physical_device: vk::PhysicalDevice,
    pub(crate) properties: vk::PhysicalDeviceProperties,
    pub(crate) memory_properties: vk::PhysicalDeviceMemoryProperties,
    pub(crate) queue_families: QueueFamilyIndices,
    name: String,
}

impl GraphicsAdapter {
    /// Enumerate adapters and pick the best one able to present to `surface`
    pub(crate) fn select(
        instance: &ash::Instance,
        surface_loader: &ash::khr::surface::Instance,
        surface: vk::SurfaceKHR,
    ) -> Result<Self> {
        let physical_devices = unsafe {
            instance.enumerate_physical_devices()
                .map_err(|e| engine_err!(SOURCE, "Failed to enumerate physical devices: {:?}", e))?
        };

        let candidates: Vec<AdapterCandidate> = physical_devices
            .iter()
            .map(|&physical_device| {
                let properties = unsafe { instance.get_physical_device_properties(physical_device) };
                let families = unsafe {
                    instance.get_physical_device_queue_family_properties(physical_device)
                };
                let queue_families = QueueFamilyIndices::discover(&families, |index| unsafe {
                    surface_loader
                        .get_physical_device_surface_support(physical_device, index, surface)
                        .unwrap_or(false)
                });
                AdapterCandidate {
                    device_type: properties.device_type,
                    has_required_extensions: has_required_extensions(instance, physical_device),
                    queue_families,
                }
            })
            .collect();

        let Some(best) = select_best_candidate(&candidates) else {
            engine_error!(SOURCE, "No adapter with graphics, transfer and present support was found ({} enumerated)",
                physical_devices.len());
            return Err(Error::InitializationFailed(
                "No suitable graphics adapter found".to_string(),
            ));
        };

        let physical_device = physical_devices[best];
        let properties = unsafe { instance.get_physical_device_properties(physical_device) };
        let memory_properties = unsafe {
            instance.get_physical_device_memory_properties(physical_device)
        };
        let name = properties
            .device_name_as_c_str()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|_| "Unnamed adapter".to_string());

        let adapter = Self {
            physical_device,
            properties,
            memory_properties,
            queue_families: candidates[best].queue_families,
            name,
        };
        adapter.log_info();
        Ok(adapter)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn device_type(&self) -> vk::PhysicalDeviceType {
        self.properties.device_type
    }

    pub fn queue_families(&self) -> QueueFamilyIndices {
        self.queue_families
    }

    pub fn limits(&self) -> &vk::PhysicalDeviceLimits {
        &self.properties.limits
    }

    pub fn find_memory_type_index(
        &self,
        type_bits: u32,
        properties: vk::MemoryPropertyFlags,
    ) -> Option<u32> {
        find_memory_type_index(&self.memory_properties, type_bits, properties)
    }

    /// First candidate whose tiling features include `features`, or `UNDEFINED` with a warning
    pub(crate) fn find_supported_format(
        &self,
        instance: &ash::Instance,
        candidates: &[vk::Format],
        tiling: vk::ImageTiling,
        features: vk::FormatFeatureFlags,
    ) -> vk::Format {
        for &format in candidates {
            let properties = unsafe {
                instance.get_physical_device_format_properties(self.physical_device, format)
            };
            let supported = match tiling {
                vk::ImageTiling::LINEAR => properties.linear_tiling_features,
                _ => properties.optimal_tiling_features,
            };
            if supported.contains(features) {
                return format;
            }
        }

        engine_warn!(SOURCE, "None of the formats {:?} supports {:?} with {:?} tiling", candidates, features, tiling);
        vk::Format::UNDEFINED
    }

    fn log_info(&self) {
        let version = self.properties.api_version;
        engine_info!(
            SOURCE,
            "Selected adapter: {} ({}, {:?}, Vulkan {}.{}.{})",
            self.name,
            vendor_name(self.properties.vendor_id),
            self.properties.device_type,
            vk::api_version_major(version),
            vk::api_version_minor(version),
            vk::api_version_patch(version),
        );
    }
}

fn has_required_extensions(instance: &ash::Instance, physical_device: vk::PhysicalDevice) -> bool {
    let available = match unsafe { instance.enumerate_device_extension_properties(physical_device) } {
        Ok(available) => available,
        Err(_) => return false,
    };

    REQUIRED_DEVICE_EXTENSIONS.iter().all(|required| {
        available
            .iter()
            .any(|ext| ext.extension_name_as_c_str().is_ok_and(|name| name == *required))
    })
}

#[cfg(test)]
#[path = "vulkan_adapter_tests.rs"]
mod tests;
