/// Device-local images with tracked layouts
///
/// A [`GpuImage`] remembers the layout of each of its array layers (all mip
/// levels of a layer share one layout). Every barrier recorded through this
/// module reads the old layout from that record and writes the new one back,
/// so callers never spell out an `old_layout` themselves.

use ash::vk;
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme};
use gpu_allocator::MemoryLocation;
use lumen_engine::lumen::config::CubeMapDesc;
use lumen_engine::lumen::resource::{mip_extent, ImageDesc, TextureFormat, TextureType};
use lumen_engine::lumen::{Error, Result};
use lumen_engine::{engine_bail_warn, engine_debug, engine_err, engine_error, engine_warn};
use std::ops::Range;
use std::path::Path;

use crate::vulkan_buffer::{allocate_buffer, read_mapped, release_buffer};
use crate::vulkan_device::GraphicsDevice;

const SOURCE: &str = "lumen::vulkan";

/// Number of faces (array layers) of a cube image
const CUBE_FACES: u32 = 6;

/// A device-local image, its default view and its tracked layouts
pub struct GpuImage {
    pub(crate) image: vk::Image,
    pub(crate) view: vk::ImageView,
    extent: vk::Extent2D,
    format: vk::Format,
    mip_levels: u32,
    array_layers: u32,
    aspect: vk::ImageAspectFlags,
    layer_layouts: Vec<vk::ImageLayout>,
    allocation: Option<Allocation>,
}

impl GpuImage {
    pub fn handle(&self) -> vk::Image {
        self.image
    }

    pub fn view(&self) -> vk::ImageView {
        self.view
    }

    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    pub fn format(&self) -> vk::Format {
        self.format
    }

    pub fn mip_levels(&self) -> u32 {
        self.mip_levels
    }

    pub fn array_layers(&self) -> u32 {
        self.array_layers
    }

    pub fn aspect(&self) -> vk::ImageAspectFlags {
        self.aspect
    }

    /// The layout shared by every layer, `None` while layers differ
    pub fn layout(&self) -> Option<vk::ImageLayout> {
        let first = *self.layer_layouts.first()?;
        self.layer_layouts
            .iter()
            .all(|&layout| layout == first)
            .then_some(first)
    }

    pub fn layer_layout(&self, layer: u32) -> Option<vk::ImageLayout> {
        self.layer_layouts.get(layer as usize).copied()
    }

    /// Record a layout change made outside this module (e.g. by a render pass)
    pub fn assume_layout(&mut self, layout: vk::ImageLayout) {
        self.layer_layouts.fill(layout);
    }

    /// Release the view, the image and its memory
    pub fn destroy(mut self, device: &GraphicsDevice) -> Result<()> {
        let allocation = self.allocation.take();
        unsafe {
            device.device().destroy_image_view(self.view, None);
        }
        let freed = match allocation {
            Some(allocation) => device.allocator().and_then(|mut allocator| {
                allocator.free(allocation)
                    .map_err(|e| engine_err!(SOURCE, "Failed to free image memory: {:?}", e))
            }),
            None => Ok(()),
        };
        unsafe {
            device.device().destroy_image(self.image, None);
        }
        freed
    }
}

impl Drop for GpuImage {
    fn drop(&mut self) {
        if self.allocation.is_some() {
            engine_warn!(SOURCE, "GpuImage {}x{} ({:?}) dropped without destroy(); its memory leaks",
                self.extent.width, self.extent.height, self.format);
        }
    }
}

/// Vulkan format of an engine texture format
pub fn vk_format(format: TextureFormat) -> vk::Format {
    match format {
        TextureFormat::RgbaU8 => vk::Format::R8G8B8A8_UNORM,
        TextureFormat::RgbaU8Srgb => vk::Format::R8G8B8A8_SRGB,
        // Vulkan has no sRGB float formats; the transfer function is left to the shader
        TextureFormat::RgbaF32 | TextureFormat::RgbaF32Srgb => vk::Format::R32G32B32A32_SFLOAT,
        TextureFormat::D24S8 => vk::Format::D24_UNORM_S8_UINT,
    }
}

/// Aspect covering every plane of `format`
pub(crate) fn aspect_flags(format: vk::Format) -> vk::ImageAspectFlags {
    match format {
        vk::Format::D16_UNORM | vk::Format::D32_SFLOAT | vk::Format::X8_D24_UNORM_PACK32 => {
            vk::ImageAspectFlags::DEPTH
        }
        vk::Format::D16_UNORM_S8_UINT
        | vk::Format::D24_UNORM_S8_UINT
        | vk::Format::D32_SFLOAT_S8_UINT => {
            vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL
        }
        vk::Format::S8_UINT => vk::ImageAspectFlags::STENCIL,
        _ => vk::ImageAspectFlags::COLOR,
    }
}

/// Image usage for a descriptor
pub(crate) fn image_usage(desc: &ImageDesc) -> vk::ImageUsageFlags {
    if desc.format.is_depth() {
        return vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT;
    }
    let mut usage = vk::ImageUsageFlags::SAMPLED
        | vk::ImageUsageFlags::TRANSFER_SRC
        | vk::ImageUsageFlags::TRANSFER_DST;
    if desc.storage {
        usage |= vk::ImageUsageFlags::STORAGE;
    }
    usage
}

/// Bytes per texel of the color formats the readback path supports
pub(crate) fn texel_size(format: vk::Format) -> Option<u64> {
    match format {
        vk::Format::R8G8B8A8_UNORM
        | vk::Format::R8G8B8A8_SRGB
        | vk::Format::B8G8R8A8_UNORM
        | vk::Format::B8G8R8A8_SRGB => Some(4),
        vk::Format::R16G16B16A16_SFLOAT => Some(8),
        vk::Format::R32G32B32A32_SFLOAT => Some(16),
        _ => None,
    }
}

/// Access mask and stage of a layout on either side of a barrier
fn layout_access(layout: vk::ImageLayout, as_source: bool) -> (vk::AccessFlags, vk::PipelineStageFlags) {
    match layout {
        vk::ImageLayout::UNDEFINED | vk::ImageLayout::PREINITIALIZED => {
            (vk::AccessFlags::empty(), vk::PipelineStageFlags::TOP_OF_PIPE)
        }
        vk::ImageLayout::TRANSFER_DST_OPTIMAL => {
            (vk::AccessFlags::TRANSFER_WRITE, vk::PipelineStageFlags::TRANSFER)
        }
        vk::ImageLayout::TRANSFER_SRC_OPTIMAL => {
            (vk::AccessFlags::TRANSFER_READ, vk::PipelineStageFlags::TRANSFER)
        }
        vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL => (
            vk::AccessFlags::SHADER_READ,
            vk::PipelineStageFlags::FRAGMENT_SHADER | vk::PipelineStageFlags::COMPUTE_SHADER,
        ),
        vk::ImageLayout::GENERAL if as_source => {
            (vk::AccessFlags::SHADER_WRITE, vk::PipelineStageFlags::COMPUTE_SHADER)
        }
        vk::ImageLayout::GENERAL => (
            vk::AccessFlags::SHADER_READ | vk::AccessFlags::SHADER_WRITE,
            vk::PipelineStageFlags::COMPUTE_SHADER,
        ),
        vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL => (
            vk::AccessFlags::COLOR_ATTACHMENT_READ | vk::AccessFlags::COLOR_ATTACHMENT_WRITE,
            vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
        ),
        vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL => (
            vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_READ | vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
            vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS | vk::PipelineStageFlags::LATE_FRAGMENT_TESTS,
        ),
        vk::ImageLayout::PRESENT_SRC_KHR => {
            (vk::AccessFlags::empty(), vk::PipelineStageFlags::BOTTOM_OF_PIPE)
        }
        _ => (
            vk::AccessFlags::MEMORY_READ | vk::AccessFlags::MEMORY_WRITE,
            vk::PipelineStageFlags::ALL_COMMANDS,
        ),
    }
}

/// Access masks and stages of an (old, new) layout transition:
/// `(src_access, dst_access, src_stage, dst_stage)`
pub(crate) fn layout_transition_masks(
    old_layout: vk::ImageLayout,
    new_layout: vk::ImageLayout,
) -> (vk::AccessFlags, vk::AccessFlags, vk::PipelineStageFlags, vk::PipelineStageFlags) {
    let (src_access, src_stage) = layout_access(old_layout, true);
    let (dst_access, dst_stage) = layout_access(new_layout, false);
    (src_access, dst_access, src_stage, dst_stage)
}

/// Split `layers` into runs of identical tracked layout
fn layout_runs(layouts: &[vk::ImageLayout], layers: Range<u32>) -> Vec<(Range<u32>, vk::ImageLayout)> {
    let mut runs: Vec<(Range<u32>, vk::ImageLayout)> = Vec::new();
    for layer in layers {
        let layout = layouts[layer as usize];
        match runs.last_mut() {
            Some((range, run_layout)) if *run_layout == layout && range.end == layer => range.end += 1,
            _ => runs.push((layer..layer + 1, layout)),
        }
    }
    runs
}

#[allow(clippy::too_many_arguments)]
fn record_barrier(
    device: &GraphicsDevice,
    command_buffer: vk::CommandBuffer,
    image: vk::Image,
    aspect_mask: vk::ImageAspectFlags,
    old_layout: vk::ImageLayout,
    new_layout: vk::ImageLayout,
    mips: Range<u32>,
    layers: Range<u32>,
) {
    let (src_access, dst_access, src_stage, dst_stage) = layout_transition_masks(old_layout, new_layout);

    let barrier = vk::ImageMemoryBarrier::default()
        .old_layout(old_layout)
        .new_layout(new_layout)
        .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .image(image)
        .subresource_range(vk::ImageSubresourceRange {
            aspect_mask,
            base_mip_level: mips.start,
            level_count: mips.end - mips.start,
            base_array_layer: layers.start,
            layer_count: layers.end - layers.start,
        })
        .src_access_mask(src_access)
        .dst_access_mask(dst_access);

    unsafe {
        device.device().cmd_pipeline_barrier(
            command_buffer,
            src_stage,
            dst_stage,
            vk::DependencyFlags::empty(),
            &[],
            &[],
            &[barrier],
        );
    }
}

/// Transition `layers` (all mips) to `new_layout`, one barrier per run of equal layouts
fn transition_layers(
    device: &GraphicsDevice,
    command_buffer: vk::CommandBuffer,
    image: &mut GpuImage,
    layers: Range<u32>,
    new_layout: vk::ImageLayout,
) {
    for (run, old_layout) in layout_runs(&image.layer_layouts, layers) {
        record_barrier(
            device,
            command_buffer,
            image.image,
            image.aspect,
            old_layout,
            new_layout,
            0..image.mip_levels,
            run.clone(),
        );
        image.layer_layouts[run.start as usize..run.end as usize].fill(new_layout);
    }
}

/// Record a barrier moving every mip and layer of `image` to `new_layout`
pub fn cmd_transition_layout(
    device: &GraphicsDevice,
    command_buffer: vk::CommandBuffer,
    image: &mut GpuImage,
    new_layout: vk::ImageLayout,
) -> Result<()> {
    if matches!(new_layout, vk::ImageLayout::UNDEFINED | vk::ImageLayout::PREINITIALIZED) {
        engine_bail_warn!(SOURCE, "Cannot transition an image to {:?}", new_layout);
    }
    let layers = 0..image.array_layers;
    transition_layers(device, command_buffer, image, layers, new_layout);
    Ok(())
}

/// Fill mips 1.. of `layer_count` layers from mip 0 by successive blits
///
/// Every mip of the range must be in TRANSFER_DST_OPTIMAL; afterwards every
/// mip of the range is in TRANSFER_SRC_OPTIMAL.
pub fn cmd_generate_mip_levels(
    device: &GraphicsDevice,
    command_buffer: vk::CommandBuffer,
    image: &mut GpuImage,
    base_layer: u32,
    layer_count: u32,
) -> Result<()> {
    let end_layer = base_layer.checked_add(layer_count).unwrap_or(u32::MAX);
    if layer_count == 0 || end_layer > image.array_layers {
        engine_bail_warn!(SOURCE, "Mip generation layer range {}..{} is outside the image's {} layers",
            base_layer, end_layer, image.array_layers);
    }
    let layers = base_layer..end_layer;
    if let Some(layer) = layers.clone().find(|&layer| {
        image.layer_layouts[layer as usize] != vk::ImageLayout::TRANSFER_DST_OPTIMAL
    }) {
        engine_bail_warn!(SOURCE, "Mip generation requires TRANSFER_DST_OPTIMAL, layer {} is in {:?}",
            layer, image.layer_layouts[layer as usize]);
    }

    let format_properties = unsafe {
        device.instance().get_physical_device_format_properties(device.physical_device(), image.format)
    };
    let filter = if format_properties
        .optimal_tiling_features
        .contains(vk::FormatFeatureFlags::SAMPLED_IMAGE_FILTER_LINEAR)
    {
        vk::Filter::LINEAR
    } else {
        engine_warn!(SOURCE, "{:?} does not support linear blits, mips are generated with nearest filtering", image.format);
        vk::Filter::NEAREST
    };

    let (width, height) = (image.extent.width, image.extent.height);
    let subresource = |mip_level: u32| vk::ImageSubresourceLayers {
        aspect_mask: image.aspect,
        mip_level,
        base_array_layer: base_layer,
        layer_count,
    };

    for mip in 1..image.mip_levels {
        record_barrier(
            device,
            command_buffer,
            image.image,
            image.aspect,
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
            mip - 1..mip,
            layers.clone(),
        );

        let (src_width, src_height) = mip_extent(width, height, mip - 1);
        let (dst_width, dst_height) = mip_extent(width, height, mip);

        let blit = vk::ImageBlit::default()
            .src_subresource(subresource(mip - 1))
            .src_offsets([
                vk::Offset3D { x: 0, y: 0, z: 0 },
                vk::Offset3D { x: src_width as i32, y: src_height as i32, z: 1 },
            ])
            .dst_subresource(subresource(mip))
            .dst_offsets([
                vk::Offset3D { x: 0, y: 0, z: 0 },
                vk::Offset3D { x: dst_width as i32, y: dst_height as i32, z: 1 },
            ]);

        unsafe {
            device.device().cmd_blit_image(
                command_buffer,
                image.image,
                vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
                image.image,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                &[blit],
                filter,
            );
        }
    }

    let last = image.mip_levels - 1;
    record_barrier(
        device,
        command_buffer,
        image.image,
        image.aspect,
        vk::ImageLayout::TRANSFER_DST_OPTIMAL,
        vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
        last..last + 1,
        layers.clone(),
    );

    image.layer_layouts[layers.start as usize..layers.end as usize]
        .fill(vk::ImageLayout::TRANSFER_SRC_OPTIMAL);
    Ok(())
}

/// Create a view over part of an image
#[allow(clippy::too_many_arguments)]
pub fn create_image_view(
    device: &GraphicsDevice,
    image: vk::Image,
    view_type: vk::ImageViewType,
    format: vk::Format,
    aspect_mask: vk::ImageAspectFlags,
    base_layer: u32,
    layer_count: u32,
    base_mip: u32,
    mip_count: u32,
) -> Result<vk::ImageView> {
    let view_create_info = vk::ImageViewCreateInfo::default()
        .image(image)
        .view_type(view_type)
        .format(format)
        .components(vk::ComponentMapping {
            r: vk::ComponentSwizzle::IDENTITY,
            g: vk::ComponentSwizzle::IDENTITY,
            b: vk::ComponentSwizzle::IDENTITY,
            a: vk::ComponentSwizzle::IDENTITY,
        })
        .subresource_range(vk::ImageSubresourceRange {
            aspect_mask,
            base_mip_level: base_mip,
            level_count: mip_count,
            base_array_layer: base_layer,
            layer_count,
        });

    unsafe {
        device.device().create_image_view(&view_create_info, None)
            .map_err(|e| engine_err!(SOURCE, "Failed to create image view: {:?}", e))
    }
}

/// Everything needed to create an image and its default view
pub(crate) struct ImageSpec {
    pub extent: vk::Extent2D,
    pub format: vk::Format,
    pub mip_levels: u32,
    pub array_layers: u32,
    pub usage: vk::ImageUsageFlags,
    pub cube: bool,
}

impl ImageSpec {
    fn view_type(&self) -> vk::ImageViewType {
        if self.cube {
            vk::ImageViewType::CUBE
        } else if self.array_layers > 1 {
            vk::ImageViewType::TYPE_2D_ARRAY
        } else {
            vk::ImageViewType::TYPE_2D
        }
    }
}

/// Create a device-local image, bind memory and create its default view
pub(crate) fn create_image(device: &GraphicsDevice, spec: &ImageSpec) -> Result<GpuImage> {
    if spec.extent.width == 0 || spec.extent.height == 0 {
        engine_bail_warn!(SOURCE, "Cannot create a {}x{} image", spec.extent.width, spec.extent.height);
    }
    let vk_device = device.device();
    let aspect = aspect_flags(spec.format);
    let flags = if spec.cube {
        vk::ImageCreateFlags::CUBE_COMPATIBLE
    } else {
        vk::ImageCreateFlags::empty()
    };

    unsafe {
        let image_create_info = vk::ImageCreateInfo::default()
            .flags(flags)
            .image_type(vk::ImageType::TYPE_2D)
            .format(spec.format)
            .extent(vk::Extent3D {
                width: spec.extent.width,
                height: spec.extent.height,
                depth: 1,
            })
            .mip_levels(spec.mip_levels)
            .array_layers(spec.array_layers)
            .samples(vk::SampleCountFlags::TYPE_1)
            .tiling(vk::ImageTiling::OPTIMAL)
            .usage(spec.usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .initial_layout(vk::ImageLayout::UNDEFINED);

        let image = vk_device.create_image(&image_create_info, None)
            .map_err(|e| engine_err!(SOURCE, "Failed to create image: {:?}", e))?;

        let requirements = vk_device.get_image_memory_requirements(image);

        let allocated = device.allocator().and_then(|mut allocator| {
            allocator.allocate(&AllocationCreateDesc {
                name: "image",
                requirements,
                location: MemoryLocation::GpuOnly,
                linear: false,
                allocation_scheme: AllocationScheme::GpuAllocatorManaged,
            })
            .map_err(|_e| {
                let size_mb = requirements.size as f64 / (1024.0 * 1024.0);
                engine_error!(SOURCE, "Out of GPU memory for image (size: {}x{}, layers: {}, {:.2} MB)",
                    spec.extent.width, spec.extent.height, spec.array_layers, size_mb);
                Error::OutOfMemory
            })
        });
        let allocation = match allocated {
            Ok(allocation) => allocation,
            Err(e) => {
                vk_device.destroy_image(image, None);
                return Err(e);
            }
        };

        let mut gpu_image = GpuImage {
            image,
            view: vk::ImageView::null(),
            extent: spec.extent,
            format: spec.format,
            mip_levels: spec.mip_levels,
            array_layers: spec.array_layers,
            aspect,
            layer_layouts: vec![vk::ImageLayout::UNDEFINED; spec.array_layers as usize],
            allocation: Some(allocation),
        };

        if let Err(e) = vk_device.bind_image_memory(image, gpu_image.allocation_memory(), gpu_image.allocation_offset()) {
            gpu_image.destroy(device)?;
            return Err(engine_err!(SOURCE, "Failed to bind image memory: {:?}", e));
        }

        match create_image_view(device, image, spec.view_type(), spec.format, aspect, 0, spec.array_layers, 0, spec.mip_levels) {
            Ok(view) => gpu_image.view = view,
            Err(e) => {
                gpu_image.destroy(device)?;
                return Err(e);
            }
        }

        engine_debug!(SOURCE, "Created {:?} image {}x{} ({} mips, {} layers)",
            spec.format, spec.extent.width, spec.extent.height, spec.mip_levels, spec.array_layers);
        Ok(gpu_image)
    }
}

impl GpuImage {
    fn allocation_memory(&self) -> vk::DeviceMemory {
        self.allocation
            .as_ref()
            .map(|allocation| unsafe { allocation.memory() })
            .unwrap_or_default()
    }

    fn allocation_offset(&self) -> u64 {
        self.allocation.as_ref().map(Allocation::offset).unwrap_or_default()
    }
}

fn spec_from_desc(desc: &ImageDesc, cube: bool) -> ImageSpec {
    ImageSpec {
        extent: vk::Extent2D { width: desc.width, height: desc.height },
        format: vk_format(desc.format),
        mip_levels: desc.mip_levels(),
        array_layers: if cube { CUBE_FACES } else { 1 },
        usage: image_usage(desc),
        cube,
    }
}

/// Create an uninitialized single-layer 2D image
pub fn create_image_2d(device: &GraphicsDevice, desc: &ImageDesc) -> Result<GpuImage> {
    if desc.texture_type != TextureType::T2D {
        engine_bail_warn!(SOURCE, "create_image_2d called with a {:?} descriptor", desc.texture_type);
    }
    create_image(device, &spec_from_desc(desc, false))
}

/// Create an uninitialized cube image (6 layers, cube view)
pub fn create_image_cube(device: &GraphicsDevice, desc: &ImageDesc) -> Result<GpuImage> {
    if desc.texture_type != TextureType::Cube {
        engine_bail_warn!(SOURCE, "create_image_cube called with a {:?} descriptor", desc.texture_type);
    }
    if desc.width != desc.height {
        engine_bail_warn!(SOURCE, "Cube faces must be square, got {}x{}", desc.width, desc.height);
    }
    create_image(device, &spec_from_desc(desc, true))
}

/// Stage `pixels` (`layer_count` tightly packed mip-0 layers), copy them in,
/// build the mip chain and leave the image in SHADER_READ_ONLY_OPTIMAL.
///
/// One submission; the staging buffer is released whatever the outcome.
fn upload_pixels(device: &GraphicsDevice, image: &mut GpuImage, pixels: &[u8]) -> Result<()> {
    let layer_count = image.array_layers;
    let layer_size = pixels.len() as u64 / u64::from(layer_count);

    let (staging, allocation) = allocate_buffer(
        device,
        pixels.len() as u64,
        vk::BufferUsageFlags::TRANSFER_SRC,
        MemoryLocation::CpuToGpu,
        "image staging buffer",
    )?;

    let recorded = match allocation.mapped_ptr() {
        Some(mapped) => {
            unsafe {
                std::ptr::copy_nonoverlapping(pixels.as_ptr(), mapped.as_ptr().cast::<u8>(), pixels.len());
            }
            device.submit_one_off(|command_buffer| {
                cmd_transition_layout(device, command_buffer, image, vk::ImageLayout::TRANSFER_DST_OPTIMAL)?;

                let regions: Vec<vk::BufferImageCopy> = (0..layer_count)
                    .map(|layer| {
                        vk::BufferImageCopy::default()
                            .buffer_offset(u64::from(layer) * layer_size)
                            .buffer_row_length(0)
                            .buffer_image_height(0)
                            .image_subresource(vk::ImageSubresourceLayers {
                                aspect_mask: image.aspect,
                                mip_level: 0,
                                base_array_layer: layer,
                                layer_count: 1,
                            })
                            .image_offset(vk::Offset3D { x: 0, y: 0, z: 0 })
                            .image_extent(vk::Extent3D {
                                width: image.extent.width,
                                height: image.extent.height,
                                depth: 1,
                            })
                    })
                    .collect();

                unsafe {
                    device.device().cmd_copy_buffer_to_image(
                        command_buffer,
                        staging,
                        image.image,
                        vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                        &regions,
                    );
                }

                cmd_generate_mip_levels(device, command_buffer, image, 0, layer_count)?;
                cmd_transition_layout(device, command_buffer, image, vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL)
            })
        }
        None => Err(engine_err!(SOURCE, "Image staging buffer is not host visible")),
    };

    let released = release_buffer(device, staging, Some(allocation));
    recorded.and(released)
}

/// Upload decoded pixels into a fresh image, destroying it if the upload fails
fn create_uploaded_image(device: &GraphicsDevice, spec: &ImageSpec, pixels: &[u8]) -> Result<GpuImage> {
    let mut image = create_image(device, spec)?;
    match upload_pixels(device, &mut image, pixels) {
        Ok(()) => Ok(image),
        Err(e) => {
            image.destroy(device)?;
            Err(e)
        }
    }
}

fn decode(path: &Path) -> Result<image::DynamicImage> {
    image::open(path).map_err(|e| {
        engine_error!(SOURCE, "Failed to decode image '{}': {}", path.display(), e);
        Error::IoError(format!("Failed to decode image '{}': {}", path.display(), e))
    })
}

/// Decode an image file into an RGBA8 2D image
pub fn load_image_2d_from_file(
    device: &GraphicsDevice,
    path: impl AsRef<Path>,
    format: TextureFormat,
    generate_mips: bool,
) -> Result<GpuImage> {
    if !matches!(format, TextureFormat::RgbaU8 | TextureFormat::RgbaU8Srgb) {
        engine_bail_warn!(SOURCE, "load_image_2d_from_file expects an 8-bit RGBA format, got {:?}", format);
    }
    let pixels = decode(path.as_ref())?.to_rgba8();
    let (width, height) = pixels.dimensions();

    let desc = ImageDesc::new_2d(width, height, format, generate_mips);
    create_uploaded_image(device, &spec_from_desc(&desc, false), pixels.as_raw())
}

/// Decode an HDR image file into an RGBA32F 2D image
pub fn load_hdr_image_2d_from_file(
    device: &GraphicsDevice,
    path: impl AsRef<Path>,
    generate_mips: bool,
) -> Result<GpuImage> {
    let pixels = decode(path.as_ref())?.to_rgba32f();
    let (width, height) = pixels.dimensions();

    let desc = ImageDesc::new_2d(width, height, TextureFormat::RgbaF32, generate_mips);
    create_uploaded_image(device, &spec_from_desc(&desc, false), bytemuck::cast_slice(pixels.as_raw().as_slice()))
}

/// Load the six faces named by a cube-map document into an sRGB cube image
pub fn load_image_cube_from_file(device: &GraphicsDevice, json_path: impl AsRef<Path>) -> Result<GpuImage> {
    let cube_map = CubeMapDesc::from_file(json_path.as_ref())?;

    let format = device.find_supported_format(
        &[vk::Format::R8G8B8A8_SRGB],
        vk::ImageTiling::OPTIMAL,
        vk::FormatFeatureFlags::SAMPLED_IMAGE
            | vk::FormatFeatureFlags::TRANSFER_SRC
            | vk::FormatFeatureFlags::TRANSFER_DST,
    );
    if format == vk::Format::UNDEFINED {
        return Err(engine_err!(SOURCE, "R8G8B8A8_SRGB cannot be sampled and transferred on this adapter"));
    }

    let mut faces = Vec::with_capacity(CUBE_FACES as usize);
    for face_path in cube_map.faces() {
        faces.push(decode(face_path)?.to_rgba8());
    }
    let (width, height) = faces[0].dimensions();
    if let Some(face) = faces.iter().find(|face| face.dimensions() != (width, height)) {
        engine_bail_warn!(SOURCE, "Cube faces must share one extent: {}x{} vs {}x{}",
            width, height, face.width(), face.height());
    }

    if width != height {
        engine_bail_warn!(SOURCE, "Cube faces must be square, got {}x{}", width, height);
    }

    let pixels: Vec<u8> = faces.iter().flat_map(|face| face.as_raw().iter().copied()).collect();
    drop(faces);

    let desc = ImageDesc::new_cube(width, TextureFormat::RgbaU8Srgb, true);
    create_uploaded_image(device, &spec_from_desc(&desc, true), &pixels)
}

/// Copy one mip level of one layer back to the CPU, tightly packed
///
/// The image returns to its previous layouts afterwards.
pub fn download_image_level(
    device: &GraphicsDevice,
    image: &mut GpuImage,
    layer: u32,
    mip: u32,
) -> Result<Vec<u8>> {
    if layer >= image.array_layers || mip >= image.mip_levels {
        engine_bail_warn!(SOURCE, "Readback of layer {} mip {} is outside the image ({} layers, {} mips)",
            layer, mip, image.array_layers, image.mip_levels);
    }
    let Some(texel) = texel_size(image.format) else {
        engine_bail_warn!(SOURCE, "Readback is not supported for {:?}", image.format);
    };
    let (width, height) = mip_extent(image.extent.width, image.extent.height, mip);
    let size = u64::from(width) * u64::from(height) * texel;

    let (readback, allocation) = allocate_buffer(
        device,
        size,
        vk::BufferUsageFlags::TRANSFER_DST,
        MemoryLocation::GpuToCpu,
        "image readback buffer",
    )?;

    let previous = image.layer_layouts.clone();
    let copied = device.submit_one_off(|command_buffer| {
        cmd_transition_layout(device, command_buffer, image, vk::ImageLayout::TRANSFER_SRC_OPTIMAL)?;

        let region = vk::BufferImageCopy::default()
            .image_subresource(vk::ImageSubresourceLayers {
                aspect_mask: image.aspect,
                mip_level: mip,
                base_array_layer: layer,
                layer_count: 1,
            })
            .image_extent(vk::Extent3D { width, height, depth: 1 });

        unsafe {
            device.device().cmd_copy_image_to_buffer(
                command_buffer,
                image.image,
                vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
                readback,
                &[region],
            );
        }

        for (run, layout) in layout_runs(&previous, 0..image.array_layers) {
            if layout != vk::ImageLayout::UNDEFINED {
                transition_layers(device, command_buffer, image, run, layout);
            }
        }
        Ok(())
    });

    let bytes = copied.and_then(|_| read_mapped(&allocation, size as usize));
    release_buffer(device, readback, Some(allocation))?;
    bytes
}

#[cfg(test)]
#[path = "vulkan_image_tests.rs"]
mod tests;
