/// Shader effects: SPIR-V stages, reflected descriptor layouts, pipeline layout
///
/// Descriptor set layouts are never written by hand. Each stage is reflected
/// with `spirq`, the stages are merged per (set, binding) and one layout is
/// created per set index, with empty layouts filling the gaps so that set
/// numbers in the shaders match the bind indices.

use ash::vk;
use lumen_engine::lumen::config::GraphicsPassConfig;
use lumen_engine::lumen::{Error, Result};
use lumen_engine::{engine_bail, engine_debug, engine_err, engine_error, engine_warn};
use std::collections::BTreeMap;
use std::path::Path;

use crate::vulkan_device::GraphicsDevice;

const SOURCE: &str = "lumen::vulkan";

/// Size in bytes of the push constant range shared by every stage
pub const PUSH_CONSTANT_SIZE: u32 = 128;

/// Highest number of descriptor sets an effect may declare
pub const MAX_DESCRIPTOR_SETS: u32 = 4;

/// One descriptor binding found in a shader stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReflectedBinding {
    pub set: u32,
    pub binding: u32,
    pub descriptor_type: vk::DescriptorType,
    /// Array length; 1 for a non-array binding
    pub count: u32,
}

/// The descriptor bindings of one stage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderStageBindings {
    pub stage: vk::ShaderStageFlags,
    pub bindings: Vec<ReflectedBinding>,
}

/// Read a whole SPIR-V file into words
pub fn load_spv(path: impl AsRef<Path>) -> Result<Vec<u32>> {
    let path = path.as_ref();
    let mut file = std::fs::File::open(path).map_err(|e| {
        engine_error!(SOURCE, "Failed to open shader '{}': {}", path.display(), e);
        Error::IoError(format!("{}: {}", path.display(), e))
    })?;
    ash::util::read_spv(&mut file).map_err(|e| {
        engine_error!(SOURCE, "Failed to read SPIR-V '{}': {}", path.display(), e);
        Error::IoError(format!("{}: {}", path.display(), e))
    })
}

fn descriptor_type(desc_ty: &spirq::ty::DescriptorType) -> Result<vk::DescriptorType> {
    use spirq::ty::DescriptorType;
    match desc_ty {
        DescriptorType::Sampler(..) => Ok(vk::DescriptorType::SAMPLER),
        DescriptorType::CombinedImageSampler(..) => Ok(vk::DescriptorType::COMBINED_IMAGE_SAMPLER),
        DescriptorType::SampledImage(..) => Ok(vk::DescriptorType::SAMPLED_IMAGE),
        DescriptorType::StorageImage(..) => Ok(vk::DescriptorType::STORAGE_IMAGE),
        DescriptorType::UniformTexelBuffer(..) => Ok(vk::DescriptorType::UNIFORM_TEXEL_BUFFER),
        DescriptorType::StorageTexelBuffer(..) => Ok(vk::DescriptorType::STORAGE_TEXEL_BUFFER),
        DescriptorType::UniformBuffer(..) => Ok(vk::DescriptorType::UNIFORM_BUFFER),
        DescriptorType::StorageBuffer(..) => Ok(vk::DescriptorType::STORAGE_BUFFER),
        DescriptorType::InputAttachment(..) => Ok(vk::DescriptorType::INPUT_ATTACHMENT),
        other => {
            engine_bail!(SOURCE, "Unsupported SPIR-V descriptor type: {:?}", other);
        }
    }
}

/// Reflect the descriptor bindings used by a SPIR-V module
pub fn reflect_stage_bindings(code: &[u32], stage: vk::ShaderStageFlags) -> Result<ShaderStageBindings> {
    let entry_points = spirq::ReflectConfig::new()
        .spv(code)
        .ref_all_rscs(true)
        .reflect()
        .map_err(|e| engine_err!(SOURCE, "SPIR-V reflection failed: {:?}", e))?;

    let mut bindings = Vec::new();
    for entry_point in &entry_points {
        for var in entry_point.vars.iter() {
            if let spirq::var::Variable::Descriptor { desc_bind, desc_ty, nbind, .. } = var {
                bindings.push(ReflectedBinding {
                    set: desc_bind.set(),
                    binding: desc_bind.bind(),
                    descriptor_type: descriptor_type(desc_ty)?,
                    // Runtime-sized arrays report 0
                    count: (*nbind).max(1),
                });
            }
        }
    }

    Ok(ShaderStageBindings { stage, bindings })
}

/// Merge the bindings of several stages into per-set layout bindings
///
/// The first stage declaring a (set, binding) pair decides its type and count;
/// later declarations of the same pair are ignored. Every binding is visible to
/// all stages. Bindings are sorted by binding number within a set.
pub fn merge_stage_bindings(
    stages: &[ShaderStageBindings],
) -> BTreeMap<u32, Vec<vk::DescriptorSetLayoutBinding<'static>>> {
    let mut sets: BTreeMap<u32, BTreeMap<u32, ReflectedBinding>> = BTreeMap::new();

    for stage in stages {
        for reflected in &stage.bindings {
            let set = sets.entry(reflected.set).or_default();
            match set.get(&reflected.binding) {
                Some(existing) if existing.descriptor_type != reflected.descriptor_type => {
                    engine_warn!(SOURCE,
                        "Binding (set {}, binding {}) declared as {:?} by {:?}, keeping {:?}",
                        reflected.set, reflected.binding, reflected.descriptor_type,
                        stage.stage, existing.descriptor_type);
                }
                Some(_) => {}
                None => {
                    set.insert(reflected.binding, *reflected);
                }
            }
        }
    }

    sets.into_iter()
        .map(|(set, bindings)| {
            let layout_bindings = bindings
                .into_values()
                .map(|reflected| {
                    vk::DescriptorSetLayoutBinding::default()
                        .binding(reflected.binding)
                        .descriptor_type(reflected.descriptor_type)
                        .descriptor_count(reflected.count)
                        .stage_flags(vk::ShaderStageFlags::ALL)
                })
                .collect();
            (set, layout_bindings)
        })
        .collect()
}

/// Lay merged sets out densely from set 0 to the highest populated set
///
/// Sets at or above [`MAX_DESCRIPTOR_SETS`] are dropped with a warning.
pub(crate) fn dense_set_bindings(
    merged: BTreeMap<u32, Vec<vk::DescriptorSetLayoutBinding<'static>>>,
) -> Vec<Vec<vk::DescriptorSetLayoutBinding<'static>>> {
    let mut dense: Vec<Vec<vk::DescriptorSetLayoutBinding<'static>>> = Vec::new();

    for (set, bindings) in merged {
        if set >= MAX_DESCRIPTOR_SETS {
            engine_warn!(SOURCE, "Descriptor set {} exceeds the {} supported sets, dropped ({} bindings)",
                set, MAX_DESCRIPTOR_SETS, bindings.len());
            continue;
        }
        let index = set as usize;
        if dense.len() <= index {
            dense.resize_with(index + 1, Vec::new);
        }
        dense[index] = bindings;
    }

    dense
}

/// A shader stage module
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShaderStage {
    pub module: vk::ShaderModule,
    pub stage: vk::ShaderStageFlags,
}

/// Shader stages plus the layouts derived from them
///
/// Graphics effects also keep the pipeline-state document they were built
/// from; the pipeline builder reads its fixed-function state from it.
pub struct ShaderEffect {
    stages: Vec<ShaderStage>,
    set_layouts: Vec<vk::DescriptorSetLayout>,
    pipeline_layout: vk::PipelineLayout,
    config: Option<GraphicsPassConfig>,
}

impl ShaderEffect {
    pub fn stages(&self) -> &[ShaderStage] {
        &self.stages
    }

    pub fn set_layouts(&self) -> &[vk::DescriptorSetLayout] {
        &self.set_layouts
    }

    pub fn set_layout(&self, set: u32) -> Option<vk::DescriptorSetLayout> {
        self.set_layouts.get(set as usize).copied()
    }

    pub fn pipeline_layout(&self) -> vk::PipelineLayout {
        self.pipeline_layout
    }

    /// The pipeline-state document, `None` for compute effects
    pub fn config(&self) -> Option<&GraphicsPassConfig> {
        self.config.as_ref()
    }

    pub fn is_compute(&self) -> bool {
        self.config.is_none()
    }

    /// Destroy the pipeline layout, set layouts and modules
    pub fn destroy(mut self, device: &GraphicsDevice) {
        self.release(device);
    }

    fn release(&mut self, device: &GraphicsDevice) {
        let vk_device = device.device();
        unsafe {
            vk_device.destroy_pipeline_layout(self.pipeline_layout, None);
            for layout in self.set_layouts.drain(..) {
                vk_device.destroy_descriptor_set_layout(layout, None);
            }
            for stage in self.stages.drain(..) {
                vk_device.destroy_shader_module(stage.module, None);
            }
        }
        self.pipeline_layout = vk::PipelineLayout::null();
    }
}

impl Drop for ShaderEffect {
    fn drop(&mut self) {
        if !self.stages.is_empty() {
            engine_warn!(SOURCE, "ShaderEffect dropped without destroy(); {} modules leak",
                self.stages.len());
        }
    }
}

/// Reflect, merge, then create modules and layouts. GPU objects already
/// created are released if a later step fails.
fn build_effect(
    device: &GraphicsDevice,
    stage_code: Vec<(vk::ShaderStageFlags, Vec<u32>)>,
    config: Option<GraphicsPassConfig>,
) -> Result<ShaderEffect> {
    let reflected = stage_code
        .iter()
        .map(|(stage, code)| reflect_stage_bindings(code, *stage))
        .collect::<Result<Vec<_>>>()?;
    let sets = dense_set_bindings(merge_stage_bindings(&reflected));

    let mut effect = ShaderEffect {
        stages: Vec::with_capacity(stage_code.len()),
        set_layouts: Vec::with_capacity(sets.len()),
        pipeline_layout: vk::PipelineLayout::null(),
        config,
    };

    if let Err(e) = create_effect_objects(device, &mut effect, &stage_code, &sets) {
        effect.release(device);
        return Err(e);
    }

    engine_debug!(SOURCE, "Shader effect built: {} stages, {} descriptor sets",
        effect.stages.len(), effect.set_layouts.len());
    Ok(effect)
}

fn create_effect_objects(
    device: &GraphicsDevice,
    effect: &mut ShaderEffect,
    stage_code: &[(vk::ShaderStageFlags, Vec<u32>)],
    sets: &[Vec<vk::DescriptorSetLayoutBinding<'static>>],
) -> Result<()> {
    let vk_device = device.device();

    for (stage, code) in stage_code {
        let create_info = vk::ShaderModuleCreateInfo::default().code(code);
        let module = unsafe {
            vk_device.create_shader_module(&create_info, None)
                .map_err(|e| engine_err!(SOURCE, "Failed to create {:?} shader module: {:?}", stage, e))?
        };
        effect.stages.push(ShaderStage { module, stage: *stage });
    }

    for (set, bindings) in sets.iter().enumerate() {
        let create_info = vk::DescriptorSetLayoutCreateInfo::default().bindings(bindings);
        let layout = unsafe {
            vk_device.create_descriptor_set_layout(&create_info, None)
                .map_err(|e| engine_err!(SOURCE, "Failed to create layout for descriptor set {}: {:?}", set, e))?
        };
        effect.set_layouts.push(layout);
    }

    let push_constant_ranges = [vk::PushConstantRange::default()
        .stage_flags(vk::ShaderStageFlags::ALL)
        .offset(0)
        .size(PUSH_CONSTANT_SIZE)];
    let layout_info = vk::PipelineLayoutCreateInfo::default()
        .set_layouts(&effect.set_layouts)
        .push_constant_ranges(&push_constant_ranges);
    effect.pipeline_layout = unsafe {
        vk_device.create_pipeline_layout(&layout_info, None)
            .map_err(|e| engine_err!(SOURCE, "Failed to create pipeline layout: {:?}", e))?
    };

    Ok(())
}

/// Build a vertex + fragment effect from a pipeline-state document
pub fn build_graphics_shader_effect(
    device: &GraphicsDevice,
    pso_json_path: impl AsRef<Path>,
) -> Result<ShaderEffect> {
    let config = GraphicsPassConfig::from_file(pso_json_path)?;
    let vert = load_spv(&config.vert_spv_file_path)?;
    let frag = load_spv(&config.frag_spv_file_path)?;

    build_effect(
        device,
        vec![
            (vk::ShaderStageFlags::VERTEX, vert),
            (vk::ShaderStageFlags::FRAGMENT, frag),
        ],
        Some(config),
    )
}

/// Build a single-stage compute effect
pub fn build_compute_shader_effect(
    device: &GraphicsDevice,
    comp_spv_path: impl AsRef<Path>,
) -> Result<ShaderEffect> {
    let comp = load_spv(comp_spv_path)?;
    build_effect(device, vec![(vk::ShaderStageFlags::COMPUTE, comp)], None)
}

#[cfg(test)]
#[path = "vulkan_shader_tests.rs"]
mod tests;
