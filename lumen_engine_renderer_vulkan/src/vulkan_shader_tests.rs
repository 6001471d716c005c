//! Unit tests for vulkan_shader.rs (binding merge and set layout, no GPU)

use super::*;

fn binding(set: u32, binding: u32, descriptor_type: vk::DescriptorType) -> ReflectedBinding {
    ReflectedBinding { set, binding, descriptor_type, count: 1 }
}

fn stage(stage: vk::ShaderStageFlags, bindings: Vec<ReflectedBinding>) -> ShaderStageBindings {
    ShaderStageBindings { stage, bindings }
}

// ============================================================================
// Merge
// ============================================================================

#[test]
fn test_merge_first_stage_wins_on_conflict() {
    let stages = [
        stage(vk::ShaderStageFlags::VERTEX, vec![binding(0, 3, vk::DescriptorType::UNIFORM_BUFFER)]),
        stage(vk::ShaderStageFlags::FRAGMENT, vec![binding(0, 3, vk::DescriptorType::STORAGE_BUFFER)]),
    ];

    let merged = merge_stage_bindings(&stages);

    assert_eq!(merged.len(), 1);
    let set0 = &merged[&0];
    assert_eq!(set0.len(), 1);
    assert_eq!(set0[0].binding, 3);
    assert_eq!(set0[0].descriptor_type, vk::DescriptorType::UNIFORM_BUFFER);
    assert_eq!(set0[0].stage_flags, vk::ShaderStageFlags::ALL);
}

#[test]
fn test_merge_unions_distinct_bindings_sorted() {
    let stages = [
        stage(vk::ShaderStageFlags::VERTEX, vec![
            binding(0, 2, vk::DescriptorType::STORAGE_BUFFER),
            binding(1, 0, vk::DescriptorType::UNIFORM_BUFFER),
        ]),
        stage(vk::ShaderStageFlags::FRAGMENT, vec![
            binding(0, 0, vk::DescriptorType::COMBINED_IMAGE_SAMPLER),
            binding(0, 2, vk::DescriptorType::STORAGE_BUFFER),
        ]),
    ];

    let merged = merge_stage_bindings(&stages);

    let set0: Vec<u32> = merged[&0].iter().map(|b| b.binding).collect();
    assert_eq!(set0, vec![0, 2]);
    assert_eq!(merged[&1].len(), 1);
}

#[test]
fn test_merge_keeps_descriptor_count() {
    let stages = [stage(vk::ShaderStageFlags::FRAGMENT, vec![ReflectedBinding {
        set: 0,
        binding: 1,
        descriptor_type: vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
        count: 16,
    }])];

    let merged = merge_stage_bindings(&stages);
    assert_eq!(merged[&0][0].descriptor_count, 16);
}

#[test]
fn test_merge_of_no_bindings_is_empty() {
    let stages = [stage(vk::ShaderStageFlags::COMPUTE, Vec::new())];
    assert!(merge_stage_bindings(&stages).is_empty());
}

// ============================================================================
// Dense set layout
// ============================================================================

#[test]
fn test_dense_sets_fill_gaps_with_empty_layouts() {
    let stages = [stage(vk::ShaderStageFlags::COMPUTE, vec![
        binding(0, 0, vk::DescriptorType::STORAGE_IMAGE),
        binding(2, 0, vk::DescriptorType::UNIFORM_BUFFER),
    ])];

    let sets = dense_set_bindings(merge_stage_bindings(&stages));

    assert_eq!(sets.len(), 3);
    assert_eq!(sets[0].len(), 1);
    assert!(sets[1].is_empty());
    assert_eq!(sets[2][0].descriptor_type, vk::DescriptorType::UNIFORM_BUFFER);
}

#[test]
fn test_dense_sets_drop_sets_beyond_limit() {
    let stages = [stage(vk::ShaderStageFlags::FRAGMENT, vec![
        binding(1, 0, vk::DescriptorType::SAMPLER),
        binding(MAX_DESCRIPTOR_SETS, 0, vk::DescriptorType::UNIFORM_BUFFER),
        binding(7, 1, vk::DescriptorType::UNIFORM_BUFFER),
    ])];

    let sets = dense_set_bindings(merge_stage_bindings(&stages));

    assert_eq!(sets.len(), 2);
    assert!(sets[0].is_empty());
    assert_eq!(sets[1][0].descriptor_type, vk::DescriptorType::SAMPLER);
}

// ============================================================================
// SPIR-V loading
// ============================================================================

#[test]
fn test_load_spv_missing_file_is_io_error() {
    let result = load_spv("does/not/exist.spv");
    assert!(matches!(result, Err(Error::IoError(_))));
}

#[test]
fn test_load_spv_reads_words() {
    let path = std::env::temp_dir().join("lumen_load_spv_words.spv");
    let words: [u32; 2] = [0x0723_0203, 0x0001_0000];
    let bytes: Vec<u8> = words.iter().flat_map(|w| w.to_le_bytes()).collect();
    std::fs::write(&path, &bytes).unwrap();

    let loaded = load_spv(&path).unwrap();
    std::fs::remove_file(&path).ok();

    assert_eq!(loaded, words.to_vec());
}

#[test]
fn test_load_spv_rejects_truncated_file() {
    let path = std::env::temp_dir().join("lumen_load_spv_truncated.spv");
    std::fs::write(&path, [0x03u8, 0x02, 0x23]).unwrap();

    let result = load_spv(&path);
    std::fs::remove_file(&path).ok();

    assert!(matches!(result, Err(Error::IoError(_))));
}
