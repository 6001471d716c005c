//! Unit tests for image.rs

use super::*;

// ============================================================================
// MIP MATH
// ============================================================================

#[test]
fn test_calculate_mip_levels_reference_values() {
    assert_eq!(calculate_mip_levels(1, 1), 1);
    assert_eq!(calculate_mip_levels(256, 256), 9);
    assert_eq!(calculate_mip_levels(300, 200), 9);
    assert_eq!(calculate_mip_levels(64, 64), 7);
    assert_eq!(calculate_mip_levels(1, 1024), 11);
}

#[test]
fn test_calculate_mip_levels_matches_log2_formula() {
    for w in 1..=520u32 {
        for h in [1u32, 3, 64, 255, 256, 257, 1000] {
            let expected = (w.max(h) as f64).log2().floor() as u32 + 1;
            assert_eq!(calculate_mip_levels(w, h), expected, "w={} h={}", w, h);
        }
    }
}

#[test]
fn test_mip_extent_halves_and_floors_at_one() {
    assert_eq!(mip_extent(300, 200, 0), (300, 200));
    assert_eq!(mip_extent(300, 200, 1), (150, 100));
    assert_eq!(mip_extent(300, 200, 8), (1, 1));
    assert_eq!(mip_extent(64, 4, 3), (8, 1));
    assert_eq!(mip_extent(64, 64, 40), (1, 1));
}

#[test]
fn test_last_mip_is_one_by_one() {
    let levels = calculate_mip_levels(300, 200);
    assert_eq!(mip_extent(300, 200, levels - 1), (1, 1));
    assert_ne!(mip_extent(300, 200, levels - 2), (1, 1));
}

// ============================================================================
// DESCRIPTORS
// ============================================================================

#[test]
fn test_image_desc_mips_and_layers() {
    let flat = ImageDesc::new_2d(64, 64, TextureFormat::RgbaU8, false);
    assert_eq!(flat.mip_levels(), 1);
    assert_eq!(flat.array_layers(), 1);

    let mipped = ImageDesc::new_2d(64, 64, TextureFormat::RgbaU8, true);
    assert_eq!(mipped.mip_levels(), 7);

    let cube = ImageDesc::new_cube(128, TextureFormat::RgbaU8Srgb, true);
    assert_eq!(cube.array_layers(), 6);
    assert_eq!(cube.mip_levels(), 8);
}

#[test]
fn test_texture_format_sizes() {
    assert_eq!(TextureFormat::RgbaU8.bytes_per_pixel(), 4);
    assert_eq!(TextureFormat::RgbaF32.bytes_per_pixel(), 16);
    assert!(TextureFormat::D24S8.is_depth());
    assert!(!TextureFormat::RgbaU8Srgb.is_depth());
}
