//! Unit tests for material.rs

use super::*;
use glam::{Vec3, Vec4};

#[test]
fn test_new_material_has_no_maps() {
    let m = Material::new(0.3, 0.7, Vec3::new(1.0, 0.0, 0.0), Vec3::new(0.0, 0.5, 0.0));
    assert_eq!(m.base_color_map_index, NO_MAP);
    assert_eq!(m.roughness_map_index, NO_MAP);
    assert_eq!(m.metalic_map_index, NO_MAP);
    assert_eq!(m.emissive_map_index, NO_MAP);
    assert_eq!(m.normal_map_index, NO_MAP);
    assert!(!m.has_textures());
    assert_eq!(m.sampler_index, 0);
}

#[test]
fn test_new_material_colors_have_zero_w() {
    let m = Material::new(0.3, 0.7, Vec3::new(1.0, 0.2, 0.1), Vec3::new(0.0, 0.5, 0.0));
    assert_eq!(m.base_color, Vec4::new(1.0, 0.2, 0.1, 0.0));
    assert_eq!(m.emissive_color, Vec4::new(0.0, 0.5, 0.0, 0.0));
    assert_eq!(m.roughness, 0.3);
    assert_eq!(m.metalness, 0.7);
}

#[test]
fn test_default_material() {
    let m = Material::default();
    assert_eq!(m.base_color, Vec4::ONE);
    assert_eq!(m.emissive_color, Vec4::ZERO);
    assert_eq!(m.roughness, 1.0);
    assert_eq!(m.metalness, 1.0);
    assert!(!m.has_textures());
}

#[test]
fn test_material_size_matches_std430() {
    assert_eq!(std::mem::size_of::<Material>(), 64);
}

#[test]
fn test_has_textures_with_one_map() {
    let mut m = Material::default();
    m.normal_map_index = 2;
    assert!(m.has_textures());
}
