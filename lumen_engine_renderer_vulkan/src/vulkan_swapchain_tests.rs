//! Unit tests for the swapchain creation policy (vulkan_swapchain.rs)

use super::*;

fn capabilities(current: (u32, u32), min: (u32, u32), max: (u32, u32)) -> vk::SurfaceCapabilitiesKHR {
    vk::SurfaceCapabilitiesKHR {
        current_extent: vk::Extent2D { width: current.0, height: current.1 },
        min_image_extent: vk::Extent2D { width: min.0, height: min.1 },
        max_image_extent: vk::Extent2D { width: max.0, height: max.1 },
        ..Default::default()
    }
}

fn surface_format(format: vk::Format, color_space: vk::ColorSpaceKHR) -> vk::SurfaceFormatKHR {
    vk::SurfaceFormatKHR { format, color_space }
}

// ============================================================================
// Extent
// ============================================================================

#[test]
fn test_extent_uses_current_extent_when_defined() {
    let caps = capabilities((1280, 720), (1, 1), (4096, 4096));
    let extent = choose_swap_extent(&caps, vk::Extent2D { width: 800, height: 600 });
    assert_eq!(extent, vk::Extent2D { width: 1280, height: 720 });
}

#[test]
fn test_extent_clamps_desired_when_current_is_undefined() {
    let caps = capabilities((u32::MAX, u32::MAX), (200, 100), (1920, 1080));

    let inside = choose_swap_extent(&caps, vk::Extent2D { width: 800, height: 600 });
    assert_eq!(inside, vk::Extent2D { width: 800, height: 600 });

    let too_large = choose_swap_extent(&caps, vk::Extent2D { width: 5000, height: 50 });
    assert_eq!(too_large, vk::Extent2D { width: 1920, height: 100 });
}

// ============================================================================
// Present mode and format
// ============================================================================

#[test]
fn test_present_mode_prefers_mailbox() {
    let modes = [vk::PresentModeKHR::FIFO, vk::PresentModeKHR::MAILBOX, vk::PresentModeKHR::IMMEDIATE];
    assert_eq!(choose_present_mode(&modes), vk::PresentModeKHR::MAILBOX);
}

#[test]
fn test_present_mode_falls_back_to_fifo() {
    let modes = [vk::PresentModeKHR::IMMEDIATE, vk::PresentModeKHR::FIFO_RELAXED];
    assert_eq!(choose_present_mode(&modes), vk::PresentModeKHR::FIFO);
    assert_eq!(choose_present_mode(&[]), vk::PresentModeKHR::FIFO);
}

#[test]
fn test_surface_format_prefers_bgra_unorm_srgb_nonlinear() {
    let formats = [
        surface_format(vk::Format::R8G8B8A8_SRGB, vk::ColorSpaceKHR::SRGB_NONLINEAR),
        surface_format(vk::Format::B8G8R8A8_UNORM, vk::ColorSpaceKHR::SRGB_NONLINEAR),
    ];
    assert_eq!(choose_surface_format(&formats), Some(formats[1]));
}

#[test]
fn test_surface_format_falls_back_to_first() {
    let formats = [
        surface_format(vk::Format::R8G8B8A8_SRGB, vk::ColorSpaceKHR::SRGB_NONLINEAR),
        surface_format(vk::Format::B8G8R8A8_UNORM, vk::ColorSpaceKHR::EXTENDED_SRGB_LINEAR_EXT),
    ];
    assert_eq!(choose_surface_format(&formats), Some(formats[0]));
    assert_eq!(choose_surface_format(&[]), None);
}

// ============================================================================
// Image count
// ============================================================================

#[test]
fn test_image_count_is_min_plus_one() {
    let caps = vk::SurfaceCapabilitiesKHR { min_image_count: 2, max_image_count: 8, ..Default::default() };
    assert_eq!(choose_image_count(&caps), 3);
}

#[test]
fn test_image_count_capped_by_max() {
    let caps = vk::SurfaceCapabilitiesKHR { min_image_count: 3, max_image_count: 3, ..Default::default() };
    assert_eq!(choose_image_count(&caps), 3);
}

#[test]
fn test_image_count_unbounded_when_max_is_zero() {
    let caps = vk::SurfaceCapabilitiesKHR { min_image_count: 4, max_image_count: 0, ..Default::default() };
    assert_eq!(choose_image_count(&caps), 5);
}

// ============================================================================
// Partial creation
// ============================================================================

#[test]
fn test_create_all_returns_every_object_in_order() {
    let mut released = Vec::new();
    let created = create_all_or_release(&[1, 2, 3], |&i| Ok(i * 10), |o| released.push(o)).unwrap();
    assert_eq!(created, vec![10, 20, 30]);
    assert!(released.is_empty());
}

#[test]
fn test_create_all_releases_earlier_objects_on_failure() {
    let mut released = Vec::new();
    let result = create_all_or_release(
        &[1, 2, 3, 4],
        |&i| {
            if i == 3 {
                Err(Error::BackendError("view 3 failed".to_string()))
            } else {
                Ok(i * 10)
            }
        },
        |o| released.push(o),
    );
    assert_eq!(result, Err(Error::BackendError("view 3 failed".to_string())));
    assert_eq!(released, vec![10, 20]);
}
