//! Unit tests for vulkan_device.rs
//!
//! Only the parts of device creation that need no Vulkan loader.

use super::*;
use crate::debug::{init_debug_config, is_debug_config_installed, Config};
use lumen_engine::lumen::config::{DebugMessageFilter, DebugOutput, DebugSeverity};
use serial_test::serial;

fn install_debug_config() {
    init_debug_config(Config {
        severity: DebugSeverity::ErrorsAndWarnings,
        output: DebugOutput::Console,
        message_filter: DebugMessageFilter::default(),
        enable_stats: true,
    });
}

#[test]
#[serial]
fn test_failed_init_uninstalls_debug_config() {
    install_debug_config();
    assert!(is_debug_config_installed());

    let mut partial = PartialInit::default();
    partial.debug_config = true;
    drop(partial);

    assert!(!is_debug_config_installed());
}

#[test]
#[serial]
fn test_completed_init_keeps_debug_config() {
    install_debug_config();

    let mut partial = PartialInit::default();
    partial.debug_config = true;
    partial.complete();

    assert!(is_debug_config_installed());
    crate::debug::cleanup_debug_config();
}

#[test]
fn test_empty_partial_init_drops_cleanly() {
    drop(PartialInit::default());
}
