// SPDX-License-Identifier: MPL-2.0

//! Integration tests for constants module

use asset_tracker::constants::{capture, directory, file_formats};

#[test]
fn test_recent_limits_are_ordered() {
    assert!(directory::DEFAULT_RECENT >= 1);
    assert!(directory::DEFAULT_RECENT <= directory::MAX_RECENT);
    assert!(
        directory::SCAN_CAP as i64 >= directory::MAX_RECENT,
        "Scan cap must cover the largest listing"
    );
}

#[test]
fn test_native_polls_faster_than_fallback() {
    assert!(capture::NATIVE_POLL_INTERVAL < capture::FALLBACK_POLL_INTERVAL);
}

#[test]
fn test_image_extensions() {
    for ext in ["png", "JPG", "jpeg", "webp"] {
        assert!(file_formats::is_image_extension(ext), "{} should be supported", ext);
    }
    assert!(!file_formats::is_image_extension("mp4"));
    assert!(!file_formats::is_image_extension(""));
}
