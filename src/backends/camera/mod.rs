// SPDX-License-Identifier: MPL-2.0

//! Camera backend abstraction
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────┐
//! │ BarcodeCaptureController  │
//! └─────────────┬─────────────┘
//!               │ acquire(constraints)
//!               ▼
//! ┌───────────────────────────┐
//! │    CameraBackend Trait    │  ← Common interface
//! └─────────────┬─────────────┘
//!          ┌────┴─────┐
//!          ▼          ▼
//!      ┌──────┐   ┌──────┐
//!      │ V4L2 │   │ File │  ← Concrete implementations
//!      └──────┘   └──────┘
//! ```
//!
//! A backend hands out a [`MediaStream`]: a set of tracks plus a
//! latest-frame [`FrameSource`]. The caller owns the stream exclusively and
//! must stop its tracks to release the device.

pub mod file;
pub mod frame_loop;
pub mod types;
#[cfg(target_os = "linux")]
pub mod v4l2;
#[cfg(target_os = "linux")]
pub mod v4l2_utils;

pub use file::FileCameraBackend;
pub use types::*;
#[cfg(target_os = "linux")]
pub use v4l2::V4l2CameraBackend;

use std::sync::Arc;

/// Camera backend trait
///
/// `acquire` may block while the device opens; async callers run it on the
/// blocking pool.
pub trait CameraBackend: Send + Sync {
    /// Enumerate available cameras on this backend
    fn enumerate_cameras(&self) -> Vec<CameraDevice>;

    /// Open a camera matching `constraints` and start streaming
    ///
    /// # Returns
    /// * `Ok(MediaStream)` - Stream with at least one live track
    /// * `Err(CameraError)` - Permission denied, no device, busy, or setup failure
    fn acquire(&self, constraints: &StreamConstraints) -> BackendResult<MediaStream>;

    /// Backend identifier for logging
    fn name(&self) -> &'static str;

    /// Check if this backend is available on the current system
    fn is_available(&self) -> bool;
}

/// Pick a device for the given constraints
///
/// An exact path match wins, then the first device with the preferred
/// facing, then the first device.
pub fn select_device(
    devices: &[CameraDevice],
    constraints: &StreamConstraints,
) -> Option<CameraDevice> {
    if let Some(path) = &constraints.device_path {
        return devices.iter().find(|d| &d.path == path).cloned();
    }

    constraints
        .facing
        .and_then(|facing| devices.iter().find(|d| d.facing == Some(facing)))
        .or_else(|| devices.first())
        .cloned()
}

/// Get the default camera backend for this platform
#[cfg(target_os = "linux")]
pub fn get_default_backend() -> Arc<dyn CameraBackend> {
    Arc::new(V4l2CameraBackend::new())
}

/// Get the default camera backend for this platform
///
/// Only still images are supported off Linux.
#[cfg(not(target_os = "linux"))]
pub fn get_default_backend() -> Arc<dyn CameraBackend> {
    Arc::new(FileCameraBackend::new(Vec::new()))
}
