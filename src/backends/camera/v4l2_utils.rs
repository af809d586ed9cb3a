// SPDX-License-Identifier: GPL-3.0-only

//! Shared V4L2 utility functions
//!
//! Capability queries and errno mapping used by the V4L2 camera backend.

use super::types::DeviceInfo;
use crate::errors::CameraError;
use std::os::unix::io::{AsRawFd, RawFd};
use tracing::{debug, warn};

/// VIDIOC_QUERYCAP ioctl number
const VIDIOC_QUERYCAP: libc::c_ulong = 0x80685600;

/// V4L2 capability flag for single-planar video capture
const V4L2_CAP_VIDEO_CAPTURE: u32 = 0x00000001;

/// V4L2 capability structure for VIDIOC_QUERYCAP ioctl
#[repr(C)]
struct V4l2Capability {
    driver: [u8; 16],
    card: [u8; 32],
    bus_info: [u8; 32],
    version: u32,
    capabilities: u32,
    device_caps: u32,
    reserved: [u32; 3],
}

/// Query V4L2 capabilities for an open file descriptor.
///
/// Issues the `VIDIOC_QUERYCAP` ioctl and returns the capability struct,
/// or `None` if the ioctl fails.
fn query_v4l2_cap(fd: RawFd) -> Option<V4l2Capability> {
    let mut cap: V4l2Capability = unsafe { std::mem::zeroed() };
    let result = unsafe { libc::ioctl(fd, VIDIOC_QUERYCAP as _, &mut cap as *mut V4l2Capability) };
    if result < 0 { None } else { Some(cap) }
}

/// Decode a NUL-terminated fixed-size ioctl string
fn c_string(bytes: &[u8]) -> String {
    let len = bytes.iter().position(|&c| c == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..len]).trim().to_string()
}

/// Probe a device node and describe it if it can capture video
///
/// Fails only when the node cannot be opened. Metadata nodes that UVC
/// drivers expose next to the capture node report no capture capability and
/// come back as `Ok(None)`.
pub fn probe_capture_device(device_path: &str) -> std::io::Result<Option<DeviceInfo>> {
    let file = std::fs::File::open(device_path)?;
    let Some(cap) = query_v4l2_cap(file.as_raw_fd()) else {
        return Ok(None);
    };

    // Use device_caps if available, otherwise capabilities
    let caps = if cap.device_caps != 0 {
        cap.device_caps
    } else {
        cap.capabilities
    };
    if caps & V4L2_CAP_VIDEO_CAPTURE == 0 {
        debug!(device_path, "Skipping node without video capture");
        return Ok(None);
    }

    // Get real path by resolving symlinks
    let real_path = std::fs::canonicalize(device_path)
        .map(|p| p.to_string_lossy().to_string())
        .unwrap_or_else(|_| device_path.to_string());

    let info = DeviceInfo {
        card: c_string(&cap.card),
        driver: c_string(&cap.driver),
        path: device_path.to_string(),
        real_path,
    };
    debug!(device_path, card = %info.card, driver = %info.driver, "Found V4L2 capture device");
    Ok(Some(info))
}

/// Result of probing every video node
#[derive(Debug, Default)]
pub struct DeviceScan {
    pub devices: Vec<DeviceInfo>,
    /// Nodes that could not be opened, with the error from the open
    pub open_errors: Vec<(String, std::io::Error)>,
}

impl DeviceScan {
    pub fn collect(paths: &[String]) -> Self {
        let mut scan = Self::default();
        for path in paths {
            match probe_capture_device(path) {
                Ok(Some(info)) => scan.devices.push(info),
                Ok(None) => {}
                Err(e) => {
                    debug!(device_path = %path, error = %e, "Could not open video node");
                    scan.open_errors.push((path.clone(), e));
                }
            }
        }
        scan
    }

    /// Error to report when no capture device is usable
    ///
    /// A node refused with EACCES/EPERM means a camera exists but access was
    /// denied, which takes precedence over "no camera".
    pub fn unavailable_error(&self) -> CameraError {
        let denied = self
            .open_errors
            .iter()
            .find(|(path, err)| camera_error_from_io(path, err) == CameraError::PermissionDenied);
        match denied {
            Some((path, err)) => {
                warn!(device_path = %path, error = %err, "Camera access denied");
                CameraError::PermissionDenied
            }
            None => CameraError::NoCameraFound,
        }
    }
}

/// List `/dev/video*` nodes in numeric order
pub fn video_device_paths() -> Vec<String> {
    let Ok(entries) = std::fs::read_dir("/dev") else {
        return Vec::new();
    };

    let mut nodes: Vec<(u32, String)> = entries
        .flatten()
        .filter_map(|entry| {
            let name = entry.file_name().to_string_lossy().to_string();
            let index = name.strip_prefix("video")?.parse().ok()?;
            Some((index, format!("/dev/{}", name)))
        })
        .collect();
    nodes.sort();
    nodes.into_iter().map(|(_, path)| path).collect()
}

/// Map an OS error from opening or streaming a device to a camera error
pub fn camera_error_from_io(device_path: &str, err: &std::io::Error) -> CameraError {
    match err.raw_os_error() {
        Some(libc::EACCES) | Some(libc::EPERM) => CameraError::PermissionDenied,
        Some(libc::EBUSY) => CameraError::Busy,
        Some(libc::ENOENT) | Some(libc::ENODEV) | Some(libc::ENXIO) => CameraError::NoCameraFound,
        _ => CameraError::InitializationFailed(format!("{}: {}", device_path, err)),
    }
}
