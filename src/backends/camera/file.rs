// SPDX-License-Identifier: GPL-3.0-only

//! Still-image camera
//!
//! Serves one or more image files as a looping camera so capture sessions
//! can run headless, e.g. scanning a photographed label.

use super::CameraBackend;
use super::frame_loop::{CaptureLoopController, FrameSlot, LoopAction, LoopTrack};
use super::types::*;
use crate::constants::{capture, file_formats};
use crate::errors::CameraError;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tracing::{debug, info};

/// Camera backend backed by image files
#[derive(Debug, Clone)]
pub struct FileCameraBackend {
    images: Vec<PathBuf>,
}

impl FileCameraBackend {
    pub fn new(images: Vec<PathBuf>) -> Self {
        Self { images }
    }

    fn device(&self) -> Option<CameraDevice> {
        let first = self.images.first()?;
        let name = match self.images.len() {
            1 => format!("Still image {}", first.display()),
            n => format!("Still images ({} files)", n),
        };
        Some(CameraDevice {
            name,
            path: format!("file:{}", first.display()),
            facing: None,
            device_info: None,
        })
    }
}

impl CameraBackend for FileCameraBackend {
    fn enumerate_cameras(&self) -> Vec<CameraDevice> {
        self.device().into_iter().collect()
    }

    fn acquire(&self, _constraints: &StreamConstraints) -> BackendResult<MediaStream> {
        let device = self.device().ok_or(CameraError::NoCameraFound)?;
        let frames = self
            .images
            .iter()
            .map(|path| load_image_as_frame(path))
            .collect::<BackendResult<Vec<_>>>()?;

        let slot: FrameSlot = Arc::new(Mutex::new(None));
        let writer = Arc::clone(&slot);
        let mut index = 0usize;

        let controller = CaptureLoopController::start("file-camera", move || {
            let frame = CameraFrame {
                captured_at: Instant::now(),
                ..frames[index % frames.len()].clone()
            };
            *writer.lock().unwrap_or_else(|e| e.into_inner()) = Some(frame);
            index = index.wrapping_add(1);
            std::thread::sleep(capture::FILE_FRAME_INTERVAL);
            LoopAction::Continue
        });

        let track = Arc::new(LoopTrack::new(device.name.clone(), slot, controller));
        let media_track: Arc<dyn MediaTrack> = track.clone();
        info!(device = %device.name, "Acquired still-image camera");
        Ok(MediaStream::new(device, track, vec![media_track]))
    }

    fn name(&self) -> &'static str {
        "file"
    }

    fn is_available(&self) -> bool {
        !self.images.is_empty()
    }
}

/// Load an image file and convert it to a CameraFrame
pub fn load_image_as_frame(path: &Path) -> BackendResult<CameraFrame> {
    info!(path = %path.display(), "Loading image file");

    let img = image::open(path).map_err(|e| {
        CameraError::InitializationFailed(format!(
            "Failed to load image '{}': {}",
            path.display(),
            e
        ))
    })?;

    let rgba = img.to_rgba8();
    let width = rgba.width();
    let height = rgba.height();

    debug!(width, height, "Image loaded successfully");
    Ok(CameraFrame::new(width, height, rgba.into_raw(), PixelFormat::RGBA))
}

/// Collect all image paths from input (files or directories)
pub fn collect_image_paths(input: &[PathBuf]) -> std::io::Result<Vec<PathBuf>> {
    let mut paths = Vec::new();

    for path in input {
        if path.is_dir() {
            let mut found: Vec<PathBuf> = std::fs::read_dir(path)?
                .filter_map(|entry| entry.ok().map(|e| e.path()))
                .filter(|p| is_supported_image(p))
                .collect();
            // Sort by filename for consistent ordering
            found.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
            paths.extend(found);
        } else if is_supported_image(path) {
            paths.push(path.clone());
        }
    }

    Ok(paths)
}

/// Check if a path is a supported image file
fn is_supported_image(path: &Path) -> bool {
    path.extension()
        .map(|ext| file_formats::is_image_extension(&ext.to_string_lossy()))
        .unwrap_or(false)
}
