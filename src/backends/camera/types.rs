// SPDX-License-Identifier: GPL-3.0-only
// Shared types for camera backend abstraction

//! Shared types for camera backends

use crate::constants::capture;
use crate::errors::CameraError;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

/// Result type for backend operations
pub type BackendResult<T> = Result<T, CameraError>;

/// Pixel format for camera frames
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    /// RGBA - 32-bit with alpha (4 bytes per pixel)
    /// Output of still images and decoded files
    RGBA,
    /// YUYV - Packed 4:2:2 (Y0 U Y1 V interleaved)
    /// Common raw format from webcam sensors
    YUYV,
    /// Gray8 - 8-bit grayscale (single channel)
    /// Luma of decoded MJPEG frames, monochrome and IR cameras
    Gray8,
}

impl PixelFormat {
    /// Average bytes per pixel (accounting for chroma subsampling)
    pub fn bytes_per_pixel(&self) -> u32 {
        match self {
            Self::RGBA => 4,
            Self::YUYV => 2,
            Self::Gray8 => 1,
        }
    }
}

/// A single frame from the camera
#[derive(Debug, Clone)]
pub struct CameraFrame {
    pub width: u32,
    pub height: u32,
    /// Pixel data in `format`
    pub data: Arc<[u8]>,
    pub format: PixelFormat,
    /// Row stride (bytes per row, may include padding)
    pub stride: u32,
    /// Timestamp when frame was captured
    pub captured_at: Instant,
}

impl CameraFrame {
    /// Create a frame with a tightly packed stride
    pub fn new(width: u32, height: u32, data: impl Into<Arc<[u8]>>, format: PixelFormat) -> Self {
        Self {
            width,
            height,
            data: data.into(),
            format,
            stride: width * format.bytes_per_pixel(),
            captured_at: Instant::now(),
        }
    }

    /// Extract the luma plane as tightly packed `width * height` bytes
    ///
    /// RGBA uses the integer BT.601 weights. Rows shorter than the stride
    /// claims are padded with black.
    pub fn to_luma(&self) -> Vec<u8> {
        let width = self.width as usize;
        let height = self.height as usize;
        let stride = self.stride as usize;
        let mut luma = Vec::with_capacity(width * height);

        for y in 0..height {
            let row = self.data.get(y * stride..).unwrap_or(&[]);
            for x in 0..width {
                let value = match self.format {
                    PixelFormat::Gray8 => row.get(x).copied(),
                    // Every pixel's Y sample sits at an even byte offset
                    PixelFormat::YUYV => row.get(x * 2).copied(),
                    PixelFormat::RGBA => row.get(x * 4..x * 4 + 3).map(|px| {
                        let (r, g, b) = (px[0] as u32, px[1] as u32, px[2] as u32);
                        ((77 * r + 150 * g + 29 * b) >> 8) as u8
                    }),
                };
                luma.push(value.unwrap_or(0));
            }
        }

        luma
    }
}

/// Which way a camera faces relative to the user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FacingMode {
    /// Towards the user (front/selfie camera)
    User,
    /// Away from the user (rear/world camera)
    Environment,
}

impl FacingMode {
    /// Guess the facing of a camera from its name or location string
    ///
    /// Returns `None` for external cameras and names with no hint.
    pub fn from_description(description: &str) -> Option<Self> {
        let lower = description.to_lowercase();
        const REAR: &[&str] = &["back", "rear", "world", "environment"];
        const FRONT: &[&str] = &["front", "user", "integrated", "facetime"];

        if REAR.iter().any(|hint| lower.contains(hint)) {
            Some(Self::Environment)
        } else if FRONT.iter().any(|hint| lower.contains(hint)) {
            Some(Self::User)
        } else {
            None
        }
    }
}

impl std::fmt::Display for FacingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FacingMode::User => write!(f, "user"),
            FacingMode::Environment => write!(f, "environment"),
        }
    }
}

/// Requested properties of an acquired stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamConstraints {
    /// Preferred facing; a camera with another facing is used if none match
    pub facing: Option<FacingMode>,
    /// Exact device path, overriding the facing preference
    pub device_path: Option<String>,
    pub width: u32,
    pub height: u32,
}

impl Default for StreamConstraints {
    fn default() -> Self {
        Self {
            facing: Some(FacingMode::Environment),
            device_path: None,
            width: capture::PREFERRED_WIDTH,
            height: capture::PREFERRED_HEIGHT,
        }
    }
}

/// Device information from V4L2 capability
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceInfo {
    /// Name of the device (V4L2 card)
    pub card: String,
    /// Driver name (V4L2 driver)
    pub driver: String,
    /// Device path (e.g., /dev/video0)
    pub path: String,
    /// Real device path (resolved symlinks)
    pub real_path: String,
}

/// Represents a camera device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraDevice {
    pub name: String,
    /// Path used to open the device
    pub path: String,
    pub facing: Option<FacingMode>,
    pub device_info: Option<DeviceInfo>,
}

/// Latest-frame view of a live video source
pub trait FrameSource: Send + Sync {
    /// Most recent frame, if any has arrived yet
    fn latest_frame(&self) -> Option<CameraFrame>;

    /// Whether enough data has arrived to attempt a detection
    fn has_frame(&self) -> bool {
        self.latest_frame().is_some()
    }
}

/// One track of an acquired stream
pub trait MediaTrack: Send + Sync {
    fn label(&self) -> &str;

    /// Stop the track and release its device; further calls are no-ops
    fn stop(&self);

    fn is_live(&self) -> bool;
}

/// An acquired camera stream
///
/// Owns its tracks. Dropping the stream stops every track.
pub struct MediaStream {
    id: Uuid,
    device: CameraDevice,
    tracks: Vec<Arc<dyn MediaTrack>>,
    frames: Arc<dyn FrameSource>,
}

impl MediaStream {
    pub fn new(
        device: CameraDevice,
        frames: Arc<dyn FrameSource>,
        tracks: Vec<Arc<dyn MediaTrack>>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            device,
            tracks,
            frames,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn device(&self) -> &CameraDevice {
        &self.device
    }

    /// Frame source the detection strategies read from
    pub fn frames(&self) -> Arc<dyn FrameSource> {
        Arc::clone(&self.frames)
    }

    /// Stop every track; idempotent
    pub fn stop_all_tracks(&self) {
        for track in &self.tracks {
            track.stop();
        }
    }

    /// Number of tracks still holding their device
    pub fn live_track_count(&self) -> usize {
        self.tracks.iter().filter(|t| t.is_live()).count()
    }
}

impl std::fmt::Debug for MediaStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaStream")
            .field("id", &self.id)
            .field("device", &self.device.path)
            .field("live_tracks", &self.live_track_count())
            .finish()
    }
}

impl Drop for MediaStream {
    fn drop(&mut self) {
        self.stop_all_tracks();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_luma_from_rgba_with_stride() {
        // 2x1 frame: white, black, then two padding bytes
        let data: Vec<u8> = vec![255, 255, 255, 255, 0, 0, 0, 255, 9, 9];
        let frame = CameraFrame {
            stride: 10,
            ..CameraFrame::new(2, 1, data, PixelFormat::RGBA)
        };
        assert_eq!(frame.to_luma(), vec![255, 0]);
    }

    #[test]
    fn test_luma_from_yuyv() {
        // Y0 U Y1 V
        let frame = CameraFrame::new(2, 1, vec![10u8, 128, 200, 128], PixelFormat::YUYV);
        assert_eq!(frame.to_luma(), vec![10, 200]);
    }

    #[test]
    fn test_luma_short_buffer_pads_black() {
        let frame = CameraFrame::new(2, 2, vec![7u8, 8, 9], PixelFormat::Gray8);
        assert_eq!(frame.to_luma(), vec![7, 8, 9, 0]);
    }

    #[test]
    fn test_facing_from_description() {
        assert_eq!(
            FacingMode::from_description("Rear Camera"),
            Some(FacingMode::Environment)
        );
        assert_eq!(
            FacingMode::from_description("Integrated Camera: Integrated C"),
            Some(FacingMode::User)
        );
        assert_eq!(FacingMode::from_description("USB2.0 HD UVC WebCam"), None);
    }

    struct NoFrames;

    impl FrameSource for NoFrames {
        fn latest_frame(&self) -> Option<CameraFrame> {
            None
        }
    }

    struct Track(std::sync::atomic::AtomicBool);

    impl MediaTrack for Track {
        fn label(&self) -> &str {
            "video"
        }

        fn stop(&self) {
            self.0.store(false, std::sync::atomic::Ordering::SeqCst);
        }

        fn is_live(&self) -> bool {
            self.0.load(std::sync::atomic::Ordering::SeqCst)
        }
    }

    fn stream() -> (MediaStream, Arc<Track>) {
        let device = CameraDevice {
            name: "Rear".into(),
            path: "/dev/video0".into(),
            facing: Some(FacingMode::Environment),
            device_info: None,
        };
        let track = Arc::new(Track(std::sync::atomic::AtomicBool::new(true)));
        let media_track: Arc<dyn MediaTrack> = track.clone();
        (MediaStream::new(device, Arc::new(NoFrames), vec![media_track]), track)
    }

    #[test]
    fn test_stream_stop_is_idempotent() {
        let (media, track) = stream();
        assert_eq!(media.live_track_count(), 1);
        media.stop_all_tracks();
        media.stop_all_tracks();
        assert_eq!(media.live_track_count(), 0);
        assert!(!track.is_live());
    }

    #[test]
    fn test_each_stream_has_its_own_id() {
        let (first, _) = stream();
        let (second, _) = stream();
        assert_ne!(first.id(), second.id());
    }

    #[test]
    fn test_dropping_stream_stops_tracks() {
        let (media, track) = stream();
        drop(media);
        assert!(!track.is_live());
    }
}
