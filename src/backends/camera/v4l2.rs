// SPDX-License-Identifier: GPL-3.0-only

//! Direct V4L2 camera capture
//!
//! Opens a `/dev/video*` node with the v4l crate, negotiates YUYV (or takes
//! MJPEG/GREY if that is what the driver offers) and captures on a dedicated
//! loop thread into a latest-frame slot. Stopping the track closes the device.

use super::frame_loop::{CaptureLoopController, FrameSlot, LoopAction, LoopTrack};
use super::types::*;
use super::v4l2_utils::{DeviceScan, camera_error_from_io, video_device_paths};
use super::{CameraBackend, select_device};
use crate::constants::capture;
use crate::errors::CameraError;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::{debug, info, trace, warn};
use v4l::buffer::Type;
use v4l::io::traits::CaptureStream;
use v4l::prelude::*;
use v4l::video::Capture;
use v4l::FourCC;

/// Layout of the buffers the driver delivers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WireFormat {
    Yuyv,
    Mjpeg,
    Grey,
}

impl WireFormat {
    fn from_fourcc(fourcc: FourCC) -> Option<Self> {
        match &fourcc.repr {
            b"YUYV" => Some(Self::Yuyv),
            b"MJPG" => Some(Self::Mjpeg),
            b"GREY" => Some(Self::Grey),
            _ => None,
        }
    }
}

/// Negotiated frame geometry
#[derive(Debug, Clone, Copy)]
struct FrameLayout {
    wire: WireFormat,
    width: u32,
    height: u32,
    stride: u32,
}

/// Per-thread capture state
struct V4l2Capture {
    stream: MmapStream<'static>,
    layout: FrameLayout,
}

impl V4l2Capture {
    fn open(path: &str, constraints: &StreamConstraints) -> BackendResult<Self> {
        info!(device_path = path, "Opening V4L2 device");

        let mut dev = Device::with_path(path).map_err(|e| camera_error_from_io(path, &e))?;

        let mut format = dev.format().map_err(|e| camera_error_from_io(path, &e))?;
        format.width = constraints.width;
        format.height = constraints.height;
        format.fourcc = FourCC::new(b"YUYV");

        let format = match dev.set_format(&format) {
            Ok(f) => f,
            Err(e) => {
                warn!(error = %e, "Could not set format, using current device format");
                dev.format().map_err(|e| camera_error_from_io(path, &e))?
            }
        };

        let wire = WireFormat::from_fourcc(format.fourcc).ok_or_else(|| {
            CameraError::InitializationFailed(format!(
                "{}: unsupported pixel format {}",
                path, format.fourcc
            ))
        })?;
        info!(
            width = format.width,
            height = format.height,
            fourcc = %format.fourcc,
            "Negotiated V4L2 format"
        );

        let stream = MmapStream::with_buffers(&mut dev, Type::VideoCapture, capture::V4L2_BUFFER_COUNT)
            .map_err(|e| camera_error_from_io(path, &e))?;

        Ok(Self {
            stream,
            layout: FrameLayout {
                wire,
                width: format.width,
                height: format.height,
                stride: format.stride,
            },
        })
    }
}

impl FrameLayout {
    fn convert(&self, buf: &[u8]) -> Option<CameraFrame> {
        match self.wire {
            WireFormat::Yuyv | WireFormat::Grey => {
                let bpp = if self.wire == WireFormat::Yuyv { 2 } else { 1 };
                let format = if self.wire == WireFormat::Yuyv {
                    PixelFormat::YUYV
                } else {
                    PixelFormat::Gray8
                };
                Some(CameraFrame {
                    stride: self.stride.max(self.width * bpp),
                    ..CameraFrame::new(self.width, self.height, Arc::<[u8]>::from(buf), format)
                })
            }
            WireFormat::Mjpeg => {
                let img = image::load_from_memory_with_format(buf, image::ImageFormat::Jpeg)
                    .map_err(|e| trace!(error = %e, "Dropping undecodable MJPEG frame"))
                    .ok()?;
                let luma = img.to_luma8();
                let (width, height) = luma.dimensions();
                Some(CameraFrame::new(width, height, luma.into_raw(), PixelFormat::Gray8))
            }
        }
    }
}

/// Camera backend using V4L2 capture devices
#[derive(Debug, Default, Clone)]
pub struct V4l2CameraBackend;

impl V4l2CameraBackend {
    pub fn new() -> Self {
        Self
    }
}

fn camera_devices(infos: Vec<DeviceInfo>) -> Vec<CameraDevice> {
    infos
        .into_iter()
        .map(|info| CameraDevice {
            name: info.card.clone(),
            path: info.path.clone(),
            facing: FacingMode::from_description(&info.card),
            device_info: Some(info),
        })
        .collect()
}

impl CameraBackend for V4l2CameraBackend {
    fn enumerate_cameras(&self) -> Vec<CameraDevice> {
        camera_devices(DeviceScan::collect(&video_device_paths()).devices)
    }

    fn acquire(&self, constraints: &StreamConstraints) -> BackendResult<MediaStream> {
        let mut scan = DeviceScan::collect(&video_device_paths());
        let devices = camera_devices(std::mem::take(&mut scan.devices));
        let device = match &constraints.device_path {
            // An explicit path is tried even if enumeration missed it
            Some(path) => devices
                .iter()
                .find(|d| &d.path == path)
                .cloned()
                .unwrap_or_else(|| CameraDevice {
                    name: path.clone(),
                    path: path.clone(),
                    facing: None,
                    device_info: None,
                }),
            None => select_device(&devices, constraints).ok_or_else(|| scan.unavailable_error())?,
        };

        info!(
            device = %device.name,
            path = %device.path,
            facing = ?device.facing,
            "Acquiring V4L2 camera"
        );

        let slot: FrameSlot = Arc::new(Mutex::new(None));
        let writer = Arc::clone(&slot);
        let path = device.path.clone();
        let init_constraints = constraints.clone();
        static FRAME_COUNTER: AtomicU64 = AtomicU64::new(0);

        let controller = CaptureLoopController::start_with_init(
            "v4l2-capture",
            move || V4l2Capture::open(&path, &init_constraints),
            move |state: &mut V4l2Capture| {
                let started = Instant::now();
                let frame = match state.stream.next() {
                    Ok((buf, _meta)) => state.layout.convert(buf),
                    Err(e) => {
                        if e.raw_os_error() == Some(libc::ENODEV) {
                            warn!(error = %e, "V4L2 device disappeared");
                            return LoopAction::Stop;
                        }
                        warn!(error = %e, "Failed to capture frame");
                        std::thread::sleep(Duration::from_millis(10));
                        None
                    }
                };

                if let Some(mut frame) = frame {
                    frame.captured_at = started;
                    let frame_num = FRAME_COUNTER.fetch_add(1, Ordering::Relaxed);
                    if frame_num % 60 == 0 {
                        debug!(
                            frame = frame_num,
                            width = frame.width,
                            height = frame.height,
                            "V4L2 frame captured"
                        );
                    }
                    *writer.lock().unwrap_or_else(|e| e.into_inner()) = Some(frame);
                }
                LoopAction::Continue
            },
        )?;

        let track = Arc::new(LoopTrack::new(device.name.clone(), slot, controller));
        let media_track: Arc<dyn MediaTrack> = track.clone();
        Ok(MediaStream::new(device, track, vec![media_track]))
    }

    fn name(&self) -> &'static str {
        "v4l2"
    }

    fn is_available(&self) -> bool {
        !video_device_paths().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_format_from_fourcc() {
        assert_eq!(
            WireFormat::from_fourcc(FourCC::new(b"YUYV")),
            Some(WireFormat::Yuyv)
        );
        assert_eq!(
            WireFormat::from_fourcc(FourCC::new(b"MJPG")),
            Some(WireFormat::Mjpeg)
        );
        assert_eq!(WireFormat::from_fourcc(FourCC::new(b"NV12")), None);
    }

    #[test]
    fn test_missing_explicit_device_fails_to_acquire() {
        let backend = V4l2CameraBackend::new();
        let constraints = StreamConstraints {
            device_path: Some("/dev/video-does-not-exist".into()),
            ..StreamConstraints::default()
        };
        assert_eq!(
            backend.acquire(&constraints).unwrap_err(),
            CameraError::NoCameraFound
        );
    }
}
