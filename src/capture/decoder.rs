// SPDX-License-Identifier: GPL-3.0-only

//! Built-in QR code decoder
//!
//! Converts frames to luma, downscales large frames for speed and decodes the
//! first readable QR grid with rqrr.

use super::fallback::SoftwareDecoder;
use super::strategy::{BarcodeFormat, DecodedValue};
use crate::backends::camera::CameraFrame;
use crate::constants::capture;
use crate::errors::DetectionError;
use tracing::{debug, trace};

/// QR decoder backed by rqrr
pub struct QrDecoder {
    /// Maximum dimension for processing (frames are downscaled to this)
    max_dimension: u32,
}

impl Default for QrDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl QrDecoder {
    pub fn new() -> Self {
        Self {
            max_dimension: capture::DECODE_MAX_DIMENSION,
        }
    }
}

impl SoftwareDecoder for QrDecoder {
    fn name(&self) -> &'static str {
        "rqrr"
    }

    fn decode(&self, frame: &CameraFrame) -> Result<Option<DecodedValue>, DetectionError> {
        if frame.width == 0 || frame.height == 0 {
            return Ok(None);
        }
        let start = std::time::Instant::now();

        let luma = frame.to_luma();
        let (luma, width, height) =
            if frame.width > self.max_dimension || frame.height > self.max_dimension {
                let scale = (frame.width as f32 / self.max_dimension as f32)
                    .max(frame.height as f32 / self.max_dimension as f32);
                let new_width = ((frame.width as f32 / scale) as u32).max(1);
                let new_height = ((frame.height as f32 / scale) as u32).max(1);
                let scaled = downscale_luma(&luma, frame.width, frame.height, new_width, new_height);
                (scaled, new_width, new_height)
            } else {
                (luma, frame.width, frame.height)
            };

        let row = width as usize;
        let mut prepared =
            rqrr::PreparedImage::prepare_from_greyscale(width as usize, height as usize, |x, y| {
                luma[y * row + x]
            });
        let grids = prepared.detect_grids();
        trace!(
            grids = grids.len(),
            width,
            height,
            elapsed_ms = start.elapsed().as_millis(),
            "QR grid search complete"
        );

        for grid in grids {
            match grid.decode() {
                Ok((_meta, content)) if !content.is_empty() => {
                    return Ok(Some(DecodedValue::new(content, Some(BarcodeFormat::QrCode))));
                }
                Ok(_) => {}
                Err(e) => debug!(error = ?e, "QR grid found but could not be decoded"),
            }
        }

        Ok(None)
    }
}

/// Downscale a packed luma plane using bilinear interpolation
fn downscale_luma(src: &[u8], src_width: u32, src_height: u32, dst_width: u32, dst_height: u32) -> Vec<u8> {
    let src_width = src_width as usize;
    let src_height = src_height as usize;

    let mut result = Vec::with_capacity((dst_width * dst_height) as usize);

    let x_ratio = src_width as f32 / dst_width as f32;
    let y_ratio = src_height as f32 / dst_height as f32;

    let pixel = |px: usize, py: usize| -> f32 { src.get(py * src_width + px).copied().unwrap_or(0) as f32 };

    for y in 0..dst_height {
        for x in 0..dst_width {
            let src_x = x as f32 * x_ratio;
            let src_y = y as f32 * y_ratio;

            let x0 = src_x as usize;
            let y0 = src_y as usize;
            let x1 = (x0 + 1).min(src_width - 1);
            let y1 = (y0 + 1).min(src_height - 1);

            let x_frac = src_x - x0 as f32;
            let y_frac = src_y - y0 as f32;

            let value = pixel(x0, y0) * (1.0 - x_frac) * (1.0 - y_frac)
                + pixel(x1, y0) * x_frac * (1.0 - y_frac)
                + pixel(x0, y1) * (1.0 - x_frac) * y_frac
                + pixel(x1, y1) * x_frac * y_frac;

            result.push(value as u8);
        }
    }

    result
}
