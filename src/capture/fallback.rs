// SPDX-License-Identifier: GPL-3.0-only

//! Software decoding fallback
//!
//! Runs a CPU decoder on the latest frame from the blocking pool, at a slower
//! cadence than the native detector.

use super::strategy::{DecodedValue, Detection, DetectionStrategy, StrategyKind};
use crate::backends::camera::{CameraFrame, FrameSource};
use crate::constants::capture;
use crate::errors::DetectionError;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace};

/// CPU barcode decoder
pub trait SoftwareDecoder: Send + Sync {
    fn name(&self) -> &'static str;

    /// Decode one frame; `Ok(None)` when nothing readable is found
    fn decode(&self, frame: &CameraFrame) -> Result<Option<DecodedValue>, DetectionError>;
}

/// Detection strategy wrapping a [`SoftwareDecoder`]
pub struct FallbackDecoder {
    decoder: Option<Arc<dyn SoftwareDecoder>>,
    interval: Duration,
}

impl Default for FallbackDecoder {
    /// Fallback using the built-in decoder when it is compiled in
    fn default() -> Self {
        #[cfg(feature = "software-decoder")]
        let decoder: Option<Arc<dyn SoftwareDecoder>> =
            Some(Arc::new(super::decoder::QrDecoder::new()));
        #[cfg(not(feature = "software-decoder"))]
        let decoder: Option<Arc<dyn SoftwareDecoder>> = None;

        Self::new(decoder)
    }
}

impl FallbackDecoder {
    pub fn new(decoder: Option<Arc<dyn SoftwareDecoder>>) -> Self {
        Self {
            decoder,
            interval: capture::FALLBACK_POLL_INTERVAL,
        }
    }

    /// A fallback whose decoder library is not loaded
    pub fn unloaded() -> Self {
        Self::new(None)
    }
}

#[async_trait]
impl DetectionStrategy for FallbackDecoder {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Fallback
    }

    fn is_available(&self) -> bool {
        self.decoder.is_some()
    }

    fn poll_interval(&self) -> Duration {
        self.interval
    }

    async fn detect_once(&self, frames: &dyn FrameSource) -> Result<Detection, DetectionError> {
        let Some(decoder) = self.decoder.clone() else {
            return Err(DetectionError("software decoder not loaded".to_string()));
        };
        let Some(frame) = frames.latest_frame() else {
            trace!("No frame yet");
            return Ok(Detection::NoMatch);
        };

        // Run decoding in a blocking task to avoid blocking the async runtime
        let decoded = tokio::task::spawn_blocking(move || decoder.decode(&frame))
            .await
            .map_err(|e| DetectionError(format!("decode task failed: {}", e)))??;

        Ok(match decoded {
            Some(value) => {
                debug!(format = ?value.format, "Software decoder decoded a barcode");
                Detection::Decoded(value)
            }
            None => Detection::NoMatch,
        })
    }

    fn reset(&self) {
        if let Some(decoder) = &self.decoder {
            debug!(decoder = decoder.name(), "Resetting software decoder");
        }
    }
}
