// SPDX-License-Identifier: GPL-3.0-only

//! Platform multi-format barcode detector

use super::strategy::{BarcodeFormat, DecodedValue, Detection, DetectionStrategy, StrategyKind};
use crate::backends::camera::{CameraFrame, FrameSource};
use crate::constants::capture;
use crate::errors::DetectionError;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace};

/// A detector provided by the host platform
///
/// Hosts that ship a hardware or OS barcode service register one of these.
/// Linux desktops have none, so the native strategy is unavailable there.
#[async_trait]
pub trait PlatformBarcodeDetector: Send + Sync {
    fn supported_formats(&self) -> Vec<BarcodeFormat>;

    /// Detect barcodes of the given formats; an empty result means no match
    async fn detect(
        &self,
        frame: &CameraFrame,
        formats: &[BarcodeFormat],
    ) -> Result<Vec<DecodedValue>, DetectionError>;
}

/// Detection strategy wrapping a [`PlatformBarcodeDetector`]
pub struct NativeDetector {
    platform: Option<Arc<dyn PlatformBarcodeDetector>>,
    formats: Vec<BarcodeFormat>,
}

impl NativeDetector {
    /// Native detector for the asset tag formats, if the host provides one
    pub fn new(platform: Option<Arc<dyn PlatformBarcodeDetector>>) -> Self {
        Self {
            platform,
            formats: BarcodeFormat::ASSET_TAG_FORMATS.to_vec(),
        }
    }

    /// A native detector on a host without barcode support
    pub fn unavailable() -> Self {
        Self::new(None)
    }

    /// Requested formats the platform can actually detect
    fn effective_formats(&self) -> Vec<BarcodeFormat> {
        let Some(platform) = &self.platform else {
            return Vec::new();
        };
        let supported = platform.supported_formats();
        self.formats
            .iter()
            .copied()
            .filter(|f| supported.contains(f))
            .collect()
    }
}

#[async_trait]
impl DetectionStrategy for NativeDetector {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Native
    }

    fn is_available(&self) -> bool {
        !self.effective_formats().is_empty()
    }

    fn poll_interval(&self) -> Duration {
        capture::NATIVE_POLL_INTERVAL
    }

    async fn detect_once(&self, frames: &dyn FrameSource) -> Result<Detection, DetectionError> {
        let Some(platform) = &self.platform else {
            return Err(DetectionError("no platform barcode detector".to_string()));
        };
        let Some(frame) = frames.latest_frame() else {
            trace!("No frame yet");
            return Ok(Detection::NoMatch);
        };

        let formats = self.effective_formats();
        let found = platform.detect(&frame, &formats).await?;
        match found.into_iter().find(|v| !v.text.is_empty()) {
            Some(value) => {
                debug!(format = ?value.format, "Native detector decoded a barcode");
                Ok(Detection::Decoded(value))
            }
            None => Ok(Detection::NoMatch),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::camera::PixelFormat;

    struct OnlyQr;

    #[async_trait]
    impl PlatformBarcodeDetector for OnlyQr {
        fn supported_formats(&self) -> Vec<BarcodeFormat> {
            vec![BarcodeFormat::QrCode]
        }

        async fn detect(
            &self,
            _frame: &CameraFrame,
            formats: &[BarcodeFormat],
        ) -> Result<Vec<DecodedValue>, DetectionError> {
            assert_eq!(formats, &[BarcodeFormat::QrCode]);
            Ok(vec![DecodedValue::new("LAP-7", Some(BarcodeFormat::QrCode))])
        }
    }

    struct NoFormats;

    #[async_trait]
    impl PlatformBarcodeDetector for NoFormats {
        fn supported_formats(&self) -> Vec<BarcodeFormat> {
            Vec::new()
        }

        async fn detect(
            &self,
            _frame: &CameraFrame,
            _formats: &[BarcodeFormat],
        ) -> Result<Vec<DecodedValue>, DetectionError> {
            Ok(Vec::new())
        }
    }

    struct StaticFrame(Option<CameraFrame>);

    impl FrameSource for StaticFrame {
        fn latest_frame(&self) -> Option<CameraFrame> {
            self.0.clone()
        }
    }

    #[test]
    fn test_availability() {
        assert!(!NativeDetector::unavailable().is_available());
        assert!(!NativeDetector::new(Some(Arc::new(NoFormats))).is_available());
        assert!(NativeDetector::new(Some(Arc::new(OnlyQr))).is_available());
    }

    #[tokio::test]
    async fn test_detect_once_requests_supported_formats() {
        let detector = NativeDetector::new(Some(Arc::new(OnlyQr)));
        let frames = StaticFrame(Some(CameraFrame::new(1, 1, vec![0u8], PixelFormat::Gray8)));
        assert_eq!(
            detector.detect_once(&frames).await.unwrap(),
            Detection::Decoded(DecodedValue::new("LAP-7", Some(BarcodeFormat::QrCode)))
        );
    }

    #[tokio::test]
    async fn test_no_frame_is_no_match() {
        let detector = NativeDetector::new(Some(Arc::new(OnlyQr)));
        assert_eq!(
            detector.detect_once(&StaticFrame(None)).await.unwrap(),
            Detection::NoMatch
        );
    }
}
