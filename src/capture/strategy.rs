// SPDX-License-Identifier: GPL-3.0-only

//! Detection strategy interface

use crate::backends::camera::FrameSource;
use crate::errors::DetectionError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Symbologies a detector may be asked for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BarcodeFormat {
    QrCode,
    Code128,
    Ean13,
    Ean8,
    UpcA,
    UpcE,
    Code39,
}

impl BarcodeFormat {
    /// Formats requested from the native detector, in preference order
    pub const ASSET_TAG_FORMATS: [BarcodeFormat; 7] = [
        BarcodeFormat::QrCode,
        BarcodeFormat::Code128,
        BarcodeFormat::Ean13,
        BarcodeFormat::Ean8,
        BarcodeFormat::UpcA,
        BarcodeFormat::UpcE,
        BarcodeFormat::Code39,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BarcodeFormat::QrCode => "qr_code",
            BarcodeFormat::Code128 => "code_128",
            BarcodeFormat::Ean13 => "ean_13",
            BarcodeFormat::Ean8 => "ean_8",
            BarcodeFormat::UpcA => "upc_a",
            BarcodeFormat::UpcE => "upc_e",
            BarcodeFormat::Code39 => "code_39",
        }
    }
}

impl std::fmt::Display for BarcodeFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A successfully decoded barcode
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedValue {
    pub text: String,
    /// Symbology, when the decoder reports it
    pub format: Option<BarcodeFormat>,
}

impl DecodedValue {
    pub fn new(text: impl Into<String>, format: Option<BarcodeFormat>) -> Self {
        Self {
            text: text.into(),
            format,
        }
    }
}

/// Outcome of one detection attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Detection {
    Decoded(DecodedValue),
    /// Nothing readable in the current frame, or no frame yet
    NoMatch,
}

/// Which strategy variant is driving a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StrategyKind {
    Native,
    Fallback,
}

impl std::fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StrategyKind::Native => write!(f, "native detector"),
            StrategyKind::Fallback => write!(f, "software decoder"),
        }
    }
}

/// One way of turning frames into a decoded value
///
/// The controller owns scheduling: it calls `detect_once` at most once at a
/// time per frame source and waits `poll_interval` after each `NoMatch`.
#[async_trait]
pub trait DetectionStrategy: Send + Sync {
    fn kind(&self) -> StrategyKind;

    /// Capability probe, evaluated once per session before scanning
    fn is_available(&self) -> bool;

    /// Delay between attempts after a `NoMatch`
    fn poll_interval(&self) -> Duration;

    /// Attempt a single detection on the latest frame
    async fn detect_once(&self, frames: &dyn FrameSource) -> Result<Detection, DetectionError>;

    /// Drop per-session state once the session ends
    fn reset(&self) {}
}
