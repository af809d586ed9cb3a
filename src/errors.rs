// SPDX-License-Identifier: GPL-3.0-only

//! Error types for the asset tracker
//!
//! Leaf errors map one-to-one onto the user-facing taxonomy:
//! validation, infrastructure, camera and unsupported-platform failures.
//! [`DirectoryError`] and [`CaptureError`] group them per subsystem.

use thiserror::Error;

/// Client-correctable input problems
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// One or more required fields were empty after trimming
    #[error("{}", missing_message(.0))]
    MissingFields(Vec<&'static str>),
    /// A field was present but unusable
    #[error("{field} {reason}")]
    InvalidField {
        field: &'static str,
        reason: String,
    },
    /// The request body could not be parsed
    #[error("invalid request body: {0}")]
    MalformedBody(String),
}

fn missing_message(fields: &[&'static str]) -> String {
    format!("{} required", fields.join(", "))
}

/// Store unreachable or misconfigured
///
/// The message is passed through verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct InfrastructureError {
    pub message: String,
}

impl InfrastructureError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<reqwest::Error> for InfrastructureError {
    fn from(err: reqwest::Error) -> Self {
        InfrastructureError::new(err.to_string())
    }
}

/// Errors of the asset directory service
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DirectoryError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Infrastructure(#[from] InfrastructureError),
}

impl DirectoryError {
    /// HTTP status code used when this error is returned by the API
    pub fn status_code(&self) -> u16 {
        match self {
            DirectoryError::Validation(_) => 400,
            DirectoryError::Infrastructure(_) => 500,
        }
    }
}

/// Camera acquisition and streaming errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CameraError {
    /// The user or the system refused access to the camera
    #[error("Camera permission denied")]
    PermissionDenied,
    /// No camera devices found
    #[error("No camera devices found")]
    NoCameraFound,
    /// Camera is busy or in use
    #[error("Camera is busy")]
    Busy,
    /// Camera initialization failed
    #[error("Camera initialization failed: {0}")]
    InitializationFailed(String),
    /// Detection against the live stream failed and no fallback remained
    #[error("Camera scan failed: {0}")]
    ScanFailed(String),
}

/// No usable detection strategy on this platform
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Barcode scanning unsupported: {reason}")]
pub struct UnsupportedError {
    pub reason: String,
}

impl UnsupportedError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// A single detection attempt failed
///
/// Not user-facing on its own: the controller either hands off to the next
/// strategy or reports [`CameraError::ScanFailed`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct DetectionError(pub String);

/// Errors reported by the barcode capture controller
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CaptureError {
    #[error(transparent)]
    Camera(#[from] CameraError),
    #[error(transparent)]
    Unsupported(#[from] UnsupportedError),
    /// The session was stopped before scanning began
    #[error("Capture session cancelled")]
    Cancelled,
}
