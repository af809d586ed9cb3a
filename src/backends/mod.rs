// SPDX-License-Identifier: MPL-2.0

//! Backend abstraction layer for camera capture
//!
//! - [`camera`]: Camera backends with device enumeration and frame capture

pub mod camera;
