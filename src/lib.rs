// SPDX-License-Identifier: MPL-2.0

//! Asset Tracker - asset assignment directory with barcode capture
//!
//! This library provides the core of the asset tracker: recording which
//! department and person an asset is assigned to, listing recent
//! assignments, and reading asset tags from a camera.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`store`]: Key-value record stores (table service, in-memory)
//! - [`directory`]: Validation and the "recent assignments" query
//! - [`server`]: HTTP API over the directory
//! - [`backends`]: Camera backend abstraction (V4L2, still images)
//! - [`capture`]: Barcode capture controller and detection strategies
//! - [`config`]: Store and server configuration
//!
//! # Example
//!
//! ```ignore
//! let store = Arc::new(MemoryRecordStore::new());
//! let directory = AssetDirectoryService::new(store);
//! let saved = directory
//!     .upsert(AssignmentInput::new("LAP-0042", "Radiology", "Jo"))
//!     .await?;
//! ```

pub mod backends;
pub mod capture;
pub mod config;
pub mod constants;
pub mod directory;
pub mod errors;
pub mod server;
pub mod store;

// Re-export commonly used types
pub use capture::{BarcodeCaptureController, CaptureState, CaptureStatus, DecodedValue};
pub use config::{ServerConfig, StoreBackend, StoreConfig};
pub use directory::{AssetDirectoryService, AssetRecord, AssignmentInput};
pub use errors::{CaptureError, DirectoryError};
pub use store::{MemoryRecordStore, RecordStore, TableRecordStore};
