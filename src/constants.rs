// SPDX-License-Identifier: GPL-3.0-only

//! Application-wide constants

use std::time::Duration;

/// Asset directory constants
pub mod directory {
    /// The single logical partition every asset record lives in
    pub const PARTITION_KEY: &str = "assets";

    /// Default number of records returned by a recent listing
    pub const DEFAULT_RECENT: i64 = 20;

    /// Upper bound for a recent listing
    pub const MAX_RECENT: i64 = 100;

    /// Entities read from the store before sorting, independent of `max`
    pub const SCAN_CAP: usize = 200;

    /// Characters the table service refuses in a row key
    pub const FORBIDDEN_KEY_CHARS: &[char] = &['/', '\\', '#', '?'];
}

/// Record field names as they appear on the wire and in the table
pub mod fields {
    pub const ASSET_NO: &str = "assetNo";
    pub const DEPT: &str = "dept";
    pub const ASSIGNED_TO: &str = "assignedTo";
    pub const ASSIGNED_AT: &str = "assignedAt";
    pub const UPDATED_AT: &str = "updatedAt";
}

/// Table storage protocol constants
pub mod table {
    /// Environment variable holding the storage connection string
    pub const CONNECTION_ENV: &str = "AzureWebJobsStorage";

    /// Environment variable holding the table name
    pub const TABLE_NAME_ENV: &str = "STORAGE_TABLE_NAME";

    /// Table used when none is configured
    pub const DEFAULT_TABLE_NAME: &str = "Assets";

    pub const DEFAULT_PROTOCOL: &str = "https";

    pub const DEFAULT_ENDPOINT_SUFFIX: &str = "core.windows.net";

    /// REST API version sent with every request
    pub const API_VERSION: &str = "2019-02-02";

    pub const DATA_SERVICE_VERSION: &str = "3.0;NetFx";

    /// Accept header asking for bare JSON entities
    pub const ACCEPT_NO_METADATA: &str = "application/json;odata=nometadata";

    pub const CONTINUATION_PARTITION_HEADER: &str = "x-ms-continuation-NextPartitionKey";

    pub const CONTINUATION_ROW_HEADER: &str = "x-ms-continuation-NextRowKey";

    /// Local storage emulator account (public, well-known credentials)
    pub const DEV_ACCOUNT_NAME: &str = "devstoreaccount1";
    pub const DEV_ACCOUNT_KEY: &str =
        "Eby8vdM02xNOcqFlqUwJPLlmEtlCDXJ1OUzFT50uSRZ6IFsuFq2UVErCz4I6tq/K1SZFPTOtr/KBHBeksoGMGw==";
    pub const DEV_TABLE_ENDPOINT: &str = "http://127.0.0.1:10002/devstoreaccount1";
}

/// HTTP server constants
pub mod server {
    /// Environment variable overriding the bind address
    pub const BIND_ENV: &str = "ASSET_TRACKER_BIND";

    pub const DEFAULT_BIND: &str = "0.0.0.0:7071";

    pub const CORS_ALLOW_ORIGIN: &str = "*";
    pub const CORS_ALLOW_METHODS: &str = "GET,POST,OPTIONS";
    pub const CORS_ALLOW_HEADERS: &str = "Content-Type";
}

/// Barcode capture timing
pub mod capture {
    use super::Duration;

    /// Poll cadence of the native detector (one display refresh at 60 Hz)
    pub const NATIVE_POLL_INTERVAL: Duration = Duration::from_millis(16);

    /// Pause between software decode attempts
    pub const FALLBACK_POLL_INTERVAL: Duration = Duration::from_millis(500);

    /// Frames are downscaled to this size before software decoding
    pub const DECODE_MAX_DIMENSION: u32 = 640;

    /// Buffers queued by the V4L2 capture stream
    pub const V4L2_BUFFER_COUNT: u32 = 4;

    /// Preferred capture size for barcode scanning
    pub const PREFERRED_WIDTH: u32 = 1280;
    pub const PREFERRED_HEIGHT: u32 = 720;

    /// Frame period of the still-image camera (~30fps)
    pub const FILE_FRAME_INTERVAL: Duration = Duration::from_millis(33);
}

/// Supported file formats for the still-image camera
pub mod file_formats {
    /// Supported image file extensions
    pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "bmp", "webp"];

    /// Check if a file extension is a supported image format
    pub fn is_image_extension(ext: &str) -> bool {
        IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str())
    }
}
