// SPDX-License-Identifier: GPL-3.0-only

//! CLI commands
//!
//! This module provides command-line functionality for:
//! - Serving the HTTP API
//! - Recording and listing assignments
//! - Scanning asset tags and listing cameras

use anyhow::{Context, bail};
use asset_tracker::backends::camera::file::collect_image_paths;
use asset_tracker::backends::camera::{
    CameraBackend, FileCameraBackend, StreamConstraints, get_default_backend,
};
use asset_tracker::capture::{BarcodeCaptureController, default_strategies};
use asset_tracker::config::{ServerConfig, StoreBackend, StoreConfig};
use asset_tracker::directory::{AssetDirectoryService, AssetRecord, AssignmentInput};
use asset_tracker::store::open_store;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Store settings from the command line and environment
pub fn store_config(
    connection_string: Option<String>,
    table_name: String,
    in_memory: bool,
) -> StoreConfig {
    StoreConfig {
        backend: if in_memory {
            StoreBackend::Memory
        } else {
            StoreBackend::Table
        },
        connection_string,
        table_name,
    }
}

async fn open_directory(config: &StoreConfig) -> anyhow::Result<AssetDirectoryService> {
    let store = open_store(config).await?;
    Ok(AssetDirectoryService::new(store))
}

/// Serve the API until Ctrl+C
pub async fn serve(config: &StoreConfig, bind: &str) -> anyhow::Result<()> {
    let server = ServerConfig::from_bind(bind)?;
    let directory = open_directory(config).await?;
    if config.backend == StoreBackend::Memory {
        warn!("Serving from an in-memory store; records are lost on exit");
    }

    let shutdown = CancellationToken::new();
    let signal = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl+C");
        }
        signal.cancel();
    });

    asset_tracker::server::serve(directory, &server, shutdown)
        .await
        .context("HTTP server failed")
}

/// Record one assignment and print the saved record
pub async fn assign(
    config: &StoreConfig,
    asset_no: String,
    dept: String,
    assigned_to: String,
    assigned_at: Option<String>,
) -> anyhow::Result<()> {
    let directory = open_directory(config).await?;
    let mut input = AssignmentInput::new(asset_no, dept, assigned_to);
    input.assigned_at = assigned_at;

    let saved = directory.upsert(input).await?;
    println!("{}", serde_json::to_string_pretty(&saved)?);
    Ok(())
}

/// Print the most recent assignments, newest first
pub async fn list(config: &StoreConfig, max: Option<i64>) -> anyhow::Result<()> {
    let directory = open_directory(config).await?;
    let records = directory.list_recent(max).await?;

    if records.is_empty() {
        println!("No assignments recorded.");
        return Ok(());
    }

    println!(
        "{:<26} {:<16} {:<20} {}",
        "ASSIGNED AT", "ASSET", "DEPT", "ASSIGNED TO"
    );
    for record in &records {
        print_record(record);
    }
    Ok(())
}

fn print_record(record: &AssetRecord) {
    println!(
        "{:<26} {:<16} {:<20} {}",
        record.assigned_at, record.asset_no, record.dept, record.assigned_to
    );
}

/// Scan one asset tag, print it and optionally record an assignment
pub async fn scan(
    config: &StoreConfig,
    device: Option<String>,
    images: Vec<PathBuf>,
    timeout_secs: u64,
    assignment: Option<(String, String)>,
) -> anyhow::Result<()> {
    // Open the store first so a misconfiguration fails before the camera is touched
    let directory = match &assignment {
        Some(_) => Some(open_directory(config).await?),
        None => None,
    };

    let backend: Arc<dyn CameraBackend> = if images.is_empty() {
        get_default_backend()
    } else {
        let paths = collect_image_paths(&images).context("Failed to read image paths")?;
        if paths.is_empty() {
            bail!("No supported images found");
        }
        info!(count = paths.len(), "Scanning still images");
        Arc::new(FileCameraBackend::new(paths))
    };
    if !backend.is_available() {
        bail!("Camera backend '{}' is not available", backend.name());
    }

    let constraints = StreamConstraints {
        device_path: device,
        ..StreamConstraints::default()
    };
    let controller =
        BarcodeCaptureController::new(backend, default_strategies()).with_constraints(constraints);

    eprintln!("Scanning... (Ctrl+C to cancel)");
    let value = tokio::select! {
        result = tokio::time::timeout(Duration::from_secs(timeout_secs), controller.scan()) => {
            match result {
                Ok(value) => value?,
                Err(_) => {
                    controller.stop();
                    bail!("No barcode detected within {} seconds", timeout_secs);
                }
            }
        }
        _ = tokio::signal::ctrl_c() => {
            controller.stop();
            bail!("Scan cancelled");
        }
    };

    println!("{}", value.text);

    if let (Some(directory), Some((dept, assigned_to))) = (directory, assignment) {
        let saved = directory
            .upsert(AssignmentInput::new(value.text, dept, assigned_to))
            .await?;
        eprintln!("Saved:");
        print_record(&saved);
    }

    Ok(())
}

/// List all available cameras
pub fn list_cameras() -> anyhow::Result<()> {
    let backend = get_default_backend();
    let cameras = backend.enumerate_cameras();

    if cameras.is_empty() {
        println!("No cameras found.");
        return Ok(());
    }

    println!("Available cameras:");
    println!();
    for camera in &cameras {
        println!("  {}  {}", camera.path, camera.name);
        if let Some(facing) = camera.facing {
            println!("      Facing: {}", facing);
        }
        if let Some(info) = &camera.device_info {
            println!("      Driver: {}", info.driver);
        }
    }

    Ok(())
}
