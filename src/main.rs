// SPDX-License-Identifier: GPL-3.0-only

use asset_tracker::constants::{server, table};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

mod cli;

#[derive(Parser)]
#[command(name = "asset-tracker")]
#[command(about = "Asset assignment directory with barcode capture")]
#[command(version = env!("GIT_VERSION"))]
struct Cli {
    #[command(flatten)]
    store: StoreArgs,

    #[command(subcommand)]
    command: Commands,
}

/// Record store selection, shared by every subcommand
#[derive(Args)]
struct StoreArgs {
    /// Storage connection string
    #[arg(long, env = table::CONNECTION_ENV, hide_env_values = true, global = true)]
    connection_string: Option<String>,

    /// Table holding the asset records
    #[arg(long, env = table::TABLE_NAME_ENV, default_value = table::DEFAULT_TABLE_NAME, global = true)]
    table: String,

    /// Keep records in memory instead of the table service
    #[arg(long, global = true)]
    in_memory: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the HTTP API
    Serve {
        /// Address to listen on
        #[arg(long, env = server::BIND_ENV, default_value = server::DEFAULT_BIND)]
        bind: String,
    },

    /// Record an assignment
    Assign {
        /// Asset number (row key)
        asset_no: String,

        /// Department the asset is assigned to
        #[arg(long)]
        dept: String,

        /// Person the asset is assigned to
        #[arg(long)]
        to: String,

        /// Assignment time (ISO-8601), stored as given; defaults to now
        #[arg(long)]
        at: Option<String>,
    },

    /// List the most recent assignments
    List {
        /// Number of records to show (1-100)
        #[arg(short, long)]
        max: Option<i64>,
    },

    /// Scan an asset tag with a camera
    Scan {
        /// Camera device path (default: rear-facing camera if known)
        #[arg(short, long, conflicts_with = "image")]
        device: Option<String>,

        /// Decode from still images or directories instead of a camera
        #[arg(short, long, num_args = 1..)]
        image: Vec<PathBuf>,

        /// Give up after this many seconds
        #[arg(short, long, default_value = "30")]
        timeout: u64,

        /// Save the scanned asset to this department
        #[arg(long, requires = "to")]
        dept: Option<String>,

        /// Save the scanned asset to this person
        #[arg(long, requires = "dept")]
        to: Option<String>,
    },

    /// List available cameras
    Cameras,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    // Set RUST_LOG environment variable to control log level
    // Examples: RUST_LOG=debug, RUST_LOG=asset_tracker=debug, RUST_LOG=info
    let default_level = match cli.command {
        Commands::Serve { .. } => "info",
        _ => "warn",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_target(true)
        .with_level(true)
        .init();

    let store = cli::store_config(
        cli.store.connection_string,
        cli.store.table,
        cli.store.in_memory,
    );

    match cli.command {
        Commands::Serve { bind } => cli::serve(&store, &bind).await,
        Commands::Assign {
            asset_no,
            dept,
            to,
            at,
        } => cli::assign(&store, asset_no, dept, to, at).await,
        Commands::List { max } => cli::list(&store, max).await,
        Commands::Scan {
            device,
            image,
            timeout,
            dept,
            to,
        } => cli::scan(&store, device, image, timeout, dept.zip(to)).await,
        Commands::Cameras => cli::list_cameras(),
    }
}
