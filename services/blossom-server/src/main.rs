//! Blossom-compatible blob server
//!
//! Content-addressable storage over HTTP: blobs are named by the SHA-256 of
//! their content, served back by digest, and swept once they outlive the
//! retention window. TLS termination belongs to the reverse proxy in front.

use std::path::PathBuf;
use std::sync::Arc;

use actix_web::{middleware, web, App, HttpServer};
use anyhow::Context;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use blossom_server::api::{self, AppState};
use blossom_store::{ObjectStore, StorageConfig, Sweeper};

/// CLI arguments
#[derive(Parser, Debug)]
#[command(name = "blossom-server")]
#[command(about = "Content-addressable blob storage server")]
struct Args {
    /// Host to bind to
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Port to listen on
    #[arg(short, long, default_value = "3000")]
    port: u16,

    /// Storage root directory
    #[arg(short, long, default_value = "./blobs")]
    storage_dir: PathBuf,

    /// Retention window in seconds before a blob is swept
    #[arg(long, default_value_t = blossom_store::DEFAULT_RETENTION_SECS)]
    retention_secs: u64,

    /// Interval between sweep passes in seconds
    #[arg(long, default_value_t = blossom_store::DEFAULT_SWEEP_INTERVAL_SECS)]
    sweep_interval_secs: u64,

    /// Maximum accepted upload size in bytes
    #[arg(long, default_value_t = blossom_store::DEFAULT_MAX_BLOB_SIZE)]
    max_blob_size: u64,

    /// Token required on uploads; falls back to BLOSSOM_AUTH_TOKEN.
    /// Uploads are unauthenticated when neither is set.
    #[arg(long)]
    auth_token: Option<String>,

    /// Log level
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(true)
        .json()
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .expect("Failed to set tracing subscriber");

    info!("Starting blossom server");

    let config = StorageConfig {
        root: args.storage_dir,
        retention_secs: args.retention_secs,
        sweep_interval_secs: args.sweep_interval_secs,
        max_blob_size: args.max_blob_size,
    };

    let store = Arc::new(
        ObjectStore::open(config.clone()).context("failed to open object store")?,
    );

    let auth_token = args
        .auth_token
        .or_else(|| std::env::var("BLOSSOM_AUTH_TOKEN").ok());
    if auth_token.is_some() {
        info!("Upload authorization enabled");
    }

    // One sweep pass runs immediately, then one per interval.
    let sweeper_token = CancellationToken::new();
    let sweeper_handle = Sweeper::new(store.clone(), config).spawn(sweeper_token.clone());

    let app_state = web::Data::new(AppState {
        store,
        auth_token,
    });

    info!("Binding to {}:{}", args.host, args.port);

    HttpServer::new(move || {
        App::new()
            .app_data(app_state.clone())
            .wrap(middleware::Logger::default())
            .wrap(api::cors_headers())
            .configure(api::configure)
    })
    .bind((args.host.as_str(), args.port))?
    .run()
    .await?;

    sweeper_token.cancel();
    let _ = sweeper_handle.await;
    info!("Shut down");

    Ok(())
}
