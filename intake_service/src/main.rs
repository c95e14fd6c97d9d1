// Copyright 2023-, Semiotic AI, Inc.
// SPDX-License-Identifier: Apache-2.0

#![doc = include_str!("../README.md")]

use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use intake_core::{
    gateway::{GatewayConfig, HttpGateway, Url},
    manager::{context::memory::InMemoryContext, Manager},
    upload::{UploadLimits, DEFAULT_MAX_UPLOAD_BYTES},
};
use intake_service::{metrics, reaper, rest, server, state::AppState};
use log::{debug, info};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Port to listen on for REST and JSON-RPC requests.
    /// Defaults to 8080.
    #[arg(long, default_value_t = 8080, env = "INTAKE_PORT")]
    port: u16,

    /// Default extraction webhook. Uploads may override it with their own
    /// `webhook_url` field.
    #[arg(long, env = "INTAKE_WEBHOOK_URL")]
    webhook_url: Option<Url>,

    /// Base URL the extraction service uses to reach this server. The
    /// callback path is appended below any path it already has.
    #[arg(long, default_value = "http://localhost:8080", env = "INTAKE_PUBLIC_URL")]
    public_url: Url,

    /// Timeout for the extraction webhook request, in seconds.
    /// Defaults to 60.
    #[arg(long, default_value_t = 60, env = "INTAKE_DISPATCH_TIMEOUT_SECS")]
    dispatch_timeout_secs: u64,

    /// Maximum image size in bytes.
    /// Defaults to 10MiB.
    #[arg(long, default_value_t = DEFAULT_MAX_UPLOAD_BYTES, env = "INTAKE_MAX_UPLOAD_BYTES")]
    max_upload_bytes: usize,

    /// Maximum number of concurrent connections.
    /// Defaults to 32.
    #[arg(long, default_value_t = 32, env = "INTAKE_MAX_CONNECTIONS")]
    max_connections: u32,

    /// Metrics server port.
    /// Defaults to 5000.
    #[arg(long, default_value_t = 5000, env = "INTAKE_METRICS_PORT")]
    metrics_port: u16,

    /// Fail receipts still waiting for their extraction result after this many
    /// seconds. Disabled when unset.
    #[arg(long, env = "INTAKE_PROCESSING_TIMEOUT_SECS")]
    processing_timeout_secs: Option<u64>,

    /// How often to look for stale receipts, in seconds.
    /// Defaults to 60.
    #[arg(long, default_value_t = 60, env = "INTAKE_SWEEP_INTERVAL_SECS")]
    sweep_interval_secs: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize the logger.
    // Set the log level by setting the RUST_LOG environment variable.
    // tracing_subscriber also picks up the jsonrpsee log spans.
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    debug!("Settings: {:?}", args);

    // Start the metrics server.
    // We just let it gracelessly get killed at the end of main()
    tokio::spawn(metrics::run_server(args.metrics_port));

    if args.webhook_url.is_none() {
        info!("No default webhook configured, uploads must provide webhook_url");
    }
    let gateway = HttpGateway::new(GatewayConfig {
        default_target: args.webhook_url.clone(),
        timeout: Duration::from_secs(args.dispatch_timeout_secs),
    })?;
    let callback_url = rest::callback_url(&args.public_url)?;
    info!("Extraction results are expected at {callback_url}");

    let manager = Manager::new(InMemoryContext::default(), gateway, callback_url);
    let state = AppState::new(
        manager,
        UploadLimits {
            max_bytes: args.max_upload_bytes,
        },
    );

    if let Some(timeout_secs) = args.processing_timeout_secs {
        let max_age = i64::try_from(timeout_secs)
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .context("processing timeout is out of range")?;
        reaper::spawn_reaper(
            state.manager.clone(),
            max_age,
            Duration::from_secs(args.sweep_interval_secs.max(1)),
        );
        info!("Receipts left processing for {timeout_secs}s will be failed");
    }

    // Start the server.
    // This await is non-blocking
    let (handle, _) = server::run_server(args.port, state, args.max_connections).await?;
    info!("Server started. Listening on port {}.", args.port);

    let _ = handle.await;

    // If we're here, we've received a signal to exit.
    info!("Shutting down...");
    Ok(())
}
