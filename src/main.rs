//! esxcloud-cpi
//!
//! Reads one JSON request from stdin, performs it against esxcloud and writes
//! one JSON response to stdout. Configuration is a JSON file named with
//! `--config-path` or `ESXCLOUD_CPI_CONFIG`.

use std::path::PathBuf;

use anyhow::{Context as _, Result};
use clap::Parser;
use tokio::io::AsyncReadExt;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use esxcloud_cpi::actions::Registry;
use esxcloud_cpi::config::Config;
use esxcloud_cpi::context::Context;
use esxcloud_cpi::dispatch::dispatch;
use esxcloud_cpi::protocol::{write_response, Request};

#[derive(Parser, Debug)]
#[command(name = "esxcloud-cpi")]
#[command(about = "Cloud provider interface for esxcloud")]
struct Args {
    /// Path to the JSON configuration file
    #[arg(long, env = "ESXCLOUD_CPI_CONFIG")]
    config_path: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();

    // stderr only: stdout carries the single response document
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut input = Vec::new();
    tokio::io::stdin()
        .read_to_end(&mut input)
        .await
        .context("Failed to read request from stdin")?;

    let request = Request::from_slice(&input).inspect_err(|e| error!(error = %e, "Bad request"))?;

    let config = Config::load(&args.config_path).context("Failed to load configuration")?;
    info!(
        esxcloud = %config.esxcloud.target,
        project = %config.esxcloud.project_id,
        "Loaded configuration"
    );

    let ctx = Context::from_config(config)?;
    let registry = Registry::default();

    let response = dispatch(&ctx, &registry, &request.method, &request.arguments).await;

    write_response(&mut tokio::io::stdout(), &response)
        .await
        .context("Failed to write response")?;

    Ok(())
}
