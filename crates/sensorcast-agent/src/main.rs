//! # sensorcast-agent
//!
//! Server binary: loads settings, installs logging and the metrics
//! recorder, then runs the telemetry broadcast server until Ctrl-C.

#![deny(unsafe_code)]

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use sensorcast_logging::LogFormat;
use sensorcast_server::{SensorcastServer, ServerConfig};
use sensorcast_settings::SensorcastSettings;

/// Telemetry ingest and SSE broadcast server.
#[derive(Parser, Debug)]
#[command(name = "sensorcast", about = "Telemetry ingest and SSE broadcast server")]
struct Cli {
    /// Settings file (defaults to `~/.sensorcast/settings.json`).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Host to bind (overrides settings).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind (overrides settings and `PORT`).
    #[arg(long)]
    port: Option<u16>,

    /// Emit newline-delimited JSON logs.
    #[arg(long)]
    log_json: bool,
}

impl Cli {
    /// Layer command-line flags over loaded settings.
    fn apply(&self, settings: &mut SensorcastSettings) {
        if let Some(ref host) = self.host {
            settings.server.host.clone_from(host);
        }
        if let Some(port) = self.port {
            settings.server.port = port;
        }
        if self.log_json {
            settings.logging.json = true;
        }
    }

    fn settings_path(&self) -> PathBuf {
        self.config
            .clone()
            .unwrap_or_else(sensorcast_settings::settings_path)
    }
}

fn load(args: &Cli, env: impl Fn(&str) -> Option<String>) -> Result<SensorcastSettings> {
    let path = args.settings_path();
    let mut settings = sensorcast_settings::load_settings_with(&path, env)
        .with_context(|| format!("Failed to load settings from {}", path.display()))?;
    args.apply(&mut settings);
    Ok(settings)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();
    let settings = load(&args, |name| std::env::var(name).ok())?;

    sensorcast_logging::init_subscriber(
        &settings.logging.level,
        LogFormat::from_json_flag(settings.logging.json),
    )
    .context("Failed to initialize logging")?;
    let metrics = sensorcast_server::metrics::install_recorder()
        .context("Failed to install metrics recorder")?;

    let config = ServerConfig::from_settings(&settings);
    let handle = SensorcastServer::new(config, metrics)
        .start()
        .await
        .context("Failed to bind server")?;
    tracing::info!("sensorcast listening on http://{}", handle.local_addr());

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl-c")?;

    tracing::info!("Shutting down...");
    handle.shutdown().await;
    tracing::info!("Shutdown complete");
    Ok(())
}
