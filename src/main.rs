//! MJPEG streaming server CLI application

use anyhow::Result;
use clap::Parser;
use qrcam_streamer::config::Config;
use qrcam_streamer::httpd::{self, AppState};
use qrcam_streamer::{DirStore, ImageJpegEncoder, PatternSource, QrState, StreamTelemetry};
use std::path::Path;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "qrcam-streamer")]
#[command(about = "Embedded-style MJPEG camera streaming server")]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    fmt().with_env_filter(filter).with_target(false).init();

    info!("QR camera streamer starting");

    let config = if Path::new(&cli.config).exists() {
        info!(config_path = %cli.config, "Loading configuration");
        Config::load(&cli.config)?
    } else {
        info!(config_path = %cli.config, "Config file not found, using defaults");
        Config::default()
    };

    info!(
        web_port = config.server.web_port,
        stream_port = config.server.stream_port(),
        format = ?config.camera.format,
        resolution = %format!("{}x{}", config.camera.width, config.camera.height),
        fps = config.camera.fps,
        "Configuration loaded"
    );

    let state = AppState {
        camera: Arc::new(Mutex::new(PatternSource::new(&config.camera))),
        encoder: Arc::new(ImageJpegEncoder::new(config.camera.quality)),
        telemetry: Arc::new(StreamTelemetry::new(config.stream.filter_samples)),
        qr: Arc::new(QrState::new()),
        store: Arc::new(DirStore::new(config.storage.snapshot_dir.clone())),
        config: Arc::new(config),
    };

    let control_listener = TcpListener::bind(state.config.server.web_addr()).await?;
    let stream_listener = TcpListener::bind(state.config.server.stream_addr()).await?;

    let control_task = tokio::spawn(httpd::serve_control(control_listener, state.clone()));
    let stream_task = tokio::spawn(httpd::serve_stream(stream_listener, state));

    info!("Servers started, press Ctrl+C to stop");

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Shutting down");
        }
        result = control_task => {
            if let Ok(Err(e)) = result {
                error!(error = %e, "Control server failed");
            }
        }
        result = stream_task => {
            if let Ok(Err(e)) = result {
                error!(error = %e, "Stream server failed");
            }
        }
    }

    Ok(())
}
