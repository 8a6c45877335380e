//! vstream server: entry point.
//!
//! Serves length-prefixed MJPEG files from a media directory.  Clients open a
//! control connection, SETUP a file by name, and receive one UDP packet per
//! frame while PLAYING.
//!
//! # Usage
//!
//! ```text
//! vstream-server [OPTIONS]
//!
//! Options:
//!   --config <PATH>        TOML config file [default: vstream-server.toml]
//!   --port <PORT>          Control port (overrides the config file)
//!   --media-root <DIR>     Media directory (overrides the config file)
//!   --write-config         Save the effective settings to --config and exit
//! ```
//!
//! A missing config file is not an error; built-in defaults apply.

use std::path::{Path, PathBuf};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use vstream_server::infrastructure::media::MjpegLibrary;
use vstream_server::infrastructure::network::run_server;
use vstream_server::infrastructure::storage::config::{load_config, save_config, ServerConfig};

// ── CLI argument definitions ──────────────────────────────────────────────────

/// vstream streaming server.
#[derive(Debug, Parser)]
#[command(name = "vstream-server", about = "Streams MJPEG files over RTSP/RTP", version)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long, default_value = "vstream-server.toml", env = "VSTREAM_CONFIG")]
    config: PathBuf,

    /// TCP control port; overrides `control_port` from the file.
    #[arg(long, env = "VSTREAM_PORT")]
    port: Option<u16>,

    /// Directory media names are resolved against; overrides `media_root`.
    #[arg(long, env = "VSTREAM_MEDIA_ROOT")]
    media_root: Option<PathBuf>,

    /// Write the effective configuration to `--config` and exit.
    #[arg(long)]
    write_config: bool,
}

impl Cli {
    /// Loads the config file and applies command-line overrides.
    fn into_server_config(self) -> anyhow::Result<ServerConfig> {
        let mut config = load_config(&self.config)
            .with_context(|| format!("failed to load config from {}", self.config.display()))?;
        if let Some(port) = self.port {
            config.control_port = port;
        }
        if let Some(root) = self.media_root {
            config.media_root = root;
        }
        Ok(config)
    }
}

/// Saves `config` so later runs start from it.
fn persist_config(path: &Path, config: &ServerConfig) -> anyhow::Result<()> {
    save_config(path, config)
        .with_context(|| format!("failed to write config to {}", path.display()))?;
    info!("configuration written to {}", path.display());
    Ok(())
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config_path = cli.config.clone();
    let write_config = cli.write_config;
    let config = cli.into_server_config()?;

    // RUST_LOG wins; the config file's level is the fallback.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .init();

    if write_config {
        return persist_config(&config_path, &config);
    }

    info!(
        "vstream server starting: control port {}, media root {}",
        config.control_port,
        config.media_root.display()
    );

    let running = Arc::new(AtomicBool::new(true));
    let running_clone = Arc::clone(&running);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("received Ctrl+C, shutting down");
                running_clone.store(false, Ordering::Relaxed);
            }
            Err(e) => tracing::error!("failed to listen for Ctrl+C signal: {e}"),
        }
    });

    let library = Arc::new(MjpegLibrary::new(config.media_root.clone()));
    run_server(&config, library, running)
        .await
        .context("control server failed")?;

    info!("vstream server stopped");
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
