//! vstream client: entry point.
//!
//! Opens a session for one media name, plays it for a while (or until
//! Ctrl+C), then tears down from PLAYING and logs receive statistics.
//!
//! # Usage
//!
//! ```text
//! vstream-client [OPTIONS] <MEDIA>
//!
//! Options:
//!   --server-host <HOST>     Server host [default: 127.0.0.1]
//!   --server-port <PORT>     Server control port [default: 8554]
//!   --data-port <PORT>       Local UDP port for frames [default: 25000]
//!   --describe-port <PORT>   Local TCP port for DESCRIBE [default: 25001]
//!   --describe               Fetch the session description after SETUP
//!   --play-secs <SECS>       Seconds to play; 0 plays until Ctrl+C [default: 10]
//!   --cache-dir <DIR>        Write the latest frame to cache-<session>.jpg here
//! ```

use std::net::ToSocketAddrs;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use vstream_client::domain::ClientConfig;
use vstream_client::infrastructure::cache::FrameCache;
use vstream_client::infrastructure::network::{ClientSession, DeliveredFrame};

// ── CLI argument definitions ──────────────────────────────────────────────────

/// vstream streaming client.
#[derive(Debug, Parser)]
#[command(name = "vstream-client", about = "Plays an MJPEG stream from a vstream server", version)]
struct Cli {
    /// Media name to request, e.g. `movie.mjpg`.
    media: String,

    #[arg(long, default_value = "127.0.0.1", env = "VSTREAM_SERVER_HOST")]
    server_host: String,

    #[arg(long, default_value_t = 8554, env = "VSTREAM_SERVER_PORT")]
    server_port: u16,

    #[arg(long, default_value_t = 25000)]
    data_port: u16,

    #[arg(long, default_value_t = 25001)]
    describe_port: u16,

    /// Fetch and log the session description after SETUP.
    #[arg(long)]
    describe: bool,

    /// Seconds to stay in PLAYING; 0 plays until Ctrl+C.
    #[arg(long, default_value_t = 10)]
    play_secs: u64,

    #[arg(long)]
    cache_dir: Option<PathBuf>,

    /// Log filter used when `RUST_LOG` is unset.
    #[arg(long, default_value = "info")]
    log_level: String,
}

impl Cli {
    fn to_client_config(&self) -> anyhow::Result<ClientConfig> {
        let server_addr = (self.server_host.as_str(), self.server_port)
            .to_socket_addrs()
            .with_context(|| format!("cannot resolve server host {}", self.server_host))?
            .next()
            .with_context(|| format!("no address found for {}", self.server_host))?;
        Ok(ClientConfig {
            server_addr,
            data_port: self.data_port,
            describe_port: self.describe_port,
            ..ClientConfig::default()
        })
    }

    fn play_duration(&self) -> Option<Duration> {
        (self.play_secs > 0).then(|| Duration::from_secs(self.play_secs))
    }
}

/// Drains delivered frames, mirroring each into the cache file if one is set.
async fn consume_frames(mut frames: mpsc::Receiver<DeliveredFrame>, cache: Option<FrameCache>) -> u64 {
    let mut count = 0;
    while let Some(frame) = frames.recv().await {
        count += 1;
        debug!("frame {} ({} bytes)", frame.sequence_number, frame.payload.len());
        if let Some(cache) = &cache {
            if let Err(e) = cache.write(&frame.payload).await {
                warn!("{e}");
            }
        }
    }
    count
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level)),
        )
        .init();

    let config = cli.to_client_config()?;
    info!("vstream client connecting to {} for {}", config.server_addr, cli.media);

    let (mut session, frames) = ClientSession::connect(config, cli.media.clone())
        .await
        .context("could not open control connection")?;

    session.setup().await.context("SETUP failed")?;
    let session_id = session.session_id().unwrap_or_default();
    info!("session {session_id} ready");

    if cli.describe {
        match session.describe().await {
            Ok(text) => info!("session description:\n{text}"),
            Err(e) => warn!("DESCRIBE failed: {e}"),
        }
    }

    let cache = cli
        .cache_dir
        .as_deref()
        .map(|dir| FrameCache::new(dir, session_id));
    let consumer = tokio::spawn(consume_frames(frames, cache.clone()));

    session.play().await.context("PLAY failed")?;
    match cli.play_duration() {
        Some(duration) => {
            tokio::select! {
                _ = tokio::time::sleep(duration) => {}
                _ = tokio::signal::ctrl_c() => info!("received Ctrl+C"),
            }
        }
        None => {
            tokio::signal::ctrl_c()
                .await
                .context("failed to listen for Ctrl+C")?;
            info!("received Ctrl+C");
        }
    }

    session.teardown().await.context("TEARDOWN failed")?;
    let stats = session.stats();
    drop(session);

    let delivered = consumer.await.context("frame consumer panicked")?;
    info!(
        "delivered {delivered} frames; highest {}, lost {} ({:.1}%), stale {}, {:.0} bytes/s",
        stats.highest_frame,
        stats.frames_lost,
        stats.loss_rate() * 100.0,
        stats.stale_discarded,
        stats.throughput_bps()
    );

    if let Some(cache) = cache {
        if let Err(e) = cache.remove().await {
            warn!("{e}");
        }
    }
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
