// ------------------------------------------------------------
// Module declarations
// ------------------------------------------------------------
//
// - config:         Configuration structs loaded from JSON
// - schema:         Current-run input and render frame output types
// - social:         Social handle listing and rotation order
// - util:           Timestamps and reconnect jitter
// - feed:           Current-run hub and replicant WebSocket client
// - nameplate:      Nameplate variants and the fade/rotate state machine
// - panels:         Game info and timekeeper panels
// - overlay_sender: Frame sink and graphics host connection pool
//
mod config;
mod feed;
mod metrics;
mod nameplate;
mod overlay_sender;
mod panels;
mod schema;
mod social;
mod util;

#[cfg(test)]
mod testing;

use rustls::crypto::{CryptoProvider, ring};

use config::Config;
use feed::{CurrentRunFeed, replicant::run_feed_loop};
use metrics::METRICS;
use nameplate::{get_variant, mount};
use overlay_sender::{FrameSink, OverlayPool};

use std::fs;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

const DEFAULT_CONFIG_PATH: &str = "config.json";
const METRICS_INTERVAL: Duration = Duration::from_secs(10);

// ------------------------------------------------------------
// Application entry point
// ------------------------------------------------------------
//
// Responsibilities:
// - Initialize logging and the rustls crypto backend
// - Load configuration
// - Connect the frame sink and the replicant feed
// - Mount the configured nameplates and panels
// - Keep the process alive indefinitely
//
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let path = config_path();
    let config = load_config(&path)?;

    init_logging(config.debug_log());
    log::info!("loaded configuration from {path}");

    // rustls >= 0.23 needs an explicit provider before the first
    // wss:// connection.
    CryptoProvider::install_default(ring::default_provider())
        .map_err(|_| anyhow::anyhow!("failed to install rustls CryptoProvider"))?;

    let sink: Arc<dyn FrameSink> = Arc::new(OverlayPool::new(
        config.overlay.url.clone(),
        &config.overlay.key,
        config.debug_log(),
        config.overlay.connections,
        config.overlay.demo.unwrap_or(false),
    ));

    let feed = CurrentRunFeed::new();

    // Mount before connecting so the first snapshot reaches everyone.
    let timing = config.timing();
    let mut mounted = Vec::new();
    for np in config.nameplates.iter().filter(|n| n.enabled) {
        let Some(variant) = get_variant(&np.variant) else {
            log::error!("nameplate variant '{}' is not supported", np.variant);
            continue;
        };
        let handle = mount(variant, np.index, timing, &feed, sink.clone());
        log::debug!("mounted {}", handle.root_id());
        mounted.push(handle);
    }
    log::info!(
        "{} nameplates mounted, {} feed subscribers",
        mounted.len(),
        feed.subscriber_count()
    );

    let panels = config.panels.clone().unwrap_or_default();
    if panels.game || panels.timekeeper {
        panel_task(panels, &feed, sink.clone());
    }

    tokio::spawn(run_feed_loop(config.feed.clone(), feed.clone(), config.debug_raw()));

    tokio::spawn(async {
        loop {
            sleep(METRICS_INTERVAL).await;
            log::info!("[METRICS] {}", METRICS.summary());
        }
    });

    // All work happens in background tasks until interrupted.
    tokio::signal::ctrl_c().await?;
    log::info!("shutting down, unmounting {} nameplates", mounted.len());

    for handle in mounted {
        handle.unmount().await;
    }

    Ok(())
}

fn panel_task(cfg: config::PanelsConfig, feed: &CurrentRunFeed, sink: Arc<dyn FrameSink>) {
    let handle = panels::spawn_panels(cfg, feed, sink);
    tokio::spawn(async move {
        if let Err(e) = handle.await {
            log::error!("panel task failed: {e}");
        }
    });
}

/// First CLI argument, then `NAMEPLATE_CONFIG`, then `config.json`.
fn config_path() -> String {
    std::env::args()
        .nth(1)
        .or_else(|| std::env::var("NAMEPLATE_CONFIG").ok())
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string())
}

/// `RUST_LOG` wins over the config's debug flag.
fn init_logging(debug: bool) {
    let default = if debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default))
        .format_timestamp_millis()
        .init();
}

// ------------------------------------------------------------
// Configuration loader
// ------------------------------------------------------------
//
// NOTE:
// The file contains the overlay key and must not be committed.
//
fn load_config(path: &str) -> anyhow::Result<Config> {
    let data = fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("cannot read config '{path}': {e}"))?;
    Config::from_json(&data)
}
