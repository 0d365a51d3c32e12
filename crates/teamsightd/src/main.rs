use anyhow::{Context, Result};
use std::path::PathBuf;
use teamsight_core::{FrameAnalyzer, KmeansQuantizer, SessionSynchronizer};
use teamsight_store::{SqliteSessionStore, StoreError};
use tokio::sync::{oneshot, watch};
use tracing_subscriber::EnvFilter;

mod config;
mod engine;
mod feed;
mod notify;

use config::Config;
use engine::FrameLoop;
use notify::HttpNotifier;

/// Open the store on its own task and report back once it is ready.
fn spawn_store_init(db_path: PathBuf) -> oneshot::Receiver<Result<SqliteSessionStore, StoreError>> {
    let (ready_tx, ready_rx) = oneshot::channel();
    tokio::spawn(async move {
        let _ = ready_tx.send(SqliteSessionStore::open(&db_path).await);
    });
    ready_rx
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = Config::load()?;
    tracing::info!(
        device_id = %config.device_id,
        feed = %config.feed_path.display(),
        absence_threshold = config.absence_threshold,
        "teamsightd starting"
    );

    let store_ready = spawn_store_init(config.db_path.clone());

    // Feed and analyzer setup overlap with store initialization.
    let (source, detector) = feed::load_manifest(&config.feed_path)
        .with_context(|| format!("loading feed {}", config.feed_path.display()))?;
    let analyzer = FrameAnalyzer::new(KmeansQuantizer::new(config.clusters))
        .with_confidence_threshold(config.confidence_threshold)
        .with_saturation_threshold(config.saturation_threshold);
    let notifier = HttpNotifier::new(config.notify_url.clone())?;
    tracing::info!(enabled = notifier.is_enabled(), "arrival notifications");

    let store = engine::wait_for_store(store_ready)
        .await
        .context("session store unavailable; refusing to start")?;

    let sync = SessionSynchronizer::new(store, notifier, config.device_id.clone());
    let mut frame_loop = FrameLoop::new(source, detector, analyzer, sync, config.absence_threshold)
        .with_max_frames(config.frame_limit());

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = shutdown_tx.send(true);
        }
    });

    tracing::info!("teamsightd ready");
    let stats = frame_loop.run(shutdown_rx).await?;
    tracing::info!(
        frames = stats.frames,
        arrivals = stats.arrivals,
        departures = stats.departures,
        "teamsightd shutting down"
    );

    Ok(())
}
