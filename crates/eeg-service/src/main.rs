//! EEG analysis service
//!
//! Signal flow: request store / marker directory -> orchestrator ->
//! preprocessing -> feature extraction -> classification -> store.

use anyhow::Context;
use clap::Parser;
use eeg_core::CancelToken;
use eeg_model::Classifier;
use eeg_processing::{FeatureConfig, FeatureExtractor, SignalPreprocessor};
use eeg_service::{
    FileStore, LoaderRegistry, MarkerWatcher, RequestProcessor, RequestStore, ServiceConfig,
    StorePoller,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    let config = ServiceConfig::parse();
    info!(
        data_dir = %config.data_dir.display(),
        store_dir = %config.store_dir.display(),
        poll_interval_secs = config.poll_interval_secs,
        workers = config.worker_count(),
        "starting EEG analysis service"
    );

    let watch_dir = config.watch_dir();
    tokio::fs::create_dir_all(&config.data_dir)
        .await
        .with_context(|| format!("cannot create data dir {}", config.data_dir.display()))?;
    tokio::fs::create_dir_all(&watch_dir)
        .await
        .with_context(|| format!("cannot create watch dir {}", watch_dir.display()))?;

    // An unreachable store is fatal at startup; everything after this is
    // per-request isolated
    let store: Arc<dyn RequestStore> = Arc::new(
        FileStore::open(&config.store_dir, config.lease_ttl_secs)
            .await
            .context("request store unreachable")?,
    );

    let classifier = Arc::new(Classifier::new(config.model_path.as_deref()));
    let cancel = CancelToken::new();

    let processor = Arc::new(RequestProcessor::new(
        store.clone(),
        Arc::new(LoaderRegistry::with_native()),
        SignalPreprocessor::new(config.preprocess_config()),
        FeatureExtractor::new(FeatureConfig::default()),
        classifier,
        &config.data_dir,
        config.worker_count(),
        cancel.clone(),
    ));

    let watcher = MarkerWatcher::new(
        &watch_dir,
        Duration::from_secs(config.watch_interval_secs.max(1)),
        processor.clone(),
    );
    let watcher_shutdown = cancel.clone();
    tokio::spawn(async move { watcher.run(watcher_shutdown).await });

    let poller = StorePoller::new(
        store,
        processor,
        Duration::from_secs(config.poll_interval_secs.max(1)),
    );

    tokio::select! {
        _ = poller.run(cancel.clone()) => {}
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown requested");
            cancel.cancel();
        }
    }

    Ok(())
}
