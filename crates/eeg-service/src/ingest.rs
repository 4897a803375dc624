//! Dual-trigger request ingestion
//!
//! Two independent sources discover work and hand ids to the orchestrator:
//! a marker-file watcher over a directory and a periodic store poller. The
//! two can race on the same id; the orchestrator's claim makes that safe.

use crate::processor::{ProcessOutcome, RequestProcessor};
use crate::store::RequestStore;
use eeg_core::CancelToken;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;
use tracing::{error, info, warn};

/// Extract the request id from a marker file name: everything before the
/// first '.'. Returns `None` for names that carry no id.
pub fn marker_id(file_name: &str) -> Option<&str> {
    let id = file_name.split('.').next().unwrap_or("");
    if id.is_empty() {
        None
    } else {
        Some(id)
    }
}

/// Watches a directory for `<id>.<anything>` marker files. Every marker is
/// handled once and then deleted regardless of outcome, so a trigger cannot
/// re-fire for the same event; the poller is the backstop for markers
/// missed across restarts.
pub struct MarkerWatcher {
    watch_dir: PathBuf,
    scan_interval: Duration,
    processor: Arc<RequestProcessor>,
}

impl MarkerWatcher {
    pub fn new(
        watch_dir: impl Into<PathBuf>,
        scan_interval: Duration,
        processor: Arc<RequestProcessor>,
    ) -> Self {
        MarkerWatcher {
            watch_dir: watch_dir.into(),
            scan_interval,
            processor,
        }
    }

    pub async fn run(&self, shutdown: CancelToken) {
        info!(dir = %self.watch_dir.display(), "marker watcher started");
        let mut ticker = interval(self.scan_interval);

        loop {
            ticker.tick().await;
            if shutdown.is_cancelled() {
                break;
            }
            self.scan_once(&shutdown).await;
        }

        info!("marker watcher stopped");
    }

    /// One pass over the watch directory
    pub async fn scan_once(&self, shutdown: &CancelToken) {
        let mut entries = match tokio::fs::read_dir(&self.watch_dir).await {
            Ok(entries) => entries,
            Err(e) => {
                error!(dir = %self.watch_dir.display(), error = %e, "cannot scan marker directory");
                return;
            }
        };

        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    error!(error = %e, "marker directory scan interrupted");
                    break;
                }
            };
            if shutdown.is_cancelled() {
                break;
            }

            let path = entry.path();
            if !path.is_file() {
                continue;
            }

            match entry.file_name().to_str().and_then(marker_id) {
                Some(id) => {
                    info!(id, marker = %path.display(), "analysis request marker detected");
                    match self.processor.process(id).await {
                        Ok(outcome) => log_outcome(id, outcome),
                        Err(e) => error!(id, error = %e, "marker handling failed"),
                    }
                }
                None => {
                    warn!(marker = %path.display(), "malformed marker name, skipping");
                }
            }

            // Delete unconditionally so the trigger cannot re-fire
            if let Err(e) = tokio::fs::remove_file(&path).await {
                warn!(marker = %path.display(), error = %e, "cannot remove marker");
            }
        }
    }
}

/// Periodically scans the store for requests with `requested` set and no
/// terminal state. A failed scan is logged and retried on the next
/// interval; it never terminates the loop.
pub struct StorePoller {
    store: Arc<dyn RequestStore>,
    processor: Arc<RequestProcessor>,
    poll_interval: Duration,
}

impl StorePoller {
    pub fn new(
        store: Arc<dyn RequestStore>,
        processor: Arc<RequestProcessor>,
        poll_interval: Duration,
    ) -> Self {
        StorePoller {
            store,
            processor,
            poll_interval,
        }
    }

    pub async fn run(&self, shutdown: CancelToken) {
        info!(
            interval_secs = self.poll_interval.as_secs(),
            "store poller started"
        );
        let mut ticker = interval(self.poll_interval);

        loop {
            ticker.tick().await;
            if shutdown.is_cancelled() {
                break;
            }
            self.poll_once(&shutdown).await;
        }

        info!("store poller stopped");
    }

    /// One scan-and-process pass
    pub async fn poll_once(&self, shutdown: &CancelToken) {
        let ids = match self.store.pending().await {
            Ok(ids) => ids,
            Err(e) => {
                error!(error = %e, "store scan failed, retrying next interval");
                return;
            }
        };

        for id in ids {
            if shutdown.is_cancelled() {
                break;
            }
            info!(id = %id, "pending analysis request found");
            match self.processor.process(&id).await {
                Ok(outcome) => log_outcome(&id, outcome),
                Err(e) => error!(id = %id, error = %e, "pending request handling failed"),
            }
        }
    }
}

fn log_outcome(id: &str, outcome: ProcessOutcome) {
    match outcome {
        ProcessOutcome::Completed => {}
        ProcessOutcome::Failed => warn!(id, "request finished in failed state"),
        ProcessOutcome::Skipped => info!(id, "request already handled elsewhere"),
        ProcessOutcome::NotFound => warn!(id, "marker or scan named an unknown request"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::{encode_raw_recording, LoaderRegistry};
    use crate::store::FileStore;
    use eeg_core::{AnalysisRequest, ChannelInfo, EegSignal, Lifecycle};
    use eeg_model::Classifier;
    use eeg_processing::{FeatureExtractor, SignalPreprocessor};

    #[test]
    fn test_marker_id_extraction() {
        assert_eq!(marker_id("abc123.request"), Some("abc123"));
        assert_eq!(marker_id("abc123.tar.gz"), Some("abc123"));
        assert_eq!(marker_id("noextension"), Some("noextension"));
        assert_eq!(marker_id(".hidden"), None);
        assert_eq!(marker_id(""), None);
    }

    fn payload() -> Vec<u8> {
        let channels = vec![ChannelInfo::eeg("Fp1"), ChannelInfo::eeg("Fp2")];
        let data: Vec<f32> = (0..5000)
            .map(|i| 15.0 * (i as f32 * 0.15).sin())
            .collect();
        let signal = EegSignal::new(data, channels, 250.0).unwrap();
        encode_raw_recording(&signal).unwrap()
    }

    async fn fixture() -> (
        tempfile::TempDir,
        tempfile::TempDir,
        tempfile::TempDir,
        Arc<FileStore>,
        Arc<RequestProcessor>,
    ) {
        let store_dir = tempfile::tempdir().unwrap();
        let data_dir = tempfile::tempdir().unwrap();
        let watch_dir = tempfile::tempdir().unwrap();
        let store = Arc::new(FileStore::open(store_dir.path(), 600).await.unwrap());

        let processor = Arc::new(RequestProcessor::new(
            store.clone(),
            Arc::new(LoaderRegistry::with_native()),
            SignalPreprocessor::default(),
            FeatureExtractor::default(),
            Arc::new(Classifier::new(None)),
            data_dir.path(),
            2,
            CancelToken::new(),
        ));

        (store_dir, data_dir, watch_dir, store, processor)
    }

    #[tokio::test]
    async fn test_marker_triggers_processing_and_is_deleted() {
        let (_s, _d, watch_dir, store, processor) = fixture().await;

        let mut request = AnalysisRequest::new(payload(), "raw");
        request.mark_requested();
        let id = request.id.clone();
        store.insert(&request).await.unwrap();

        let marker = watch_dir.path().join(format!("{}.request", id));
        tokio::fs::write(&marker, b"").await.unwrap();

        let watcher = MarkerWatcher::new(watch_dir.path(), Duration::from_secs(1), processor);
        watcher.scan_once(&CancelToken::new()).await;

        assert!(!marker.exists());
        let record = store.get(&id).await.unwrap().unwrap();
        assert_eq!(record.analysis.lifecycle(), Lifecycle::Completed);
    }

    #[tokio::test]
    async fn test_marker_for_unknown_id_is_deleted() {
        let (_s, _d, watch_dir, _store, processor) = fixture().await;

        let marker = watch_dir.path().join("unknownid42.request");
        tokio::fs::write(&marker, b"").await.unwrap();

        let watcher = MarkerWatcher::new(watch_dir.path(), Duration::from_secs(1), processor);
        watcher.scan_once(&CancelToken::new()).await;

        assert!(!marker.exists());
    }

    #[tokio::test]
    async fn test_poller_picks_up_pending_request() {
        let (_s, _d, _w, store, processor) = fixture().await;

        let mut request = AnalysisRequest::new(payload(), "raw");
        request.mark_requested();
        let id = request.id.clone();
        store.insert(&request).await.unwrap();

        let poller = StorePoller::new(store.clone(), processor, Duration::from_secs(10));
        poller.poll_once(&CancelToken::new()).await;

        let record = store.get(&id).await.unwrap().unwrap();
        assert_eq!(record.analysis.lifecycle(), Lifecycle::Completed);
        assert!(!record.analysis.requested);
    }

    #[tokio::test]
    async fn test_poller_ignores_unrequested_records() {
        let (_s, _d, _w, store, processor) = fixture().await;

        let request = AnalysisRequest::new(payload(), "raw");
        let id = request.id.clone();
        store.insert(&request).await.unwrap();

        let poller = StorePoller::new(store.clone(), processor, Duration::from_secs(10));
        poller.poll_once(&CancelToken::new()).await;

        let record = store.get(&id).await.unwrap().unwrap();
        assert_eq!(record.analysis.lifecycle(), Lifecycle::Unrequested);
    }
}
