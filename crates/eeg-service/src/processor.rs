//! Request orchestration
//!
//! Owns the per-request lifecycle: claim, materialize, decode, preprocess,
//! extract, classify, persist. Failures are absorbed at this boundary and
//! persisted as a terminal failed state; nothing propagates back into the
//! ingestion loops except store transport errors.

use crate::loader::LoaderRegistry;
use crate::store::RequestStore;
use eeg_core::{AnalysisRequest, CancelToken, EegError, EegResult, KeyFeatures, Prediction};
use eeg_model::Classifier;
use eeg_processing::{key_features, FeatureExtractor, SignalPreprocessor};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

/// What `process` did with the request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// Pipeline ran and a completed record was persisted
    Completed,
    /// Pipeline failed and a failed record was persisted
    Failed,
    /// Another worker holds the claim, or the record is already terminal
    Skipped,
    /// No such request in the store; no side effects
    NotFound,
}

pub struct RequestProcessor {
    store: Arc<dyn RequestStore>,
    loaders: Arc<LoaderRegistry>,
    preprocessor: SignalPreprocessor,
    extractor: FeatureExtractor,
    classifier: Arc<Classifier>,
    data_dir: PathBuf,
    workers: Arc<Semaphore>,
    cancel: CancelToken,
}

impl RequestProcessor {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<dyn RequestStore>,
        loaders: Arc<LoaderRegistry>,
        preprocessor: SignalPreprocessor,
        extractor: FeatureExtractor,
        classifier: Arc<Classifier>,
        data_dir: impl Into<PathBuf>,
        worker_count: usize,
        cancel: CancelToken,
    ) -> Self {
        RequestProcessor {
            store,
            loaders,
            preprocessor,
            extractor,
            classifier,
            data_dir: data_dir.into(),
            workers: Arc::new(Semaphore::new(worker_count.max(1))),
            cancel,
        }
    }

    /// Idempotent per-request entry point shared by the marker watcher and
    /// the poller. The store's compare-and-set claim is the only guard the
    /// two racing triggers need.
    pub async fn process(&self, id: &str) -> EegResult<ProcessOutcome> {
        let Some(request) = self.store.get(id).await? else {
            warn!(id, "analysis request not found");
            return Ok(ProcessOutcome::NotFound);
        };

        if !self.store.try_claim(id).await? {
            debug!(id, "request already claimed or terminal, skipping");
            return Ok(ProcessOutcome::Skipped);
        }

        info!(id, format = %request.format, "processing analysis request");

        match self.run_pipeline(&request).await {
            Ok((prediction, features_used, keys)) => {
                self.store
                    .complete(id, &prediction, &features_used, &keys)
                    .await?;
                info!(
                    id,
                    label = %prediction.label,
                    confidence = prediction.confidence,
                    "analysis completed"
                );
                Ok(ProcessOutcome::Completed)
            }
            Err(EegError::Cancelled) => {
                // Shutdown mid-pipeline: leave the record non-terminal; the
                // claim lease expires and a later run picks it up again
                warn!(id, "pipeline cancelled before completion");
                Err(EegError::Cancelled)
            }
            Err(e) => {
                error!(id, error = %e, "analysis failed");
                self.store.fail(id, &e.to_string()).await?;
                Ok(ProcessOutcome::Failed)
            }
        }
    }

    /// Materialize the payload and run decode -> preprocess -> extract ->
    /// classify on the blocking pool, bounded by the worker semaphore. The
    /// temp file is released on every exit path.
    async fn run_pipeline(
        &self,
        request: &AnalysisRequest,
    ) -> EegResult<(Prediction, Vec<String>, KeyFeatures)> {
        let permit = self
            .workers
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| EegError::Cancelled)?;

        let payload = request.payload.clone();
        let format = request.format.clone();
        let id = request.id.clone();
        let loaders = self.loaders.clone();
        let preprocessor = self.preprocessor.clone();
        let extractor = self.extractor.clone();
        let classifier = self.classifier.clone();
        let cancel = self.cancel.clone();
        let data_dir = self.data_dir.clone();

        let handle = tokio::task::spawn_blocking(move || {
            let _permit = permit;

            let mut staged = tempfile::Builder::new()
                .prefix(&format!("payload-{}-", id))
                .suffix(&format!(".{}", format.to_lowercase()))
                .tempfile_in(&data_dir)
                .map_err(|e| EegError::processing(format!("cannot stage payload: {}", e)))?;
            staged
                .write_all(&payload)
                .map_err(|e| EegError::processing(format!("cannot stage payload: {}", e)))?;
            staged
                .flush()
                .map_err(|e| EegError::processing(format!("cannot stage payload: {}", e)))?;

            let signal = loaders.load(staged.path(), &format)?;
            debug!(
                id = %id,
                channels = signal.channel_count(),
                samples = signal.samples_per_channel(),
                rate = signal.sampling_rate(),
                "recording decoded"
            );

            let cleaned = preprocessor.process(&signal, &cancel)?;
            if !cleaned.bad_channels().is_empty() {
                info!(id = %id, bad = ?cleaned.bad_channels(), "channels flagged bad");
            }

            let features = extractor.extract(&cleaned, &cancel)?;
            let prediction = classifier.predict(&features);
            let keys = key_features(&features);

            Ok((prediction, features.names(), keys))
        });

        handle
            .await
            .map_err(|e| EegError::processing(format!("pipeline task failed: {}", e)))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::encode_raw_recording;
    use crate::store::FileStore;
    use eeg_core::{ChannelInfo, EegSignal, Label, Lifecycle};

    fn recording_payload() -> Vec<u8> {
        let names = ["Fp1", "Fp2", "C3", "C4"];
        let fs = 250.0;
        let mut data = Vec::new();
        for (c, _) in names.iter().enumerate() {
            data.extend((0..2500).map(|i| {
                let t = i as f32 / fs;
                20.0 * (2.0 * std::f32::consts::PI * (6.0 + c as f32) * t).sin()
                    + 5.0 * (2.0 * std::f32::consts::PI * 18.0 * t).sin()
            }));
        }
        let channels = names.iter().map(|n| ChannelInfo::eeg(*n)).collect();
        let signal = EegSignal::new(data, channels, fs).unwrap();
        encode_raw_recording(&signal).unwrap()
    }

    struct Fixture {
        _store_dir: tempfile::TempDir,
        _data_dir: tempfile::TempDir,
        store: Arc<FileStore>,
        processor: RequestProcessor,
        data_path: PathBuf,
    }

    async fn fixture() -> Fixture {
        let store_dir = tempfile::tempdir().unwrap();
        let data_dir = tempfile::tempdir().unwrap();
        let store = Arc::new(FileStore::open(store_dir.path(), 600).await.unwrap());

        let processor = RequestProcessor::new(
            store.clone(),
            Arc::new(LoaderRegistry::with_native()),
            SignalPreprocessor::default(),
            FeatureExtractor::default(),
            Arc::new(Classifier::new(None)),
            data_dir.path(),
            2,
            CancelToken::new(),
        );

        Fixture {
            data_path: data_dir.path().to_path_buf(),
            _store_dir: store_dir,
            _data_dir: data_dir,
            store,
            processor,
        }
    }

    async fn seed(store: &FileStore, payload: Vec<u8>, format: &str) -> String {
        let mut request = AnalysisRequest::new(payload, format);
        request.mark_requested();
        let id = request.id.clone();
        store.insert(&request).await.unwrap();
        id
    }

    #[tokio::test]
    async fn test_end_to_end_completion() {
        let fx = fixture().await;
        let id = seed(&fx.store, recording_payload(), "raw").await;

        let outcome = fx.processor.process(&id).await.unwrap();
        assert_eq!(outcome, ProcessOutcome::Completed);

        let record = fx.store.get(&id).await.unwrap().unwrap();
        let status = &record.analysis;
        assert_eq!(status.lifecycle(), Lifecycle::Completed);
        assert!(status.performed);
        assert!(!status.requested);
        assert!(!status.in_progress);
        assert!(status.performed_at.is_some());
        assert!(matches!(
            status.result,
            Some(Label::Adhd) | Some(Label::NonAdhd)
        ));
        assert!(!status.features_used.is_empty());

        let details = status.details.as_ref().unwrap();
        let sum: f32 = details.probabilities.values().sum();
        assert!((sum - 1.0).abs() < 1e-6);
        assert!(details.key_features.theta_beta_ratio.is_some());
    }

    #[tokio::test]
    async fn test_unsupported_format_persists_failure() {
        let fx = fixture().await;
        let id = seed(&fx.store, vec![0u8; 128], "edf").await;

        let outcome = fx.processor.process(&id).await.unwrap();
        assert_eq!(outcome, ProcessOutcome::Failed);

        let record = fx.store.get(&id).await.unwrap().unwrap();
        let status = &record.analysis;
        assert_eq!(status.lifecycle(), Lifecycle::Failed);
        assert_eq!(status.result, Some(Label::Inconclusive));
        assert_eq!(status.confidence, Some(0.0));
        assert!(status.error.as_deref().unwrap().contains("edf"));
        assert!(!status.requested);
        assert!(!status.in_progress);
    }

    #[tokio::test]
    async fn test_corrupt_payload_persists_failure() {
        let fx = fixture().await;
        let id = seed(&fx.store, b"garbage\nmore garbage".to_vec(), "raw").await;

        let outcome = fx.processor.process(&id).await.unwrap();
        assert_eq!(outcome, ProcessOutcome::Failed);
    }

    #[tokio::test]
    async fn test_missing_request_has_no_side_effects() {
        let fx = fixture().await;
        let outcome = fx.processor.process("doesnotexist").await.unwrap();
        assert_eq!(outcome, ProcessOutcome::NotFound);
        assert!(fx.store.pending().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_claimed_request_is_skipped() {
        let fx = fixture().await;
        let id = seed(&fx.store, recording_payload(), "raw").await;

        assert!(fx.store.try_claim(&id).await.unwrap());
        let outcome = fx.processor.process(&id).await.unwrap();
        assert_eq!(outcome, ProcessOutcome::Skipped);
    }

    #[tokio::test]
    async fn test_terminal_request_is_skipped() {
        let fx = fixture().await;
        let id = seed(&fx.store, recording_payload(), "raw").await;

        assert_eq!(
            fx.processor.process(&id).await.unwrap(),
            ProcessOutcome::Completed
        );
        // No automatic retry of a terminal record
        assert_eq!(
            fx.processor.process(&id).await.unwrap(),
            ProcessOutcome::Skipped
        );
    }

    #[tokio::test]
    async fn test_staged_payload_released() {
        let fx = fixture().await;

        let completed = seed(&fx.store, recording_payload(), "raw").await;
        fx.processor.process(&completed).await.unwrap();

        let failed = seed(&fx.store, vec![1, 2, 3], "raw").await;
        fx.processor.process(&failed).await.unwrap();

        let leftovers = std::fs::read_dir(&fx.data_path).unwrap().count();
        assert_eq!(leftovers, 0);
    }
}
