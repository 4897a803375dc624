//! Persistent request store
//!
//! `RequestStore` is the seam shared by the marker watcher, the poller, and
//! the orchestrator. `FileStore` keeps one JSON document per request under
//! a directory; claim and update operations are serialized behind a mutex
//! so the in-progress transition behaves as a compare-and-set against the
//! shared state.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use eeg_core::{
    AnalysisDetails, AnalysisRequest, EegError, EegResult, KeyFeatures, Label, Prediction,
};
use std::path::PathBuf;
use tokio::sync::Mutex;
use tracing::warn;

#[async_trait]
pub trait RequestStore: Send + Sync {
    async fn get(&self, id: &str) -> EegResult<Option<AnalysisRequest>>;

    async fn insert(&self, request: &AnalysisRequest) -> EegResult<()>;

    /// Atomic compare-and-set to in-progress. Returns `false` when the
    /// request already carries a fresh claim or is terminal; this is the
    /// dedup guard between the two trigger paths.
    async fn try_claim(&self, id: &str) -> EegResult<bool>;

    /// Single atomic update: completed state, full prediction, feature
    /// names, timestamp, key features, and the claim/request flags cleared.
    async fn complete(
        &self,
        id: &str,
        prediction: &Prediction,
        features_used: &[String],
        key_features: &KeyFeatures,
    ) -> EegResult<()>;

    /// Single atomic update: failed state with the error message recorded,
    /// flags cleared so the request cannot spin.
    async fn fail(&self, id: &str, error: &str) -> EegResult<()>;

    /// Ids awaiting analysis: `requested` set and no terminal state yet
    async fn pending(&self) -> EegResult<Vec<String>>;
}

/// Directory-backed store: `<root>/<id>.json` per request, written via
/// temp-file + rename.
pub struct FileStore {
    root: PathBuf,
    lease_ttl: Duration,
    lock: Mutex<()>,
}

impl FileStore {
    /// Open (creating if needed) the store directory. Failure here is a
    /// startup-fatal condition for the service.
    pub async fn open(root: impl Into<PathBuf>, lease_ttl_secs: i64) -> EegResult<Self> {
        let root = root.into();
        tokio::fs::create_dir_all(&root).await.map_err(|e| {
            EegError::store(format!("cannot open store at {}: {}", root.display(), e))
        })?;

        Ok(FileStore {
            root,
            lease_ttl: Duration::seconds(lease_ttl_secs),
            lock: Mutex::new(()),
        })
    }

    /// Request ids become file names; reject anything that could escape
    /// the store directory.
    fn validate_id(id: &str) -> EegResult<()> {
        if id.is_empty()
            || !id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(EegError::store(format!("invalid request id: {:?}", id)));
        }
        Ok(())
    }

    fn document_path(&self, id: &str) -> PathBuf {
        self.root.join(format!("{}.json", id))
    }

    async fn read_document(&self, id: &str) -> EegResult<Option<AnalysisRequest>> {
        Self::validate_id(id)?;
        let path = self.document_path(id);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(EegError::store(format!(
                    "cannot read {}: {}",
                    path.display(),
                    e
                )))
            }
        };
        let request = serde_json::from_slice(&bytes).map_err(|e| {
            EegError::store(format!("corrupt document {}: {}", path.display(), e))
        })?;
        Ok(Some(request))
    }

    async fn write_document(&self, request: &AnalysisRequest) -> EegResult<()> {
        Self::validate_id(&request.id)?;
        let path = self.document_path(&request.id);
        let staging = self.root.join(format!(".{}.tmp", request.id));

        let bytes = serde_json::to_vec(request)
            .map_err(|e| EegError::store(format!("cannot serialize {}: {}", request.id, e)))?;

        tokio::fs::write(&staging, &bytes).await.map_err(|e| {
            EegError::store(format!("cannot write {}: {}", staging.display(), e))
        })?;
        tokio::fs::rename(&staging, &path).await.map_err(|e| {
            EegError::store(format!("cannot commit {}: {}", path.display(), e))
        })?;

        Ok(())
    }

    async fn update_document<F>(&self, id: &str, apply: F) -> EegResult<()>
    where
        F: FnOnce(&mut AnalysisRequest),
    {
        let _guard = self.lock.lock().await;
        let mut request = self
            .read_document(id)
            .await?
            .ok_or_else(|| EegError::NotFound { id: id.to_string() })?;
        apply(&mut request);
        request.updated_at = Utc::now();
        self.write_document(&request).await
    }
}

#[async_trait]
impl RequestStore for FileStore {
    async fn get(&self, id: &str) -> EegResult<Option<AnalysisRequest>> {
        self.read_document(id).await
    }

    async fn insert(&self, request: &AnalysisRequest) -> EegResult<()> {
        let _guard = self.lock.lock().await;
        self.write_document(request).await
    }

    async fn try_claim(&self, id: &str) -> EegResult<bool> {
        let _guard = self.lock.lock().await;
        let mut request = self
            .read_document(id)
            .await?
            .ok_or_else(|| EegError::NotFound { id: id.to_string() })?;

        if request.analysis.performed {
            return Ok(false);
        }
        if request.analysis.in_progress {
            // A crashed worker must not wedge the record forever; a stale
            // lease may be taken over.
            let fresh = request
                .analysis
                .claimed_at
                .map(|at| Utc::now() - at < self.lease_ttl)
                .unwrap_or(false);
            if fresh {
                return Ok(false);
            }
        }

        request.analysis.in_progress = true;
        request.analysis.claimed_at = Some(Utc::now());
        request.updated_at = Utc::now();
        self.write_document(&request).await?;
        Ok(true)
    }

    async fn complete(
        &self,
        id: &str,
        prediction: &Prediction,
        features_used: &[String],
        key_features: &KeyFeatures,
    ) -> EegResult<()> {
        self.update_document(id, |request| {
            let status = &mut request.analysis;
            status.performed = true;
            status.result = Some(prediction.label);
            status.confidence = Some(prediction.confidence);
            status.features_used = features_used.to_vec();
            status.performed_at = Some(Utc::now());
            status.error = None;
            status.details = Some(AnalysisDetails {
                probabilities: prediction.probabilities.clone(),
                key_features: key_features.clone(),
            });
            status.in_progress = false;
            status.requested = false;
            status.claimed_at = None;
        })
        .await
    }

    async fn fail(&self, id: &str, error: &str) -> EegResult<()> {
        let error = error.to_string();
        self.update_document(id, move |request| {
            let status = &mut request.analysis;
            status.performed = true;
            status.result = Some(Label::Inconclusive);
            status.confidence = Some(0.0);
            status.performed_at = Some(Utc::now());
            status.error = Some(error);
            status.in_progress = false;
            status.requested = false;
            status.claimed_at = None;
        })
        .await
    }

    async fn pending(&self) -> EegResult<Vec<String>> {
        let mut entries = tokio::fs::read_dir(&self.root).await.map_err(|e| {
            EegError::store(format!("cannot scan {}: {}", self.root.display(), e))
        })?;

        let mut ids = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(|e| {
            EegError::store(format!("cannot scan {}: {}", self.root.display(), e))
        })? {
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            let Some(id) = name.strip_suffix(".json") else { continue };

            // One bad document must not take down the scan
            match self.read_document(id).await {
                Ok(Some(request))
                    if request.analysis.requested && !request.analysis.performed =>
                {
                    ids.push(request.id);
                }
                Ok(_) => {}
                Err(e) => warn!(id, error = %e, "skipping unreadable store document"),
            }
        }

        ids.sort();
        Ok(ids)
    }
}
