//! Analysis-request data model
//!
//! Mirrors the persisted store schema: a request owns the raw recording
//! payload and a status block the orchestrator advances through the
//! lifecycle. The core only reads the payload/format and writes the
//! status/prediction fields.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

/// Classification outcome label
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Label {
    #[serde(rename = "ADHD")]
    Adhd,
    #[serde(rename = "non-ADHD")]
    NonAdhd,
    Inconclusive,
}

impl Label {
    pub fn as_str(&self) -> &'static str {
        match self {
            Label::Adhd => "ADHD",
            Label::NonAdhd => "non-ADHD",
            Label::Inconclusive => "Inconclusive",
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a prediction came from. Stub results must be distinguishable from
/// model-backed results so downstream consumers are not misled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PredictionSource {
    /// Produced by the trained model artifact
    Model,
    /// No artifact configured; placeholder prediction
    Stub,
    /// Classifier failed internally; inconclusive placeholder
    Fallback,
}

/// Classification result with its probability distribution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prediction {
    pub label: Label,
    /// Probability of the predicted class, in [0, 1]
    pub confidence: f32,
    /// Distribution over labels; sums to 1 within 1e-6
    pub probabilities: BTreeMap<Label, f32>,
    pub source: PredictionSource,
}

impl Prediction {
    pub fn probability_sum(&self) -> f32 {
        self.probabilities.values().sum()
    }
}

/// Curated subset of features persisted alongside the prediction
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KeyFeatures {
    pub theta_beta_ratio: Option<f32>,
    pub frontal_theta: Option<f32>,
    pub central_beta: Option<f32>,
}

/// Detailed analysis output nested under the status block
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisDetails {
    pub probabilities: BTreeMap<Label, f32>,
    pub key_features: KeyFeatures,
}

/// Per-request analysis status as persisted in the store
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalysisStatus {
    /// An external actor asked for this recording to be analyzed
    #[serde(default)]
    pub requested: bool,
    /// A terminal state (completed or failed) has been persisted
    #[serde(default)]
    pub performed: bool,
    /// A worker currently holds the claim on this request
    #[serde(default)]
    pub in_progress: bool,
    /// Lease timestamp set when the claim was taken; stale claims may be
    /// re-claimed after the lease TTL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claimed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Label>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub features_used: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub performed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<AnalysisDetails>,
}

/// Derived lifecycle view over the status flags. Transitions are monotonic:
/// Unrequested -> Requested -> InProgress -> {Completed, Failed}, and the
/// two terminal states absorb.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Unrequested,
    Requested,
    InProgress,
    Completed,
    Failed,
}

impl AnalysisStatus {
    pub fn lifecycle(&self) -> Lifecycle {
        if self.performed {
            if self.error.is_some() {
                Lifecycle::Failed
            } else {
                Lifecycle::Completed
            }
        } else if self.in_progress {
            Lifecycle::InProgress
        } else if self.requested {
            Lifecycle::Requested
        } else {
            Lifecycle::Unrequested
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.performed
    }
}

/// A stored recording with its analysis status
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisRequest {
    pub id: String,
    /// Raw recording bytes as uploaded
    pub payload: Vec<u8>,
    /// Declared format tag (file extension style, e.g. "edf")
    pub format: String,
    pub analysis: AnalysisStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AnalysisRequest {
    /// Create a new unrequested record with a generated id
    pub fn new(payload: Vec<u8>, format: impl Into<String>) -> Self {
        let now = Utc::now();
        AnalysisRequest {
            id: Uuid::new_v4().simple().to_string(),
            payload,
            format: format.into(),
            analysis: AnalysisStatus::default(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Mark analysis as requested (the store-side trigger for the poller)
    pub fn mark_requested(&mut self) {
        self.analysis.requested = true;
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lifecycle_derivation() {
        let mut status = AnalysisStatus::default();
        assert_eq!(status.lifecycle(), Lifecycle::Unrequested);

        status.requested = true;
        assert_eq!(status.lifecycle(), Lifecycle::Requested);

        status.in_progress = true;
        assert_eq!(status.lifecycle(), Lifecycle::InProgress);

        status.performed = true;
        status.in_progress = false;
        status.result = Some(Label::Adhd);
        assert_eq!(status.lifecycle(), Lifecycle::Completed);
        assert!(status.is_terminal());

        status.error = Some("decode failed".to_string());
        assert_eq!(status.lifecycle(), Lifecycle::Failed);
    }

    #[test]
    fn test_label_serialization() {
        assert_eq!(serde_json::to_string(&Label::Adhd).unwrap(), "\"ADHD\"");
        assert_eq!(serde_json::to_string(&Label::NonAdhd).unwrap(), "\"non-ADHD\"");
        assert_eq!(
            serde_json::to_string(&Label::Inconclusive).unwrap(),
            "\"Inconclusive\""
        );
    }

    #[test]
    fn test_request_roundtrip() {
        let mut request = AnalysisRequest::new(vec![1, 2, 3], "edf");
        request.mark_requested();

        let json = serde_json::to_string(&request).unwrap();
        let parsed: AnalysisRequest = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed.id, request.id);
        assert_eq!(parsed.payload, vec![1, 2, 3]);
        assert_eq!(parsed.format, "edf");
        assert!(parsed.analysis.requested);
        assert!(!parsed.analysis.performed);
    }

    #[test]
    fn test_probability_sum() {
        let mut probabilities = BTreeMap::new();
        probabilities.insert(Label::Adhd, 0.7);
        probabilities.insert(Label::NonAdhd, 0.3);

        let prediction = Prediction {
            label: Label::Adhd,
            confidence: 0.7,
            probabilities,
            source: PredictionSource::Stub,
        };

        assert!((prediction.probability_sum() - 1.0).abs() < 1e-6);
    }
}
