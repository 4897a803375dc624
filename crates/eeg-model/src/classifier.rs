//! Classifier capability: feature vector in, prediction out
//!
//! Wraps the model artifact behind a call that never fails outward. With no
//! artifact configured the classifier produces a clearly-flagged stub
//! prediction; an unloadable artifact or an internal prediction failure
//! degrades to the inconclusive fallback.

use crate::artifact::ModelArtifact;
use eeg_core::{Label, Prediction, PredictionSource};
use eeg_processing::FeatureVector;
use rand::Rng;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{info, warn};

enum ModelState {
    /// Artifact loaded and validated
    Loaded(Box<ModelArtifact>),
    /// No artifact configured or none on disk; stub predictions
    Missing,
    /// Artifact configured but unusable; inconclusive fallback only
    Broken,
}

pub struct Classifier {
    state: ModelState,
}

impl Classifier {
    /// Load the artifact once at startup. A missing artifact selects the
    /// stub; a present-but-unreadable one is reported and pinned to the
    /// fallback so downstream results are never mistaken for real ones.
    pub fn new(artifact_path: Option<&Path>) -> Self {
        let state = match artifact_path {
            None => {
                warn!("no model artifact configured, using stub predictions");
                ModelState::Missing
            }
            Some(path) if !path.exists() => {
                warn!(path = %path.display(), "model artifact not found, using stub predictions");
                ModelState::Missing
            }
            Some(path) => match ModelArtifact::load(path) {
                Ok(artifact) => {
                    info!(
                        path = %path.display(),
                        columns = artifact.feature_order.len(),
                        "model artifact loaded"
                    );
                    ModelState::Loaded(Box::new(artifact))
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "model artifact unusable");
                    ModelState::Broken
                }
            },
        };
        Classifier { state }
    }

    pub fn is_model_backed(&self) -> bool {
        matches!(self.state, ModelState::Loaded(_))
    }

    /// Classify a feature vector. Never propagates an error.
    pub fn predict(&self, features: &FeatureVector) -> Prediction {
        match &self.state {
            ModelState::Loaded(artifact) => match artifact.predict(features) {
                Ok(prediction) => prediction,
                Err(e) => {
                    warn!(error = %e, "model prediction failed");
                    fallback_prediction()
                }
            },
            ModelState::Missing => stub_prediction(rand::thread_rng().gen::<f32>()),
            ModelState::Broken => fallback_prediction(),
        }
    }
}

/// Placeholder prediction derived from a single uniform draw. Public so the
/// draw can be forced in tests.
pub fn stub_prediction(r: f32) -> Prediction {
    let mut probabilities = BTreeMap::new();
    let (label, confidence) = if r > 0.5 {
        probabilities.insert(Label::Adhd, 0.7);
        probabilities.insert(Label::NonAdhd, 0.3);
        (Label::Adhd, 0.7)
    } else {
        probabilities.insert(Label::Adhd, 0.35);
        probabilities.insert(Label::NonAdhd, 0.65);
        (Label::NonAdhd, 0.65)
    };

    Prediction {
        label,
        confidence,
        probabilities,
        source: PredictionSource::Stub,
    }
}

/// Inconclusive prediction for internal classifier failures
pub fn fallback_prediction() -> Prediction {
    let mut probabilities = BTreeMap::new();
    probabilities.insert(Label::Adhd, 0.0);
    probabilities.insert(Label::NonAdhd, 0.0);
    probabilities.insert(Label::Inconclusive, 1.0);

    Prediction {
        label: Label::Inconclusive,
        confidence: 0.0,
        probabilities,
        source: PredictionSource::Fallback,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_stub_high_draw() {
        let prediction = stub_prediction(0.8);

        assert_eq!(prediction.label, Label::Adhd);
        assert_eq!(prediction.confidence, 0.7);
        assert_eq!(prediction.probabilities[&Label::Adhd], 0.7);
        assert_eq!(prediction.probabilities[&Label::NonAdhd], 0.3);
        assert_eq!(prediction.source, PredictionSource::Stub);
    }

    #[test]
    fn test_stub_low_draw() {
        let prediction = stub_prediction(0.2);

        assert_eq!(prediction.label, Label::NonAdhd);
        assert_eq!(prediction.confidence, 0.65);
        assert_eq!(prediction.probabilities[&Label::Adhd], 0.35);
        assert_eq!(prediction.probabilities[&Label::NonAdhd], 0.65);
    }

    #[test]
    fn test_stub_probability_sum() {
        for r in [0.0, 0.3, 0.5, 0.51, 1.0] {
            let prediction = stub_prediction(r);
            assert!((prediction.probability_sum() - 1.0).abs() < 1e-6);
            assert!(prediction.confidence >= 0.0 && prediction.confidence <= 1.0);
        }
    }

    #[test]
    fn test_fallback_is_inconclusive() {
        let prediction = fallback_prediction();

        assert_eq!(prediction.label, Label::Inconclusive);
        assert_eq!(prediction.confidence, 0.0);
        assert_eq!(prediction.probabilities[&Label::Inconclusive], 1.0);
        assert!((prediction.probability_sum() - 1.0).abs() < 1e-6);
        assert_eq!(prediction.source, PredictionSource::Fallback);
    }

    #[test]
    fn test_missing_artifact_uses_stub() {
        let classifier = Classifier::new(None);
        assert!(!classifier.is_model_backed());

        let prediction = classifier.predict(&FeatureVector::default());
        assert_eq!(prediction.source, PredictionSource::Stub);
        assert!(matches!(prediction.label, Label::Adhd | Label::NonAdhd));
    }

    #[test]
    fn test_nonexistent_path_uses_stub() {
        let classifier = Classifier::new(Some(Path::new("/nonexistent/model.json")));
        assert!(!classifier.is_model_backed());
    }

    #[test]
    fn test_corrupt_artifact_pins_fallback() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not a model").unwrap();

        let classifier = Classifier::new(Some(file.path()));
        assert!(!classifier.is_model_backed());

        let prediction = classifier.predict(&FeatureVector::default());
        assert_eq!(prediction.source, PredictionSource::Fallback);
        assert_eq!(prediction.label, Label::Inconclusive);
    }

    #[test]
    fn test_valid_artifact_is_model_backed() {
        let artifact = ModelArtifact {
            classes: vec![Label::NonAdhd, Label::Adhd],
            feature_order: vec!["global_theta_beta_ratio".to_string()],
            means: vec![2.0],
            scales: vec![1.0],
            coefficients: vec![1.0],
            intercept: 0.0,
        };

        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{}", serde_json::to_string(&artifact).unwrap()).unwrap();

        let classifier = Classifier::new(Some(file.path()));
        assert!(classifier.is_model_backed());

        let prediction = classifier.predict(&FeatureVector::default());
        assert_eq!(prediction.source, PredictionSource::Model);
        assert!((prediction.probability_sum() - 1.0).abs() < 1e-6);
    }
}
