//! Trained model artifact
//!
//! A JSON document produced by the training side: class labels, feature
//! columns in training order, per-column standardization, and logistic
//! regression weights. Loaded once at startup.

use eeg_core::{EegError, EegResult, Label, Prediction, PredictionSource};
use eeg_processing::FeatureVector;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelArtifact {
    /// The two class labels; the sigmoid output is the probability of
    /// `classes[1]`
    pub classes: Vec<Label>,
    /// Feature columns in training order
    pub feature_order: Vec<String>,
    /// Per-column standardization parameters
    pub means: Vec<f32>,
    pub scales: Vec<f32>,
    /// Logistic regression weights over the standardized columns
    pub coefficients: Vec<f32>,
    pub intercept: f32,
}

impl ModelArtifact {
    pub fn load(path: &Path) -> EegResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            EegError::config(format!(
                "cannot read model artifact {}: {}",
                path.display(),
                e
            ))
        })?;
        let artifact: ModelArtifact = serde_json::from_str(&text).map_err(|e| {
            EegError::config(format!(
                "cannot parse model artifact {}: {}",
                path.display(),
                e
            ))
        })?;
        artifact.validate()?;
        Ok(artifact)
    }

    pub fn validate(&self) -> EegResult<()> {
        if self.classes.len() != 2 {
            return Err(EegError::config(format!(
                "model artifact must have exactly 2 classes, got {}",
                self.classes.len()
            )));
        }
        let columns = self.feature_order.len();
        if self.means.len() != columns
            || self.scales.len() != columns
            || self.coefficients.len() != columns
        {
            return Err(EegError::config(
                "model artifact column tables have mismatched lengths",
            ));
        }
        if self.scales.iter().any(|s| *s <= 0.0) {
            return Err(EegError::config(
                "model artifact scales must all be positive",
            ));
        }
        Ok(())
    }

    /// Build the standardized feature row in training column order. A
    /// feature the recording did not yield contributes a raw zero.
    fn feature_row(&self, features: &FeatureVector) -> Vec<f32> {
        self.feature_order
            .iter()
            .enumerate()
            .map(|(i, name)| {
                let raw = features.by_name(name).unwrap_or(0.0);
                (raw - self.means[i]) / self.scales[i]
            })
            .collect()
    }

    /// Predict class and probabilities for a feature vector
    pub fn predict(&self, features: &FeatureVector) -> EegResult<Prediction> {
        self.validate()?;
        let row = self.feature_row(features);

        let z: f32 = self.intercept
            + row
                .iter()
                .zip(&self.coefficients)
                .map(|(x, w)| x * w)
                .sum::<f32>();
        if !z.is_finite() {
            return Err(EegError::processing(
                "model decision value is not finite",
            ));
        }

        let p_second = 1.0 / (1.0 + (-z).exp());
        let p_first = 1.0 - p_second;

        let mut probabilities = BTreeMap::new();
        probabilities.insert(self.classes[0], p_first);
        probabilities.insert(self.classes[1], p_second);

        let (label, confidence) = if p_second >= p_first {
            (self.classes[1], p_second)
        } else {
            (self.classes[0], p_first)
        };

        Ok(Prediction {
            label,
            confidence,
            probabilities,
            source: PredictionSource::Model,
        })
    }
}
