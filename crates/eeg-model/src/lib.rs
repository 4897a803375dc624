//! EEG-Model: classification over extracted features
//!
//! Model-artifact loading plus the stub and fallback prediction paths.

pub mod artifact;
pub mod classifier;

pub use artifact::ModelArtifact;
pub use classifier::{fallback_prediction, stub_prediction, Classifier};
