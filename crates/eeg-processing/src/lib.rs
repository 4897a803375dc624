//! EEG-Processing: deterministic signal transforms
//!
//! Preprocessing (filtering, re-referencing, artifact flagging) and
//! spectral feature extraction over complete recordings.

pub mod features;
pub mod filters;
pub mod preprocess;
pub mod psd;

pub use features::{
    key_features, relevant_features, Band, FeatureConfig, FeatureExtractor, FeatureKey,
    FeatureVector,
};
pub use filters::{notch_harmonics, BiquadSection};
pub use preprocess::{PreprocessConfig, SignalPreprocessor};
pub use psd::welch_psd;
