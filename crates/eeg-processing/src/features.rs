//! Band-power feature extraction
//!
//! Converts a cleaned recording into the named feature map the classifier
//! consumes: per-channel band powers from a Welch PSD, theta/beta ratios,
//! frontal alpha asymmetry, global and regional aggregates, and normalized
//! global powers. Emission order is part of the contract; the curated
//! key-feature selection is first-match-wins over it.

use crate::psd::welch_psd;
use eeg_core::{is_frontal, is_left, is_right, CancelToken, EegError, EegResult, EegSignal};
use eeg_core::{KeyFeatures, Region};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The five canonical EEG frequency bands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Band {
    Delta,
    Theta,
    Alpha,
    Beta,
    Gamma,
}

impl Band {
    /// All bands in emission order
    pub const ALL: [Band; 5] = [Band::Delta, Band::Theta, Band::Alpha, Band::Beta, Band::Gamma];

    pub fn name(&self) -> &'static str {
        match self {
            Band::Delta => "delta",
            Band::Theta => "theta",
            Band::Alpha => "alpha",
            Band::Beta => "beta",
            Band::Gamma => "gamma",
        }
    }

    /// Band edges in Hz
    pub fn range(&self) -> (f32, f32) {
        match self {
            Band::Delta => (0.5, 4.0),
            Band::Theta => (4.0, 8.0),
            Band::Alpha => (8.0, 13.0),
            Band::Beta => (13.0, 30.0),
            Band::Gamma => (30.0, 50.0),
        }
    }

    /// Half-open membership, except gamma which closes the taxonomy at its
    /// upper edge
    pub fn contains(&self, freq: f32) -> bool {
        let (low, high) = self.range();
        if *self == Band::Gamma {
            freq >= low && freq <= high
        } else {
            freq >= low && freq < high
        }
    }
}

impl fmt::Display for Band {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Structured feature identity. Kept as typed tuples internally and
/// rendered to flat names only at the store/model boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum FeatureKey {
    ChannelBand { channel: String, band: Band },
    ChannelThetaBetaRatio { channel: String },
    FrontalAlphaAsymmetry,
    GlobalBand { band: Band },
    GlobalThetaBetaRatio,
    RegionBand { region: Region, band: Band },
    RegionThetaBetaRatio { region: Region },
    GlobalBandNorm { band: Band },
}

impl fmt::Display for FeatureKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeatureKey::ChannelBand { channel, band } => write!(f, "{}_{}", channel, band),
            FeatureKey::ChannelThetaBetaRatio { channel } => {
                write!(f, "{}_theta_beta_ratio", channel)
            }
            FeatureKey::FrontalAlphaAsymmetry => f.write_str("frontal_alpha_asymmetry"),
            FeatureKey::GlobalBand { band } => write!(f, "global_{}", band),
            FeatureKey::GlobalThetaBetaRatio => f.write_str("global_theta_beta_ratio"),
            FeatureKey::RegionBand { region, band } => {
                write!(f, "{}_{}", region.label(), band)
            }
            FeatureKey::RegionThetaBetaRatio { region } => {
                write!(f, "{}_theta_beta_ratio", region.label())
            }
            FeatureKey::GlobalBandNorm { band } => write!(f, "global_{}_norm", band),
        }
    }
}

/// Insertion-ordered feature map. Cardinality depends on the channel set;
/// keys are deterministic functions of channel names and the band/region
/// taxonomies.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureVector {
    entries: Vec<(FeatureKey, f32)>,
}

impl FeatureVector {
    /// Append a feature. Order of insertion is preserved and observable.
    pub fn push(&mut self, key: FeatureKey, value: f32) {
        debug_assert!(value.is_finite(), "non-finite feature {}", key);
        self.entries.push((key, value));
    }

    pub fn get(&self, key: &FeatureKey) -> Option<f32> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| *v)
    }

    /// Lookup by flat rendered name (the model-artifact column space)
    pub fn by_name(&self, name: &str) -> Option<f32> {
        self.entries
            .iter()
            .find(|(k, _)| k.to_string() == name)
            .map(|(_, v)| *v)
    }

    /// Entries in emission order
    pub fn iter(&self) -> impl Iterator<Item = (&FeatureKey, f32)> {
        self.entries.iter().map(|(k, v)| (k, *v))
    }

    /// Flat names in emission order
    pub fn names(&self) -> Vec<String> {
        self.entries.iter().map(|(k, _)| k.to_string()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Spectral estimation parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureConfig {
    /// PSD window length in seconds
    pub window_secs: f32,
    /// Window overlap fraction
    pub overlap: f32,
    /// Spectral range of interest in Hz
    pub fmin: f32,
    pub fmax: f32,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            window_secs: 2.0,
            overlap: 0.5,
            fmin: 0.5,
            fmax: 50.0,
        }
    }
}

/// Deterministic feature extractor over EEG-typed, non-bad channels
#[derive(Debug, Clone, Default)]
pub struct FeatureExtractor {
    config: FeatureConfig,
}

impl FeatureExtractor {
    pub fn new(config: FeatureConfig) -> Self {
        FeatureExtractor { config }
    }

    pub fn extract(&self, signal: &EegSignal, cancel: &CancelToken) -> EegResult<FeatureVector> {
        let picks = signal.eeg_picks();
        if picks.is_empty() {
            return Err(EegError::processing(
                "no usable EEG channels for feature extraction",
            ));
        }

        let fs = signal.sampling_rate();
        let window_len = ((fs * self.config.window_secs).round() as usize).max(2);
        let overlap = (window_len as f32 * self.config.overlap) as usize;

        let mut features = FeatureVector::default();

        // Per-channel band powers from the Welch estimate, restricted to
        // the spectral range of interest
        let mut channel_bands: Vec<(String, [Option<f32>; 5])> = Vec::with_capacity(picks.len());
        for &ch in &picks {
            cancel.check()?;
            let name = signal.channels()[ch].name.clone();
            let samples = signal.channel_data(ch)?;
            let (freqs, psd) = welch_psd(samples, fs, window_len, overlap)?;

            let mut bands = [None; 5];
            for (slot, band) in bands.iter_mut().zip(Band::ALL) {
                let mut sum = 0.0f32;
                let mut count = 0usize;
                for (freq, density) in freqs.iter().zip(&psd) {
                    if *freq >= self.config.fmin && *freq <= self.config.fmax && band.contains(*freq)
                    {
                        sum += density;
                        count += 1;
                    }
                }
                if count > 0 {
                    let power = sum / count as f32;
                    *slot = Some(power);
                    features.push(
                        FeatureKey::ChannelBand { channel: name.clone(), band },
                        power,
                    );
                }
            }
            channel_bands.push((name, bands));
        }

        // Per-channel theta/beta ratio; omitted, not computed, when beta is
        // not positive
        for (name, bands) in &channel_bands {
            let theta = bands[1].unwrap_or(0.0);
            let beta = bands[3].unwrap_or(0.0);
            if beta > 0.0 {
                let ratio = theta / beta;
                if ratio.is_finite() {
                    features.push(
                        FeatureKey::ChannelThetaBetaRatio { channel: name.clone() },
                        ratio,
                    );
                }
            }
        }

        // Frontal alpha asymmetry over the laterality heuristic
        let frontal: Vec<&(String, [Option<f32>; 5])> = channel_bands
            .iter()
            .filter(|(name, _)| is_frontal(name))
            .collect();
        if frontal.len() >= 2 {
            let left: Vec<f32> = frontal
                .iter()
                .filter(|(name, _)| is_left(name))
                .map(|(_, bands)| bands[2].unwrap_or(0.0))
                .collect();
            let right: Vec<f32> = frontal
                .iter()
                .filter(|(name, _)| is_right(name))
                .map(|(_, bands)| bands[2].unwrap_or(0.0))
                .collect();

            if !left.is_empty() && !right.is_empty() {
                let left_alpha = left.iter().sum::<f32>() / left.len() as f32;
                let right_alpha = right.iter().sum::<f32>() / right.len() as f32;
                if left_alpha > 0.0 && right_alpha > 0.0 {
                    features.push(
                        FeatureKey::FrontalAlphaAsymmetry,
                        right_alpha.ln() - left_alpha.ln(),
                    );
                }
            }
        }

        // Global band powers: mean over channels
        let mut global = [None; 5];
        for (i, band) in Band::ALL.into_iter().enumerate() {
            let values: Vec<f32> = channel_bands
                .iter()
                .filter_map(|(_, bands)| bands[i])
                .collect();
            if !values.is_empty() {
                let mean = values.iter().sum::<f32>() / values.len() as f32;
                global[i] = Some(mean);
                features.push(FeatureKey::GlobalBand { band }, mean);
            }
        }

        let global_theta = global[1].unwrap_or(0.0);
        let global_beta = global[3].unwrap_or(0.0);
        if global_beta > 0.0 {
            let ratio = global_theta / global_beta;
            if ratio.is_finite() {
                features.push(FeatureKey::GlobalThetaBetaRatio, ratio);
            }
        }

        // Regional aggregates over the name-prefix montage heuristic
        for region in Region::ALL {
            let members: Vec<&(String, [Option<f32>; 5])> = channel_bands
                .iter()
                .filter(|(name, _)| Region::of_channel(name) == Some(region))
                .collect();
            if members.is_empty() {
                continue;
            }

            let mut regional = [None; 5];
            for (i, band) in Band::ALL.into_iter().enumerate() {
                let values: Vec<f32> =
                    members.iter().filter_map(|(_, bands)| bands[i]).collect();
                if !values.is_empty() {
                    let mean = values.iter().sum::<f32>() / values.len() as f32;
                    regional[i] = Some(mean);
                    features.push(FeatureKey::RegionBand { region, band }, mean);
                }
            }

            let region_theta = regional[1].unwrap_or(0.0);
            let region_beta = regional[3].unwrap_or(0.0);
            if region_beta > 0.0 {
                let ratio = region_theta / region_beta;
                if ratio.is_finite() {
                    features.push(FeatureKey::RegionThetaBetaRatio { region }, ratio);
                }
            }
        }

        // Normalized global band powers against the summed total
        let total: f32 = global.iter().flatten().sum();
        if total > 0.0 {
            for (i, band) in Band::ALL.into_iter().enumerate() {
                if let Some(value) = global[i] {
                    features.push(FeatureKey::GlobalBandNorm { band }, value / total);
                }
            }
        }

        Ok(features)
    }
}

/// Curated key-feature subset persisted with each prediction. Selection is
/// first-match-wins over the emission order, not sorted.
pub fn key_features(features: &FeatureVector) -> KeyFeatures {
    let mut frontal_theta = None;
    let mut central_beta = None;

    for (key, value) in features.iter() {
        let name = key.to_string().to_lowercase();
        if frontal_theta.is_none() && name.contains("frontal") && name.contains("theta") {
            frontal_theta = Some(value);
        }
        if central_beta.is_none() && name.contains("central") && name.contains("beta") {
            central_beta = Some(value);
        }
    }

    KeyFeatures {
        theta_beta_ratio: features.get(&FeatureKey::GlobalThetaBetaRatio),
        frontal_theta,
        central_beta,
    }
}

/// The features most cited for ADHD screening: global/regional theta-beta
/// ratios, frontal alpha asymmetry, frontal/central per-channel ratios, and
/// the normalized global powers. When more than `top_n` are present, keeps
/// the largest by magnitude.
pub fn relevant_features(features: &FeatureVector, top_n: usize) -> Vec<(String, f32)> {
    let mut selected: Vec<(String, f32)> = Vec::new();

    for key in [
        FeatureKey::GlobalThetaBetaRatio,
        FeatureKey::RegionThetaBetaRatio { region: Region::Frontal },
        FeatureKey::RegionThetaBetaRatio { region: Region::Central },
        FeatureKey::FrontalAlphaAsymmetry,
    ] {
        if let Some(value) = features.get(&key) {
            selected.push((key.to_string(), value));
        }
    }

    for (key, value) in features.iter() {
        match key {
            FeatureKey::ChannelThetaBetaRatio { channel }
                if is_frontal(channel) || channel.starts_with('C') =>
            {
                selected.push((key.to_string(), value));
            }
            FeatureKey::GlobalBandNorm { .. } => selected.push((key.to_string(), value)),
            _ => {}
        }
    }

    if selected.len() > top_n {
        selected.sort_by(|a, b| b.1.abs().partial_cmp(&a.1.abs()).unwrap());
        selected.truncate(top_n);
    }

    selected
}
