//! Preprocessing pipeline for raw EEG recordings
//!
//! Fixed stage order: notch filtering, bandpass, average re-reference,
//! artifact flagging, optional statistical channel rejection, optional
//! resampling. Every stage is independently toggleable and only touches
//! EEG-typed channels that are not already flagged bad. The input signal is
//! never mutated; the pipeline clones and returns a new one.

use crate::filters::{notch_harmonics, BiquadSection};
use eeg_core::{CancelToken, ChannelStats, EegResult, EegSignal};
use serde::{Deserialize, Serialize};

/// Stage toggles and parameters for preprocessing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreprocessConfig {
    /// Apply notch + bandpass filtering
    pub filter_enabled: bool,
    /// Line-noise frequency; 50Hz covers most of the world
    pub line_freq: f32,
    /// Notch quality factor
    pub notch_q: f32,
    /// Bandpass edges in Hz
    pub bandpass_low: f32,
    pub bandpass_high: f32,
    /// Re-reference each EEG channel to the average of all EEG channels
    pub rereference_enabled: bool,
    /// Flag channels with too many high-amplitude samples
    pub artifact_rejection_enabled: bool,
    /// Amplitude threshold in microvolts
    pub artifact_threshold_uv: f32,
    /// Fraction of samples beyond the threshold that flags a channel
    pub artifact_fraction: f32,
    /// Statistical bad-channel detection (z-score over channel std-dev and
    /// peak-to-peak); off by default
    pub zscore_rejection_enabled: bool,
    pub zscore_threshold: f32,
    /// Resample to this rate when it differs from the recording's rate
    pub resample_to: Option<f32>,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            filter_enabled: true,
            line_freq: 50.0,
            notch_q: 30.0,
            bandpass_low: 0.5,
            bandpass_high: 50.0,
            rereference_enabled: true,
            artifact_rejection_enabled: true,
            artifact_threshold_uv: 150.0,
            artifact_fraction: 0.05,
            zscore_rejection_enabled: false,
            zscore_threshold: 3.0,
            resample_to: None,
        }
    }
}

/// Stateless preprocessing pipeline. Same input, same config, same output.
#[derive(Debug, Clone, Default)]
pub struct SignalPreprocessor {
    config: PreprocessConfig,
}

impl SignalPreprocessor {
    pub fn new(config: PreprocessConfig) -> Self {
        SignalPreprocessor { config }
    }

    pub fn config(&self) -> &PreprocessConfig {
        &self.config
    }

    /// Run the full pipeline, returning a cleaned copy of the signal with
    /// the bad-channel set updated.
    pub fn process(&self, signal: &EegSignal, cancel: &CancelToken) -> EegResult<EegSignal> {
        let mut out = signal.clone();
        let picks = out.eeg_picks();

        if self.config.filter_enabled {
            cancel.check()?;
            self.apply_filters(&mut out, &picks, cancel)?;
        }

        if self.config.rereference_enabled {
            cancel.check()?;
            self.rereference(&mut out, &picks)?;
        }

        if self.config.artifact_rejection_enabled {
            cancel.check()?;
            self.flag_amplitude_artifacts(&mut out, &picks)?;
        }

        if self.config.zscore_rejection_enabled {
            cancel.check()?;
            self.flag_statistical_outliers(&mut out, &picks)?;
        }

        if let Some(target) = self.config.resample_to {
            if (target - out.sampling_rate()).abs() > f32::EPSILON {
                cancel.check()?;
                self.resample(&mut out, target)?;
            }
        }

        Ok(out)
    }

    /// Notch out the line frequency and its harmonics, then bandpass
    fn apply_filters(
        &self,
        signal: &mut EegSignal,
        picks: &[usize],
        cancel: &CancelToken,
    ) -> EegResult<()> {
        let fs = signal.sampling_rate();
        let nyquist = fs / 2.0;
        let harmonics = notch_harmonics(self.config.line_freq, fs);

        for &ch in picks {
            cancel.check()?;
            let samples = signal.channel_data_mut(ch)?;

            for &freq in &harmonics {
                let mut notch = BiquadSection::notch(freq, self.config.notch_q, fs)?;
                notch.apply(samples);
            }

            let mut highpass = BiquadSection::butterworth_highpass(self.config.bandpass_low, fs)?;
            highpass.apply(samples);

            // A low sampling rate can put the upper edge at or above
            // Nyquist; the recording then has no content to remove there
            if self.config.bandpass_high < nyquist {
                let mut lowpass =
                    BiquadSection::butterworth_lowpass(self.config.bandpass_high, fs)?;
                lowpass.apply(samples);
            }
        }

        Ok(())
    }

    /// Recompute each EEG channel relative to the average of all EEG
    /// channels
    fn rereference(&self, signal: &mut EegSignal, picks: &[usize]) -> EegResult<()> {
        if picks.is_empty() {
            return Ok(());
        }

        let n = signal.samples_per_channel();
        let mut reference = vec![0.0f32; n];
        for &ch in picks {
            let samples = signal.channel_data(ch)?;
            for (acc, &sample) in reference.iter_mut().zip(samples) {
                *acc += sample;
            }
        }
        let count = picks.len() as f32;
        for acc in reference.iter_mut() {
            *acc /= count;
        }

        for &ch in picks {
            let samples = signal.channel_data_mut(ch)?;
            for (sample, &avg) in samples.iter_mut().zip(&reference) {
                *sample -= avg;
            }
        }

        Ok(())
    }

    /// Flag channels where more than `artifact_fraction` of samples exceed
    /// the amplitude threshold. Channels are flagged, never removed.
    fn flag_amplitude_artifacts(&self, signal: &mut EegSignal, picks: &[usize]) -> EegResult<()> {
        let threshold = self.config.artifact_threshold_uv;
        let mut flagged = Vec::new();

        for &ch in picks {
            let samples = signal.channel_data(ch)?;
            let artifacts = samples.iter().filter(|s| s.abs() > threshold).count();
            if artifacts as f32 > samples.len() as f32 * self.config.artifact_fraction {
                flagged.push(signal.channels()[ch].name.clone());
            }
        }

        for name in flagged {
            signal.mark_bad(name);
        }

        Ok(())
    }

    /// Flag channels whose std-dev or peak-to-peak is a z-score outlier
    /// against the other channels
    fn flag_statistical_outliers(&self, signal: &mut EegSignal, picks: &[usize]) -> EegResult<()> {
        if picks.len() < 2 {
            return Ok(());
        }

        let stats: Vec<ChannelStats> = picks
            .iter()
            .map(|&ch| signal.channel_stats(ch))
            .collect::<EegResult<_>>()?;

        let std_devs: Vec<f32> = stats.iter().map(|s| s.std_dev).collect();
        let ranges: Vec<f32> = stats.iter().map(|s| s.peak_to_peak).collect();

        let zscores = |values: &[f32]| -> Vec<f32> {
            let n = values.len() as f32;
            let mean = values.iter().sum::<f32>() / n;
            let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f32>() / n;
            let sd = var.sqrt();
            if sd == 0.0 {
                vec![0.0; values.len()]
            } else {
                values.iter().map(|v| (v - mean) / sd).collect()
            }
        };

        let std_z = zscores(&std_devs);
        let range_z = zscores(&ranges);

        let mut flagged = Vec::new();
        for (i, &ch) in picks.iter().enumerate() {
            if std_z[i].abs() > self.config.zscore_threshold
                || range_z[i].abs() > self.config.zscore_threshold
            {
                flagged.push(signal.channels()[ch].name.clone());
            }
        }

        for name in flagged {
            signal.mark_bad(name);
        }

        Ok(())
    }

    /// Linear-interpolation resample of every channel to the target rate
    fn resample(&self, signal: &mut EegSignal, target: f32) -> EegResult<()> {
        if target <= 0.0 {
            return Err(eeg_core::EegError::config(format!(
                "resample target must be positive, got {}",
                target
            )));
        }

        let fs = signal.sampling_rate();
        let old_n = signal.samples_per_channel();
        let new_n = ((old_n as f32) * target / fs).round() as usize;
        if new_n < 2 {
            return Err(eeg_core::EegError::processing(
                "recording too short to resample at the target rate",
            ));
        }

        let channel_count = signal.channel_count();
        let mut resampled = Vec::with_capacity(new_n * channel_count);
        let scale = (old_n - 1) as f32 / (new_n - 1) as f32;

        for ch in 0..channel_count {
            let samples = signal.channel_data(ch)?;
            for i in 0..new_n {
                let position = i as f32 * scale;
                let index = (position.floor() as usize).min(old_n - 1);
                let frac = position - index as f32;
                let value = if index + 1 < old_n {
                    samples[index] + frac * (samples[index + 1] - samples[index])
                } else {
                    samples[index]
                };
                resampled.push(value);
            }
        }

        signal.replace_samples(resampled, target)
    }
}
