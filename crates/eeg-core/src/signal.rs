//! EegSignal: core container for a multichannel EEG recording

use crate::error::{EegError, EegResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Channel modality. Only `Eeg` channels participate in band/feature math;
/// everything else is carried through the pipeline untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChannelKind {
    Eeg,
    Eog,
    Ecg,
    Emg,
    Stim,
    Misc,
}

/// Per-channel metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelInfo {
    pub name: String,
    pub kind: ChannelKind,
}

impl ChannelInfo {
    pub fn new(name: impl Into<String>, kind: ChannelKind) -> Self {
        ChannelInfo { name: name.into(), kind }
    }

    /// Shorthand for the common case
    pub fn eeg(name: impl Into<String>) -> Self {
        Self::new(name, ChannelKind::Eeg)
    }
}

/// A complete, already-acquired recording: channels × samples matrix in
/// channel-major order, amplitudes in microvolts.
///
/// Transforms never mutate a signal in place; they clone and return a new
/// one, with the bad-channel set carried along.
#[derive(Debug, Clone)]
pub struct EegSignal {
    /// Sample data, channel-major (all of channel 0, then channel 1, ...)
    data: Vec<f32>,
    channels: Vec<ChannelInfo>,
    sampling_rate: f32,
    bad_channels: BTreeSet<String>,
}

impl EegSignal {
    /// Create a new signal, validating the data length against the channel
    /// count.
    pub fn new(data: Vec<f32>, channels: Vec<ChannelInfo>, sampling_rate: f32) -> EegResult<Self> {
        if channels.is_empty() {
            return Err(EegError::invalid_signal("signal has no channels"));
        }
        if sampling_rate <= 0.0 {
            return Err(EegError::invalid_signal(format!(
                "sampling rate must be positive, got {}",
                sampling_rate
            )));
        }
        if data.len() % channels.len() != 0 {
            return Err(EegError::invalid_signal(format!(
                "data length {} is not a multiple of channel count {}",
                data.len(),
                channels.len()
            )));
        }

        Ok(EegSignal {
            data,
            channels,
            sampling_rate,
            bad_channels: BTreeSet::new(),
        })
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    pub fn samples_per_channel(&self) -> usize {
        self.data.len() / self.channels.len()
    }

    pub fn sampling_rate(&self) -> f32 {
        self.sampling_rate
    }

    /// Signal duration in seconds
    pub fn duration(&self) -> f32 {
        self.samples_per_channel() as f32 / self.sampling_rate
    }

    pub fn channels(&self) -> &[ChannelInfo] {
        &self.channels
    }

    pub fn channel_index(&self, name: &str) -> Option<usize> {
        self.channels.iter().position(|ch| ch.name == name)
    }

    /// Borrow the samples of one channel
    pub fn channel_data(&self, channel_index: usize) -> EegResult<&[f32]> {
        if channel_index >= self.channels.len() {
            return Err(EegError::invalid_signal(format!(
                "channel index {} out of bounds (0-{})",
                channel_index,
                self.channels.len() - 1
            )));
        }
        let n = self.samples_per_channel();
        Ok(&self.data[channel_index * n..(channel_index + 1) * n])
    }

    /// Mutably borrow the samples of one channel
    pub fn channel_data_mut(&mut self, channel_index: usize) -> EegResult<&mut [f32]> {
        if channel_index >= self.channels.len() {
            return Err(EegError::invalid_signal(format!(
                "channel index {} out of bounds (0-{})",
                channel_index,
                self.channels.len() - 1
            )));
        }
        let n = self.data.len() / self.channels.len();
        Ok(&mut self.data[channel_index * n..(channel_index + 1) * n])
    }

    /// Indices of EEG-typed channels that are not flagged bad, in channel
    /// order. This is the set every band/feature computation runs over.
    pub fn eeg_picks(&self) -> Vec<usize> {
        self.channels
            .iter()
            .enumerate()
            .filter(|(_, ch)| ch.kind == ChannelKind::Eeg && !self.bad_channels.contains(&ch.name))
            .map(|(i, _)| i)
            .collect()
    }

    pub fn is_bad(&self, name: &str) -> bool {
        self.bad_channels.contains(name)
    }

    /// Flag a channel as bad. Flagged channels stay in the matrix; they are
    /// only excluded from picks.
    pub fn mark_bad(&mut self, name: impl Into<String>) {
        self.bad_channels.insert(name.into());
    }

    pub fn bad_channels(&self) -> &BTreeSet<String> {
        &self.bad_channels
    }

    /// Replace the sample matrix, e.g. after resampling. The new data must
    /// still be a multiple of the channel count.
    pub fn replace_samples(&mut self, data: Vec<f32>, sampling_rate: f32) -> EegResult<()> {
        if data.len() % self.channels.len() != 0 {
            return Err(EegError::invalid_signal(format!(
                "replacement data length {} is not a multiple of channel count {}",
                data.len(),
                self.channels.len()
            )));
        }
        if sampling_rate <= 0.0 {
            return Err(EegError::invalid_signal("sampling rate must be positive"));
        }
        self.data = data;
        self.sampling_rate = sampling_rate;
        Ok(())
    }

    /// Basic amplitude statistics for a channel
    pub fn channel_stats(&self, channel_index: usize) -> EegResult<ChannelStats> {
        let data = self.channel_data(channel_index)?;
        Ok(ChannelStats::calculate(data))
    }
}

/// Basic statistics for one channel's samples
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelStats {
    pub mean: f32,
    pub rms: f32,
    pub std_dev: f32,
    pub min: f32,
    pub max: f32,
    pub peak_to_peak: f32,
}

impl ChannelStats {
    pub fn calculate(data: &[f32]) -> Self {
        if data.is_empty() {
            return Self {
                mean: 0.0,
                rms: 0.0,
                std_dev: 0.0,
                min: 0.0,
                max: 0.0,
                peak_to_peak: 0.0,
            };
        }

        let n = data.len() as f32;
        let mean = data.iter().sum::<f32>() / n;
        let rms = (data.iter().map(|x| x * x).sum::<f32>() / n).sqrt();
        let variance = data.iter().map(|x| (x - mean).powi(2)).sum::<f32>() / n;
        let std_dev = variance.sqrt();
        let min = data.iter().fold(f32::INFINITY, |a, &b| a.min(b));
        let max = data.iter().fold(f32::NEG_INFINITY, |a, &b| a.max(b));

        Self {
            mean,
            rms,
            std_dev,
            min,
            max,
            peak_to_peak: max - min,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn four_channel_signal() -> EegSignal {
        let channels = vec![
            ChannelInfo::eeg("Fp1"),
            ChannelInfo::eeg("Fp2"),
            ChannelInfo::eeg("C3"),
            ChannelInfo::eeg("C4"),
        ];
        let data = (0..4000).map(|i| i as f32).collect();
        EegSignal::new(data, channels, 250.0).unwrap()
    }

    #[test]
    fn test_signal_creation() {
        let signal = four_channel_signal();
        assert_eq!(signal.channel_count(), 4);
        assert_eq!(signal.samples_per_channel(), 1000);
        assert_eq!(signal.duration(), 4.0);
    }

    #[test]
    fn test_channel_major_layout() {
        let signal = four_channel_signal();
        let ch0 = signal.channel_data(0).unwrap();
        let ch1 = signal.channel_data(1).unwrap();

        assert_eq!(ch0[0], 0.0);
        assert_eq!(ch0[999], 999.0);
        assert_eq!(ch1[0], 1000.0);
    }

    #[test]
    fn test_length_validation() {
        let channels = vec![ChannelInfo::eeg("Fp1"), ChannelInfo::eeg("Fp2")];
        let result = EegSignal::new(vec![0.0; 999], channels, 250.0);
        assert!(result.is_err());
    }

    #[test]
    fn test_bad_channel_excluded_from_picks() {
        let mut signal = four_channel_signal();
        assert_eq!(signal.eeg_picks(), vec![0, 1, 2, 3]);

        signal.mark_bad("C3");
        assert_eq!(signal.eeg_picks(), vec![0, 1, 3]);
        assert!(signal.is_bad("C3"));
        // The channel itself is still present
        assert_eq!(signal.channel_count(), 4);
    }

    #[test]
    fn test_non_eeg_channel_excluded() {
        let channels = vec![
            ChannelInfo::eeg("Fp1"),
            ChannelInfo::new("HEOG", ChannelKind::Eog),
        ];
        let signal = EegSignal::new(vec![0.0; 200], channels, 100.0).unwrap();
        assert_eq!(signal.eeg_picks(), vec![0]);
    }

    #[test]
    fn test_channel_stats() {
        let channels = vec![ChannelInfo::eeg("Cz")];
        let signal = EegSignal::new(vec![1.0, -1.0, 1.0, -1.0], channels, 4.0).unwrap();
        let stats = signal.channel_stats(0).unwrap();

        assert_eq!(stats.mean, 0.0);
        assert_eq!(stats.rms, 1.0);
        assert_eq!(stats.peak_to_peak, 2.0);
    }
}
