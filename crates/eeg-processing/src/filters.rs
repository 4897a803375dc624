//! Digital filters for EEG preprocessing
//!
//! Biquad sections designed per filter application. The recording is
//! complete when it reaches us, so filters run as whole-channel forward
//! passes with fresh state instead of streaming across calls.

use eeg_core::{EegError, EegResult};

/// Single biquad section (2nd order)
///
/// y[n] = b0*x[n] + b1*x[n-1] + b2*x[n-2] - a1*y[n-1] - a2*y[n-2]
#[derive(Debug, Clone)]
pub struct BiquadSection {
    b0: f32,
    b1: f32,
    b2: f32,
    a1: f32,
    a2: f32,
    // State for one forward pass
    x1: f32,
    x2: f32,
    y1: f32,
    y2: f32,
}

impl BiquadSection {
    fn from_coefficients(b0: f32, b1: f32, b2: f32, a1: f32, a2: f32) -> Self {
        BiquadSection {
            b0,
            b1,
            b2,
            a1,
            a2,
            x1: 0.0,
            x2: 0.0,
            y1: 0.0,
            y2: 0.0,
        }
    }

    /// Notch at `freq` with quality factor `q`, for powerline interference
    pub fn notch(freq: f32, q: f32, sampling_rate: f32) -> EegResult<Self> {
        if freq <= 0.0 || freq >= sampling_rate / 2.0 {
            return Err(EegError::config(format!(
                "notch frequency {}Hz must be below Nyquist ({}Hz)",
                freq,
                sampling_rate / 2.0
            )));
        }

        let omega = 2.0 * std::f32::consts::PI * freq / sampling_rate;
        let alpha = omega.sin() / (2.0 * q);
        let cos_omega = omega.cos();

        let a0 = 1.0 + alpha;
        Ok(Self::from_coefficients(
            1.0 / a0,
            -2.0 * cos_omega / a0,
            1.0 / a0,
            -2.0 * cos_omega / a0,
            (1.0 - alpha) / a0,
        ))
    }

    /// 2nd-order Butterworth lowpass
    pub fn butterworth_lowpass(cutoff: f32, sampling_rate: f32) -> EegResult<Self> {
        if cutoff <= 0.0 || cutoff >= sampling_rate / 2.0 {
            return Err(EegError::config(format!(
                "lowpass cutoff {}Hz must be below Nyquist ({}Hz)",
                cutoff,
                sampling_rate / 2.0
            )));
        }

        // Pre-warp frequency for bilinear transform
        let omega_c = 2.0 * std::f32::consts::PI * cutoff / sampling_rate;
        let k = (omega_c / 2.0).tan();

        let sqrt2 = std::f32::consts::SQRT_2;
        let k2 = k * k;
        let denom = k2 + sqrt2 * k + 1.0;

        let b0 = k2 / denom;
        Ok(Self::from_coefficients(
            b0,
            2.0 * b0,
            b0,
            (2.0 * (k2 - 1.0)) / denom,
            (k2 - sqrt2 * k + 1.0) / denom,
        ))
    }

    /// 2nd-order Butterworth highpass
    pub fn butterworth_highpass(cutoff: f32, sampling_rate: f32) -> EegResult<Self> {
        if cutoff <= 0.0 || cutoff >= sampling_rate / 2.0 {
            return Err(EegError::config(format!(
                "highpass cutoff {}Hz must be below Nyquist ({}Hz)",
                cutoff,
                sampling_rate / 2.0
            )));
        }

        let omega_c = 2.0 * std::f32::consts::PI * cutoff / sampling_rate;
        let k = (omega_c / 2.0).tan();

        let sqrt2 = std::f32::consts::SQRT_2;
        let k2 = k * k;
        let denom = k2 + sqrt2 * k + 1.0;

        let b0 = 1.0 / denom;
        Ok(Self::from_coefficients(
            b0,
            -2.0 * b0,
            b0,
            (2.0 * (k2 - 1.0)) / denom,
            (k2 - sqrt2 * k + 1.0) / denom,
        ))
    }

    fn process_sample(&mut self, input: f32) -> f32 {
        let output = self.b0 * input + self.b1 * self.x1 + self.b2 * self.x2
            - self.a1 * self.y1
            - self.a2 * self.y2;

        self.x2 = self.x1;
        self.x1 = input;
        self.y2 = self.y1;
        self.y1 = output;

        output
    }

    /// Run a forward pass over one channel in place
    pub fn apply(&mut self, samples: &mut [f32]) {
        for sample in samples.iter_mut() {
            *sample = self.process_sample(*sample);
        }
    }
}

/// Line-noise harmonics to notch out: the line frequency and its multiples
/// up to (but excluding) Nyquist.
pub fn notch_harmonics(line_freq: f32, sampling_rate: f32) -> Vec<f32> {
    let nyquist = sampling_rate / 2.0;
    let mut harmonics = Vec::new();
    let mut freq = line_freq;
    while freq < nyquist {
        harmonics.push(freq);
        freq += line_freq;
    }
    harmonics
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(freq: f32, sampling_rate: f32, n: usize) -> Vec<f32> {
        (0..n)
            .map(|i| (2.0 * std::f32::consts::PI * freq * i as f32 / sampling_rate).sin())
            .collect()
    }

    fn rms(data: &[f32]) -> f32 {
        (data.iter().map(|x| x * x).sum::<f32>() / data.len() as f32).sqrt()
    }

    #[test]
    fn test_notch_attenuates_line_frequency() {
        let fs = 250.0;
        let mut data = sine(50.0, fs, 2500);

        let mut filter = BiquadSection::notch(50.0, 30.0, fs).unwrap();
        filter.apply(&mut data);

        // Skip the transient, then the 50Hz tone should be mostly gone
        let settled = &data[500..];
        assert!(rms(settled) < 0.1, "rms after notch: {}", rms(settled));
    }

    #[test]
    fn test_notch_preserves_passband() {
        let fs = 250.0;
        let mut data = sine(10.0, fs, 2500);

        let mut filter = BiquadSection::notch(50.0, 30.0, fs).unwrap();
        filter.apply(&mut data);

        let settled = &data[500..];
        // 10Hz sine has rms 1/sqrt(2); the notch should barely touch it
        assert!((rms(settled) - 0.707).abs() < 0.05);
    }

    #[test]
    fn test_lowpass_attenuates_high_frequency() {
        let fs = 250.0;
        let mut data = sine(100.0, fs, 2500);

        let mut filter = BiquadSection::butterworth_lowpass(50.0, fs).unwrap();
        filter.apply(&mut data);

        let settled = &data[500..];
        assert!(rms(settled) < 0.2);
    }

    #[test]
    fn test_highpass_removes_drift() {
        let fs = 250.0;
        // Constant offset is 0Hz content
        let mut data = vec![5.0f32; 2500];

        let mut filter = BiquadSection::butterworth_highpass(0.5, fs).unwrap();
        filter.apply(&mut data);

        let settled = &data[1000..];
        assert!(rms(settled) < 0.5);
    }

    #[test]
    fn test_cutoff_above_nyquist_rejected() {
        assert!(BiquadSection::butterworth_lowpass(200.0, 250.0).is_err());
        assert!(BiquadSection::notch(125.0, 30.0, 250.0).is_err());
    }

    #[test]
    fn test_notch_harmonics() {
        assert_eq!(notch_harmonics(50.0, 250.0), vec![50.0, 100.0]);
        assert_eq!(notch_harmonics(60.0, 250.0), vec![60.0, 120.0]);
        // Nothing representable below Nyquist
        assert!(notch_harmonics(50.0, 80.0).is_empty());
    }
}
