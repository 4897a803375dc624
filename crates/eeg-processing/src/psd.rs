//! Welch power-spectral-density estimation
//!
//! Windowed periodogram averaging over Hann-tapered segments, the estimate
//! behind every band-power feature.

use eeg_core::{EegError, EegResult};
use realfft::RealFftPlanner;

/// Welch PSD over one channel.
///
/// Splits `samples` into `window_len`-sample segments advancing by
/// `window_len - overlap`, tapers each with a Hann window, and averages the
/// one-sided periodograms. Returns `(frequencies, density)`; density units
/// are amplitude²/Hz. A recording shorter than one window is estimated as a
/// single segment.
pub fn welch_psd(
    samples: &[f32],
    sampling_rate: f32,
    window_len: usize,
    overlap: usize,
) -> EegResult<(Vec<f32>, Vec<f32>)> {
    if samples.is_empty() {
        return Err(EegError::processing("cannot estimate PSD of empty channel"));
    }
    if sampling_rate <= 0.0 {
        return Err(EegError::processing("sampling rate must be positive"));
    }

    let window_len = window_len.min(samples.len()).max(2);
    let overlap = overlap.min(window_len - 1);
    let step = window_len - overlap;

    // Hann taper and its power for density normalization
    let window: Vec<f32> = (0..window_len)
        .map(|i| {
            let phase = 2.0 * std::f32::consts::PI * i as f32 / (window_len - 1) as f32;
            0.5 * (1.0 - phase.cos())
        })
        .collect();
    let window_power: f32 = window.iter().map(|w| w * w).sum();

    let mut planner = RealFftPlanner::<f32>::new();
    let fft = planner.plan_fft_forward(window_len);

    let n_bins = window_len / 2 + 1;
    let mut accumulated = vec![0.0f32; n_bins];
    let mut segment_count = 0usize;

    let mut input = fft.make_input_vec();
    let mut spectrum = fft.make_output_vec();

    let mut start = 0;
    while start + window_len <= samples.len() {
        for (i, slot) in input.iter_mut().enumerate() {
            *slot = samples[start + i] * window[i];
        }

        fft.process(&mut input, &mut spectrum)
            .map_err(|e| EegError::processing(format!("FFT failed: {}", e)))?;

        for (bin, value) in spectrum.iter().enumerate() {
            accumulated[bin] += value.norm_sqr();
        }

        segment_count += 1;
        start += step;
    }

    if segment_count == 0 {
        return Err(EegError::processing("no complete PSD segment in recording"));
    }

    // One-sided density: double every bin except DC and (for even lengths)
    // Nyquist
    let norm = 1.0 / (segment_count as f32 * sampling_rate * window_power);
    let mut density = Vec::with_capacity(n_bins);
    for (bin, &power) in accumulated.iter().enumerate() {
        let one_sided = if bin == 0 || (window_len % 2 == 0 && bin == n_bins - 1) {
            1.0
        } else {
            2.0
        };
        density.push(power * norm * one_sided);
    }

    let freqs: Vec<f32> = (0..n_bins)
        .map(|bin| bin as f32 * sampling_rate / window_len as f32)
        .collect();

    Ok((freqs, density))
}
