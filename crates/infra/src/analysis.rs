//! Spectral measurement of rendered audio
//!
//! Hann-windowed FFT via `rustfft`, used to verify filter gain on real
//! signals rather than on the analytic transfer function.

use rustfft::{num_complex::Complex, FftPlanner};
use serde::Serialize;
use std::f64::consts::PI;

/// Bins either side of the target summed for a tone estimate.
///
/// Hann sidelobes are far enough down at this distance that the leakage
/// error stays below 0.1%.
const LOBE_BINS: usize = 4;

/// Floor for dB conversions
const SILENCE_DB: f32 = -120.0;

/// Measured level of one tone before and after processing
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ToneMeasurement {
    pub frequency_hz: f32,
    pub input_amplitude: f32,
    pub output_amplitude: f32,
    pub gain_db: f32,
}

impl ToneMeasurement {
    pub fn measure(input: &[f32], output: &[f32], sample_rate: f32, frequency_hz: f32) -> Self {
        let input_amplitude = tone_amplitude(input, sample_rate, frequency_hz);
        let output_amplitude = tone_amplitude(output, sample_rate, frequency_hz);
        Self {
            frequency_hz,
            input_amplitude,
            output_amplitude,
            gain_db: amplitude_ratio_db(output_amplitude, input_amplitude),
        }
    }
}

fn hann(index: usize, len: usize) -> f64 {
    0.5 * (1.0 - (2.0 * PI * index as f64 / len as f64).cos())
}

fn windowed_fft(samples: &[f32]) -> Vec<Complex<f64>> {
    let len = samples.len();
    let mut planner = FftPlanner::<f64>::new();
    let fft = planner.plan_fft_forward(len);

    let mut spectrum: Vec<Complex<f64>> = samples
        .iter()
        .enumerate()
        .map(|(i, &s)| Complex::new(s as f64 * hann(i, len), 0.0))
        .collect();
    fft.process(&mut spectrum);
    spectrum
}

/// Single-sided magnitude spectrum, scaled so a full-bin sine of amplitude
/// `a` peaks at `a`.
pub fn magnitude_spectrum(samples: &[f32]) -> Vec<f32> {
    if samples.is_empty() {
        return Vec::new();
    }

    let len = samples.len();
    let window_sum: f64 = (0..len).map(|i| hann(i, len)).sum();
    let spectrum = windowed_fft(samples);

    spectrum
        .iter()
        .take(len / 2 + 1)
        .map(|c| (2.0 * c.norm() / window_sum) as f32)
        .collect()
}

/// Amplitude of the sine component at `frequency_hz`.
///
/// Energy of the main lobe around the target bin is summed, so the result
/// does not depend on where the tone falls between bins.
pub fn tone_amplitude(samples: &[f32], sample_rate: f32, frequency_hz: f32) -> f32 {
    let len = samples.len();
    if len < 2 * LOBE_BINS + 1 || sample_rate <= 0.0 {
        return 0.0;
    }

    let window_power: f64 = (0..len).map(|i| hann(i, len).powi(2)).sum();
    let spectrum = windowed_fft(samples);

    let nyquist_bin = len / 2;
    let bin_hz = sample_rate as f64 / len as f64;
    let center = ((frequency_hz as f64 / bin_hz).round() as usize).min(nyquist_bin);
    let lo = center.saturating_sub(LOBE_BINS).max(1);
    let hi = (center + LOBE_BINS).min(nyquist_bin.saturating_sub(1));
    if lo > hi {
        return 0.0;
    }

    let energy: f64 = spectrum[lo..=hi].iter().map(|c| c.norm_sqr()).sum();
    (4.0 * energy / (len as f64 * window_power)).sqrt() as f32
}

/// Largest absolute sample value
pub fn peak_level(samples: &[f32]) -> f32 {
    samples.iter().fold(0.0f32, |acc, s| acc.max(s.abs()))
}

pub fn rms_level(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum: f64 = samples.iter().map(|&s| (s as f64).powi(2)).sum();
    (sum / samples.len() as f64).sqrt() as f32
}

/// `20 log10(output / input)`, floored for silent signals
pub fn amplitude_ratio_db(output: f32, input: f32) -> f32 {
    if input <= 0.0 || output <= 0.0 {
        return SILENCE_DB;
    }
    (20.0 * (output / input).log10()).max(SILENCE_DB)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::sine;

    #[test]
    fn test_tone_amplitude_on_bin() {
        // 48000 / 4800 = 10 Hz bins, 1 kHz lands on bin 100
        let samples = sine(1000.0, 48000.0, 4800, 0.8);
        let amplitude = tone_amplitude(&samples, 48000.0, 1000.0);
        assert!((amplitude - 0.8).abs() < 0.005, "amplitude {}", amplitude);
    }

    #[test]
    fn test_tone_amplitude_between_bins() {
        let samples = sine(1003.7, 44100.0, 8192, 0.5);
        let amplitude = tone_amplitude(&samples, 44100.0, 1003.7);
        assert!((amplitude - 0.5).abs() < 0.005, "amplitude {}", amplitude);
    }

    #[test]
    fn test_tone_amplitude_ignores_other_tones() {
        let a = sine(200.0, 48000.0, 9600, 0.5);
        let b = sine(5000.0, 48000.0, 9600, 0.25);
        let mixed: Vec<f32> = a.iter().zip(&b).map(|(x, y)| x + y).collect();

        assert!((tone_amplitude(&mixed, 48000.0, 200.0) - 0.5).abs() < 0.005);
        assert!((tone_amplitude(&mixed, 48000.0, 5000.0) - 0.25).abs() < 0.005);
    }

    #[test]
    fn test_magnitude_spectrum_peak() {
        let samples = sine(1000.0, 48000.0, 4800, 1.0);
        let spectrum = magnitude_spectrum(&samples);
        assert_eq!(spectrum.len(), 2401);
        assert!((spectrum[100] - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_levels() {
        assert_eq!(peak_level(&[0.1, -0.7, 0.3]), 0.7);
        assert!((rms_level(&[1.0, -1.0, 1.0, -1.0]) - 1.0).abs() < 1e-6);
        assert_eq!(rms_level(&[]), 0.0);
    }

    #[test]
    fn test_ratio_db() {
        assert!((amplitude_ratio_db(2.0, 1.0) - 6.0206).abs() < 1e-3);
        assert_eq!(amplitude_ratio_db(0.0, 1.0), SILENCE_DB);
    }
}
