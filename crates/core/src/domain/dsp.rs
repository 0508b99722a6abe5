//! Peak filter signal processing
//!
//! This module provides:
//! - RBJ peak (bell) coefficient synthesis from Hz, dB and Q
//! - A Direct Form I biquad that carries its own delay line
//! - `ChainSettings`, the per-block snapshot of the consumed parameters
//!
//! Everything reachable from `BiquadCoeffs::peak` and `BiquadFilter::process`
//! is allocation-free and lock-free so it can run on the audio thread.

use crate::domain::parameters::{ParamId, ParameterSet};
use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Parameter constraints for the peak filter
///
/// Out-of-range inputs are clamped to these values instead of being reported,
/// the audio thread has nowhere to send an error.
pub mod params {
    /// Decibel range of every gain parameter
    pub const GAIN_DB_MIN: f32 = -24.0;
    pub const GAIN_DB_MAX: f32 = 24.0;

    /// Host-facing frequency range (Hz)
    pub const FREQ_PARAM_MIN: f32 = 20.0;
    pub const FREQ_PARAM_MAX: f32 = 20000.0;

    /// Host-facing Q range
    pub const Q_PARAM_MIN: f32 = 0.1;
    pub const Q_PARAM_MAX: f32 = 10.0;

    pub const DEFAULT_PEAK_FREQ_HZ: f32 = 1000.0;
    pub const DEFAULT_PEAK_QUALITY: f32 = 1.0;

    /// Synthesis limits, wider than the parameter ranges
    pub const MIN_FREQ_HZ: f64 = 10.0;
    /// Highest center frequency as a fraction of the sample rate (just below Nyquist)
    pub const MAX_FREQ_RATIO: f64 = 0.49;
    pub const MIN_Q: f64 = 0.01;
    pub const MAX_PEAK_GAIN_DB: f64 = 48.0;
}

/// Convert decibels to a linear amplitude factor
#[inline]
pub fn decibels_to_gain(db: f32) -> f32 {
    10.0_f32.powf(db / 20.0)
}

/// Convert a linear amplitude factor to decibels (floored at -100 dB)
#[inline]
pub fn gain_to_decibels(gain: f32) -> f32 {
    if gain <= 1e-5 {
        -100.0
    } else {
        20.0 * gain.log10()
    }
}

/// Snapshot of the parameters consumed by the filter chain
///
/// Built fresh for every block and never mutated afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChainSettings {
    pub peak_freq_hz: f32,
    pub peak_gain_db: f32,
    pub peak_quality: f32,
}

impl ChainSettings {
    /// Read the current parameter values, one relaxed atomic load each.
    #[inline]
    pub fn from_parameters(params: &ParameterSet) -> Self {
        Self {
            peak_freq_hz: params.value(ParamId::PeakFreq),
            peak_gain_db: params.value(ParamId::PeakGain),
            peak_quality: params.value(ParamId::PeakQuality),
        }
    }
}

impl Default for ChainSettings {
    fn default() -> Self {
        Self {
            peak_freq_hz: params::DEFAULT_PEAK_FREQ_HZ,
            peak_gain_db: 0.0,
            peak_quality: params::DEFAULT_PEAK_QUALITY,
        }
    }
}

// ============================================================================
// BIQUAD COEFFICIENTS
// ============================================================================

/// Biquad filter coefficients
///
/// Transfer function: H(z) = (b0 + b1*z^-1 + b2*z^-2) / (1 + a1*z^-1 + a2*z^-2)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BiquadCoeffs {
    /// Numerator coefficients
    pub b0: f32,
    pub b1: f32,
    pub b2: f32,
    /// Denominator coefficients (a0 is normalized to 1.0)
    pub a1: f32,
    pub a2: f32,
}

impl Default for BiquadCoeffs {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl BiquadCoeffs {
    /// Unity gain (no filtering)
    pub const IDENTITY: BiquadCoeffs = BiquadCoeffs {
        b0: 1.0,
        b1: 0.0,
        b2: 0.0,
        a1: 0.0,
        a2: 0.0,
    };

    /// Peak filter for the given chain settings.
    #[must_use]
    #[inline]
    pub fn peak(sample_rate: f32, settings: &ChainSettings) -> Self {
        Self::peaking(
            sample_rate,
            settings.peak_freq_hz,
            settings.peak_gain_db,
            settings.peak_quality,
        )
    }

    /// Calculate coefficients for a peaking EQ filter
    ///
    /// Boosts or cuts frequencies around a center frequency (Audio EQ
    /// Cookbook). Computed in f64 and stored as f32.
    ///
    /// # Parameters
    /// - `sample_rate`: must be positive, otherwise the identity is returned
    /// - `freq`: center frequency in Hz, clamped just below Nyquist
    /// - `gain_db`: boost/cut at the center frequency
    /// - `q`: quality factor, clamped to a small positive minimum
    #[must_use]
    pub fn peaking(sample_rate: f32, freq: f32, gain_db: f32, q: f32) -> Self {
        if !(sample_rate.is_finite() && sample_rate > 0.0) {
            return Self::IDENTITY;
        }
        let fs = sample_rate as f64;

        let freq = if freq.is_finite() {
            freq as f64
        } else {
            params::DEFAULT_PEAK_FREQ_HZ as f64
        };
        let freq = freq.clamp(params::MIN_FREQ_HZ, fs * params::MAX_FREQ_RATIO);

        let q = if q.is_finite() {
            q as f64
        } else {
            params::DEFAULT_PEAK_QUALITY as f64
        };
        let q = q.max(params::MIN_Q);

        let gain_db = if gain_db.is_finite() { gain_db as f64 } else { 0.0 };
        let gain_db = gain_db.clamp(-params::MAX_PEAK_GAIN_DB, params::MAX_PEAK_GAIN_DB);

        // A = sqrt(10^(dB/20))
        let gain_linear = 10.0_f64.powf(gain_db / 20.0);
        let a = gain_linear.sqrt();

        let w0 = 2.0 * PI * freq / fs;
        let cos_w0 = w0.cos();
        let alpha = w0.sin() / (2.0 * q);

        let b0 = 1.0 + alpha * a;
        let b1 = -2.0 * cos_w0;
        let b2 = 1.0 - alpha * a;

        let a0 = 1.0 + alpha / a;
        let a1 = -2.0 * cos_w0;
        let a2 = 1.0 - alpha / a;

        Self {
            b0: (b0 / a0) as f32,
            b1: (b1 / a0) as f32,
            b2: (b2 / a0) as f32,
            a1: (a1 / a0) as f32,
            a2: (a2 / a0) as f32,
        }
    }

    /// Magnitude response |H(e^jw)| at `freq` Hz
    pub fn magnitude_at(&self, freq: f32, sample_rate: f32) -> f32 {
        if sample_rate <= 0.0 {
            return 1.0;
        }
        let w = 2.0 * PI * freq as f64 / sample_rate as f64;
        let z1 = Complex64::from_polar(1.0, -w);
        let z2 = z1 * z1;

        let numerator = self.b0 as f64 + self.b1 as f64 * z1 + self.b2 as f64 * z2;
        let denominator = 1.0 + self.a1 as f64 * z1 + self.a2 as f64 * z2;

        (numerator / denominator).norm() as f32
    }

    /// Magnitude response in dB at `freq` Hz
    pub fn magnitude_db_at(&self, freq: f32, sample_rate: f32) -> f32 {
        gain_to_decibels(self.magnitude_at(freq, sample_rate))
    }

    /// Log-spaced `(frequency, dB)` pairs from 20 Hz to 20 kHz (capped at Nyquist)
    pub fn response_curve(&self, sample_rate: f32, points: usize) -> Vec<(f32, f32)> {
        let low = params::FREQ_PARAM_MIN as f64;
        let high = (params::FREQ_PARAM_MAX as f64).min(sample_rate as f64 * 0.5);
        if points == 0 || high <= low {
            return Vec::new();
        }
        let ratio = high / low;

        (0..points)
            .map(|i| {
                let t = if points == 1 {
                    0.0
                } else {
                    i as f64 / (points - 1) as f64
                };
                let freq = (low * ratio.powf(t)) as f32;
                (freq, self.magnitude_db_at(freq, sample_rate))
            })
            .collect()
    }

    /// True when every coefficient is finite and the poles lie inside the unit circle
    pub fn is_stable(&self) -> bool {
        let all_finite = [self.b0, self.b1, self.b2, self.a1, self.a2]
            .iter()
            .all(|c| c.is_finite());
        // Jury criterion for a monic second order denominator
        all_finite && self.a2.abs() < 1.0 && self.a1.abs() < 1.0 + self.a2
    }
}

// ============================================================================
// BIQUAD FILTER
// ============================================================================

/// Stateful biquad filter using Direct Form I
///
/// Direct Form I keeps the input history separate from the output history,
/// so swapping coefficients between blocks does not disturb the stored
/// samples.
#[derive(Debug, Clone, PartialEq)]
pub struct BiquadFilter {
    coeffs: BiquadCoeffs,
    // Previous input samples (x[n-1], x[n-2])
    x1: f32,
    x2: f32,
    // Previous output samples (y[n-1], y[n-2])
    y1: f32,
    y2: f32,
}

impl BiquadFilter {
    /// Create a new biquad filter with given coefficients
    pub fn new(coeffs: BiquadCoeffs) -> Self {
        Self {
            coeffs,
            x1: 0.0,
            x2: 0.0,
            y1: 0.0,
            y2: 0.0,
        }
    }

    /// Create a bypass filter (unity gain)
    pub fn bypass() -> Self {
        Self::new(BiquadCoeffs::IDENTITY)
    }

    pub fn coefficients(&self) -> &BiquadCoeffs {
        &self.coeffs
    }

    /// Install a new coefficient set as one value.
    ///
    /// The delay line is kept.
    #[inline]
    pub fn replace_coefficients(&mut self, coeffs: BiquadCoeffs) {
        self.coeffs = coeffs;
    }

    /// Process a single sample
    #[inline]
    pub fn process_sample(&mut self, x: f32) -> f32 {
        // Direct Form I: y[n] = b0*x[n] + b1*x[n-1] + b2*x[n-2]
        //                        - a1*y[n-1] - a2*y[n-2]
        let y = self.coeffs.b0 * x + self.coeffs.b1 * self.x1 + self.coeffs.b2 * self.x2
            - self.coeffs.a1 * self.y1
            - self.coeffs.a2 * self.y2;

        self.x2 = self.x1;
        self.x1 = x;
        self.y2 = self.y1;
        self.y1 = y;

        y
    }

    /// Process a buffer of samples in place
    pub fn process(&mut self, buffer: &mut [f32]) {
        for sample in buffer.iter_mut() {
            *sample = self.process_sample(*sample);
        }
        self.flush_denormals();
    }

    /// Reset filter state
    pub fn reset(&mut self) {
        self.x1 = 0.0;
        self.x2 = 0.0;
        self.y1 = 0.0;
        self.y2 = 0.0;
    }

    /// True when the delay line holds only zeros
    pub fn is_silent(&self) -> bool {
        self.x1 == 0.0 && self.x2 == 0.0 && self.y1 == 0.0 && self.y2 == 0.0
    }

    #[inline]
    fn flush_denormals(&mut self) {
        for state in [&mut self.x1, &mut self.x2, &mut self.y1, &mut self.y2] {
            if state.is_subnormal() {
                *state = 0.0;
            }
        }
    }
}

impl Default for BiquadFilter {
    fn default() -> Self {
        Self::bypass()
    }
}

// ============================================================================
// TESTS
// ============================================================================
