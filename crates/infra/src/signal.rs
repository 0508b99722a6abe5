//! Test signal generation

use serde::{Deserialize, Serialize};
use std::f64::consts::TAU;

/// Phase-accumulating sine oscillator
///
/// Allocation-free, so it can feed the processor from inside an audio
/// callback.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SineOscillator {
    phase: f64,
    increment: f64,
    amplitude: f32,
}

impl SineOscillator {
    pub fn new(frequency: f32, sample_rate: f32, amplitude: f32) -> Self {
        let increment = if sample_rate > 0.0 {
            frequency as f64 / sample_rate as f64
        } else {
            0.0
        };
        Self {
            phase: 0.0,
            increment,
            amplitude,
        }
    }

    #[inline]
    pub fn next_sample(&mut self) -> f32 {
        let sample = (self.phase * TAU).sin() as f32 * self.amplitude;
        self.phase = (self.phase + self.increment).fract();
        sample
    }

    pub fn fill(&mut self, buffer: &mut [f32]) {
        for sample in buffer.iter_mut() {
            *sample = self.next_sample();
        }
    }

    /// Fill an interleaved buffer with the same sample on every channel
    pub fn fill_interleaved(&mut self, buffer: &mut [f32], channels: usize) {
        if channels == 0 {
            return;
        }
        for frame in buffer.chunks_mut(channels) {
            let sample = self.next_sample();
            frame.fill(sample);
        }
    }
}

/// `num_samples` of a sine at `frequency`
pub fn sine(frequency: f32, sample_rate: f32, num_samples: usize, amplitude: f32) -> Vec<f32> {
    let mut osc = SineOscillator::new(frequency, sample_rate, amplitude);
    let mut samples = vec![0.0; num_samples];
    osc.fill(&mut samples);
    samples
}

/// Exponential sine sweep from `start_hz` to `end_hz`
pub fn log_sweep(start_hz: f32, end_hz: f32, sample_rate: f32, num_samples: usize) -> Vec<f32> {
    if num_samples == 0 || sample_rate <= 0.0 || start_hz <= 0.0 || end_hz <= 0.0 {
        return vec![0.0; num_samples];
    }

    let duration = num_samples as f64 / sample_rate as f64;
    let start = start_hz as f64;
    let ratio = (end_hz as f64 / start).ln();

    (0..num_samples)
        .map(|i| {
            let t = i as f64 / sample_rate as f64;
            let phase = if ratio.abs() < f64::EPSILON {
                TAU * start * t
            } else {
                TAU * start * duration / ratio * ((t / duration * ratio).exp() - 1.0)
            };
            phase.sin() as f32
        })
        .collect()
}

/// Unit impulse followed by silence
pub fn impulse(num_samples: usize) -> Vec<f32> {
    let mut samples = vec![0.0; num_samples];
    if let Some(first) = samples.first_mut() {
        *first = 1.0;
    }
    samples
}
