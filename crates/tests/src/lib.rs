//! Cross-crate integration tests for Multiband
//!
//! The helpers here build a configured host and run whole signals through
//! it; the test modules drive the processor end to end.

use multiband_core::domain::{BusLayout, ParamId, ParameterSet};
use multiband_infra::{render_offline, HostSettings, PluginHost};
use std::sync::Arc;

#[cfg(test)]
mod peak_integration;
#[cfg(test)]
mod preset_integration;

/// Peak settings applied before a render
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PeakSettings {
    pub freq_hz: f32,
    pub gain_db: f32,
    pub quality: f32,
}

impl PeakSettings {
    pub fn new(freq_hz: f32, gain_db: f32, quality: f32) -> Self {
        Self {
            freq_hz,
            gain_db,
            quality,
        }
    }

    pub fn apply(&self, params: &ParameterSet) {
        params.set(ParamId::PeakFreq, self.freq_hz);
        params.set(ParamId::PeakGain, self.gain_db);
        params.set(ParamId::PeakQuality, self.quality);
    }
}

/// A host prepared for `layout` with the given peak settings
pub fn configured_host(
    layout: BusLayout,
    sample_rate: f32,
    block_size: usize,
    peak: PeakSettings,
) -> PluginHost {
    let params = Arc::new(ParameterSet::new());
    peak.apply(&params);

    let mut host = PluginHost::with_parameters(params);
    if let Err(e) = host.configure(HostSettings::new(layout, sample_rate, block_size)) {
        panic!("test host rejected configuration: {}", e);
    }
    host
}

/// Render a stereo signal (same input on both channels) in one call
pub fn render_stereo(
    input: &[f32],
    sample_rate: f32,
    block_size: usize,
    peak: PeakSettings,
) -> Vec<Vec<f32>> {
    let mut host = configured_host(BusLayout::STEREO, sample_rate, block_size, peak);
    match render_offline(&mut host, &[input.to_vec(), input.to_vec()]) {
        Ok(output) => output,
        Err(e) => panic!("render failed: {}", e),
    }
}
