//! Plugin host integration
//!
//! `PluginHost` plays the role a DAW plays for the processor: it negotiates
//! the bus layout, prepares the processor, converts between interleaved
//! device buffers and the planar buffer the processor works on, and splits
//! long buffers into blocks no larger than the prepared maximum.

use multiband_core::domain::{
    AudioBuffer, AudioError, BusLayout, ParameterSet, PeakProcessor,
};
use std::sync::Arc;
use tracing::{debug, info};

type Result<T> = std::result::Result<T, AudioError>;

/// Stream format the host runs the processor with
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HostSettings {
    pub layout: BusLayout,
    pub sample_rate: f32,
    pub max_block_size: usize,
    /// Channels in the buffers the host hands over.
    ///
    /// May exceed the bus width; the extra channels come back silent.
    pub buffer_channels: usize,
}

impl HostSettings {
    pub fn new(layout: BusLayout, sample_rate: f32, max_block_size: usize) -> Self {
        Self {
            layout,
            sample_rate,
            max_block_size,
            buffer_channels: layout.num_output_channels(),
        }
    }

    pub fn with_buffer_channels(mut self, buffer_channels: usize) -> Self {
        self.buffer_channels = buffer_channels;
        self
    }

    fn validate(&self) -> Result<()> {
        if !(self.sample_rate.is_finite() && self.sample_rate > 0.0) {
            return Err(AudioError::InvalidConfiguration(format!(
                "sample rate must be positive, got {}",
                self.sample_rate
            )));
        }
        if self.max_block_size == 0 {
            return Err(AudioError::InvalidConfiguration(
                "max block size must be positive".to_string(),
            ));
        }
        if self.buffer_channels < self.layout.num_output_channels() {
            return Err(AudioError::InvalidConfiguration(format!(
                "{} buffer channels cannot carry a {}-channel bus",
                self.buffer_channels,
                self.layout.num_output_channels()
            )));
        }
        Ok(())
    }
}

/// Drives a [`PeakProcessor`] the way a plugin host would
pub struct PluginHost {
    processor: PeakProcessor,
    settings: Option<HostSettings>,
    scratch: AudioBuffer,
}

impl PluginHost {
    pub fn new(processor: PeakProcessor) -> Self {
        Self {
            processor,
            settings: None,
            scratch: AudioBuffer::new(0, 0),
        }
    }

    /// Host with a fresh processor on the given parameter set
    pub fn with_parameters(params: Arc<ParameterSet>) -> Self {
        Self::new(PeakProcessor::with_parameters(params))
    }

    /// Negotiate the layout and prepare the processor.
    ///
    /// Unsupported layouts are rejected here, before the processor sees a
    /// single block. Reconfiguring resets all filter state.
    pub fn configure(&mut self, settings: HostSettings) -> Result<()> {
        settings.validate()?;
        if !self.processor.is_bus_layout_supported(&settings.layout) {
            return Err(AudioError::UnsupportedLayout(format!(
                "{:?} in, {:?} out",
                settings.layout.input, settings.layout.output
            )));
        }

        self.processor.set_bus_layout(settings.layout)?;
        self.processor
            .prepare(settings.sample_rate, settings.max_block_size);
        self.scratch
            .resize(settings.buffer_channels, settings.max_block_size);
        self.settings = Some(settings);

        info!(
            sample_rate = settings.sample_rate,
            max_block_size = settings.max_block_size,
            channels = settings.buffer_channels,
            "Host configured"
        );
        Ok(())
    }

    /// Stop playback. `configure` must run again before processing.
    pub fn suspend(&mut self) {
        self.processor.release_resources();
        self.settings = None;
        debug!("Host suspended");
    }

    pub fn settings(&self) -> Option<&HostSettings> {
        self.settings.as_ref()
    }

    pub fn is_active(&self) -> bool {
        self.settings.is_some()
    }

    pub fn processor(&self) -> &PeakProcessor {
        &self.processor
    }

    pub fn processor_mut(&mut self) -> &mut PeakProcessor {
        &mut self.processor
    }

    pub fn parameters(&self) -> &Arc<ParameterSet> {
        self.processor.parameters()
    }

    /// Process an interleaved buffer in place.
    ///
    /// Trailing samples that do not fill a whole frame are left untouched.
    /// Does nothing while the host is not configured.
    pub fn process_interleaved(&mut self, data: &mut [f32]) {
        let Some(settings) = self.settings else {
            return;
        };
        let channels = settings.buffer_channels;
        if channels == 0 {
            return;
        }

        let frames = data.len() / channels;
        let mut start = 0;
        while start < frames {
            let len = settings.max_block_size.min(frames - start);
            let block = &mut data[start * channels..(start + len) * channels];

            self.scratch.set_num_samples(len);
            for (frame_index, frame) in block.chunks_exact(channels).enumerate() {
                for (channel, &sample) in frame.iter().enumerate() {
                    self.scratch.channel_mut(channel)[frame_index] = sample;
                }
            }

            self.processor.process_block(&mut self.scratch);

            for (frame_index, frame) in block.chunks_exact_mut(channels).enumerate() {
                for (channel, sample) in frame.iter_mut().enumerate() {
                    *sample = self.scratch.channel(channel)[frame_index];
                }
            }

            start += len;
        }
    }

    /// Process planar channels in place.
    ///
    /// Every channel must be the same length, and there must be exactly
    /// `buffer_channels` of them.
    pub fn process_planar(&mut self, channels: &mut [Vec<f32>]) -> Result<()> {
        let settings = self.settings.ok_or_else(|| {
            AudioError::InvalidConfiguration("host is not configured".to_string())
        })?;
        if channels.len() != settings.buffer_channels {
            return Err(AudioError::InvalidConfiguration(format!(
                "expected {} channels, got {}",
                settings.buffer_channels,
                channels.len()
            )));
        }
        let frames = channels.first().map(Vec::len).unwrap_or(0);
        if channels.iter().any(|channel| channel.len() != frames) {
            return Err(AudioError::InvalidConfiguration(
                "channels differ in length".to_string(),
            ));
        }

        let mut start = 0;
        while start < frames {
            let len = settings.max_block_size.min(frames - start);
            self.scratch.set_num_samples(len);
            for (index, channel) in channels.iter().enumerate() {
                self.scratch
                    .channel_mut(index)
                    .copy_from_slice(&channel[start..start + len]);
            }

            self.processor.process_block(&mut self.scratch);

            for (index, channel) in channels.iter_mut().enumerate() {
                channel[start..start + len].copy_from_slice(self.scratch.channel(index));
            }
            start += len;
        }
        Ok(())
    }
}

impl std::fmt::Debug for PluginHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginHost")
            .field("processor", &self.processor)
            .field("settings", &self.settings)
            .finish()
    }
}

/// Render planar input through a configured host, block by block.
pub fn render_offline(host: &mut PluginHost, input: &[Vec<f32>]) -> Result<Vec<Vec<f32>>> {
    let mut output = input.to_vec();
    host.process_planar(&mut output)?;
    debug!(
        channels = output.len(),
        frames = output.first().map(Vec::len).unwrap_or(0),
        "Offline render finished"
    );
    Ok(output)
}
