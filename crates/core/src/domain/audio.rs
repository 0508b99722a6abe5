//! Audio buffer, process spec and bus layout models
//!
//! These are the platform-agnostic shapes the host integration layer hands to
//! the processor. Device and stream specifics live in the `infra` crate.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur in the audio subsystem
#[derive(Debug, Error)]
pub enum AudioError {
    /// Requested audio device was not found
    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    /// Error in audio stream creation or processing
    #[error("Stream error: {0}")]
    StreamError(String),

    /// Invalid configuration for the processor or a device
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// The host proposed a bus layout the plugin cannot handle
    #[error("Unsupported bus layout: {0}")]
    UnsupportedLayout(String),

    /// Persisted plugin state could not be encoded or decoded
    #[error("State error: {0}")]
    State(String),
}

pub type Result<T> = std::result::Result<T, AudioError>;

/// Channel set of a single bus
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChannelSet {
    Disabled,
    Mono,
    Stereo,
    Discrete(u16),
}

impl ChannelSet {
    pub fn count(&self) -> usize {
        match self {
            ChannelSet::Disabled => 0,
            ChannelSet::Mono => 1,
            ChannelSet::Stereo => 2,
            ChannelSet::Discrete(n) => *n as usize,
        }
    }
}

/// Main input/output bus pair proposed by the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusLayout {
    pub input: ChannelSet,
    pub output: ChannelSet,
}

impl BusLayout {
    pub const STEREO: BusLayout = BusLayout {
        input: ChannelSet::Stereo,
        output: ChannelSet::Stereo,
    };

    pub const MONO: BusLayout = BusLayout {
        input: ChannelSet::Mono,
        output: ChannelSet::Mono,
    };

    pub fn new(input: ChannelSet, output: ChannelSet) -> Self {
        Self { input, output }
    }

    /// Mono or stereo output, with an input bus matching the output.
    pub fn is_supported(&self) -> bool {
        if !matches!(self.output, ChannelSet::Mono | ChannelSet::Stereo) {
            return false;
        }
        self.input == self.output
    }

    pub fn num_input_channels(&self) -> usize {
        self.input.count()
    }

    pub fn num_output_channels(&self) -> usize {
        self.output.count()
    }
}

impl Default for BusLayout {
    fn default() -> Self {
        Self::STEREO
    }
}

/// Processing context handed to every chain on `prepare`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProcessSpec {
    pub sample_rate: f32,
    pub max_block_size: usize,
    pub num_channels: usize,
}

/// Planar multi-channel sample buffer
///
/// Every channel has the same length. Allocation happens in `new`/`resize`,
/// which belong to `prepare`, never to the block callback.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    channels: Vec<Vec<f32>>,
    num_samples: usize,
}

impl AudioBuffer {
    pub fn new(num_channels: usize, num_samples: usize) -> Self {
        Self {
            channels: vec![vec![0.0; num_samples]; num_channels],
            num_samples,
        }
    }

    /// Build a buffer from per-channel sample vectors.
    ///
    /// Shorter channels are zero-padded to the longest one.
    pub fn from_channels(mut channels: Vec<Vec<f32>>) -> Self {
        let num_samples = channels.iter().map(Vec::len).max().unwrap_or(0);
        for channel in &mut channels {
            channel.resize(num_samples, 0.0);
        }
        Self {
            channels,
            num_samples,
        }
    }

    pub fn num_channels(&self) -> usize {
        self.channels.len()
    }

    pub fn num_samples(&self) -> usize {
        self.num_samples
    }

    /// Reallocate to a new shape; contents are zeroed.
    pub fn resize(&mut self, num_channels: usize, num_samples: usize) {
        self.channels.resize_with(num_channels, Vec::new);
        for channel in &mut self.channels {
            channel.clear();
            channel.resize(num_samples, 0.0);
        }
        self.num_samples = num_samples;
    }

    /// Shrink the active length without releasing capacity.
    ///
    /// `num_samples` must not exceed the allocated length.
    pub fn set_num_samples(&mut self, num_samples: usize) {
        debug_assert!(self
            .channels
            .iter()
            .all(|channel| channel.capacity() >= num_samples));
        for channel in &mut self.channels {
            channel.resize(num_samples, 0.0);
        }
        self.num_samples = num_samples;
    }

    pub fn channel(&self, index: usize) -> &[f32] {
        &self.channels[index]
    }

    pub fn channel_mut(&mut self, index: usize) -> &mut [f32] {
        &mut self.channels[index]
    }

    /// Zero `len` samples of one channel starting at `start`.
    pub fn clear(&mut self, channel: usize, start: usize, len: usize) {
        let end = (start + len).min(self.num_samples);
        if let Some(samples) = self.channels.get_mut(channel) {
            samples[start.min(end)..end].fill(0.0);
        }
    }
}
