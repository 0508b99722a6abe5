//! Live playback through the processor
//!
//! A test tone is generated and filtered inside the CPAL output callback.
//! Per-callback levels travel back to the control thread over a bounded
//! crossbeam channel; the callback never waits on it.

use crate::audio::cpal_backend::find_output_device;
use crate::host::{HostSettings, PluginHost};
use crate::signal::SineOscillator;
use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{Stream, StreamConfig as CpalStreamConfig};
use crossbeam::channel::{bounded, Receiver};
use multiband_core::domain::{
    AudioDeviceConfig, AudioError, BiquadCoeffs, BusLayout, CoefficientMonitor, ParameterSet,
};
use std::sync::Arc;
use tracing::{error, info};

type Result<T> = std::result::Result<T, AudioError>;

/// Capacity of the level channel, in callbacks
const LEVEL_QUEUE: usize = 64;

/// Settings for a live session
#[derive(Debug, Clone, PartialEq)]
pub struct LiveSessionConfig {
    /// Output device name, empty for the default device
    pub device: String,
    pub sample_rate: u32,
    /// Requested device buffer size; 0 lets the device choose
    pub block_size: u32,
    pub channels: u16,
    pub tone_hz: f32,
    pub amplitude: f32,
}

impl LiveSessionConfig {
    pub fn from_audio_config(audio: &AudioDeviceConfig, sample_rate: u32, block_size: u32) -> Self {
        Self {
            device: audio.output_device.clone(),
            sample_rate,
            block_size,
            channels: audio.channels,
            tone_hz: 1000.0,
            amplitude: 0.25,
        }
    }
}

impl Default for LiveSessionConfig {
    fn default() -> Self {
        Self::from_audio_config(&AudioDeviceConfig::default(), 48000, 512)
    }
}

/// Peak levels of one device callback
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlockLevels {
    pub frames: usize,
    pub input_peak: f32,
    pub output_peak: f32,
}

fn peak(samples: &[f32]) -> f32 {
    samples.iter().fold(0.0f32, |acc, s| acc.max(s.abs()))
}

/// Running output stream with the processor in its callback
pub struct LiveSession {
    _stream: Stream,
    levels: Receiver<BlockLevels>,
    params: Arc<ParameterSet>,
    monitor: CoefficientMonitor,
    config: LiveSessionConfig,
}

impl LiveSession {
    /// Open the output device and start playing
    pub fn start(config: LiveSessionConfig, params: Arc<ParameterSet>) -> Result<Self> {
        info!(
            "Starting live session: device={:?}, config={:?}",
            config.device, config
        );

        if config.channels == 0 {
            return Err(AudioError::InvalidConfiguration(
                "live session needs at least one channel".to_string(),
            ));
        }

        let device = find_output_device(&config.device)?;

        let channels = config.channels as usize;
        let layout = if channels == 1 {
            BusLayout::MONO
        } else {
            BusLayout::STEREO
        };
        let max_block_size = if config.block_size == 0 {
            1024
        } else {
            config.block_size as usize
        };

        let mut host = PluginHost::with_parameters(Arc::clone(&params));
        host.configure(
            HostSettings::new(layout, config.sample_rate as f32, max_block_size)
                .with_buffer_channels(channels),
        )?;
        let monitor = host.processor().coefficient_monitor();

        let mut oscillator =
            SineOscillator::new(config.tone_hz, config.sample_rate as f32, config.amplitude);
        let (level_tx, level_rx) = bounded(LEVEL_QUEUE);

        let cpal_config = CpalStreamConfig {
            channels: config.channels,
            sample_rate: config.sample_rate,
            buffer_size: if config.block_size == 0 {
                cpal::BufferSize::Default
            } else {
                cpal::BufferSize::Fixed(config.block_size)
            },
        };

        let stream = device
            .build_output_stream(
                &cpal_config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    oscillator.fill_interleaved(data, channels);
                    let input_peak = peak(data);

                    host.process_interleaved(data);

                    // A full queue means nobody is reading; drop the report
                    let _ = level_tx.try_send(BlockLevels {
                        frames: data.len() / channels,
                        input_peak,
                        output_peak: peak(data),
                    });
                },
                |err| error!("Output stream error: {}", err),
                None,
            )
            .map_err(|e| AudioError::StreamError(format!("Failed to build stream: {}", e)))?;

        stream
            .play()
            .map_err(|e| AudioError::StreamError(format!("Failed to start stream: {}", e)))?;

        Ok(Self {
            _stream: stream,
            levels: level_rx,
            params,
            monitor,
            config,
        })
    }

    /// Drain every pending report
    pub fn drain_levels(&self) -> Vec<BlockLevels> {
        self.levels.try_iter().collect()
    }

    pub fn parameters(&self) -> &Arc<ParameterSet> {
        &self.params
    }

    /// Coefficients the callback installed most recently
    pub fn coefficients(&self) -> BiquadCoeffs {
        self.monitor.load()
    }

    pub fn config(&self) -> &LiveSessionConfig {
        &self.config
    }
}
