//! Domain entities and business rules

pub mod audio;
pub mod chain;
pub mod config;
pub mod dsp;
pub mod parameters;
pub mod processor;
pub mod state;

// Re-export specific items to avoid ambiguous glob imports
pub use audio::{AudioBuffer, AudioError, BusLayout, ChannelSet, ProcessSpec};
pub use chain::{ChainPosition, ChainStage, MonoChain, Stage};
pub use config::{
    AppConfig, AudioDeviceConfig, ConfigError, ConfigManager, PluginConfig, PresetManager,
    PresetWatcher,
};
pub use dsp::{decibels_to_gain, gain_to_decibels, params, BiquadCoeffs, BiquadFilter, ChainSettings};
pub use parameters::{
    create_parameter_layout, EditorBindings, FloatParam, ParamId, ParamRange, ParameterAttachment,
    ParameterSet,
};
pub use processor::{CoefficientMonitor, PeakProcessor};
pub use state::{PluginState, STATE_VERSION};
