//! Multiband plugin core
//!
//! The processing core of a stereo peak-filter plugin: a lock-free parameter
//! set, RBJ peak coefficient synthesis and a per-channel filter chain driven
//! once per audio block. Host integration lives in `multiband-infra`.

pub mod domain;

pub use domain::{
    AudioBuffer, AudioError, BiquadCoeffs, BusLayout, ChainSettings, ParameterSet, PeakProcessor,
    ProcessSpec,
};
