//! Platform audio output using CPAL
//!
//! CPAL abstracts the platform-specific APIs:
//! - Windows: WASAPI
//! - Linux: ALSA/PulseAudio
//! - macOS: CoreAudio

pub mod cpal_backend;
pub mod stream;

pub use cpal_backend::{find_output_device, list_output_devices, OutputDeviceInfo};
pub use stream::{BlockLevels, LiveSession, LiveSessionConfig};
