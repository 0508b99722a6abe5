//! Host integration for the Multiband processor
//!
//! Everything that drives `multiband-core` from the outside: bus layout
//! negotiation and buffer plumbing, an offline renderer, a live session on
//! the default output device, test signals and spectral measurement.

pub mod analysis;
pub mod audio;
pub mod host;
pub mod signal;

pub use audio::stream;
pub use host::{render_offline, HostSettings, PluginHost};
