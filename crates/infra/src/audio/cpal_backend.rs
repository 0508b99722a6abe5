//! CPAL output device lookup
//!
//! Finds the device a live session plays on and describes the available
//! outputs for the CLI.

use cpal::traits::{DeviceTrait, HostTrait};
use multiband_core::domain::AudioError;
use serde::Serialize;
use tracing::{debug, info, warn};

type Result<T> = std::result::Result<T, AudioError>;

/// Summary of one output device
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutputDeviceInfo {
    pub name: String,
    pub default_sample_rate: Option<u32>,
    pub max_channels: u16,
    pub is_default: bool,
}

#[allow(deprecated)]
fn device_name(device: &cpal::Device) -> String {
    device
        .name()
        .unwrap_or_else(|_| "Unknown Device".to_string())
}

fn describe(device: &cpal::Device, default_name: Option<&str>) -> OutputDeviceInfo {
    let name = device_name(device);

    let default_sample_rate = device
        .default_output_config()
        .ok()
        .map(|config| config.sample_rate());

    let max_channels = device
        .supported_output_configs()
        .map(|configs| configs.map(|c| c.channels()).max().unwrap_or(0))
        .unwrap_or(0);

    OutputDeviceInfo {
        is_default: default_name == Some(name.as_str()),
        name,
        default_sample_rate,
        max_channels,
    }
}

/// Enumerate the output devices of the default host
pub fn list_output_devices() -> Result<Vec<OutputDeviceInfo>> {
    let host = cpal::default_host();
    debug!("Using audio host: {:?}", host.id());

    let default_name = host.default_output_device().map(|d| device_name(&d));

    let devices: Vec<OutputDeviceInfo> = host
        .output_devices()
        .map_err(|e| AudioError::StreamError(e.to_string()))?
        .map(|device| describe(&device, default_name.as_deref()))
        .filter(|info| {
            if info.max_channels == 0 {
                warn!(device = %info.name, "Skipping device without output configurations");
                false
            } else {
                true
            }
        })
        .collect();

    info!("Found {} output devices", devices.len());
    Ok(devices)
}

/// Output device by name; an empty name selects the host default.
pub fn find_output_device(name: &str) -> Result<cpal::Device> {
    let host = cpal::default_host();

    if name.is_empty() {
        return host
            .default_output_device()
            .ok_or_else(|| AudioError::DeviceNotFound("No default output device".to_string()));
    }

    host.output_devices()
        .map_err(|e| AudioError::StreamError(e.to_string()))?
        .find(|d| device_name(d) == name)
        .ok_or_else(|| AudioError::DeviceNotFound(name.to_string()))
}
