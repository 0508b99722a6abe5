//! Persisted plugin state
//!
//! The host stores an opaque blob per plugin instance. We encode the current
//! plain value of every parameter as TOML, keyed by parameter identifier.

use crate::domain::audio::{AudioError, Result};
use crate::domain::parameters::ParameterSet;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Current on-disk format version
pub const STATE_VERSION: u32 = 1;

/// Snapshot of the parameter set suitable for persistence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginState {
    pub version: u32,
    #[serde(default)]
    pub params: BTreeMap<String, f32>,
}

impl PluginState {
    /// Capture the current value of every parameter
    pub fn capture(params: &ParameterSet) -> Self {
        Self {
            version: STATE_VERSION,
            params: params.values(),
        }
    }

    /// Write the stored values into `params`.
    ///
    /// Parameters missing from the state keep their current value.
    pub fn apply(&self, params: &ParameterSet) {
        let unknown = params.apply_values(&self.params);
        if unknown > 0 {
            warn!(unknown, "State contained unknown parameters");
        }
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| AudioError::State(e.to_string()))
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let state: PluginState =
            toml::from_str(content).map_err(|e| AudioError::State(e.to_string()))?;
        state.validate()?;
        Ok(state)
    }

    /// Encode as the opaque byte blob handed to the host
    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(self.to_toml()?.into_bytes())
    }

    /// Decode a blob produced by [`PluginState::encode`]
    pub fn decode(data: &[u8]) -> Result<Self> {
        let content = std::str::from_utf8(data)
            .map_err(|e| AudioError::State(format!("state is not UTF-8: {}", e)))?;
        let state = Self::from_toml(content)?;
        debug!(version = state.version, params = state.params.len(), "Decoded plugin state");
        Ok(state)
    }

    fn validate(&self) -> Result<()> {
        if self.version == 0 || self.version > STATE_VERSION {
            return Err(AudioError::State(format!(
                "unsupported state version {}",
                self.version
            )));
        }
        if let Some((name, _)) = self.params.iter().find(|(_, value)| !value.is_finite()) {
            return Err(AudioError::State(format!(
                "parameter '{}' is not a finite number",
                name
            )));
        }
        Ok(())
    }
}

impl Default for PluginState {
    fn default() -> Self {
        Self::capture(&ParameterSet::new())
    }
}
