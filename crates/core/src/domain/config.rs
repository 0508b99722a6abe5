//! Configuration management for Multiband
//!
//! This module provides:
//! - Application and audio device settings stored as TOML
//! - Preset storage for plugin state
//! - Hot-reload support via file system watcher

use crate::domain::audio::AudioError;
use crate::domain::state::PluginState;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use tokio::sync::broadcast;
use tracing::{debug, error, info, instrument, warn};

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Errors that can occur during configuration operations
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("File watch error: {0}")]
    WatchError(#[from] notify::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Preset not found: {0}")]
    PresetNotFound(String),

    #[error("Invalid preset: {0}")]
    State(#[from] AudioError),
}

/// Application-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Sample rate used for offline rendering and live playback
    pub sample_rate: u32,

    /// Maximum block size in frames handed to the processor
    pub block_size: u32,

    /// Preset directory
    pub preset_dir: PathBuf,

    /// Preset applied at startup
    #[serde(default)]
    pub default_preset: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48000,
            block_size: 512,
            preset_dir: PathBuf::from("presets"),
            default_preset: None,
        }
    }
}

impl AppConfig {
    pub fn validate(&self) -> Result<()> {
        if self.sample_rate == 0 {
            return Err(ConfigError::Invalid("sample_rate must be positive".to_string()));
        }
        if self.block_size == 0 {
            return Err(ConfigError::Invalid("block_size must be positive".to_string()));
        }
        Ok(())
    }
}

/// Audio device configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioDeviceConfig {
    /// Output device name (empty = use default)
    #[serde(default)]
    pub output_device: String,

    /// Output channel count, 1 or 2
    #[serde(default = "default_channels")]
    pub channels: u16,
}

fn default_channels() -> u16 {
    2
}

impl Default for AudioDeviceConfig {
    fn default() -> Self {
        Self {
            output_device: String::new(),
            channels: default_channels(),
        }
    }
}

/// Complete Multiband configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PluginConfig {
    #[serde(default)]
    pub app: AppConfig,
    #[serde(default)]
    pub audio: AudioDeviceConfig,
}

impl PluginConfig {
    /// Load configuration from TOML file
    #[instrument(skip(path))]
    pub async fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading configuration");

        let contents = fs::read_to_string(path).await?;
        let config: Self = toml::from_str(&contents)?;
        config.app.validate()?;

        debug!("Configuration loaded successfully");
        Ok(config)
    }

    /// Save configuration to TOML file
    #[instrument(skip(self, path))]
    pub async fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        info!(path = %path.display(), "Saving configuration");

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let toml_str = toml::to_string_pretty(self)?;
        fs::write(path, toml_str).await?;

        debug!("Configuration saved successfully");
        Ok(())
    }

    /// Create factory default configuration rooted at `config_dir`
    pub fn factory_default(config_dir: &Path) -> Self {
        Self {
            app: AppConfig {
                preset_dir: config_dir.join("presets"),
                ..AppConfig::default()
            },
            audio: AudioDeviceConfig::default(),
        }
    }
}

/// File system watcher for preset hot-reload
pub struct PresetWatcher {
    _watcher: notify::RecommendedWatcher,
    preset_tx: broadcast::Sender<PathBuf>,
}

impl PresetWatcher {
    /// Watch `preset_dir` for created or modified presets
    pub async fn new(preset_dir: PathBuf) -> Result<Self> {
        use notify::Watcher;

        let (preset_tx, _preset_rx) = broadcast::channel(32);

        fs::create_dir_all(&preset_dir).await?;

        let tx_clone = preset_tx.clone();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
            match res {
                Ok(event) => {
                    if matches!(
                        event.kind,
                        notify::EventKind::Create(_) | notify::EventKind::Modify(_)
                    ) {
                        for path in event.paths {
                            if path.extension().and_then(|e| e.to_str()) == Some("toml") {
                                // No subscribers is fine
                                let _ = tx_clone.send(path);
                            }
                        }
                    }
                }
                Err(e) => error!("Preset watch error: {}", e),
            }
        })?;

        watcher.watch(&preset_dir, notify::RecursiveMode::NonRecursive)?;

        info!(path = %preset_dir.display(), "Preset watcher started");

        Ok(Self {
            _watcher: watcher,
            preset_tx,
        })
    }

    /// Subscribe to preset change events
    pub fn subscribe(&self) -> broadcast::Receiver<PathBuf> {
        self.preset_tx.subscribe()
    }
}

/// Preset manager
///
/// A preset is a [`PluginState`] stored as `<preset_dir>/<name>.toml`.
pub struct PresetManager {
    preset_dir: PathBuf,
}

impl PresetManager {
    pub fn new(preset_dir: PathBuf) -> Self {
        Self { preset_dir }
    }

    pub fn preset_dir(&self) -> &Path {
        &self.preset_dir
    }

    fn preset_path(&self, name: &str) -> Result<PathBuf> {
        let valid = !name.is_empty()
            && !name.starts_with('.')
            && !name.contains(|c| matches!(c, '/' | '\\' | ':'));
        if !valid {
            return Err(ConfigError::Invalid(format!("invalid preset name '{}'", name)));
        }
        Ok(self.preset_dir.join(format!("{}.toml", name)))
    }

    /// List all available presets
    #[instrument(skip(self))]
    pub async fn list_presets(&self) -> Result<Vec<String>> {
        let mut presets = Vec::new();

        if !self.preset_dir.exists() {
            return Ok(presets);
        }

        let mut entries = fs::read_dir(&self.preset_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().map(|e| e == "toml").unwrap_or(false) {
                if let Some(name) = path.file_stem().and_then(|n| n.to_str()) {
                    presets.push(name.to_string());
                }
            }
        }

        presets.sort();
        debug!(count = presets.len(), "Listed presets");
        Ok(presets)
    }

    /// Load a preset by name
    #[instrument(skip(self))]
    pub async fn load_preset(&self, name: &str) -> Result<PluginState> {
        let path = self.preset_path(name)?;

        if !path.exists() {
            return Err(ConfigError::PresetNotFound(name.to_string()));
        }

        Self::load_from_path(&path).await
    }

    /// Load a preset file directly, e.g. one reported by [`PresetWatcher`]
    pub async fn load_from_path(path: &Path) -> Result<PluginState> {
        let contents = fs::read_to_string(path).await?;
        Ok(PluginState::from_toml(&contents)?)
    }

    /// Save a preset by name
    #[instrument(skip(self, state))]
    pub async fn save_preset(&self, name: &str, state: &PluginState) -> Result<()> {
        let path = self.preset_path(name)?;
        fs::create_dir_all(&self.preset_dir).await?;
        fs::write(&path, state.to_toml()?).await?;
        info!(name, "Preset saved");
        Ok(())
    }

    /// Delete a preset by name
    #[instrument(skip(self))]
    pub async fn delete_preset(&self, name: &str) -> Result<()> {
        let path = self.preset_path(name)?;

        if !path.exists() {
            return Err(ConfigError::PresetNotFound(name.to_string()));
        }

        fs::remove_file(&path).await?;
        info!(name, "Preset deleted");
        Ok(())
    }

    pub async fn preset_exists(&self, name: &str) -> bool {
        self.preset_path(name).map(|p| p.exists()).unwrap_or(false)
    }
}

/// Configuration manager for the main config file
///
/// Lives at `<config dir>/multiband/config.toml`.
pub struct ConfigManager {
    config_dir: PathBuf,
    config_path: PathBuf,
}

impl ConfigManager {
    pub fn new(config_dir: PathBuf) -> Self {
        let config_path = config_dir.join("config.toml");
        Self {
            config_dir,
            config_path,
        }
    }

    /// Get the default config directory path
    ///
    /// `~/.config/multiband` on Linux, the platform equivalent elsewhere.
    pub fn default_config_dir() -> Result<PathBuf> {
        dirs::config_dir()
            .map(|p| p.join("multiband"))
            .ok_or_else(|| ConfigError::Invalid("Could not determine config directory".to_string()))
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Load configuration from file
    ///
    /// A missing file yields (and writes) the factory default. A corrupt
    /// file is backed up next to the original and replaced by the default.
    #[instrument(skip(self))]
    pub async fn load(&self) -> PluginConfig {
        let factory = PluginConfig::factory_default(&self.config_dir);

        if !self.config_path.exists() {
            info!(
                path = %self.config_path.display(),
                "Config file not found, creating factory default"
            );

            if let Err(e) = factory.save_to_file(&self.config_path).await {
                error!(
                    path = %self.config_path.display(),
                    error = %e,
                    "Failed to save factory default config"
                );
            }

            return factory;
        }

        match PluginConfig::load_from_file(&self.config_path).await {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    path = %self.config_path.display(),
                    error = %e,
                    "Failed to load config, using factory default"
                );

                let backup_path = self.config_path.with_extension("toml.corrupt");
                if let Err(copy_err) = fs::copy(&self.config_path, &backup_path).await {
                    error!(
                        path = %backup_path.display(),
                        error = %copy_err,
                        "Failed to backup corrupt config"
                    );
                }

                factory
            }
        }
    }

    /// Delete the config file
    #[instrument(skip(self))]
    pub async fn clear(&self) -> Result<()> {
        if self.config_path.exists() {
            fs::remove_file(&self.config_path).await?;
            info!(path = %self.config_path.display(), "Configuration cleared");
        }
        Ok(())
    }

    pub fn exists(&self) -> bool {
        self.config_path.exists()
    }
}
