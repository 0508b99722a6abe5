//! Persistence tests: host state blobs, preset files and hot reload

use crate::{configured_host, PeakSettings};
use multiband_core::domain::{
    BusLayout, ConfigManager, ParamId, ParameterSet, PeakProcessor, PluginState, PresetManager,
    PresetWatcher,
};
use multiband_infra::render_offline;
use multiband_infra::signal::log_sweep;
use std::time::Duration;
use tempfile::TempDir;

const SAMPLE_RATE: f32 = 48000.0;

#[test]
fn test_state_blob_restores_identical_processing() {
    let input = log_sweep(20.0, 20000.0, SAMPLE_RATE, 6000);

    let mut original = configured_host(
        BusLayout::STEREO,
        SAMPLE_RATE,
        512,
        PeakSettings::new(3300.0, -7.5, 2.5),
    );
    original.parameters().set(ParamId::Band2Gain, 3.0);
    let blob = original.processor().get_state().unwrap();
    let expected = render_offline(&mut original, &[input.clone(), input.clone()]).unwrap();

    let mut restored = configured_host(
        BusLayout::STEREO,
        SAMPLE_RATE,
        512,
        PeakSettings::new(1000.0, 0.0, 1.0),
    );
    restored.processor().set_state(&blob).unwrap();
    assert_eq!(restored.parameters().value(ParamId::Band2Gain), 3.0);

    let output = render_offline(&mut restored, &[input.clone(), input]).unwrap();
    assert_eq!(expected, output);
}

#[test]
fn test_corrupt_blob_is_ignored() {
    let processor = PeakProcessor::new();
    processor.parameters().set(ParamId::PeakGain, -3.0);

    assert!(processor.set_state(b"version = 1\n[params\n").is_err());
    assert!(processor.set_state(&[]).is_err());
    assert_eq!(processor.parameters().value(ParamId::PeakGain), -3.0);
}

#[tokio::test]
async fn test_preset_roundtrip_through_files() {
    let temp_dir = TempDir::new().unwrap();
    let manager = PresetManager::new(temp_dir.path().join("presets"));

    let params = ParameterSet::new();
    PeakSettings::new(250.0, 4.0, 0.8).apply(&params);
    manager
        .save_preset("warm", &PluginState::capture(&params))
        .await
        .unwrap();
    manager
        .save_preset("flat", &PluginState::default())
        .await
        .unwrap();

    assert_eq!(manager.list_presets().await.unwrap(), vec!["flat", "warm"]);

    let target = ParameterSet::new();
    manager.load_preset("warm").await.unwrap().apply(&target);
    assert_eq!(target.value(ParamId::PeakFreq), 250.0);
    assert_eq!(target.value(ParamId::PeakGain), 4.0);
    assert_eq!(target.value(ParamId::PeakQuality), 0.8);
}

#[tokio::test]
async fn test_config_manager_points_at_presets() {
    let temp_dir = TempDir::new().unwrap();
    let manager = ConfigManager::new(temp_dir.path().to_path_buf());
    let config = manager.load().await;

    let presets = PresetManager::new(config.app.preset_dir.clone());
    presets
        .save_preset("default", &PluginState::default())
        .await
        .unwrap();
    assert!(temp_dir.path().join("presets").join("default.toml").exists());
}

#[tokio::test]
async fn test_watcher_reports_preset_changes() {
    let temp_dir = TempDir::new().unwrap();
    let preset_dir = temp_dir.path().join("presets");
    let watcher = PresetWatcher::new(preset_dir.clone()).await.unwrap();
    let mut rx = watcher.subscribe();

    let manager = PresetManager::new(preset_dir.clone());
    let params = ParameterSet::new();
    params.set(ParamId::PeakGain, 9.0);
    manager
        .save_preset("live", &PluginState::capture(&params))
        .await
        .unwrap();

    let path = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("no preset change reported")
        .unwrap();
    assert_eq!(path.file_name().unwrap(), "live.toml");

    // The file may still be mid-write when the first event fires
    tokio::time::sleep(Duration::from_millis(50)).await;
    let state = PresetManager::load_from_path(&path).await.unwrap();
    let target = ParameterSet::new();
    state.apply(&target);
    assert_eq!(target.value(ParamId::PeakGain), 9.0);
}
