//! Example demonstrating parameters, plugin state and presets
//!
//! Run with: cargo run --package multiband-core --example preset_demo

use multiband_core::domain::{
    AudioBuffer, ParamId, PeakProcessor, PluginConfig, PluginState, PresetManager,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter("multiband_core=debug,info")
        .init();

    println!("=== Multiband Preset Demo ===\n");

    let work_dir = tempfile::tempdir()?;

    // 1. Factory configuration
    let config = PluginConfig::factory_default(work_dir.path());
    println!(
        "1. Factory config: {} Hz, block {}, presets in {}",
        config.app.sample_rate,
        config.app.block_size,
        config.app.preset_dir.display()
    );

    // 2. Dial in a setting through the editor binding
    let mut processor = PeakProcessor::new();
    let bindings = processor.editor_bindings();
    bindings.peak_gain.set_position(0.75);
    processor.parameters().set(ParamId::PeakFreq, 2500.0);
    println!("\n2. Peak gain knob at 0.75 -> {}", bindings.peak_gain.display_text());

    // 3. Process a block so the coefficients follow the parameters
    processor.prepare(config.app.sample_rate as f32, config.app.block_size as usize);
    let mut buffer = AudioBuffer::new(2, config.app.block_size as usize);
    processor.process_block(&mut buffer);
    let coeffs = processor.current_coefficients();
    println!(
        "\n3. Active coefficients: b0={:.5} b1={:.5} b2={:.5} a1={:.5} a2={:.5}",
        coeffs.b0, coeffs.b1, coeffs.b2, coeffs.a1, coeffs.a2
    );
    println!(
        "   Response at 2.5 kHz: {:+.2} dB",
        coeffs.magnitude_db_at(2500.0, config.app.sample_rate as f32)
    );

    // 4. Save and reload as a preset
    let presets = PresetManager::new(config.app.preset_dir.clone());
    presets
        .save_preset("presence", &PluginState::capture(processor.parameters()))
        .await?;
    println!("\n4. Presets on disk: {:?}", presets.list_presets().await?);

    let fresh = PeakProcessor::new();
    presets.load_preset("presence").await?.apply(fresh.parameters());
    println!(
        "   Reloaded peak gain: {} dB",
        fresh.parameters().value(ParamId::PeakGain)
    );

    // 5. Host state blob
    let blob = fresh.get_state()?;
    println!("\n5. State blob ({} bytes):\n{}", blob.len(), String::from_utf8_lossy(&blob));

    Ok(())
}
