//! Subcommand implementations

use crate::PeakArgs;
use anyhow::{bail, Context as _, Result};
use multiband_core::domain::{
    BiquadCoeffs, BusLayout, ChainSettings, ConfigManager, ParamId, ParameterSet, PluginConfig,
    PluginState, PresetManager, PresetWatcher,
};
use multiband_infra::analysis::ToneMeasurement;
use multiband_infra::audio::{list_output_devices, LiveSession, LiveSessionConfig};
use multiband_infra::signal::sine;
use multiband_infra::{render_offline, HostSettings, PluginHost};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Loaded configuration shared by every command
pub struct Context {
    pub manager: ConfigManager,
    pub config: PluginConfig,
    pub presets: PresetManager,
}

impl Context {
    pub async fn load(config_dir: Option<PathBuf>) -> Result<Self> {
        let config_dir = match config_dir {
            Some(dir) => dir,
            None => ConfigManager::default_config_dir()?,
        };
        let manager = ConfigManager::new(config_dir);
        let config = manager.load().await;
        let presets = PresetManager::new(config.app.preset_dir.clone());
        Ok(Self {
            manager,
            config,
            presets,
        })
    }

    /// Parameters from the requested (or default) preset plus overrides
    async fn parameters(&self, peak: &PeakArgs) -> Result<Arc<ParameterSet>> {
        let params = ParameterSet::shared();

        let preset = peak
            .preset
            .as_deref()
            .or(self.config.app.default_preset.as_deref());
        if let Some(name) = preset {
            let state = self
                .presets
                .load_preset(name)
                .await
                .with_context(|| format!("failed to load preset '{}'", name))?;
            state.apply(&params);
            info!(preset = name, "Preset applied");
        }

        if let Some(gain) = peak.gain {
            params.set(ParamId::PeakGain, gain);
        }
        if let Some(freq) = peak.freq {
            params.set(ParamId::PeakFreq, freq);
        }
        if let Some(q) = peak.q {
            params.set(ParamId::PeakQuality, q);
        }
        Ok(params)
    }
}

/// Validate a `--seconds` argument
fn seconds_arg(seconds: f32) -> Result<Duration> {
    if !(seconds.is_finite() && seconds > 0.0) {
        bail!("--seconds must be positive");
    }
    Duration::try_from_secs_f32(seconds).context("--seconds is out of range")
}

#[derive(Serialize)]
struct ParamRow {
    id: &'static str,
    unit: &'static str,
    min: f32,
    max: f32,
    step: f32,
    skew: f32,
    default: f32,
    consumed: bool,
}

pub fn params(_ctx: &Context, json: bool) -> Result<()> {
    let params = ParameterSet::new();
    let rows: Vec<ParamRow> = params
        .iter()
        .map(|param| {
            let range = param.range();
            ParamRow {
                id: param.name(),
                unit: param.unit(),
                min: range.min,
                max: range.max,
                step: range.step,
                skew: range.skew,
                default: param.default_value(),
                consumed: param.id().is_consumed(),
            }
        })
        .collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    println!(
        "{:<14} {:>9} {:>9} {:>6} {:>5} {:>9}  {}",
        "id", "min", "max", "step", "skew", "default", "unit"
    );
    for row in &rows {
        let marker = if row.consumed { "" } else { "  (inert)" };
        println!(
            "{:<14} {:>9} {:>9} {:>6} {:>5} {:>9}  {}{}",
            row.id, row.min, row.max, row.step, row.skew, row.default, row.unit, marker
        );
    }
    Ok(())
}

#[derive(Serialize)]
struct RenderReport {
    sample_rate: u32,
    block_size: u32,
    frames: usize,
    settings: ChainSettings,
    measurement: ToneMeasurement,
    expected_gain_db: f32,
}

pub async fn render(
    ctx: &Context,
    tone: f32,
    seconds: f32,
    sample_rate: Option<u32>,
    block_size: Option<u32>,
    peak: &PeakArgs,
    json: bool,
) -> Result<()> {
    let sample_rate = sample_rate.unwrap_or(ctx.config.app.sample_rate);
    let block_size = block_size.unwrap_or(ctx.config.app.block_size);
    seconds_arg(seconds)?;

    let params = ctx.parameters(peak).await?;
    let settings = ChainSettings::from_parameters(&params);

    let mut host = PluginHost::with_parameters(Arc::clone(&params));
    host.configure(HostSettings::new(
        BusLayout::STEREO,
        sample_rate as f32,
        block_size as usize,
    ))?;

    let frames = (seconds * sample_rate as f32) as usize;
    let input = sine(tone, sample_rate as f32, frames, 0.5);
    let output = render_offline(&mut host, &[input.clone(), input.clone()])?;

    // Skip the filter's settling time
    let settled = frames / 4;
    let measurement = ToneMeasurement::measure(
        &input[settled..],
        &output[0][settled..],
        sample_rate as f32,
        tone,
    );
    let expected_gain_db =
        BiquadCoeffs::peak(sample_rate as f32, &settings).magnitude_db_at(tone, sample_rate as f32);

    let report = RenderReport {
        sample_rate,
        block_size,
        frames,
        settings,
        measurement,
        expected_gain_db,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!(
            "peak {:.1} Hz, {:+.1} dB, Q {:.2} @ {} Hz, block {}",
            settings.peak_freq_hz, settings.peak_gain_db, settings.peak_quality, sample_rate, block_size
        );
        println!(
            "tone {:.1} Hz: in {:.4}, out {:.4}, measured {:+.2} dB, expected {:+.2} dB",
            measurement.frequency_hz,
            measurement.input_amplitude,
            measurement.output_amplitude,
            measurement.gain_db,
            expected_gain_db
        );
    }
    Ok(())
}

pub async fn response(
    ctx: &Context,
    points: usize,
    sample_rate: Option<u32>,
    peak: &PeakArgs,
    json: bool,
) -> Result<()> {
    let sample_rate = sample_rate.unwrap_or(ctx.config.app.sample_rate) as f32;
    let params = ctx.parameters(peak).await?;
    let coeffs = BiquadCoeffs::peak(sample_rate, &ChainSettings::from_parameters(&params));
    let curve = coeffs.response_curve(sample_rate, points);

    if json {
        println!("{}", serde_json::to_string_pretty(&curve)?);
        return Ok(());
    }

    for (freq, db) in curve {
        // One '#' per half dB around a center line
        let width = (db * 2.0).round() as i32;
        let bar = "#".repeat(width.unsigned_abs() as usize);
        if width >= 0 {
            println!("{:>9.1} Hz {:>+7.2} dB |{}", freq, db, bar);
        } else {
            println!("{:>9.1} Hz {:>+7.2} dB {:>48}|", freq, db, bar);
        }
    }
    Ok(())
}

pub async fn play(
    ctx: &Context,
    tone: f32,
    seconds: f32,
    peak: &PeakArgs,
    watch: bool,
) -> Result<()> {
    let duration = seconds_arg(seconds)?;
    let params = ctx.parameters(peak).await?;

    let mut config = LiveSessionConfig::from_audio_config(
        &ctx.config.audio,
        ctx.config.app.sample_rate,
        ctx.config.app.block_size,
    );
    config.tone_hz = tone;

    let session = LiveSession::start(config, Arc::clone(&params))?;
    println!("Playing {:.1} Hz for {:.1} s, Ctrl+C to stop", tone, seconds);

    let watcher = if watch {
        Some(PresetWatcher::new(ctx.presets.preset_dir().to_path_buf()).await?)
    } else {
        None
    };
    let mut preset_rx = watcher.as_ref().map(|w| w.subscribe());

    let deadline = tokio::time::sleep(duration);
    tokio::pin!(deadline);
    let mut meter = tokio::time::interval(Duration::from_millis(250));

    loop {
        tokio::select! {
            _ = &mut deadline => break,
            _ = tokio::signal::ctrl_c() => break,
            _ = meter.tick() => {
                let levels = session.drain_levels();
                if let Some(last) = levels.last() {
                    let coeffs = session.coefficients();
                    println!(
                        "in {:.3}  out {:.3}  ({} callbacks)  b0 {:.4}",
                        last.input_peak, last.output_peak, levels.len(), coeffs.b0
                    );
                }
            }
            changed = async {
                match preset_rx.as_mut() {
                    Some(rx) => rx.recv().await.ok(),
                    None => std::future::pending().await,
                }
            } => {
                if let Some(path) = changed {
                    match PresetManager::load_from_path(&path).await {
                        Ok(state) => {
                            state.apply(session.parameters());
                            info!(path = %path.display(), "Preset reloaded");
                        }
                        Err(e) => warn!(path = %path.display(), error = %e, "Ignoring preset change"),
                    }
                }
            }
        }
    }

    Ok(())
}

pub fn devices() -> Result<()> {
    for device in list_output_devices()? {
        let marker = if device.is_default { "*" } else { " " };
        let rate = device
            .default_sample_rate
            .map(|r| format!("{} Hz", r))
            .unwrap_or_else(|| "unknown rate".to_string());
        println!("{} {} ({} ch, {})", marker, device.name, device.max_channels, rate);
    }
    Ok(())
}

pub fn config_path(ctx: &Context) -> Result<()> {
    let state = if ctx.manager.exists() { "" } else { " (missing)" };
    println!("{}{}", ctx.manager.config_path().display(), state);
    println!("presets: {}", ctx.presets.preset_dir().display());
    Ok(())
}

pub async fn config_reset(ctx: &Context) -> Result<()> {
    ctx.manager.clear().await?;
    println!("Configuration reset, defaults apply on next run");
    Ok(())
}

pub async fn preset_list(ctx: &Context) -> Result<()> {
    for name in ctx.presets.list_presets().await? {
        println!("{}", name);
    }
    Ok(())
}

pub async fn preset_save(ctx: &Context, name: &str, peak: &PeakArgs) -> Result<()> {
    let params = ctx.parameters(peak).await?;
    ctx.presets
        .save_preset(name, &PluginState::capture(&params))
        .await
        .with_context(|| format!("failed to save preset '{}'", name))?;
    println!("Saved preset '{}'", name);
    Ok(())
}

pub async fn preset_load(ctx: &Context, name: &str) -> Result<()> {
    let state = ctx.presets.load_preset(name).await?;
    for (id, value) in &state.params {
        println!("{:<14} {}", id, value);
    }
    Ok(())
}

pub async fn preset_delete(ctx: &Context, name: &str) -> Result<()> {
    ctx.presets.delete_preset(name).await?;
    println!("Deleted preset '{}'", name);
    Ok(())
}
