//! End-to-end tests of the peak filter pipeline
//!
//! Signals go through a configured host exactly as a plugin host would feed
//! them, and the results are measured with the FFT analysis helpers.

use crate::{configured_host, render_stereo, PeakSettings};
use multiband_core::domain::{
    AudioError, BiquadCoeffs, BusLayout, ChannelSet, ParamId, ParameterSet,
};
use multiband_infra::analysis::{peak_level, tone_amplitude, ToneMeasurement};
use multiband_infra::signal::{impulse, log_sweep, sine};
use multiband_infra::{render_offline, HostSettings, PluginHost};
use proptest::prelude::*;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

const SAMPLE_RATE: f32 = 44100.0;

fn measure(input: &[f32], output: &[f32], sample_rate: f32, tone: f32) -> ToneMeasurement {
    // Skip the settling time at the start of the render
    let settled = input.len() / 4;
    ToneMeasurement::measure(&input[settled..], &output[settled..], sample_rate, tone)
}

// ============================================================================
// CONCRETE SCENARIO
// ============================================================================

#[test]
fn test_six_db_boost_at_one_khz() {
    let peak = PeakSettings::new(1000.0, 6.0, 1.0);
    let input = sine(1000.0, SAMPLE_RATE, 44100, 0.5);
    let output = render_stereo(&input, SAMPLE_RATE, 512, peak);

    let m = measure(&input, &output[0], SAMPLE_RATE, 1000.0);
    let ratio = m.output_amplitude / m.input_amplitude;
    assert!((ratio - 1.995).abs() < 0.01, "ratio at 1 kHz: {}", ratio);
    assert!((m.gain_db - 6.0).abs() < 0.05);
}

#[test]
fn test_six_db_boost_leaves_50_hz_alone() {
    let peak = PeakSettings::new(1000.0, 6.0, 1.0);
    let input = sine(50.0, SAMPLE_RATE, 44100, 0.5);
    let output = render_stereo(&input, SAMPLE_RATE, 512, peak);

    let m = measure(&input, &output[0], SAMPLE_RATE, 50.0);
    let ratio = m.output_amplitude / m.input_amplitude;
    assert!((ratio - 1.0).abs() < 0.01, "ratio at 50 Hz: {}", ratio);
}

#[test]
fn test_cut_at_48k() {
    let peak = PeakSettings::new(1000.0, -12.0, 1.0);
    let input = sine(1000.0, 48000.0, 48000, 0.5);
    let output = render_stereo(&input, 48000.0, 256, peak);

    let m = measure(&input, &output[1], 48000.0, 1000.0);
    assert!((m.output_amplitude / m.input_amplitude - 0.2512).abs() < 0.005);
}

#[test]
fn test_measured_matches_analytic_response() {
    let peak = PeakSettings::new(2500.0, 9.0, 2.0);
    let coeffs = BiquadCoeffs::peaking(SAMPLE_RATE, 2500.0, 9.0, 2.0);

    for tone in [200.0, 1200.0, 2500.0, 4000.0, 12000.0] {
        let input = sine(tone, SAMPLE_RATE, 22050, 0.5);
        let output = render_stereo(&input, SAMPLE_RATE, 333, peak);
        let m = measure(&input, &output[0], SAMPLE_RATE, tone);
        let expected = coeffs.magnitude_db_at(tone, SAMPLE_RATE);
        assert!(
            (m.gain_db - expected).abs() < 0.1,
            "{} Hz: measured {} dB, expected {} dB",
            tone,
            m.gain_db,
            expected
        );
    }
}

// ============================================================================
// UNITY, SYMMETRY AND BLOCKING
// ============================================================================

#[test]
fn test_zero_gain_is_transparent() {
    let input = log_sweep(20.0, 20000.0, SAMPLE_RATE, 44100);
    let output = render_stereo(&input, SAMPLE_RATE, 512, PeakSettings::new(750.0, 0.0, 3.0));

    for (x, y) in input.iter().zip(&output[0]) {
        assert!((x - y).abs() < 1e-5);
    }
}

#[test]
fn test_left_and_right_match() {
    let input = log_sweep(50.0, 15000.0, SAMPLE_RATE, 20000);
    let output = render_stereo(&input, SAMPLE_RATE, 480, PeakSettings::new(3000.0, -18.0, 0.7));
    assert_eq!(output[0], output[1]);
}

#[test]
fn test_unsupported_layouts_rejected_by_host() {
    let mut host = PluginHost::new(Default::default());
    let layouts = [
        BusLayout::new(ChannelSet::Discrete(6), ChannelSet::Discrete(6)),
        BusLayout::new(ChannelSet::Stereo, ChannelSet::Mono),
        BusLayout::new(ChannelSet::Disabled, ChannelSet::Stereo),
    ];
    for layout in layouts {
        assert!(matches!(
            host.configure(HostSettings::new(layout, SAMPLE_RATE, 256)),
            Err(AudioError::UnsupportedLayout(_)) | Err(AudioError::InvalidConfiguration(_))
        ));
    }
    assert!(!host.is_active());
}

#[test]
fn test_mono_layout() {
    let peak = PeakSettings::new(1000.0, 6.0, 1.0);
    let mut host = configured_host(BusLayout::MONO, SAMPLE_RATE, 256, peak);
    let input = sine(1000.0, SAMPLE_RATE, 22050, 0.5);
    let output = render_offline(&mut host, &[input.clone()]).unwrap();

    let m = measure(&input, &output[0], SAMPLE_RATE, 1000.0);
    assert!((m.gain_db - 6.0).abs() < 0.05);
}

#[test]
fn test_extra_device_channels_are_silent() {
    let params = Arc::new(ParameterSet::new());
    let mut host = PluginHost::with_parameters(params);
    host.configure(HostSettings::new(BusLayout::STEREO, SAMPLE_RATE, 128).with_buffer_channels(3))
        .unwrap();

    let input = sine(440.0, SAMPLE_RATE, 1000, 0.5);
    let output = render_offline(&mut host, &[input.clone(), input.clone(), input]).unwrap();
    assert!(output[2].iter().all(|&s| s == 0.0));
    assert!(peak_level(&output[0]) > 0.4);
}

#[test]
fn test_prepare_resets_state() {
    let peak = PeakSettings::new(200.0, 24.0, 10.0);
    let mut host = configured_host(BusLayout::STEREO, SAMPLE_RATE, 256, peak);
    let settings = *host.settings().unwrap();

    // Ring the resonance, then cut the signal
    let burst = sine(200.0, SAMPLE_RATE, 4096, 0.9);
    render_offline(&mut host, &[burst.clone(), burst]).unwrap();

    host.configure(settings).unwrap();
    let silence = vec![0.0; 2048];
    let output = render_offline(&mut host, &[silence.clone(), silence]).unwrap();
    assert!(output.iter().all(|channel| channel.iter().all(|&s| s == 0.0)));
}

#[test]
fn test_ringing_persists_across_blocks_without_reset() {
    let peak = PeakSettings::new(200.0, 24.0, 10.0);
    let mut host = configured_host(BusLayout::STEREO, SAMPLE_RATE, 256, peak);

    let burst = sine(200.0, SAMPLE_RATE, 4096, 0.9);
    render_offline(&mut host, &[burst.clone(), burst]).unwrap();

    let silence = vec![0.0; 256];
    let output = render_offline(&mut host, &[silence.clone(), silence]).unwrap();
    assert!(peak_level(&output[0]) > 0.0);

    host.processor_mut().reset();
    let silence = vec![0.0; 256];
    let output = render_offline(&mut host, &[silence.clone(), silence]).unwrap();
    assert_eq!(peak_level(&output[0]), 0.0);
}

#[test]
fn test_inert_parameters_do_not_touch_audio() {
    let input = log_sweep(20.0, 20000.0, SAMPLE_RATE, 8192);
    let peak = PeakSettings::new(1500.0, 5.0, 1.5);

    let mut plain = configured_host(BusLayout::STEREO, SAMPLE_RATE, 512, peak);
    let reference = render_offline(&mut plain, &[input.clone(), input.clone()]).unwrap();

    let mut decorated = configured_host(BusLayout::STEREO, SAMPLE_RATE, 512, peak);
    let params = decorated.parameters();
    params.set(ParamId::Gain, 12.0);
    params.set(ParamId::Distortion, 0.8);
    params.set(ParamId::Band1Gain, -20.0);
    params.set(ParamId::Band3Freq, 4000.0);
    params.set(ParamId::Output, -6.0);
    let output = render_offline(&mut decorated, &[input.clone(), input]).unwrap();

    assert_eq!(reference, output);
}

#[test]
fn test_impulse_response_decays() {
    let output = render_stereo(&impulse(8192), SAMPLE_RATE, 512, PeakSettings::new(5000.0, 18.0, 4.0));
    assert!(peak_level(&output[0][..64]) > 0.0);
    assert!(peak_level(&output[0][8000..]) < 1e-4);
}

// ============================================================================
// AUTOMATION AND CONCURRENCY
// ============================================================================

#[test]
fn test_automation_applies_at_block_boundary() {
    let mut host = configured_host(BusLayout::STEREO, SAMPLE_RATE, 1024, PeakSettings::new(1000.0, 0.0, 1.0));
    let input = sine(1000.0, SAMPLE_RATE, 8192, 0.5);
    let mut left = input.clone();
    let mut right = input.clone();

    // First half flat, second half boosted
    let (l1, l2) = left.split_at_mut(4096);
    let (r1, r2) = right.split_at_mut(4096);
    let mut first = [l1.to_vec(), r1.to_vec()];
    host.process_planar(&mut first).unwrap();
    host.parameters().set(ParamId::PeakGain, 12.0);
    let mut second = [l2.to_vec(), r2.to_vec()];
    host.process_planar(&mut second).unwrap();

    let flat = tone_amplitude(&first[0][2048..], SAMPLE_RATE, 1000.0);
    let boosted = tone_amplitude(&second[0][2048..], SAMPLE_RATE, 1000.0);
    assert!((flat - 0.5).abs() < 0.005);
    assert!((boosted / 0.5 - 3.981).abs() < 0.04);
}

#[test]
fn test_concurrent_parameter_writes() {
    let mut host = configured_host(BusLayout::STEREO, 48000.0, 256, PeakSettings::new(1000.0, 0.0, 1.0));
    let params = Arc::clone(host.parameters());
    let monitor = host.processor().coefficient_monitor();
    let running = Arc::new(AtomicBool::new(true));

    let writer = {
        let params = Arc::clone(&params);
        let running = Arc::clone(&running);
        thread::spawn(move || {
            let mut step = 0u32;
            while running.load(Ordering::Relaxed) {
                let t = (step % 1000) as f32 / 1000.0;
                params.set(ParamId::PeakGain, -24.0 + 48.0 * t);
                params.set(ParamId::PeakFreq, 20.0 + 19980.0 * t);
                params.set(ParamId::PeakQuality, 0.1 + 9.9 * (1.0 - t));
                step = step.wrapping_add(1);
            }
        })
    };

    let reader = {
        let running = Arc::clone(&running);
        thread::spawn(move || {
            let mut observed = 0usize;
            while running.load(Ordering::Relaxed) {
                assert!(monitor.load().is_stable());
                observed += 1;
            }
            observed
        })
    };

    let input = sine(1000.0, 48000.0, 256, 0.5);
    for _ in 0..400 {
        let output = render_offline(&mut host, &[input.clone(), input.clone()]).unwrap();
        assert!(output[0].iter().all(|s| s.is_finite()));
        assert_eq!(output[0], output[1]);
    }

    running.store(false, Ordering::Relaxed);
    writer.join().unwrap();
    assert!(reader.join().unwrap() > 0);
}

// ============================================================================
// PROPERTIES
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn prop_block_size_does_not_change_output(
        block_size in 1usize..1500,
        gain in -24.0f32..24.0,
        freq in 30.0f32..18000.0,
        q in 0.1f32..10.0,
    ) {
        let peak = PeakSettings::new(freq, gain, q);
        let input = log_sweep(20.0, 20000.0, SAMPLE_RATE, 4000);

        let whole = render_stereo(&input, SAMPLE_RATE, 4000, peak);
        let chunked = render_stereo(&input, SAMPLE_RATE, block_size, peak);
        prop_assert_eq!(whole, chunked);
    }

    #[test]
    fn prop_gain_direction_at_center(
        gain in prop_oneof![-24.0f32..-1.0, 1.0f32..24.0],
        freq in 200.0f32..12000.0,
        q in 0.3f32..6.0,
    ) {
        let params = ParameterSet::new();
        PeakSettings::new(freq, gain, q).apply(&params);
        // Round-trip through the parameter grid before rendering a tone at the snapped frequency
        let center = params.value(ParamId::PeakFreq);

        let input = sine(center, 48000.0, 24000, 0.25);
        let output = render_stereo(&input, 48000.0, 512, PeakSettings::new(center, gain, q));
        let m = measure(&input, &output[0], 48000.0, center);

        if gain > 0.0 {
            prop_assert!(m.output_amplitude > m.input_amplitude);
        } else {
            prop_assert!(m.output_amplitude < m.input_amplitude);
        }
    }
}
