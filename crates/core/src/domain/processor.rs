//! Block processor
//!
//! `PeakProcessor` is what a plugin host drives. Once per block it snapshots
//! the parameters, derives one coefficient set, installs it into both channel
//! chains and streams each channel through its chain.

use crate::domain::audio::{AudioBuffer, AudioError, BusLayout, ProcessSpec, Result};
use crate::domain::chain::{ChainPosition, MonoChain, Stage};
use crate::domain::dsp::{BiquadCoeffs, ChainSettings};
use crate::domain::parameters::{EditorBindings, ParameterSet};
use crate::domain::state::PluginState;
use crossbeam::utils::{Backoff, CachePadded};
use std::sync::atomic::{fence, AtomicU32, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Single-writer publication slot for a coefficient set
///
/// A sequence counter guards five `AtomicU32` cells holding the f32 bit
/// patterns. The counter is odd while a write is in progress. `publish`
/// never waits; `load` retries until it sees the same even sequence before
/// and after reading the cells.
#[derive(Debug)]
struct CoefficientSlot {
    sequence: CachePadded<AtomicU32>,
    cells: [AtomicU32; 5],
}

impl CoefficientSlot {
    fn new(coeffs: BiquadCoeffs) -> Self {
        let slot = Self {
            sequence: CachePadded::new(AtomicU32::new(0)),
            cells: Default::default(),
        };
        slot.publish(coeffs);
        slot
    }

    /// Store a new set. Only the audio thread calls this.
    ///
    /// A fixed number of atomic stores; never spins or locks.
    #[inline]
    fn publish(&self, coeffs: BiquadCoeffs) {
        let seq = self.sequence.load(Ordering::Relaxed);
        self.sequence.store(seq.wrapping_add(1), Ordering::Relaxed);
        fence(Ordering::Release);

        let values = [coeffs.b0, coeffs.b1, coeffs.b2, coeffs.a1, coeffs.a2];
        for (cell, value) in self.cells.iter().zip(values) {
            cell.store(value.to_bits(), Ordering::Relaxed);
        }

        self.sequence.store(seq.wrapping_add(2), Ordering::Release);
    }

    /// Read a complete set, retrying while a publish is in flight
    fn load(&self) -> BiquadCoeffs {
        let backoff = Backoff::new();
        loop {
            let before = self.sequence.load(Ordering::Acquire);
            if before % 2 == 0 {
                let read = |index: usize| f32::from_bits(self.cells[index].load(Ordering::Relaxed));
                let coeffs = BiquadCoeffs {
                    b0: read(0),
                    b1: read(1),
                    b2: read(2),
                    a1: read(3),
                    a2: read(4),
                };
                fence(Ordering::Acquire);
                if self.sequence.load(Ordering::Relaxed) == before {
                    return coeffs;
                }
            }
            backoff.snooze();
        }
    }
}

/// Read-only view of the coefficients the audio thread last installed
///
/// Cloneable and cheap to hand to a UI thread; every load returns a complete
/// coefficient set.
#[derive(Debug, Clone)]
pub struct CoefficientMonitor {
    slot: Arc<CoefficientSlot>,
}

impl CoefficientMonitor {
    pub fn load(&self) -> BiquadCoeffs {
        self.slot.load()
    }
}

/// Stereo peak-filter processor
pub struct PeakProcessor {
    params: Arc<ParameterSet>,
    left_chain: MonoChain,
    right_chain: MonoChain,
    sample_rate: f32,
    max_block_size: usize,
    layout: BusLayout,
    prepared: bool,
    published: Arc<CoefficientSlot>,
}

impl PeakProcessor {
    pub const NAME: &'static str = "Multiband";

    /// Create a processor with a fresh parameter set
    pub fn new() -> Self {
        Self::with_parameters(ParameterSet::shared())
    }

    /// Create a processor reading from an existing parameter set
    pub fn with_parameters(params: Arc<ParameterSet>) -> Self {
        Self {
            params,
            left_chain: MonoChain::new(),
            right_chain: MonoChain::new(),
            sample_rate: 0.0,
            max_block_size: 0,
            layout: BusLayout::STEREO,
            prepared: false,
            published: Arc::new(CoefficientSlot::new(BiquadCoeffs::IDENTITY)),
        }
    }

    // ========================================================================
    // Host lifecycle
    // ========================================================================

    /// Get ready for playback at a new sample rate and block size.
    ///
    /// Clears all filter state and installs coefficients for the current
    /// parameters. Calling it twice with the same arguments is harmless.
    pub fn prepare(&mut self, sample_rate: f32, max_block_size: usize) {
        if !(sample_rate.is_finite() && sample_rate > 0.0) {
            warn!(sample_rate, "Preparing with invalid sample rate, filter will pass through");
        }

        self.sample_rate = sample_rate;
        self.max_block_size = max_block_size;

        let spec = ProcessSpec {
            sample_rate,
            max_block_size,
            num_channels: 1,
        };
        self.left_chain.prepare(&spec);
        self.right_chain.prepare(&spec);
        self.update_peak_filter(&ChainSettings::from_parameters(&self.params));
        self.prepared = true;

        debug!(sample_rate, max_block_size, "Processor prepared");
    }

    /// Clear both chains' delay lines
    pub fn reset(&mut self) {
        self.left_chain.reset();
        self.right_chain.reset();
    }

    /// Playback stopped; `prepare` must run again before the next block
    pub fn release_resources(&mut self) {
        self.left_chain.release();
        self.right_chain.release();
        self.prepared = false;
        debug!("Processor resources released");
    }

    pub fn is_bus_layout_supported(&self, layout: &BusLayout) -> bool {
        layout.is_supported()
    }

    /// Adopt the bus layout negotiated with the host
    pub fn set_bus_layout(&mut self, layout: BusLayout) -> Result<()> {
        if !self.is_bus_layout_supported(&layout) {
            return Err(AudioError::UnsupportedLayout(format!(
                "{:?} in, {:?} out",
                layout.input, layout.output
            )));
        }
        if layout != self.layout {
            info!(
                inputs = layout.num_input_channels(),
                outputs = layout.num_output_channels(),
                "Bus layout changed"
            );
        }
        self.layout = layout;
        Ok(())
    }

    // ========================================================================
    // Audio thread
    // ========================================================================

    /// Process one block in place.
    ///
    /// Output channels without a matching input are cleared. Every sample of
    /// the block is filtered with the same coefficient set, so fast
    /// automation steps at block boundaries.
    pub fn process_block(&mut self, buffer: &mut AudioBuffer) {
        let total_inputs = self.layout.num_input_channels();
        let num_samples = buffer.num_samples();
        for channel in total_inputs..buffer.num_channels() {
            buffer.clear(channel, 0, num_samples);
        }

        debug_assert!(self.prepared, "process_block called before prepare");
        if !self.prepared {
            return;
        }

        let settings = ChainSettings::from_parameters(&self.params);
        self.update_peak_filter(&settings);

        let channels = buffer.num_channels().min(total_inputs);
        if channels > 0 {
            self.left_chain.process(buffer.channel_mut(0));
        }
        if channels > 1 {
            self.right_chain.process(buffer.channel_mut(1));
        }
    }

    fn update_peak_filter(&mut self, settings: &ChainSettings) {
        let coeffs = BiquadCoeffs::peak(self.sample_rate, settings);
        self.left_chain
            .get_mut(ChainPosition::Peak)
            .replace_coefficients(coeffs);
        self.right_chain
            .get_mut(ChainPosition::Peak)
            .replace_coefficients(coeffs);
        self.published.publish(coeffs);
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Coefficients installed by the most recent block or `prepare`
    pub fn current_coefficients(&self) -> BiquadCoeffs {
        self.published.load()
    }

    pub fn coefficient_monitor(&self) -> CoefficientMonitor {
        CoefficientMonitor {
            slot: Arc::clone(&self.published),
        }
    }

    pub fn parameters(&self) -> &Arc<ParameterSet> {
        &self.params
    }

    pub fn editor_bindings(&self) -> EditorBindings {
        EditorBindings::new(Arc::clone(&self.params))
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    pub fn max_block_size(&self) -> usize {
        self.max_block_size
    }

    pub fn bus_layout(&self) -> BusLayout {
        self.layout
    }

    pub fn is_prepared(&self) -> bool {
        self.prepared
    }

    pub fn left_chain(&self) -> &MonoChain {
        &self.left_chain
    }

    pub fn right_chain(&self) -> &MonoChain {
        &self.right_chain
    }

    // ========================================================================
    // Plugin metadata
    // ========================================================================

    pub fn tail_length_seconds(&self) -> f64 {
        0.0
    }

    pub fn accepts_midi(&self) -> bool {
        false
    }

    pub fn produces_midi(&self) -> bool {
        false
    }

    pub fn num_programs(&self) -> usize {
        1
    }

    // ========================================================================
    // State
    // ========================================================================

    /// Serialize the current parameter values
    pub fn get_state(&self) -> Result<Vec<u8>> {
        PluginState::capture(&self.params).encode()
    }

    /// Restore parameter values from a blob produced by `get_state`.
    ///
    /// Invalid data is rejected and the parameters stay as they are.
    pub fn set_state(&self, data: &[u8]) -> Result<()> {
        let state = PluginState::decode(data).map_err(|e| {
            warn!(error = %e, "Ignoring invalid plugin state");
            e
        })?;
        state.apply(&self.params);
        Ok(())
    }
}

impl Default for PeakProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for PeakProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PeakProcessor")
            .field("sample_rate", &self.sample_rate)
            .field("max_block_size", &self.max_block_size)
            .field("layout", &self.layout)
            .field("prepared", &self.prepared)
            .finish()
    }
}
