//! Per-channel filter chain
//!
//! A `MonoChain` is a fixed-size, ordered array of stages. Stages are a tagged
//! enum rather than boxed trait objects, so the chain lives inline in the
//! processor and processing never touches the heap.

use crate::domain::audio::ProcessSpec;
use crate::domain::dsp::{BiquadCoeffs, BiquadFilter};

/// Position of each stage in the chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ChainPosition {
    Peak = 0,
}

impl ChainPosition {
    pub const COUNT: usize = 1;
    pub const ALL: [ChainPosition; Self::COUNT] = [ChainPosition::Peak];

    pub fn name(&self) -> &'static str {
        match self {
            ChainPosition::Peak => "Peak",
        }
    }
}

/// Capability shared by everything a chain can hold
pub trait Stage: Send {
    /// Size and clear internal state for a new stream configuration
    fn prepare(&mut self, spec: &ProcessSpec);

    /// Process samples in place. Must not allocate or block.
    fn process(&mut self, buffer: &mut [f32]);

    /// Clear internal state, keep configuration
    fn reset(&mut self);

    /// Install a new coefficient set
    fn replace_coefficients(&mut self, coeffs: BiquadCoeffs);

    fn name(&self) -> &str;
}

impl Stage for BiquadFilter {
    fn prepare(&mut self, _spec: &ProcessSpec) {
        BiquadFilter::reset(self);
    }

    fn process(&mut self, buffer: &mut [f32]) {
        BiquadFilter::process(self, buffer);
    }

    fn reset(&mut self) {
        BiquadFilter::reset(self);
    }

    fn replace_coefficients(&mut self, coeffs: BiquadCoeffs) {
        BiquadFilter::replace_coefficients(self, coeffs);
    }

    fn name(&self) -> &str {
        "Biquad"
    }
}

/// One slot of the chain
#[derive(Debug, Clone, PartialEq)]
pub enum ChainStage {
    Peak(BiquadFilter),
}

impl ChainStage {
    pub fn position(&self) -> ChainPosition {
        match self {
            ChainStage::Peak(_) => ChainPosition::Peak,
        }
    }

    pub fn coefficients(&self) -> &BiquadCoeffs {
        match self {
            ChainStage::Peak(filter) => filter.coefficients(),
        }
    }

    /// Delay line holds only zeros
    pub fn is_silent(&self) -> bool {
        match self {
            ChainStage::Peak(filter) => filter.is_silent(),
        }
    }
}

impl Stage for ChainStage {
    fn prepare(&mut self, spec: &ProcessSpec) {
        match self {
            ChainStage::Peak(filter) => Stage::prepare(filter, spec),
        }
    }

    #[inline]
    fn process(&mut self, buffer: &mut [f32]) {
        match self {
            ChainStage::Peak(filter) => filter.process(buffer),
        }
    }

    fn reset(&mut self) {
        match self {
            ChainStage::Peak(filter) => filter.reset(),
        }
    }

    #[inline]
    fn replace_coefficients(&mut self, coeffs: BiquadCoeffs) {
        match self {
            ChainStage::Peak(filter) => filter.replace_coefficients(coeffs),
        }
    }

    fn name(&self) -> &str {
        self.position().name()
    }
}

/// Ordered filter chain for a single audio channel
#[derive(Debug, Clone, PartialEq)]
pub struct MonoChain {
    stages: [ChainStage; ChainPosition::COUNT],
    spec: Option<ProcessSpec>,
}

impl MonoChain {
    /// Create an unprepared chain with pass-through stages
    pub fn new() -> Self {
        Self {
            stages: [ChainStage::Peak(BiquadFilter::bypass())],
            spec: None,
        }
    }

    /// Clear every delay line and remember the stream configuration.
    ///
    /// Idempotent. Must run before the first `process` and whenever the
    /// sample rate or maximum block size changes.
    pub fn prepare(&mut self, spec: &ProcessSpec) {
        for stage in &mut self.stages {
            stage.prepare(spec);
        }
        self.spec = Some(*spec);
    }

    pub fn is_prepared(&self) -> bool {
        self.spec.is_some()
    }

    pub fn spec(&self) -> Option<&ProcessSpec> {
        self.spec.as_ref()
    }

    /// Mark the chain unprepared. State is left as is.
    pub fn release(&mut self) {
        self.spec = None;
    }

    /// Run every sample through every stage in chain order.
    #[inline]
    pub fn process(&mut self, buffer: &mut [f32]) {
        debug_assert!(self.is_prepared(), "MonoChain::process called before prepare");
        for stage in &mut self.stages {
            stage.process(buffer);
        }
    }

    /// Clear delay lines, keep coefficients
    pub fn reset(&mut self) {
        for stage in &mut self.stages {
            stage.reset();
        }
    }

    pub fn get(&self, position: ChainPosition) -> &ChainStage {
        &self.stages[position as usize]
    }

    pub fn get_mut(&mut self, position: ChainPosition) -> &mut ChainStage {
        &mut self.stages[position as usize]
    }

    pub fn stages(&self) -> &[ChainStage] {
        &self.stages
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}

impl Default for MonoChain {
    fn default() -> Self {
        Self::new()
    }
}
