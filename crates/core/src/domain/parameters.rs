//! Host-visible parameter set
//!
//! Every parameter stores its plain value in its own atomic cell. The UI or
//! host automation thread writes, the audio thread reads once per block, and
//! nobody takes a lock. There is no multi-parameter transaction: two
//! parameters written together may become visible in different blocks.

use crate::domain::dsp::params;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Atomically stored f32 for lock-free parameter updates
#[derive(Debug)]
pub struct AtomicF32(AtomicU32);

impl AtomicF32 {
    pub fn new(value: f32) -> Self {
        Self(AtomicU32::new(value.to_bits()))
    }

    #[inline]
    pub fn load(&self) -> f32 {
        f32::from_bits(self.0.load(Ordering::Relaxed))
    }

    #[inline]
    pub fn store(&self, value: f32) {
        self.0.store(value.to_bits(), Ordering::Relaxed);
    }
}

impl Default for AtomicF32 {
    fn default() -> Self {
        Self::new(0.0)
    }
}

/// Normalisable value range with optional step and skew
///
/// Normalized position `p` maps to `min + (max - min) * p^(1/skew)`, so a skew
/// below 1.0 spends more of the knob travel on the low end of the range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamRange {
    pub min: f32,
    pub max: f32,
    /// Snapping interval in plain units, 0.0 for continuous
    pub step: f32,
    pub skew: f32,
}

impl ParamRange {
    pub const fn new(min: f32, max: f32, step: f32, skew: f32) -> Self {
        Self {
            min,
            max,
            step,
            skew,
        }
    }

    pub const fn linear(min: f32, max: f32, step: f32) -> Self {
        Self::new(min, max, step, 1.0)
    }

    /// Clamp to the range and snap to the step grid.
    ///
    /// The grid is anchored at zero, so `min` and `max` should be multiples
    /// of `step`.
    pub fn constrain(&self, value: f32) -> f32 {
        let value = if value.is_nan() { self.min } else { value };
        let mut value = value.clamp(self.min, self.max);
        if self.step > 0.0 {
            let step = self.step as f64;
            value = ((value as f64 / step).round() * step) as f32;
            value = value.clamp(self.min, self.max);
        }
        value
    }

    /// Plain value to [0, 1].
    pub fn normalize(&self, value: f32) -> f32 {
        let span = self.max - self.min;
        if span <= 0.0 {
            return 0.0;
        }
        let proportion = ((value.clamp(self.min, self.max) - self.min) / span).clamp(0.0, 1.0);
        if self.skew == 1.0 || proportion <= 0.0 {
            proportion
        } else {
            proportion.powf(self.skew)
        }
    }

    /// [0, 1] to a plain value, unsnapped.
    pub fn denormalize(&self, normalized: f32) -> f32 {
        let mut proportion = normalized.clamp(0.0, 1.0);
        if self.skew != 1.0 && proportion > 0.0 {
            proportion = (proportion.ln() / self.skew).exp();
        }
        self.min + (self.max - self.min) * proportion
    }
}

/// Identifiers of every declared parameter
///
/// Only the three `Peak*` parameters feed the signal path. The rest describe
/// a multiband distortion layout that nothing consumes yet; they are stored
/// and persisted like any other parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ParamId {
    PeakGain,
    PeakFreq,
    PeakQuality,
    Gain,
    Distortion,
    Band1Gain,
    Band2Gain,
    Band3Gain,
    Band4Gain,
    Band1Freq,
    Band2Freq,
    Band3Freq,
    Band4Freq,
    Output,
}

impl ParamId {
    pub const ALL: [ParamId; 14] = [
        ParamId::PeakGain,
        ParamId::PeakFreq,
        ParamId::PeakQuality,
        ParamId::Gain,
        ParamId::Distortion,
        ParamId::Band1Gain,
        ParamId::Band2Gain,
        ParamId::Band3Gain,
        ParamId::Band4Gain,
        ParamId::Band1Freq,
        ParamId::Band2Freq,
        ParamId::Band3Freq,
        ParamId::Band4Freq,
        ParamId::Output,
    ];

    /// Stable identifier used by hosts and persisted state
    pub fn as_str(&self) -> &'static str {
        match self {
            ParamId::PeakGain => "Peak Gain",
            ParamId::PeakFreq => "Peak Freq",
            ParamId::PeakQuality => "Peak Quality",
            ParamId::Gain => "Gain",
            ParamId::Distortion => "Distortion",
            ParamId::Band1Gain => "Band 1 Gain",
            ParamId::Band2Gain => "Band 2 Gain",
            ParamId::Band3Gain => "Band 3 Gain",
            ParamId::Band4Gain => "Band 4 Gain",
            ParamId::Band1Freq => "Band 1 Freq",
            ParamId::Band2Freq => "Band 2 Freq",
            ParamId::Band3Freq => "Band 3 Freq",
            ParamId::Band4Freq => "Band 4 Freq",
            ParamId::Output => "Output",
        }
    }

    pub fn from_str_id(id: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|param| param.as_str() == id)
    }

    /// Whether the processing core reads this parameter
    pub fn is_consumed(&self) -> bool {
        matches!(
            self,
            ParamId::PeakGain | ParamId::PeakFreq | ParamId::PeakQuality
        )
    }

    #[inline]
    fn index(&self) -> usize {
        *self as usize
    }
}

impl fmt::Display for ParamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

const DB_RANGE: ParamRange = ParamRange::linear(params::GAIN_DB_MIN, params::GAIN_DB_MAX, 0.1);
const FREQ_RANGE: ParamRange = ParamRange::new(params::FREQ_PARAM_MIN, params::FREQ_PARAM_MAX, 1.0, 0.25);

/// A continuous, ranged, host-automatable parameter
#[derive(Debug)]
pub struct FloatParam {
    id: ParamId,
    unit: &'static str,
    range: ParamRange,
    default: f32,
    value: AtomicF32,
}

impl FloatParam {
    pub fn new(id: ParamId, unit: &'static str, range: ParamRange, default: f32) -> Self {
        let default = range.constrain(default);
        Self {
            id,
            unit,
            range,
            default,
            value: AtomicF32::new(default),
        }
    }

    pub fn id(&self) -> ParamId {
        self.id
    }

    pub fn name(&self) -> &'static str {
        self.id.as_str()
    }

    pub fn unit(&self) -> &'static str {
        self.unit
    }

    pub fn range(&self) -> ParamRange {
        self.range
    }

    pub fn default_value(&self) -> f32 {
        self.default
    }

    /// Current plain value. Wait-free.
    #[inline]
    pub fn value(&self) -> f32 {
        self.value.load()
    }

    /// Store a plain value, clamped and snapped to the range.
    pub fn set(&self, value: f32) {
        self.value.store(self.range.constrain(value));
    }

    pub fn normalized(&self) -> f32 {
        self.range.normalize(self.value())
    }

    pub fn set_normalized(&self, normalized: f32) {
        self.set(self.range.denormalize(normalized));
    }

    pub fn reset(&self) {
        self.value.store(self.default);
    }

    /// Human-readable value, e.g. `"-3.5 dB"`
    pub fn display_value(&self) -> String {
        let value = self.value();
        let text = if self.range.step >= 1.0 {
            format!("{:.0}", value)
        } else if self.range.step >= 0.1 {
            format!("{:.1}", value)
        } else {
            format!("{:.2}", value)
        };
        if self.unit.is_empty() {
            text
        } else {
            format!("{} {}", text, self.unit)
        }
    }
}

/// Build the full parameter layout in host order.
pub fn create_parameter_layout() -> Vec<FloatParam> {
    ParamId::ALL
        .iter()
        .map(|&id| match id {
            ParamId::PeakGain => FloatParam::new(id, "dB", DB_RANGE, 0.0),
            ParamId::PeakFreq => FloatParam::new(id, "Hz", FREQ_RANGE, params::DEFAULT_PEAK_FREQ_HZ),
            ParamId::PeakQuality => FloatParam::new(
                id,
                "",
                ParamRange::new(params::Q_PARAM_MIN, params::Q_PARAM_MAX, 0.05, 0.5),
                params::DEFAULT_PEAK_QUALITY,
            ),
            ParamId::Gain | ParamId::Output => FloatParam::new(id, "dB", DB_RANGE, 0.0),
            ParamId::Distortion => FloatParam::new(id, "", ParamRange::linear(0.0, 1.0, 0.01), 0.0),
            ParamId::Band1Gain | ParamId::Band2Gain | ParamId::Band3Gain | ParamId::Band4Gain => {
                FloatParam::new(id, "dB", DB_RANGE, 0.0)
            }
            ParamId::Band1Freq => FloatParam::new(id, "Hz", FREQ_RANGE, 100.0),
            ParamId::Band2Freq => FloatParam::new(id, "Hz", FREQ_RANGE, 500.0),
            ParamId::Band3Freq => FloatParam::new(id, "Hz", FREQ_RANGE, 2000.0),
            ParamId::Band4Freq => FloatParam::new(id, "Hz", FREQ_RANGE, 8000.0),
        })
        .collect()
}

/// The plugin's parameter registry
///
/// Share it between threads as `Arc<ParameterSet>`; every accessor takes
/// `&self`.
#[derive(Debug)]
pub struct ParameterSet {
    params: Vec<FloatParam>,
}

impl ParameterSet {
    pub fn new() -> Self {
        Self {
            params: create_parameter_layout(),
        }
    }

    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Typed O(1) access, used by the audio thread.
    #[inline]
    pub fn get(&self, id: ParamId) -> &FloatParam {
        &self.params[id.index()]
    }

    /// Current plain value of a parameter.
    #[inline]
    pub fn value(&self, id: ParamId) -> f32 {
        self.get(id).value()
    }

    pub fn set(&self, id: ParamId, value: f32) {
        self.get(id).set(value);
    }

    /// Look up a parameter by its string identifier.
    pub fn by_name(&self, name: &str) -> Option<&FloatParam> {
        ParamId::from_str_id(name).map(|id| self.get(id))
    }

    pub fn iter(&self) -> impl Iterator<Item = &FloatParam> {
        self.params.iter()
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn reset_all(&self) {
        for param in &self.params {
            param.reset();
        }
    }

    /// Plain values of every parameter keyed by identifier
    pub fn values(&self) -> BTreeMap<String, f32> {
        self.params
            .iter()
            .map(|param| (param.name().to_string(), param.value()))
            .collect()
    }

    /// Apply stored values. Unknown identifiers are skipped and counted.
    pub fn apply_values(&self, values: &BTreeMap<String, f32>) -> usize {
        let mut unknown = 0;
        for (name, value) in values {
            match self.by_name(name) {
                Some(param) => param.set(*value),
                None => {
                    debug!(name = %name, "Ignoring unknown parameter");
                    unknown += 1;
                }
            }
        }
        unknown
    }
}

impl Default for ParameterSet {
    fn default() -> Self {
        Self::new()
    }
}

/// Binding between a rotary control and one parameter
///
/// The control works in normalized knob positions, the parameter in plain
/// units. Reads and writes go straight to the atomic cell.
#[derive(Debug, Clone)]
pub struct ParameterAttachment {
    params: Arc<ParameterSet>,
    id: ParamId,
}

impl ParameterAttachment {
    pub fn new(params: Arc<ParameterSet>, id: ParamId) -> Self {
        Self { params, id }
    }

    pub fn param_id(&self) -> ParamId {
        self.id
    }

    /// Knob position in [0, 1]
    pub fn position(&self) -> f32 {
        self.params.get(self.id).normalized()
    }

    pub fn set_position(&self, position: f32) {
        self.params.get(self.id).set_normalized(position);
    }

    /// Double-click on the knob
    pub fn reset(&self) {
        self.params.get(self.id).reset();
    }

    pub fn display_text(&self) -> String {
        self.params.get(self.id).display_value()
    }
}

/// Control bindings exposed to an editor
///
/// Only the peak gain knob is wired to a visible control.
#[derive(Debug, Clone)]
pub struct EditorBindings {
    pub peak_gain: ParameterAttachment,
}

impl EditorBindings {
    pub fn new(params: Arc<ParameterSet>) -> Self {
        Self {
            peak_gain: ParameterAttachment::new(params, ParamId::PeakGain),
        }
    }
}
