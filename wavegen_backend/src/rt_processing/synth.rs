//! Per-sample oscillator synthesis.
//!
//! Two phase units coexist: the sine path accumulates radians, the table
//! path accumulates cycles. Neither wraps its phase; the caller owns the
//! accumulator and stores whatever the render functions return.

use std::f64::consts::{PI, TAU};
use std::ops::Range;

use wavegen_core::{ParameterSource, PeriodicWave, PhaseGating};

/// Frequency/detune evaluation for one quantum.
#[derive(Debug, Clone, Copy)]
pub enum ParamMode<'a> {
    /// Both parameters hold for the whole block.
    Constant { frequency: f32, detune: f32 },
    /// At least one parameter is automated; both are read per sample.
    /// Frames past the end of an array hold its last value.
    SampleAccurate {
        frequency: &'a [f32],
        detune: &'a [f32],
    },
}

impl<'a> ParamMode<'a> {
    /// Falls back to `Constant` when a source reports per-sample values
    /// but hands out an empty array.
    pub fn resolve<F, D>(frequency: &'a F, detune: &'a D) -> Self
    where
        F: ParameterSource + ?Sized,
        D: ParameterSource + ?Sized,
    {
        let automated =
            frequency.has_sample_accurate_values() || detune.has_sample_accurate_values();
        let frequency_values = frequency.sample_accurate_values();
        let detune_values = detune.sample_accurate_values();
        if automated && !frequency_values.is_empty() && !detune_values.is_empty() {
            ParamMode::SampleAccurate {
                frequency: frequency_values,
                detune: detune_values,
            }
        } else {
            ParamMode::Constant {
                frequency: frequency.value(),
                detune: detune.value(),
            }
        }
    }

    pub fn is_sample_accurate(&self) -> bool {
        matches!(self, ParamMode::SampleAccurate { .. })
    }
}

/// Block-constant shaping parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Shape {
    pub pulse_width: f32,
    pub phase_shift: f32,
    pub gating: PhaseGating,
}

impl Shape {
    /// Sign multiplier for `phase`, where `cycle` is one period in the
    /// path's phase unit.
    #[inline]
    fn sign(&self, phase: f64, cycle: f64) -> f64 {
        let pulse_width = f64::from(self.pulse_width);
        let positive = match self.gating {
            PhaseGating::Literal => phase < PI * pulse_width,
            PhaseGating::Wrapped => phase.rem_euclid(cycle) < cycle * pulse_width,
        };
        if positive { 1.0 } else { -1.0 }
    }
}

/// Running phase of one oscillator, continuous across quanta.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PhaseAccumulator {
    phase: f64,
}

impl PhaseAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn value(&self) -> f64 {
        self.phase
    }

    pub fn set(&mut self, phase: f64) {
        self.phase = phase;
    }
}

/// Value of an automation array at frame `i`, holding the last entry.
#[inline]
fn held(values: &[f32], i: usize) -> f32 {
    match values.get(i) {
        Some(value) => *value,
        None => values.last().copied().unwrap_or(0.0),
    }
}

/// `frequency * 2^(detune / 1200)`, detune in cents.
#[inline]
pub fn computed_frequency(frequency: f32, detune: f32) -> f64 {
    f64::from(frequency) * 2.0f64.powf(f64::from(detune) / 1200.0)
}

/// Closed-form sine into `out[range]`. Returns the advanced phase (radians).
pub fn render_sine(
    out: &mut [f32],
    range: Range<usize>,
    mode: ParamMode<'_>,
    shape: Shape,
    sample_rate: f32,
    mut phase: f64,
) -> f64 {
    let frequency_to_phase_incr = TAU / f64::from(sample_rate);
    let shift = TAU * f64::from(shape.phase_shift);

    match mode {
        ParamMode::Constant { frequency, detune } => {
            let phase_incr = frequency_to_phase_incr * computed_frequency(frequency, detune);
            for sample in &mut out[range] {
                *sample = ((phase + shift).sin() * shape.sign(phase, TAU)) as f32;
                phase += phase_incr;
            }
        }
        ParamMode::SampleAccurate { frequency, detune } => {
            for i in range {
                out[i] = ((phase + shift).sin() * shape.sign(phase, TAU)) as f32;
                phase += frequency_to_phase_incr
                    * computed_frequency(held(frequency, i), held(detune, i));
            }
        }
    }

    phase
}

/// Interpolated table lookup into `out[range]`. Returns the advanced phase
/// (cycles).
pub fn render_wave(
    out: &mut [f32],
    range: Range<usize>,
    mode: ParamMode<'_>,
    shape: Shape,
    wave: &PeriodicWave,
    sample_rate: f32,
    mut phase: f64,
) -> f64 {
    let table = wave.table();
    let segments = wave.segments() as f64;
    let frequency_to_phase_incr = 1.0 / f64::from(sample_rate);
    let shift = f64::from(shape.phase_shift) * segments;

    match mode {
        ParamMode::Constant { frequency, detune } => {
            let phase_incr = frequency_to_phase_incr * computed_frequency(frequency, detune);
            for sample in &mut out[range] {
                *sample = lookup(table, segments, phase * segments + shift, shape.sign(phase, 1.0));
                phase += phase_incr;
            }
        }
        ParamMode::SampleAccurate { frequency, detune } => {
            for i in range {
                out[i] = lookup(table, segments, phase * segments + shift, shape.sign(phase, 1.0));
                phase += frequency_to_phase_incr
                    * computed_frequency(held(frequency, i), held(detune, i));
            }
        }
    }

    phase
}

/// Linear interpolation at fractional `position`, gating both neighbours.
#[inline]
fn lookup(table: &[f32], segments: f64, position: f64, sign: f64) -> f32 {
    let idx = position.rem_euclid(segments);
    // rem_euclid can round up to exactly `segments`
    let i = (idx as usize).min(table.len() - 2);
    let frac = idx - i as f64;

    let v0 = f64::from(table[i]) * sign;
    let v1 = f64::from(table[i + 1]) * sign;
    (v0 + frac * (v1 - v0)) as f32
}
