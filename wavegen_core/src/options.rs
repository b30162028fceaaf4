use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::waveform::WaveformKind;

pub const DEFAULT_FREQUENCY: f32 = 440.0;
pub const DEFAULT_DETUNE: f32 = 0.0;
pub const DEFAULT_PULSE_WIDTH: f32 = 0.5;
pub const DEFAULT_PHASE_SHIFT: f32 = 0.0;

pub const DEFAULT_SAMPLE_RATE: f32 = 44_100.0;
pub const DEFAULT_BLOCK_SIZE: usize = 128;

/// How the pulse-width sign gate compares against the running phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PhaseGating {
    /// Compare the unwrapped phase against `pi * pulse_width` in both
    /// paths. Only the very first cycle is ever gated positive.
    #[default]
    Literal,
    /// Compare the phase reduced to one cycle against `pulse_width` as a
    /// fraction of that cycle, in the path's own unit.
    Wrapped,
}

/// Construction options for an oscillator node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct OscillatorOptions {
    #[serde(rename = "type")]
    pub kind: WaveformKind,
    pub frequency: f32,
    pub detune: f32,
    pub pulse_width: f32,
    pub phase_shift: f32,
    pub gating: PhaseGating,
}

impl Default for OscillatorOptions {
    fn default() -> Self {
        Self {
            kind: WaveformKind::Sine,
            frequency: DEFAULT_FREQUENCY,
            detune: DEFAULT_DETUNE,
            pulse_width: DEFAULT_PULSE_WIDTH,
            phase_shift: DEFAULT_PHASE_SHIFT,
            gating: PhaseGating::Literal,
        }
    }
}

impl OscillatorOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse options from JSON. Missing fields keep their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn with_kind(mut self, kind: WaveformKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_frequency(mut self, frequency: f32) -> Self {
        self.frequency = frequency;
        self
    }

    pub fn with_detune(mut self, cents: f32) -> Self {
        self.detune = cents;
        self
    }

    pub fn with_pulse_width(mut self, pulse_width: f32) -> Self {
        self.pulse_width = pulse_width;
        self
    }

    pub fn with_phase_shift(mut self, phase_shift: f32) -> Self {
        self.phase_shift = phase_shift;
        self
    }

    pub fn with_gating(mut self, gating: PhaseGating) -> Self {
        self.gating = gating;
        self
    }
}

/// Rendering setup shared by every node of one render context.
///
/// Deserialized configs go through the same clamping as the builders, so
/// block size and channel count are never zero.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "RawRenderConfig")]
pub struct RenderConfig {
    pub sample_rate: f32,
    pub block_size: usize,
    pub channels: usize,
}

#[derive(Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct RawRenderConfig {
    sample_rate: f32,
    block_size: usize,
    channels: usize,
}

impl Default for RawRenderConfig {
    fn default() -> Self {
        let config = RenderConfig::default();
        Self {
            sample_rate: config.sample_rate,
            block_size: config.block_size,
            channels: config.channels,
        }
    }
}

impl From<RawRenderConfig> for RenderConfig {
    fn from(raw: RawRenderConfig) -> Self {
        RenderConfig::new()
            .with_sample_rate(raw.sample_rate)
            .with_block_size(raw.block_size)
            .with_channels(raw.channels)
    }
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            block_size: DEFAULT_BLOCK_SIZE,
            channels: 1,
        }
    }
}

impl RenderConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a config from JSON. Missing fields keep their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Copy with zero block size or channel count raised to one.
    pub fn normalized(self) -> Self {
        self.with_block_size(self.block_size).with_channels(self.channels)
    }

    pub fn with_sample_rate(mut self, sample_rate: f32) -> Self {
        self.sample_rate = sample_rate;
        self
    }

    pub fn with_block_size(mut self, block_size: usize) -> Self {
        self.block_size = block_size.max(1);
        self
    }

    pub fn with_channels(mut self, channels: usize) -> Self {
        self.channels = channels.max(1);
        self
    }

    pub fn balanced() -> Self {
        Self::new().with_sample_rate(48_000.0).with_block_size(128).with_channels(2)
    }

    pub fn low_latency() -> Self {
        Self::new().with_sample_rate(48_000.0).with_block_size(64).with_channels(2)
    }

    /// Duration of one quantum in seconds.
    pub fn quantum_seconds(&self) -> f64 {
        self.block_size as f64 / f64::from(self.sample_rate)
    }
}

impl fmt::Display for RenderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}ch @ {}Hz, quantum: {} frames",
            self.channels, self.sample_rate, self.block_size
        )
    }
}
