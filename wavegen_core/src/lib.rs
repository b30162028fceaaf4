//! Data model for the wavegen oscillator: waveform kinds, one-cycle wave
//! tables and their cache, parameter sources, options and errors.

pub mod cache;
pub mod error;
pub mod options;
pub mod param;
pub mod periodic_wave;
pub mod waveform;

pub use cache::WaveTableCache;
pub use error::{Result, WavegenError};
pub use options::{OscillatorOptions, PhaseGating, RenderConfig};
pub use param::{AudioParam, ParameterSource};
pub use periodic_wave::PeriodicWave;
pub use waveform::WaveformKind;
