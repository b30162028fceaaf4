use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::WavegenError;

/// Waveform enumeration for dynamic waveform selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WaveformKind {
    #[default]
    Sine,
    Sawtooth,
    Triangle,
    Square,
    /// User supplied periodic wave. Never pooled in the cache.
    Custom,
}

impl WaveformKind {
    /// Kinds that can be selected by name and resolved through the cache.
    pub const BASIC: [WaveformKind; 4] = [
        WaveformKind::Sine,
        WaveformKind::Sawtooth,
        WaveformKind::Triangle,
        WaveformKind::Square,
    ];

    pub fn is_basic(self) -> bool {
        !matches!(self, WaveformKind::Custom)
    }

    /// Sine renders in closed form, everything else reads a table.
    pub fn uses_table(self) -> bool {
        !matches!(self, WaveformKind::Sine)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            WaveformKind::Sine => "sine",
            WaveformKind::Sawtooth => "sawtooth",
            WaveformKind::Triangle => "triangle",
            WaveformKind::Square => "square",
            WaveformKind::Custom => "custom",
        }
    }

    /// Fourier sine coefficient of harmonic `n` (n >= 1) for the basic kinds.
    pub(crate) fn harmonic(self, n: usize) -> f64 {
        use std::f64::consts::PI;

        let nf = n as f64;
        let odd = n % 2 == 1;
        match self {
            WaveformKind::Sine => {
                if n == 1 {
                    1.0
                } else {
                    0.0
                }
            }
            WaveformKind::Square => {
                if odd {
                    4.0 / (nf * PI)
                } else {
                    0.0
                }
            }
            WaveformKind::Sawtooth => {
                let sign = if odd { 1.0 } else { -1.0 };
                sign * 2.0 / (nf * PI)
            }
            WaveformKind::Triangle => {
                if odd {
                    let sign = if (n - 1) / 2 % 2 == 0 { 1.0 } else { -1.0 };
                    sign * 8.0 / (nf * nf * PI * PI)
                } else {
                    0.0
                }
            }
            WaveformKind::Custom => 0.0,
        }
    }
}

impl fmt::Display for WaveformKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WaveformKind {
    type Err = WavegenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sine" => Ok(WaveformKind::Sine),
            "sawtooth" => Ok(WaveformKind::Sawtooth),
            "triangle" => Ok(WaveformKind::Triangle),
            "square" => Ok(WaveformKind::Square),
            "custom" => Ok(WaveformKind::Custom),
            other => Err(WavegenError::UnknownWaveform(other.to_string())),
        }
    }
}
