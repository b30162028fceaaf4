//! One-cycle wave tables for table-lookup synthesis.
//!
//! A stored table always carries one extra trailing sample equal to the
//! first, so linear interpolation across the cycle boundary never needs a
//! wrap-around index.

use rustfft::FftPlanner;
use rustfft::num_complex::Complex;

use crate::error::{Result, WavegenError};
use crate::waveform::WaveformKind;

/// Points per cycle, excluding the wrap sample. Power of 2 for the FFT.
pub const TABLE_SIZE: usize = 4096;

/// Lowest fundamental the basic tables are band-limited for.
const LOWEST_FUNDAMENTAL_HZ: f32 = 20.0;

const MAX_HARMONICS: usize = TABLE_SIZE / 2 - 1;

/// Immutable one-cycle wave table shared by every oscillator that uses it.
#[derive(Debug, Clone, PartialEq)]
pub struct PeriodicWave {
    kind: WaveformKind,
    table: Box<[f32]>,
}

impl PeriodicWave {
    /// Build the band-limited table for a basic waveform at `sample_rate`.
    ///
    /// The harmonic count depends on the sample rate, so tables built for
    /// different rates differ. `Custom` has no series and yields silence.
    pub fn basic(kind: WaveformKind, sample_rate: f32) -> Self {
        let harmonics = harmonics_for(sample_rate);
        let cycle = synthesize(harmonics, |_| 0.0, |n| kind.harmonic(n), true);
        Self::with_wrap(kind, cycle)
    }

    /// Build a custom wave from cosine (`real`) and sine (`imag`) terms.
    ///
    /// Index 0 (DC) is ignored. Both slices must have the same length and
    /// describe at least the fundamental.
    pub fn from_coefficients(real: &[f32], imag: &[f32], normalize: bool) -> Result<Self> {
        if real.len() != imag.len() {
            return Err(WavegenError::InvalidArgument(format!(
                "coefficient lengths differ: real {} vs imag {}",
                real.len(),
                imag.len()
            )));
        }
        if real.len() < 2 {
            return Err(WavegenError::InvalidArgument(
                "at least two coefficients are required".to_string(),
            ));
        }

        let harmonics = (real.len() - 1).min(MAX_HARMONICS);
        let cycle = synthesize(
            harmonics,
            |n| f64::from(real[n]),
            |n| f64::from(imag[n]),
            normalize,
        );
        Ok(Self::with_wrap(WaveformKind::Custom, cycle))
    }

    /// Wrap an arbitrary single cycle given as raw samples.
    pub fn from_table(cycle: Vec<f32>) -> Result<Self> {
        if cycle.len() < 2 {
            return Err(WavegenError::InvalidArgument(format!(
                "a wave table needs at least 2 samples, got {}",
                cycle.len()
            )));
        }
        Ok(Self::with_wrap(WaveformKind::Custom, cycle))
    }

    fn with_wrap(kind: WaveformKind, mut cycle: Vec<f32>) -> Self {
        let first = cycle[0];
        cycle.push(first);
        Self {
            kind,
            table: cycle.into_boxed_slice(),
        }
    }

    pub fn kind(&self) -> WaveformKind {
        self.kind
    }

    /// Stored samples, including the trailing wrap sample.
    pub fn table(&self) -> &[f32] {
        &self.table
    }

    /// Number of interpolation segments (stored length minus one).
    pub fn segments(&self) -> usize {
        self.table.len() - 1
    }
}

fn harmonics_for(sample_rate: f32) -> usize {
    let nyquist_bound = (sample_rate / 2.0 / LOWEST_FUNDAMENTAL_HZ).floor();
    if nyquist_bound.is_finite() && nyquist_bound >= 1.0 {
        (nyquist_bound as usize).min(MAX_HARMONICS)
    } else {
        1
    }
}

/// Inverse FFT of a harmonic series into `TABLE_SIZE` time-domain samples.
fn synthesize(
    harmonics: usize,
    real: impl Fn(usize) -> f64,
    imag: impl Fn(usize) -> f64,
    normalize: bool,
) -> Vec<f32> {
    let mut spectrum = vec![Complex::new(0.0f64, 0.0); TABLE_SIZE];
    for n in 1..=harmonics {
        let a = real(n);
        let b = imag(n);
        // a*cos + b*sin split across the conjugate bins
        spectrum[n] = Complex::new(a / 2.0, -b / 2.0);
        spectrum[TABLE_SIZE - n] = Complex::new(a / 2.0, b / 2.0);
    }

    let mut planner = FftPlanner::<f64>::new();
    let ifft = planner.plan_fft_inverse(TABLE_SIZE);
    ifft.process(&mut spectrum);

    let peak = spectrum.iter().fold(0.0f64, |acc, c| acc.max(c.re.abs()));
    let scale = if normalize && peak > 0.0 { 1.0 / peak } else { 1.0 };

    spectrum.iter().map(|c| (c.re * scale) as f32).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrap_invariant() {
        for kind in WaveformKind::BASIC {
            let wave = PeriodicWave::basic(kind, 44_100.0);
            let table = wave.table();
            assert_eq!(table.len(), TABLE_SIZE + 1);
            assert_eq!(table[0], table[TABLE_SIZE]);
            assert_eq!(wave.segments(), TABLE_SIZE);
            assert_eq!(wave.kind(), kind);
        }
    }

    #[test]
    fn test_basic_sine_shape() {
        let wave = PeriodicWave::basic(WaveformKind::Sine, 48_000.0);
        let table = wave.table();
        assert!(table[0].abs() < 1e-6);
        assert!((table[TABLE_SIZE / 4] - 1.0).abs() < 1e-6);
        assert!(table[TABLE_SIZE / 2].abs() < 1e-6);
        assert!((table[3 * TABLE_SIZE / 4] + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_basic_tables_normalized() {
        for kind in WaveformKind::BASIC {
            let wave = PeriodicWave::basic(kind, 44_100.0);
            let peak = wave.table().iter().fold(0.0f32, |acc, s| acc.max(s.abs()));
            assert!((peak - 1.0).abs() < 1e-5, "{kind} peak was {peak}");
        }
    }

    #[test]
    fn test_square_polarity() {
        let wave = PeriodicWave::basic(WaveformKind::Square, 44_100.0);
        let table = wave.table();
        // normalized to the Gibbs overshoot, so the plateau sits near 0.85
        assert!(table[TABLE_SIZE / 4] > 0.8);
        assert!(table[3 * TABLE_SIZE / 4] < -0.8);
        let plateau = &table[TABLE_SIZE / 8..3 * TABLE_SIZE / 8];
        let mean = plateau.iter().sum::<f32>() / plateau.len() as f32;
        assert!(mean > 0.8 && mean < 1.0, "plateau mean {mean}");
    }

    #[test]
    fn test_sample_rate_changes_table() {
        let a = PeriodicWave::basic(WaveformKind::Sawtooth, 22_050.0);
        let b = PeriodicWave::basic(WaveformKind::Sawtooth, 44_100.0);
        assert_ne!(a, b);
    }

    #[test]
    fn test_from_coefficients_matches_sine() {
        let wave = PeriodicWave::from_coefficients(&[0.0, 0.0], &[0.0, 1.0], true).unwrap();
        let reference = PeriodicWave::basic(WaveformKind::Sine, 44_100.0);
        assert_eq!(wave.kind(), WaveformKind::Custom);
        for (a, b) in wave.table().iter().zip(reference.table()) {
            assert!((a - b).abs() < 1e-6);
        }
    }

    #[test]
    fn test_from_coefficients_cosine_unnormalized() {
        let wave = PeriodicWave::from_coefficients(&[0.0, 0.5], &[0.0, 0.0], false).unwrap();
        assert!((wave.table()[0] - 0.5).abs() < 1e-6);
        assert!(wave.table()[TABLE_SIZE / 4].abs() < 1e-6);
    }

    #[test]
    fn test_invalid_coefficients() {
        assert!(matches!(
            PeriodicWave::from_coefficients(&[0.0, 1.0], &[0.0], true),
            Err(WavegenError::InvalidArgument(_))
        ));
        assert!(matches!(
            PeriodicWave::from_coefficients(&[0.0], &[0.0], true),
            Err(WavegenError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_from_table() {
        let wave = PeriodicWave::from_table(vec![1.0, -1.0]).unwrap();
        assert_eq!(wave.table(), &[1.0, -1.0, 1.0]);
        assert_eq!(wave.segments(), 2);
        assert!(PeriodicWave::from_table(vec![0.5]).is_err());
    }
}
