/// Supplier of a modulatable parameter for one rendering quantum.
///
/// A source is either block-constant (`value`) or sample-accurate for the
/// current quantum. `sample_accurate_values` is valid in both modes and
/// always has block-size length; in constant mode every entry equals
/// `value()`.
pub trait ParameterSource {
    fn value(&self) -> f32;

    fn has_sample_accurate_values(&self) -> bool;

    fn sample_accurate_values(&self) -> &[f32];
}

/// Parameter with a scalar value and optional per-sample automation.
///
/// Automation curves are evaluated elsewhere; this only holds the
/// resulting per-sample values for the quantum being rendered.
#[derive(Debug, Clone)]
pub struct AudioParam {
    default_value: f32,
    value: f32,
    values: Vec<f32>,
    automated: bool,
}

impl AudioParam {
    pub fn new(default_value: f32, block_size: usize) -> Self {
        Self {
            default_value,
            value: default_value,
            values: vec![default_value; block_size],
            automated: false,
        }
    }

    pub fn default_value(&self) -> f32 {
        self.default_value
    }

    /// Set a block-constant value, cancelling any automation.
    pub fn set_value(&mut self, value: f32) {
        self.value = value;
        self.values.fill(value);
        self.automated = false;
    }

    /// Supply per-sample values for the following quanta.
    ///
    /// Shorter input holds its last value to the end of the block; longer
    /// input is truncated. Empty input is ignored. The scalar value follows
    /// the last sample of the block.
    pub fn set_sample_accurate_values(&mut self, values: &[f32]) {
        let Some(&last) = values.last() else {
            return;
        };
        let n = values.len().min(self.values.len());
        self.values[..n].copy_from_slice(&values[..n]);
        self.values[n..].fill(last);
        self.value = self.values.last().copied().unwrap_or(last);
        self.automated = true;
    }

    /// Drop automation and hold the current scalar value.
    pub fn cancel_automation(&mut self) {
        let value = self.value;
        self.set_value(value);
    }

    pub fn block_size(&self) -> usize {
        self.values.len()
    }
}

impl ParameterSource for AudioParam {
    fn value(&self) -> f32 {
        self.value
    }

    fn has_sample_accurate_values(&self) -> bool {
        self.automated
    }

    fn sample_accurate_values(&self) -> &[f32] {
        &self.values
    }
}
