//! Per-feature weights and the dense table that backs an evaluator.

use crate::error::PersistenceError;

pub const MIN_WEIGHT: f32 = -64.0;
pub const MAX_WEIGHT: f32 = 64.0;

/// One feature's learned scalar plus the scratch state a learning rule
/// needs, always present rather than compiled in/out per rule (see
/// DESIGN.md: optional-field layout was rejected in favour of one concrete
/// shape).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Weight {
    pub value: f32,
    /// TD(lambda) eligibility trace; zero and inactive for rules that don't use it.
    pub trace: f32,
    pub trace_active: bool,
    pub step_size: f32,
    /// Running per-weight statistic used by the normalised step-size modes
    /// (sum of squared occurrences observed so far).
    pub running_trace: f32,
    pub update_count: u64,
}

impl Weight {
    pub fn new(step_size: f32) -> Weight {
        Weight {
            value: 0.0,
            trace: 0.0,
            trace_active: false,
            step_size,
            running_trace: 0.0,
            update_count: 0,
        }
    }

    #[inline]
    pub fn clamp_in_place(&mut self) {
        self.value = self.value.clamp(MIN_WEIGHT, MAX_WEIGHT);
    }
}

/// Dense array of weights, one per feature index of some feature set.
#[derive(Debug, Clone)]
pub struct WeightSet {
    feature_set_name: String,
    weights: Vec<Weight>,
}

impl WeightSet {
    pub fn new(feature_set_name: impl Into<String>, num_features: usize, step_size: f32) -> WeightSet {
        WeightSet {
            feature_set_name: feature_set_name.into(),
            weights: vec![Weight::new(step_size); num_features],
        }
    }

    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    pub fn name(&self) -> &str {
        &self.feature_set_name
    }

    #[inline]
    pub fn get(&self, feature_index: usize) -> &Weight {
        &self.weights[feature_index]
    }

    #[inline]
    pub fn get_mut(&mut self, feature_index: usize) -> &mut Weight {
        &mut self.weights[feature_index]
    }

    #[inline]
    pub fn value_of(&self, feature_index: usize) -> f32 {
        self.weights[feature_index].value
    }

    pub fn zero(&mut self) {
        for w in &mut self.weights {
            w.value = 0.0;
        }
    }

    pub fn randomise(&mut self, rng: &mut impl rand::Rng, min: f32, max: f32) {
        for w in &mut self.weights {
            w.value = rng.random_range(min..=max);
        }
    }

    /// Pointwise addition of another weight set's values, used by offline
    /// weight-merging tools. Panics on a size mismatch (a caller-level
    /// programming error, not a recoverable one).
    pub fn add(&mut self, other: &WeightSet) {
        assert_eq!(self.weights.len(), other.weights.len(), "weight set size mismatch");
        for (w, o) in self.weights.iter_mut().zip(other.weights.iter()) {
            w.value += o.value;
        }
    }

    pub fn subtract(&mut self, other: &WeightSet) {
        assert_eq!(self.weights.len(), other.weights.len(), "weight set size mismatch");
        for (w, o) in self.weights.iter_mut().zip(other.weights.iter()) {
            w.value -= o.value;
        }
    }
}

/// How many entries were dropped from the longer side when loading a
/// size-mismatched weight file in non-strict mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadReport {
    pub dropped_from_file: usize,
    pub dropped_from_memory: usize,
}

impl WeightSet {
    /// Writes the binary weight-file format (§6.3): version, name, count,
    /// then the scalar array as little-endian `f32`.
    pub fn save(&self, w: &mut impl std::io::Write) -> Result<(), PersistenceError> {
        crate::persistence::weight_file::save(w, &self.feature_set_name, &self.weights)
    }

    /// Loads weights from `r`. In strict mode, a feature-set name or size
    /// mismatch is rejected outright. In non-strict mode the shared prefix
    /// is loaded and the caller is told how many entries were dropped from
    /// whichever side was longer, rather than the mismatch being silently
    /// swallowed.
    pub fn load(
        &mut self,
        r: &mut impl std::io::Read,
        strict: bool,
    ) -> Result<Option<LoadReport>, PersistenceError> {
        crate::persistence::weight_file::load(r, &self.feature_set_name, &mut self.weights, strict)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_clears_values_but_not_trace_state() {
        let mut ws = WeightSet::new("test", 4, 0.1);
        ws.get_mut(0).value = 3.0;
        ws.get_mut(0).trace = 7.0;
        ws.zero();
        assert_eq!(ws.value_of(0), 0.0);
        assert_eq!(ws.get(0).trace, 7.0);
    }

    #[test]
    fn add_and_subtract_are_inverse() {
        let mut a = WeightSet::new("test", 2, 0.1);
        let mut b = WeightSet::new("test", 2, 0.1);
        a.get_mut(0).value = 1.0;
        b.get_mut(0).value = 2.0;
        a.add(&b);
        assert_eq!(a.value_of(0), 3.0);
        a.subtract(&b);
        assert_eq!(a.value_of(0), 1.0);
    }

    #[test]
    fn clamp_keeps_value_in_band() {
        let mut w = Weight::new(0.1);
        w.value = MAX_WEIGHT + 10.0;
        w.clamp_in_place();
        assert_eq!(w.value, MAX_WEIGHT);
    }
}
