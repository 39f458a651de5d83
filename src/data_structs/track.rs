use serde::{
    Deserialize,
    Serialize,
};

/// A contiguous range of diagonal offsets `[lo, hi)` with the sum and count
/// of the valid pixels it covers (one triangle).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DistanceBin {
    pub lo:      usize,
    pub hi:      usize,
    pub sum:     f64,
    pub n_valid: usize,
}

impl DistanceBin {
    /// Mean contact frequency of the bin, `None` when it has no valid pixels.
    pub fn mean(&self) -> Option<f64> {
        (self.n_valid > 0).then(|| self.sum / self.n_valid as f64)
    }

    pub fn contains(
        &self,
        offset: usize,
    ) -> bool {
        self.lo <= offset && offset < self.hi
    }
}

/// Per-bin log2 insulation score and boundary strength.
///
/// `boundary_strength` is defined only at called boundaries, where it holds
/// the prominence reported by the peak finder.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct InsulationTrack {
    pub score:             Vec<Option<f64>>,
    pub boundary_strength: Vec<Option<f64>>,
}

impl InsulationTrack {
    pub fn len(&self) -> usize {
        self.score.len()
    }

    pub fn is_empty(&self) -> bool {
        self.score.is_empty()
    }

    /// Indices of the called boundaries.
    pub fn boundaries(&self) -> Vec<usize> {
        self.boundary_strength
            .iter()
            .enumerate()
            .filter_map(|(i, strength)| strength.map(|_| i))
            .collect()
    }

    /// Scores with NaN in place of missing values.
    pub fn score_nan(&self) -> Vec<f64> {
        self.score
            .iter()
            .map(|v| v.unwrap_or(f64::NAN))
            .collect()
    }
}
