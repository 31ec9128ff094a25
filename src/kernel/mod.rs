//! Correlation kernels producing dense score maps.

use crate::candidate::topk::top_k_mean;

pub mod scalar;

pub use scalar::{placements, zncc_at, zncc_score_map};

/// Dense correlation surface of one template level slid over a frame.
///
/// Entry `(x, y)` is the ZNCC score with the template's top-left corner at
/// `(x, y)`. Scores lie in `[-1, 1]`.
#[derive(Clone, Debug)]
pub struct ScoreMap {
    width: usize,
    height: usize,
    scores: Vec<f32>,
}

impl ScoreMap {
    pub(crate) fn new(width: usize, height: usize, scores: Vec<f32>) -> Self {
        debug_assert_eq!(scores.len(), width * height);
        Self {
            width,
            height,
            scores,
        }
    }

    /// Returns the number of placements along x.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Returns the number of placements along y.
    pub fn height(&self) -> usize {
        self.height
    }

    /// Returns the row-major scores.
    pub fn scores(&self) -> &[f32] {
        &self.scores
    }

    /// Returns the score at placement `(x, y)`.
    pub fn get(&self, x: usize, y: usize) -> Option<f32> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.scores.get(y * self.width + x).copied()
    }

    /// Returns the highest score.
    pub fn max(&self) -> f32 {
        self.scores
            .iter()
            .copied()
            .fold(f32::NEG_INFINITY, f32::max)
    }

    /// Returns the mean of the `k` best scores, `k = max(10, 1% of cells)`
    /// clamped to the map size.
    pub fn top_k_mean(&self) -> f32 {
        let cells = self.scores.len();
        let k = (cells / 100).max(10).min(cells);
        top_k_mean(&self.scores, k).unwrap_or(f32::NEG_INFINITY)
    }
}
