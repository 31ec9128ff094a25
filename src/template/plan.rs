//! Template plan precomputation for ZNCC.
//!
//! All statistics are exact integers. With `n` pixels, `S = sum(t)` and
//! `Q = sum(t^2)`, the scaled variance `n * Q - S^2` is what the kernel pairs
//! with the matching window statistic, so a window identical to the template
//! correlates to exactly `1.0`.

use crate::image::{ImageView, OwnedImage};
use crate::util::{AutoSceneError, AutoSceneResult};

/// Precomputed statistics and pixel buffer for one template level.
pub struct TemplatePlan {
    width: usize,
    height: usize,
    pixels: Vec<u8>,
    sum: u64,
    scaled_var: i128,
}

impl TemplatePlan {
    /// Builds a plan from a template view.
    ///
    /// Fails with `DegenerateTemplate` when the level has no intensity
    /// variance, since ZNCC is undefined for a flat template.
    pub fn from_view(tpl: ImageView<'_, u8>) -> AutoSceneResult<Self> {
        let owned = OwnedImage::from_view(tpl)?;
        let width = owned.width();
        let height = owned.height();
        let count = width
            .checked_mul(height)
            .ok_or(AutoSceneError::InvalidDimensions { width, height })?;

        let mut sum = 0u64;
        let mut sum_sq = 0u64;
        for &value in owned.data() {
            let v = u64::from(value);
            sum += v;
            sum_sq += v * v;
        }

        let scaled_var = count as i128 * i128::from(sum_sq) - i128::from(sum) * i128::from(sum);
        if scaled_var <= 0 {
            return Err(AutoSceneError::DegenerateTemplate {
                reason: "zero variance",
            });
        }

        Ok(Self {
            width,
            height,
            pixels: owned.data().to_vec(),
            sum,
            scaled_var,
        })
    }

    /// Returns the template width in pixels.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Returns the template height in pixels.
    pub fn height(&self) -> usize {
        self.height
    }

    /// Returns the number of template pixels.
    pub fn count(&self) -> usize {
        self.width * self.height
    }

    /// Returns the row-major template pixels.
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Returns the sum of template intensities.
    pub fn sum(&self) -> u64 {
        self.sum
    }

    /// Returns `n * sum(t^2) - sum(t)^2`.
    pub fn scaled_var(&self) -> i128 {
        self.scaled_var
    }
}
