//! Coarse-to-fine search for the best placement of one template level.
//!
//! The frame is box-downsampled once per tick. A level with a coarse plan is
//! scored densely on the matching coarse frame, the strongest local maxima are
//! rescored at full resolution in a small neighbourhood, and each is climbed to
//! the best exact score around it. Small placement grids and levels without a
//! coarse plan are scored densely.

use crate::candidate::peaks::{local_peaks, Peak};
use crate::image::integral::IntegralImage;
use crate::image::pyramid::downsample_box;
use crate::image::{ImageView, OwnedImage};
use crate::kernel::{placements, zncc_at, zncc_score_map, ScoreMap};
use crate::template::{TemplateLevel, TemplatePlan, COARSE_FACTORS};
use rayon::prelude::*;
use tracing::trace;

/// Placement counts up to this are always scored densely.
const DENSE_LIMIT: usize = 4096;
/// Coarse peaks rescored at full resolution.
const BEAM_WIDTH: usize = 8;
/// Upper bound on hill-climbing steps per peak.
const MAX_CLIMB: usize = 64;

struct CoarseFrame {
    factor: usize,
    image: OwnedImage,
    integral: IntegralImage,
}

/// A normalized frame with its integral image and coarse copies, shared
/// read-only by every template task of one tick.
pub(crate) struct SearchFrame<'a> {
    image: ImageView<'a, u8>,
    integral: IntegralImage,
    coarse: Vec<CoarseFrame>,
}

impl<'a> SearchFrame<'a> {
    pub(crate) fn new(image: ImageView<'a, u8>) -> Self {
        let integral = IntegralImage::build(image);
        let coarse = COARSE_FACTORS
            .iter()
            .filter_map(|&factor| {
                let image = downsample_box(image, factor).ok()?;
                let integral = IntegralImage::build(image.view());
                Some(CoarseFrame {
                    factor,
                    image,
                    integral,
                })
            })
            .collect();
        Self {
            image,
            integral,
            coarse,
        }
    }

    /// Dense full-resolution score map of one level.
    pub(crate) fn score_map(&self, plan: &TemplatePlan) -> Option<ScoreMap> {
        zncc_score_map(self.image, &self.integral, plan)
    }

    /// Highest score of `level` over the frame, or `None` if it does not fit.
    pub(crate) fn best_score(&self, level: &TemplateLevel) -> Option<f32> {
        let plan = level.plan();
        let (map_width, map_height) = placements(self.image, plan)?;
        if map_width * map_height <= DENSE_LIMIT {
            return self.score_map(plan).map(|map| map.max());
        }

        let coarse = level.coarse().and_then(|coarse| {
            let frame = self.coarse.iter().find(|f| f.factor == coarse.factor())?;
            let map = zncc_score_map(frame.image.view(), &frame.integral, coarse.plan())?;
            Some((coarse.factor(), map))
        });
        let Some((factor, map)) = coarse else {
            return self.score_map(plan).map(|map| map.max());
        };

        let peaks = local_peaks(&map, BEAM_WIDTH);
        trace!(
            factor,
            peaks = peaks.len(),
            coarse_best = peaks.first().map(|p| p.score),
            "coarse peaks"
        );
        peaks
            .par_iter()
            .map(|peak| self.refine(plan, peak, factor, map_width, map_height))
            .reduce_with(f32::max)
    }

    /// Rescores the full-resolution neighbourhood of a coarse peak, then
    /// climbs to the best 8-connected neighbour until no neighbour improves.
    fn refine(
        &self,
        plan: &TemplatePlan,
        peak: &Peak,
        factor: usize,
        map_width: usize,
        map_height: usize,
    ) -> f32 {
        let score_at = |x: usize, y: usize| zncc_at(self.image, &self.integral, plan, x, y);
        let window = |center: usize, radius: usize, len: usize| {
            center.saturating_sub(radius).min(len - 1)..=(center + radius).min(len - 1)
        };

        let mut best = (0, 0, f32::NEG_INFINITY);
        let (cx, cy) = (peak.x * factor, peak.y * factor);
        for y in window(cy, factor, map_height) {
            for x in window(cx, factor, map_width) {
                let score = score_at(x, y);
                if score > best.2 {
                    best = (x, y, score);
                }
            }
        }

        for _ in 0..MAX_CLIMB {
            let (bx, by, current) = best;
            for y in window(by, 1, map_height) {
                for x in window(bx, 1, map_width) {
                    if (x, y) == (bx, by) {
                        continue;
                    }
                    let score = score_at(x, y);
                    if score > best.2 {
                        best = (x, y, score);
                    }
                }
            }
            if best.2 <= current {
                break;
            }
        }
        best.2
    }
}
