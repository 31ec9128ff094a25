//! Local maxima of score maps.

use crate::kernel::ScoreMap;

/// A placement on a score map.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Peak {
    pub x: usize,
    pub y: usize,
    pub score: f32,
}

/// Returns up to `count` local maxima of `map`, best first.
///
/// A cell is a local maximum when none of its 8 neighbours scores higher, so
/// plateaus yield several peaks.
pub fn local_peaks(map: &ScoreMap, count: usize) -> Vec<Peak> {
    let width = map.width();
    let height = map.height();
    let scores = map.scores();
    if count == 0 || scores.is_empty() {
        return Vec::new();
    }

    let mut peaks = Vec::new();
    for y in 0..height {
        let rows = y.saturating_sub(1)..=(y + 1).min(height - 1);
        for x in 0..width {
            let score = scores[y * width + x];
            let cols = x.saturating_sub(1)..=(x + 1).min(width - 1);
            let is_max = rows
                .clone()
                .all(|ny| cols.clone().all(|nx| scores[ny * width + nx] <= score));
            if is_max {
                peaks.push(Peak { x, y, score });
            }
        }
    }

    peaks.sort_unstable_by(|a, b| b.score.total_cmp(&a.score));
    peaks.truncate(count);
    peaks
}
