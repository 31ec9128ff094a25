//! Scoring one template's scale band against a frame.

use crate::search::cancel::CancelToken;
use crate::search::coarse::SearchFrame;
use crate::search::{Aggregation, MatchConfig};
use crate::template::Template;

/// Best scalar score of one template over its levels.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct TemplateScore {
    /// Highest aggregated score over the evaluated levels.
    pub best: f32,
    /// Scale of the level that produced `best`, if any level fit the frame.
    pub scale: Option<f32>,
    /// Whether some level reached the threshold.
    pub matched: bool,
}

/// Scores `template` level by level, stopping at the first level whose
/// aggregated score reaches the threshold.
///
/// `Max` uses the coarse-to-fine search; `TopKMean` needs every placement and
/// scores the dense map.
///
/// Returns `None` if `cancel` was raised between levels.
pub(crate) fn score_template(
    frame: &SearchFrame<'_>,
    template: &Template,
    cfg: &MatchConfig,
    cancel: &CancelToken,
) -> Option<TemplateScore> {
    let mut result = TemplateScore {
        best: f32::NEG_INFINITY,
        scale: None,
        matched: false,
    };

    for level in template.levels() {
        if cancel.is_cancelled() {
            return None;
        }
        let scalar = match cfg.aggregation {
            Aggregation::Max => frame.best_score(level),
            Aggregation::TopKMean => frame.score_map(level.plan()).map(|map| map.top_k_mean()),
        };
        let Some(scalar) = scalar else {
            continue;
        };
        if scalar > result.best || result.scale.is_none() {
            result.best = scalar;
            result.scale = Some(level.scale());
        }
        if scalar >= cfg.threshold {
            result.matched = true;
            break;
        }
    }

    Some(result)
}
