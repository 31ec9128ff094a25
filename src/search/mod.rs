//! Concurrent multi-template matching.
//!
//! Every template is scored on its own task in a bounded rayon pool. Results
//! are collected on the calling thread in completion order; the first result
//! that decides the tick raises a shared [`CancelToken`] so tasks that have not
//! started yet skip their work. Tasks already scoring run to completion and
//! their results are recorded as discarded.
//!
//! Inside a task, score map rows and coarse peaks are split across the same
//! pool, so a single template still keeps every worker busy.

pub(crate) mod cancel;
pub(crate) mod coarse;
pub(crate) mod scan;

pub use cancel::CancelToken;

use crate::image::ImageView;
use crate::search::coarse::SearchFrame;
use crate::search::scan::{score_template, TemplateScore};
use crate::template::TemplateSet;
use crate::util::{AutoSceneError, AutoSceneResult};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info_span};

/// Upper bound on matcher worker threads, independent of template count.
pub const MAX_WORKERS: usize = 4;

/// How a score map is reduced to a scalar.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Aggregation {
    /// Highest single placement score.
    #[default]
    Max,
    /// Mean of the `max(10, 1%)` best placement scores.
    TopKMean,
}

/// How per-template verdicts combine into the tick's verdict.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum VerdictPolicy {
    /// True iff any template matches; the first match cancels the rest.
    #[default]
    AnyMatch,
    /// The first completed result that disagrees with the current steady
    /// state decides the tick; later results are ignored.
    FirstDecisive,
}

/// Matching parameters.
#[derive(Clone, Debug, PartialEq)]
pub struct MatchConfig {
    /// Minimum aggregated score for a template to count as present.
    pub threshold: f32,
    /// Score map reduction.
    pub aggregation: Aggregation,
    /// Verdict combination.
    pub policy: VerdictPolicy,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            threshold: 0.8,
            aggregation: Aggregation::Max,
            policy: VerdictPolicy::AnyMatch,
        }
    }
}

/// Result of one template for one frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum TemplateOutcome {
    /// A level reached the threshold.
    Matched { score: f32, scale: f32 },
    /// No level reached the threshold; `score` is the best seen.
    NotMatched { score: f32 },
    /// Cancelled before scoring started.
    Skipped,
    /// Finished after the tick was already decided.
    Discarded { score: f32 },
}

/// Per-template entry of a [`GlobalVerdict`].
#[derive(Clone, Debug, PartialEq)]
pub struct TemplateVerdict {
    pub name: String,
    pub outcome: TemplateOutcome,
}

/// Verdict for one frame across all templates.
#[derive(Clone, Debug, PartialEq)]
pub struct GlobalVerdict {
    /// Whether the pattern is considered present.
    pub matched: bool,
    /// Index of the template whose result decided the tick, if any.
    pub decided_by: Option<usize>,
    /// One entry per template, in template order.
    pub templates: Vec<TemplateVerdict>,
}

/// Returns the worker count: `configured` if given, else twice the template
/// count, clamped to `[1, MAX_WORKERS]` and `[2, MAX_WORKERS]` respectively.
pub fn worker_count(templates: usize, configured: Option<usize>) -> usize {
    match configured {
        Some(n) => n.clamp(1, MAX_WORKERS),
        None => templates.saturating_mul(2).clamp(2, MAX_WORKERS),
    }
}

/// Scores frames against a shared template set on a bounded pool.
pub struct Matcher {
    templates: Arc<TemplateSet>,
    cfg: MatchConfig,
    pool: rayon::ThreadPool,
}

impl Matcher {
    /// Creates a matcher with its own worker pool of `workers` threads.
    pub fn new(templates: Arc<TemplateSet>, cfg: MatchConfig, workers: usize) -> AutoSceneResult<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers.clamp(1, MAX_WORKERS))
            .thread_name(|idx| format!("autoscene-match-{idx}"))
            .build()
            .map_err(|err| AutoSceneError::WorkerPool {
                reason: err.to_string(),
            })?;
        Ok(Self {
            templates,
            cfg,
            pool,
        })
    }

    /// Returns the matching parameters.
    pub fn config(&self) -> &MatchConfig {
        &self.cfg
    }

    /// Returns the shared template set.
    pub fn templates(&self) -> &TemplateSet {
        &self.templates
    }

    /// Returns the number of worker threads.
    pub fn workers(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Evaluates one normalized frame.
    ///
    /// `assumption` is the current steady state (`true` while the overlay is
    /// applied); it only matters for [`VerdictPolicy::FirstDecisive`].
    pub fn evaluate(&self, frame: ImageView<'_, u8>, assumption: bool) -> GlobalVerdict {
        let templates = self.templates.templates();
        let _span = info_span!("evaluate", templates = templates.len()).entered();

        let search = SearchFrame::new(frame);
        let cancel = CancelToken::new();
        let cfg = &self.cfg;
        let mut outcomes = vec![TemplateOutcome::Skipped; templates.len()];
        let mut decided_by = None;
        let (tx, rx) = crossbeam_channel::unbounded::<(usize, Option<TemplateScore>)>();

        self.pool.in_place_scope(|scope| {
            for (idx, template) in templates.iter().enumerate() {
                let tx = tx.clone();
                let cancel = &cancel;
                let search = &search;
                scope.spawn(move |_| {
                    let score = if cancel.is_cancelled() {
                        None
                    } else {
                        score_template(search, template, cfg, cancel)
                    };
                    let _ = tx.send((idx, score));
                });
            }
            drop(tx);

            for (idx, score) in rx.iter() {
                let Some(score) = score else {
                    continue;
                };
                if decided_by.is_some() {
                    outcomes[idx] = TemplateOutcome::Discarded { score: score.best };
                    continue;
                }
                outcomes[idx] = outcome_of(score);
                if is_decisive(cfg.policy, score.matched, assumption) {
                    decided_by = Some(idx);
                    cancel.cancel();
                }
            }
        });

        let matched = match (cfg.policy, decided_by) {
            (VerdictPolicy::AnyMatch, decided) => decided.is_some(),
            (VerdictPolicy::FirstDecisive, Some(_)) => !assumption,
            (VerdictPolicy::FirstDecisive, None) => assumption,
        };

        let templates = templates
            .iter()
            .zip(outcomes)
            .map(|(template, outcome)| {
                debug!(template = template.name(), ?outcome, "template verdict");
                TemplateVerdict {
                    name: template.name().to_string(),
                    outcome,
                }
            })
            .collect();

        GlobalVerdict {
            matched,
            decided_by,
            templates,
        }
    }
}

fn outcome_of(score: TemplateScore) -> TemplateOutcome {
    match (score.matched, score.scale) {
        (true, Some(scale)) => TemplateOutcome::Matched {
            score: score.best,
            scale,
        },
        _ => TemplateOutcome::NotMatched { score: score.best },
    }
}

fn is_decisive(policy: VerdictPolicy, matched: bool, assumption: bool) -> bool {
    match policy {
        VerdictPolicy::AnyMatch => matched,
        VerdictPolicy::FirstDecisive => matched != assumption,
    }
}

#[cfg(test)]
mod tests {
    use super::{is_decisive, worker_count, VerdictPolicy, MAX_WORKERS};

    #[test]
    fn worker_count_is_bounded() {
        assert_eq!(worker_count(1, None), 2);
        assert_eq!(worker_count(2, None), 4);
        assert_eq!(worker_count(40, None), MAX_WORKERS);
        assert_eq!(worker_count(40, Some(16)), MAX_WORKERS);
        assert_eq!(worker_count(3, Some(0)), 1);
    }

    #[test]
    fn decisiveness_follows_policy() {
        assert!(is_decisive(VerdictPolicy::AnyMatch, true, true));
        assert!(!is_decisive(VerdictPolicy::AnyMatch, false, true));
        assert!(is_decisive(VerdictPolicy::FirstDecisive, false, true));
        assert!(!is_decisive(VerdictPolicy::FirstDecisive, true, true));
        assert!(is_decisive(VerdictPolicy::FirstDecisive, true, false));
    }
}
