use super::{Greedy, MetricMaximizer};
use crate::consts::HILL_CLIMB_MAX_PASSES;
use crate::error::MertResult;
use crate::metric::Metric;
use crate::nbest::{Candidate, NBestList};
use std::sync::Arc;
use tracing::trace;

/// Greedy start followed by coordinate-wise re-optimization passes.
#[derive(Clone, Default)]
pub struct HillClimbing {
    tie_break: Option<Arc<dyn Metric>>,
}

/// Objective after each pass and the number of positions it changed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClimbTrace {
    pub initial_score: f64,
    pub pass_scores: Vec<f64>,
    pub pass_changes: Vec<usize>,
}

impl HillClimbing {
    pub fn new() -> Self {
        Self::default()
    }

    /// Equal-score candidates are then ranked by `metric`.
    pub fn with_tie_break(metric: Arc<dyn Metric>) -> Self {
        Self {
            tie_break: Some(metric),
        }
    }

    pub fn climb<'a>(
        &self,
        nbest: &'a NBestList,
        metric: &dyn Metric,
    ) -> (Vec<&'a Candidate>, ClimbTrace) {
        let (mut selection, mut acc) = Greedy::select(nbest, metric);
        let mut tie_acc = self.tie_break.as_ref().map(|m| {
            let mut a = m.accumulator();
            for cand in &selection {
                a.add(Some(cand));
            }
            a
        });

        let mut trace = ClimbTrace {
            initial_score: acc.score(),
            ..ClimbTrace::default()
        };

        for pass in 0..HILL_CLIMB_MAX_PASSES {
            let mut changes = 0;

            for (i, list) in nbest.sentences().iter().enumerate() {
                let current = selection[i];
                let mut best = current;
                let mut best_score = acc.score();
                let mut best_tie = tie_acc.as_ref().map(|a| a.score());

                for cand in list {
                    if cand.rank == best.rank {
                        continue;
                    }
                    acc.replace(i, Some(cand));
                    let s = acc.score();

                    if s > best_score {
                        best = cand;
                        best_score = s;
                        if let Some(t) = tie_acc.as_mut() {
                            t.replace(i, Some(cand));
                            best_tie = Some(t.score());
                        }
                    } else if s == best_score {
                        if let (Some(t), Some(bt)) = (tie_acc.as_mut(), best_tie) {
                            t.replace(i, Some(cand));
                            let ts = t.score();
                            if ts > bt {
                                best = cand;
                                best_tie = Some(ts);
                            } else {
                                t.replace(i, Some(best));
                            }
                        }
                    }
                }

                acc.replace(i, Some(best));
                if best.rank != current.rank {
                    changes += 1;
                    selection[i] = best;
                }
            }

            trace!("hill climbing pass {}: {} changes, score {}", pass, changes, acc.score());
            trace.pass_scores.push(acc.score());
            trace.pass_changes.push(changes);
            if changes == 0 {
                break;
            }
        }

        (selection, trace)
    }
}

impl MetricMaximizer for HillClimbing {
    fn maximize<'a>(
        &self,
        nbest: &'a NBestList,
        metric: &dyn Metric,
    ) -> MertResult<Vec<&'a Candidate>> {
        Ok(self.climb(nbest, metric).0)
    }
}
