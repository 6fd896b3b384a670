use super::MetricMaximizer;
use crate::error::MertResult;
use crate::metric::{Accumulator, Metric};
use crate::nbest::{Candidate, NBestList};

/// One left-to-right pass: each sentence takes the candidate that maximizes
/// the running score of the prefix. First seen wins ties.
#[derive(Debug, Clone, Copy, Default)]
pub struct Greedy;

impl Greedy {
    /// Returns the selection and the accumulator holding it.
    pub fn select<'a>(
        nbest: &'a NBestList,
        metric: &dyn Metric,
    ) -> (Vec<&'a Candidate>, Box<dyn Accumulator>) {
        let mut acc = metric.accumulator();
        let mut selection = Vec::with_capacity(nbest.len());

        for (i, list) in nbest.sentences().iter().enumerate() {
            acc.add(None);

            let mut best: &Candidate = &list[0];
            let mut best_score = f64::NEG_INFINITY;
            for (k, cand) in list.iter().enumerate() {
                acc.replace(i, Some(cand));
                let s = acc.score();
                if k == 0 || s > best_score {
                    best = cand;
                    best_score = s;
                }
            }

            acc.replace(i, Some(best));
            selection.push(best);
        }

        (selection, acc)
    }
}

impl MetricMaximizer for Greedy {
    fn maximize<'a>(
        &self,
        nbest: &'a NBestList,
        metric: &dyn Metric,
    ) -> MertResult<Vec<&'a Candidate>> {
        Ok(Self::select(nbest, metric).0)
    }
}
