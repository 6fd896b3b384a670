use crate::eval;
use crate::error::MertResult;
use crate::line_search::{LineSearch, LineSearchOutcome};
use crate::metric::Metric;
use crate::nbest::{Candidate, NBestList};
use crate::weights::WeightVector;
use std::sync::Arc;
use typed_builder::TypedBuilder;

/// Everything a tuning run reads: candidates, metric, fixed weights and
/// search settings. Built once and shared read-only between workers.
#[derive(TypedBuilder)]
pub struct TuneContext {
    pub nbest: Arc<NBestList>,
    pub metric: Arc<dyn Metric>,

    /// Features excluded from optimization, attached at these values for scoring.
    #[builder(default)]
    pub fixed: WeightVector,

    #[builder(default)]
    pub line_search: LineSearch,

    #[builder(default = 100)]
    pub max_sweeps: usize,
}

impl TuneContext {
    /// Line search from free `weights` along `direction`.
    pub fn search(
        &self,
        weights: &WeightVector,
        direction: &WeightVector,
    ) -> MertResult<LineSearchOutcome> {
        self.line_search.search(
            &self.nbest,
            self.metric.as_ref(),
            weights,
            direction,
            &self.fixed,
        )
    }

    /// Metric of the model 1-best under free `weights` plus the fixed ones.
    pub fn evaluate(&self, weights: &WeightVector) -> f64 {
        eval::evaluate(&self.nbest, self.metric.as_ref(), &weights.with(&self.fixed))
    }

    pub fn argmax(&self, weights: &WeightVector) -> Vec<&Candidate> {
        eval::argmax(&self.nbest, &weights.with(&self.fixed))
    }

    /// Every feature of the n-best list that is not fixed, sorted.
    pub fn free_features(&self) -> Vec<String> {
        self.nbest
            .feature_names()
            .into_iter()
            .filter(|name| !self.fixed.contains(name))
            .collect()
    }

    /// Sum of feature vectors of a selection, as free weights.
    pub fn summed_features(&self, selection: &[&Candidate]) -> WeightVector {
        let index = self.nbest.index();
        let mut dense = vec![0.0; index.len()];
        for cand in selection {
            for (id, v) in cand.features.iter() {
                dense[id] += v;
            }
        }
        WeightVector::from_dense(&dense, index).without(&self.fixed)
    }
}
