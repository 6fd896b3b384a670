use super::{Accumulator, Metric};
use crate::nbest::Candidate;
use std::sync::Arc;

/// Sum of linear model scores of the selected candidates.
///
/// Maximizing it with the greedy strategy yields the model argmax, which is
/// how final weights are turned into a selection.
#[derive(Debug, Clone)]
pub struct ModelScoreMetric {
    dense: Arc<Vec<f64>>,
}

impl ModelScoreMetric {
    pub fn new(dense: Vec<f64>) -> Self {
        Self {
            dense: Arc::new(dense),
        }
    }
}

impl Metric for ModelScoreMetric {
    fn name(&self) -> String {
        "model-score".to_string()
    }

    fn accumulator(&self) -> Box<dyn Accumulator> {
        Box::new(ModelScoreAccumulator {
            dense: self.dense.clone(),
            scores: Vec::new(),
            total: 0.0,
            compensation: 0.0,
        })
    }
}

#[derive(Clone)]
struct ModelScoreAccumulator {
    dense: Arc<Vec<f64>>,
    scores: Vec<f64>,
    // Neumaier-compensated running sum, so replace cycles do not drift.
    total: f64,
    compensation: f64,
}

impl ModelScoreAccumulator {
    fn score_of(&self, candidate: Option<&Candidate>) -> f64 {
        candidate.map(|c| c.score(&self.dense)).unwrap_or(0.0)
    }

    fn accumulate(&mut self, x: f64) {
        let t = self.total + x;
        if self.total.abs() >= x.abs() {
            self.compensation += (self.total - t) + x;
        } else {
            self.compensation += (x - t) + self.total;
        }
        self.total = t;
    }
}

impl Accumulator for ModelScoreAccumulator {
    fn add(&mut self, candidate: Option<&Candidate>) {
        let s = self.score_of(candidate);
        self.scores.push(s);
        self.accumulate(s);
    }

    fn replace(&mut self, index: usize, candidate: Option<&Candidate>) {
        if index >= self.scores.len() {
            self.scores.resize(index + 1, 0.0);
        }
        let s = self.score_of(candidate);
        let old = self.scores[index];
        self.accumulate(-old);
        self.accumulate(s);
        self.scores[index] = s;
    }

    fn score(&self) -> f64 {
        self.total + self.compensation
    }

    fn len(&self) -> usize {
        self.scores.len()
    }

    /// Sentences contribute independently, so every prefix of equal length is equivalent.
    fn recombination_signature(&self) -> Option<Vec<i64>> {
        Some(Vec::new())
    }

    fn clone_box(&self) -> Box<dyn Accumulator> {
        Box::new(self.clone())
    }
}
