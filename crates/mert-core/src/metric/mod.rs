pub mod bleu;
pub mod model_score;
pub mod references;

pub use self::bleu::{BleuMetric, BleuStats};
pub use self::model_score::ModelScoreMetric;
pub use self::references::{load_references, References};

use crate::consts::DEFAULT_BLEU_ORDER;
use crate::error::{MertError, MertResult};
use crate::nbest::{Candidate, NBestList};
use std::sync::Arc;

/// Incremental corpus-level score over one selected candidate per position.
///
/// `None` positions are placeholders and score as if absent. Each search call
/// owns its accumulator; they are never shared between threads.
pub trait Accumulator: Send {
    fn add(&mut self, candidate: Option<&Candidate>);

    /// Overwrites position `index`. Positions past the end are padded with `None`.
    fn replace(&mut self, index: usize, candidate: Option<&Candidate>);

    fn score(&self) -> f64;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Recombination predicate: two accumulators over the same prefix length
    /// with equal signatures reach the same final score from any continuation.
    /// `None` means the metric offers no recombination.
    fn recombination_signature(&self) -> Option<Vec<i64>> {
        None
    }

    fn clone_box(&self) -> Box<dyn Accumulator>;
}

impl Clone for Box<dyn Accumulator> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

pub trait Metric: Send + Sync {
    fn name(&self) -> String;

    fn accumulator(&self) -> Box<dyn Accumulator>;

    /// Checks the metric against the list it will score and warms any caches.
    fn prepare(&self, _nbest: &NBestList) -> MertResult<()> {
        Ok(())
    }

    /// Scores a complete selection from scratch.
    fn score_selection(&self, selection: &[&Candidate]) -> f64 {
        let mut acc = self.accumulator();
        for cand in selection {
            acc.add(Some(cand));
        }
        acc.score()
    }
}

/// Resolves a metric name: `bleu` or `bleu:N`.
pub fn create(name: &str, references: Arc<References>) -> MertResult<Arc<dyn Metric>> {
    let lowered = name.to_ascii_lowercase();
    let (base, arg) = match lowered.split_once(':') {
        Some((b, a)) => (b, Some(a)),
        None => (lowered.as_str(), None),
    };

    match base {
        "bleu" => {
            let order = match arg {
                None => DEFAULT_BLEU_ORDER,
                Some(a) => a
                    .parse::<usize>()
                    .ok()
                    .filter(|&n| n > 0)
                    .ok_or_else(|| MertError::UnknownMetric(name.to_string()))?,
            };
            Ok(Arc::new(BleuMetric::new(references, order)))
        }
        _ => Err(MertError::UnknownMetric(name.to_string())),
    }
}
