pub mod coordinate;
pub mod powell;
pub mod random;
pub mod registry;

pub use self::coordinate::CoordinateAscent;
pub use self::powell::Powell;
pub use self::random::{CerStyle, RandomAltPair, RandomPairs, RandomPoint};
pub use self::registry::{OptimizerRegistry, Sequence};

use crate::context::TuneContext;
use crate::error::MertResult;
use crate::nbest::Candidate;
use crate::weights::WeightVector;
use fastrand::Rng;

/// Improves one starting point. Works on free weights only; the driver
/// strips fixed features before the call and re-attaches them after.
pub trait PointOptimizer: Send + Sync {
    fn name(&self) -> String;

    fn optimize(
        &self,
        ctx: &TuneContext,
        start: WeightVector,
        rng: &mut Rng,
    ) -> MertResult<WeightVector>;

    /// Whether results should be L1-normalized by the driver.
    fn normalizes(&self) -> bool {
        true
    }
}

pub(crate) fn unit(feature: &str) -> WeightVector {
    let mut dir = WeightVector::new();
    dir.set(feature, 1.0);
    dir
}

/// One uniformly random candidate per sentence.
pub(crate) fn random_selection<'a>(ctx: &'a TuneContext, rng: &mut Rng) -> Vec<&'a Candidate> {
    ctx.nbest
        .sentences()
        .iter()
        .map(|list| &list[rng.usize(..list.len())])
        .collect()
}

/// One random candidate per sentence among those that, swapped into the
/// current 1-best selection, score at least as well as it.
pub(crate) fn random_better_selection<'a>(
    ctx: &'a TuneContext,
    weights: &WeightVector,
    rng: &mut Rng,
) -> Vec<&'a Candidate> {
    let current = ctx.argmax(weights);
    let mut acc = ctx.metric.accumulator();
    for cand in &current {
        acc.add(Some(cand));
    }
    let base = acc.score();

    ctx.nbest
        .sentences()
        .iter()
        .enumerate()
        .map(|(i, list)| {
            let better: Vec<&Candidate> = list
                .iter()
                .filter(|&cand| {
                    acc.replace(i, Some(cand));
                    acc.score() >= base
                })
                .collect();
            acc.replace(i, Some(current[i]));
            if better.is_empty() {
                current[i]
            } else {
                better[rng.usize(..better.len())]
            }
        })
        .collect()
}
