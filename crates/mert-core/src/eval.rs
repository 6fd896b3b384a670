use crate::error::MertResult;
use crate::maximizer::{HillClimbing, MetricMaximizer};
use crate::metric::{Metric, ModelScoreMetric};
use crate::nbest::{Candidate, NBestList};
use crate::weights::WeightVector;
use std::sync::Arc;

/// Model 1-best per sentence; the earliest candidate wins ties.
///
/// This is what the greedy maximizer returns for the (decomposable) model
/// score metric, computed per sentence with exact comparisons.
pub fn argmax<'a>(nbest: &'a NBestList, weights: &WeightVector) -> Vec<&'a Candidate> {
    let dense = weights.to_dense(nbest.index());
    argmax_dense(nbest, &dense)
}

pub fn argmax_dense<'a>(nbest: &'a NBestList, dense: &[f64]) -> Vec<&'a Candidate> {
    nbest
        .sentences()
        .iter()
        .map(|list| {
            let mut best = &list[0];
            let mut best_score = best.score(dense);
            for cand in &list[1..] {
                let s = cand.score(dense);
                if s > best_score {
                    best = cand;
                    best_score = s;
                }
            }
            best
        })
        .collect()
}

/// Corpus metric of the model 1-best selection under `weights`.
pub fn evaluate(nbest: &NBestList, metric: &dyn Metric, weights: &WeightVector) -> f64 {
    metric.score_selection(&argmax(nbest, weights))
}

/// Best reachable selection under `metric`, ties going to the model's preference.
pub fn oracle<'a>(
    nbest: &'a NBestList,
    metric: &dyn Metric,
    maximizer: &dyn MetricMaximizer,
) -> MertResult<(Vec<&'a Candidate>, f64)> {
    let selection = maximizer.maximize(nbest, metric)?;
    let score = metric.score_selection(&selection);
    Ok((selection, score))
}

/// Hill-climbing oracle that breaks metric ties by model score under `weights`.
pub fn model_guided_oracle<'a>(
    nbest: &'a NBestList,
    metric: &dyn Metric,
    weights: &WeightVector,
) -> Vec<&'a Candidate> {
    let model = Arc::new(ModelScoreMetric::new(weights.to_dense(nbest.index())));
    HillClimbing::with_tie_break(model).climb(nbest, metric).0
}

/// Metric value of each candidate of `sentence` swapped into `selection`.
pub fn incontext_scores(
    nbest: &NBestList,
    metric: &dyn Metric,
    selection: &[&Candidate],
    sentence: usize,
) -> Vec<f64> {
    let mut acc = metric.accumulator();
    for cand in selection {
        acc.add(Some(cand));
    }
    nbest
        .get(sentence)
        .iter()
        .map(|cand| {
            acc.replace(sentence, Some(cand));
            acc.score()
        })
        .collect()
}

/// Features occurring in at least `min_lists` sentences' candidate lists.
pub fn feature_whitelist(nbest: &NBestList, min_lists: usize) -> Vec<String> {
    let mut names: Vec<String> = nbest
        .feature_occurrences()
        .into_iter()
        .filter(|&(_, count)| count >= min_lists)
        .filter_map(|(id, _)| nbest.index().name(id))
        .collect();
    names.sort();
    names
}
