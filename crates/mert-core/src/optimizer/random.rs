use super::{random_better_selection, random_selection, PointOptimizer};
use crate::consts::{CER_NO_PROGRESS_LIMIT, MIN_NBEST_OCCURRENCES, NO_PROGRESS_LIMIT, NO_PROGRESS_SSD};
use crate::context::TuneContext;
use crate::error::MertResult;
use crate::eval;
use crate::util::gaussian;
use crate::weights::WeightVector;
use fastrand::Rng;
use tracing::{debug, trace};

/// Repeats `step` until `NO_PROGRESS_LIMIT` consecutive line searches move
/// the weights by less than `NO_PROGRESS_SSD`.
fn until_stalled<F>(ctx: &TuneContext, start: WeightVector, mut direction: F) -> MertResult<WeightVector>
where
    F: FnMut(&WeightVector) -> WeightVector,
{
    let mut wts = start;
    let mut no_progress = 0;
    let cap = ctx.max_sweeps.saturating_mul(NO_PROGRESS_LIMIT);

    for step in 0..cap {
        if no_progress >= NO_PROGRESS_LIMIT {
            break;
        }
        let dir = direction(&wts);
        let moved = ctx.search(&wts, &dir)?.weights;
        let ssd = wts.ssd(&moved);
        if ssd < NO_PROGRESS_SSD {
            no_progress += 1;
        } else {
            no_progress = 0;
        }
        trace!("step {}: ssd {:e} (no progress: {})", step, ssd, no_progress);
        wts = moved;
    }
    Ok(wts)
}

/// Direction between two random selections.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomPairs;

impl PointOptimizer for RandomPairs {
    fn name(&self) -> String {
        "random-pairs".to_string()
    }

    fn optimize(&self, ctx: &TuneContext, start: WeightVector, rng: &mut Rng) -> MertResult<WeightVector> {
        until_stalled(ctx, start, |_| {
            let mut dir = ctx.summed_features(&random_selection(ctx, rng));
            dir.add_scaled(&ctx.summed_features(&random_selection(ctx, rng)), -1.0);
            dir
        })
    }
}

/// Direction towards a random point of the n-best space. With `better`, each
/// sentence only draws among candidates that do not hurt the current score.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomPoint {
    pub better: bool,
}

impl PointOptimizer for RandomPoint {
    fn name(&self) -> String {
        if self.better {
            "random-better".to_string()
        } else {
            "random-point".to_string()
        }
    }

    fn optimize(&self, ctx: &TuneContext, start: WeightVector, rng: &mut Rng) -> MertResult<WeightVector> {
        until_stalled(ctx, start, |wts| {
            let selection = if self.better {
                random_better_selection(ctx, wts, rng)
            } else {
                random_selection(ctx, rng)
            };
            ctx.summed_features(&selection)
        })
    }
}

/// Direction from the current 1-best selection to a random alternative.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomAltPair {
    pub better: bool,
}

impl PointOptimizer for RandomAltPair {
    fn name(&self) -> String {
        if self.better {
            "random-better-alt-pair".to_string()
        } else {
            "random-alt-pair".to_string()
        }
    }

    fn optimize(&self, ctx: &TuneContext, start: WeightVector, rng: &mut Rng) -> MertResult<WeightVector> {
        until_stalled(ctx, start, |wts| {
            let selection = if self.better {
                random_better_selection(ctx, wts, rng)
            } else {
                random_selection(ctx, rng)
            };
            let mut dir = ctx.summed_features(&selection);
            dir.add_scaled(&ctx.summed_features(&ctx.argmax(wts)), -1.0);
            dir
        })
    }
}

/// Random Gaussian directions scaled by each feature's spread, kept
/// orthogonal to the directions already tried.
#[derive(Debug, Clone, Copy, Default)]
pub struct CerStyle;

impl CerStyle {
    /// Standard deviation of each whitelisted feature over all candidates.
    fn feature_spread(ctx: &TuneContext, features: &[String]) -> Vec<(String, f64)> {
        let index = ctx.nbest.index();
        let total = ctx.nbest.candidate_count().max(1) as f64;
        features
            .iter()
            .filter_map(|name| {
                let id = index.get(name)?;
                let (mut sum, mut sum_sq) = (0.0, 0.0);
                for list in ctx.nbest.sentences() {
                    for cand in list {
                        let v = cand.features.get(id);
                        sum += v;
                        sum_sq += v * v;
                    }
                }
                let mean = sum / total;
                let var = (sum_sq / total - mean * mean).max(0.0);
                let sd = var.sqrt();
                (sd > 0.0).then(|| (name.clone(), sd))
            })
            .collect()
    }
}

impl PointOptimizer for CerStyle {
    fn name(&self) -> String {
        "cer".to_string()
    }

    fn optimize(&self, ctx: &TuneContext, start: WeightVector, rng: &mut Rng) -> MertResult<WeightVector> {
        let whitelist: Vec<String> = eval::feature_whitelist(&ctx.nbest, MIN_NBEST_OCCURRENCES)
            .into_iter()
            .filter(|f| start.contains(f))
            .collect();
        let spread = Self::feature_spread(ctx, &whitelist);
        if spread.is_empty() {
            debug!("cer: no feature occurs in {} lists, nothing to do", MIN_NBEST_OCCURRENCES);
            return Ok(start);
        }

        let mut wts = start;
        let mut obj = ctx.evaluate(&wts);
        let mut prior: Vec<WeightVector> = Vec::new();
        let mut no_progress = 0;
        let cap = ctx.max_sweeps.saturating_mul(spread.len());

        for step in 0..cap {
            if no_progress >= CER_NO_PROGRESS_LIMIT {
                break;
            }

            let mut dir: WeightVector = spread
                .iter()
                .map(|(name, sd)| (name.as_str(), gaussian(rng) * sd))
                .collect();

            // Gram-Schmidt against earlier directions.
            for p in &prior {
                let pp = p.dot(p);
                if pp > 0.0 {
                    dir.add_scaled(p, -dir.dot(p) / pp);
                }
            }
            if dir.dot(&dir) < NO_PROGRESS_SSD {
                no_progress += 1;
                prior.clear();
                continue;
            }
            prior.push(dir.clone());
            if prior.len() >= spread.len() {
                prior.clear();
            }

            let moved = ctx.search(&wts, &dir)?.weights;
            let e = ctx.evaluate(&moved);
            let ssd = wts.ssd(&moved);
            if ssd < NO_PROGRESS_SSD || (e - obj).abs() < 1e-9 {
                no_progress += 1;
            } else {
                no_progress = 0;
            }
            trace!("cer step {}: {:.5} -> {:.5} (no progress: {})", step, obj, e, no_progress);

            if e >= obj {
                wts = moved;
                obj = e;
            }
        }

        Ok(wts)
    }
}
