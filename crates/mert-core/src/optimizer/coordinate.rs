use super::{unit, PointOptimizer};
use crate::consts::MIN_OBJECTIVE_DIFF;
use crate::context::TuneContext;
use crate::error::MertResult;
use crate::weights::WeightVector;
use fastrand::Rng;
use tracing::debug;

/// Koehn-style coordinate ascent: line-search every feature axis, move along
/// the axis that scored best, repeat until the gain vanishes.
#[derive(Debug, Clone, Copy, Default)]
pub struct CoordinateAscent;

impl PointOptimizer for CoordinateAscent {
    fn name(&self) -> String {
        "koehn".to_string()
    }

    fn optimize(
        &self,
        ctx: &TuneContext,
        start: WeightVector,
        _rng: &mut Rng,
    ) -> MertResult<WeightVector> {
        let axes: Vec<String> = start.names().map(String::from).collect();
        let mut wts = start;
        let mut eval = ctx.evaluate(&wts);

        for sweep in 0..ctx.max_sweeps {
            let mut best: Option<(WeightVector, f64, &str)> = None;

            for axis in &axes {
                let moved = ctx.search(&wts, &unit(axis))?.weights;
                let e = ctx.evaluate(&moved);
                if best.as_ref().map_or(true, |b| e > b.1) {
                    best = Some((moved, e, axis.as_str()));
                }
            }

            let Some((moved, e, axis)) = best else {
                break;
            };
            debug!("koehn sweep {}: best axis {} -> {:.5} (was {:.5})", sweep, axis, e, eval);

            let gain = e - eval;
            if gain > 0.0 {
                wts = moved;
                eval = e;
            }
            if gain < MIN_OBJECTIVE_DIFF {
                break;
            }
        }

        Ok(wts)
    }
}
