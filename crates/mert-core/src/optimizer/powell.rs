use super::{unit, PointOptimizer};
use crate::consts::MIN_OBJECTIVE_DIFF;
use crate::context::TuneContext;
use crate::error::MertResult;
use crate::weights::WeightVector;
use fastrand::Rng;
use tracing::debug;

/// Powell's conjugate direction method over the feature axes.
///
/// The full variant replaces the direction of largest gain with the combined
/// direction only when the extrapolation test passes. The basic variant always
/// replaces the last direction and resets to the axes every `n` iterations.
#[derive(Debug, Clone, Copy, Default)]
pub struct Powell {
    basic: bool,
}

impl Powell {
    pub fn new() -> Self {
        Self { basic: false }
    }

    pub fn basic() -> Self {
        Self { basic: true }
    }

    fn combined(from: &WeightVector, to: &WeightVector) -> WeightVector {
        let mut dir = to.clone();
        dir.add_scaled(from, -1.0);
        dir
    }
}

impl PointOptimizer for Powell {
    fn name(&self) -> String {
        if self.basic {
            "basic-powell".to_string()
        } else {
            "powell".to_string()
        }
    }

    fn optimize(
        &self,
        ctx: &TuneContext,
        start: WeightVector,
        _rng: &mut Rng,
    ) -> MertResult<WeightVector> {
        let axes: Vec<WeightVector> = start.names().map(unit).collect();
        if axes.is_empty() {
            return Ok(start);
        }
        let n = axes.len();

        let mut dirs = axes.clone();
        let mut wts = start;
        let mut obj = ctx.evaluate(&wts);

        for iter in 0..ctx.max_sweeps {
            if self.basic && iter % n == 0 {
                dirs = axes.clone();
            }
            let init_obj = obj;

            // Search along each direction in turn.
            let mut p = wts.clone();
            let mut biggest_win = 0.0;
            let mut biggest_id = 0;
            let mut total_win = 0.0;
            for (i, dir) in dirs.iter().enumerate() {
                p = ctx.search(&p, dir)?.weights;
                let e = ctx.evaluate(&p);
                let win = (e - obj).max(0.0);
                if win > biggest_win {
                    biggest_win = win;
                    biggest_id = i;
                }
                total_win += win;
                obj = e;
            }

            if self.basic {
                dirs.rotate_left(1);
                if (obj - init_obj).abs() < MIN_OBJECTIVE_DIFF {
                    wts = p;
                    break;
                }
            }

            let combined = Self::combined(&wts, &p);

            if !self.basic {
                let mut test_point = p.clone();
                test_point.add_scaled(&combined, 1.0);
                let extrapolated_win = ctx.evaluate(&test_point) - obj;
                if extrapolated_win > 0.0
                    && 2.0 * (2.0 * total_win - extrapolated_win) * (total_win - biggest_win).powi(2)
                        < extrapolated_win.powi(2) * biggest_win
                {
                    debug!("powell {}: replacing direction {} with combined direction", iter, biggest_id);
                    if let Some(normalized) = combined.normalized_l1() {
                        dirs[biggest_id] = normalized;
                    }
                }
            } else {
                dirs[n - 1] = combined.clone();
            }

            wts = ctx.search(&p, &combined)?.weights;
            obj = ctx.evaluate(&wts);
            debug!("{} {}: objective {:.5} (from {:.5})", self.name(), iter, obj, init_obj);

            if (obj - init_obj).abs() < MIN_OBJECTIVE_DIFF {
                break;
            }
        }

        Ok(wts)
    }
}
