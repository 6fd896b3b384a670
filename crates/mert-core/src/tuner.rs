use crate::config::Config;
use crate::context::TuneContext;
use crate::error::{MertError, MertResult};
use crate::optimizer::PointOptimizer;
use crate::util::{seed_from_str, seed_from_values};
use crate::weights::WeightVector;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;
use strum_macros::{Display, EnumIter, EnumString};
use tracing::{debug, info, trace, warn};

/// How equal scores are resolved when updating the best record.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, EnumString, Display, EnumIter, Serialize, Deserialize,
)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum TieBreak {
    /// Equal score replaces when it comes from a lower point index.
    #[default]
    LowestPoint,
    /// Only a strictly better score replaces.
    FirstFound,
    /// An equal score replaces too.
    LastBest,
}

#[derive(Debug, Clone)]
struct Best {
    weights: WeightVector,
    score: f64,
    point: usize,
}

/// The single piece of state shared between workers.
#[derive(Debug, Default)]
pub struct BestRecord {
    inner: Mutex<Option<Best>>,
}

impl BestRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compares and conditionally replaces in one critical section.
    /// Returns true if `weights` became the new best.
    pub fn offer(&self, weights: &WeightVector, score: f64, point: usize, policy: TieBreak) -> bool {
        let mut guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let replace = match guard.as_ref() {
            None => true,
            Some(best) if score > best.score => true,
            Some(best) if score == best.score => match policy {
                TieBreak::LowestPoint => point < best.point,
                TieBreak::FirstFound => false,
                TieBreak::LastBest => true,
            },
            Some(_) => false,
        };
        if replace {
            match guard.as_ref() {
                Some(best) if best.score == score => info!(
                    "⚖️  Tie-break replace: point {} -> point {} ({:.6})",
                    best.point, point, score
                ),
                Some(best) => info!(
                    "🏆 New best: {:.6} -> {:.6} (point {})",
                    best.score, score, point
                ),
                None => info!("🏆 New best: {:.6} (point {})", score, point),
            }
            *guard = Some(Best {
                weights: weights.clone(),
                score,
                point,
            });
        }
        replace
    }

    pub fn score(&self) -> Option<f64> {
        let guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        guard.as_ref().map(|b| b.score)
    }

    fn take(&self) -> Option<Best> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).take()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PointStatus {
    Ok,
    ZeroNorm,
    Failed,
}

/// One row of the per-point report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PointReport {
    pub point: usize,
    pub start_score: f64,
    pub final_score: f64,
    pub status: PointStatus,
    pub became_best: bool,
    pub millis: u64,
}

pub trait TuneCallback: Send + Sync {
    /// Called after every starting point. Returning false stops the run
    /// once the points already in flight finish.
    fn on_point(&self, report: &PointReport) -> bool;
}

impl<T: TuneCallback + ?Sized> TuneCallback for &T {
    fn on_point(&self, report: &PointReport) -> bool {
        (**self).on_point(report)
    }
}

/// Callback that never stops the run.
pub struct NoopCallback;

impl TuneCallback for NoopCallback {
    fn on_point(&self, _report: &PointReport) -> bool {
        true
    }
}

#[derive(Debug, Clone)]
pub struct TuneOptions {
    pub starting_points: usize,
    pub threads: usize,
    pub seed: String,
    pub tie_break: TieBreak,
}

impl Default for TuneOptions {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

impl From<&Config> for TuneOptions {
    fn from(cfg: &Config) -> Self {
        let threads = if cfg.tune.threads == 0 {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4)
        } else {
            cfg.tune.threads
        };
        Self {
            starting_points: cfg.tune.starting_points,
            threads,
            seed: cfg.tune.seed.clone(),
            tie_break: cfg.tune.tie_break,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TuneOutcome {
    pub initial_score: f64,
    pub final_score: f64,
    /// Best weights with the fixed features re-attached.
    pub best_weights: WeightVector,
    pub best_point: usize,
    /// Sorted by point index.
    pub points: Vec<PointReport>,
}

/// Multi-start driver: optimizes every starting point on a worker pool and
/// keeps the best result.
pub struct Tuner {
    ctx: Arc<TuneContext>,
    optimizer: Arc<dyn PointOptimizer>,
    options: TuneOptions,
}

impl Tuner {
    pub fn new(ctx: Arc<TuneContext>, optimizer: Arc<dyn PointOptimizer>, options: TuneOptions) -> Self {
        Self {
            ctx,
            optimizer,
            options,
        }
    }

    pub fn context(&self) -> &TuneContext {
        &self.ctx
    }

    /// Free weights of every starting point: the given vectors first, then
    /// random points up to `starting_points`.
    pub fn starting_points(&self, starting: &[WeightVector], master: u64) -> Vec<WeightVector> {
        let free = self.ctx.free_features();
        let mut points: Vec<WeightVector> = starting
            .iter()
            .map(|w| {
                let mut p = w.without(&self.ctx.fixed);
                p.extend_zero(free.iter().map(String::as_str));
                p
            })
            .collect();

        let wanted = self.options.starting_points.max(points.len()).max(1);
        for index in points.len()..wanted {
            let mut rng = fastrand::Rng::with_seed(master.wrapping_add(index as u64));
            let p: WeightVector = free
                .iter()
                .map(|name| (name.as_str(), rng.f64() * 2.0 - 1.0))
                .collect();
            points.push(p);
        }
        points
    }

    pub fn run<CB: TuneCallback>(&self, starting: Vec<WeightVector>, callback: CB) -> MertResult<TuneOutcome> {
        let opts = &self.options;
        let master = seed_from_str(&opts.seed);
        let points = self.starting_points(&starting, master);
        let initial_score = self.ctx.evaluate(&points[0]);

        info!(
            "🚀 Tuning {} starting points with '{}' on {} threads (initial {:.6})",
            points.len(),
            self.optimizer.name(),
            opts.threads,
            initial_score
        );

        let queue: Mutex<VecDeque<(usize, WeightVector)>> =
            Mutex::new(points.into_iter().enumerate().collect());
        let best = BestRecord::new();
        let reports: Mutex<Vec<PointReport>> = Mutex::new(Vec::new());
        let fatal: Mutex<Option<MertError>> = Mutex::new(None);
        let stop = AtomicBool::new(false);

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(opts.threads.max(1))
            .build()
            .map_err(|e| MertError::Config(format!("thread pool: {}", e)))?;

        pool.scope(|s| {
            for worker in 0..opts.threads.max(1) {
                let (queue, best, reports, fatal, stop, callback) =
                    (&queue, &best, &reports, &fatal, &stop, &callback);
                s.spawn(move |_| loop {
                    if stop.load(Ordering::Relaxed) {
                        break;
                    }
                    trace!("worker {}: waiting for point", worker);
                    let next = queue.lock().unwrap_or_else(PoisonError::into_inner).pop_front();
                    let Some((point, start)) = next else {
                        break;
                    };

                    let report = match self.optimize_point(worker, point, start, master, best) {
                        Ok(report) => report,
                        Err(e) if e.is_fatal() => {
                            warn!("❌ Point {} hit an unrecoverable error: {}", point, e);
                            let mut slot = fatal.lock().unwrap_or_else(PoisonError::into_inner);
                            if slot.is_none() {
                                *slot = Some(e);
                            }
                            drop(slot);
                            stop.store(true, Ordering::Relaxed);
                            break;
                        }
                        Err(e) => {
                            warn!("⚠️  Point {} failed: {}", point, e);
                            PointReport {
                                point,
                                start_score: f64::NAN,
                                final_score: f64::NAN,
                                status: PointStatus::Failed,
                                became_best: false,
                                millis: 0,
                            }
                        }
                    };

                    if !callback.on_point(&report) {
                        debug!("callback requested stop after point {}", point);
                        stop.store(true, Ordering::Relaxed);
                    }
                    reports.lock().unwrap_or_else(PoisonError::into_inner).push(report);
                });
            }
        });

        if let Some(e) = fatal.into_inner().unwrap_or_else(PoisonError::into_inner) {
            return Err(e);
        }

        let best = best.take().ok_or(MertError::NoSuccessfulPoint)?;
        let mut points = reports.into_inner().unwrap_or_else(PoisonError::into_inner);
        points.sort_by_key(|r| r.point);

        info!(
            "Initial score {:.6} -> final score {:.6} (point {})",
            initial_score, best.score, best.point
        );

        Ok(TuneOutcome {
            initial_score,
            final_score: best.score,
            best_weights: best.weights.with(&self.ctx.fixed),
            best_point: best.point,
            points,
        })
    }

    fn optimize_point(
        &self,
        worker: usize,
        point: usize,
        start: WeightVector,
        master: u64,
        best: &BestRecord,
    ) -> MertResult<PointReport> {
        let timer = Instant::now();
        let start_score = self.ctx.evaluate(&start);
        let mut rng = fastrand::Rng::with_seed(seed_from_values(&start.sorted_values(), master));

        trace!("worker {}: optimizing point {}", worker, point);
        let mut wts = self.optimizer.optimize(&self.ctx, start, &mut rng)?;

        if self.optimizer.normalizes()
            && self.ctx.line_search.normalize
            && self.ctx.fixed.l1_norm() == 0.0
        {
            if let Some(n) = wts.normalized_l1() {
                wts = n;
            }
        }
        if !wts.is_finite() {
            return Err(MertError::Numeric(format!(
                "point {} produced non-finite weights",
                point
            )));
        }

        trace!("worker {}: evaluating point {}", worker, point);
        let final_score = self.ctx.evaluate(&wts);
        info!(
            "Point {}: {:.6} -> {:.6} ({} ms)",
            point,
            start_score,
            final_score,
            timer.elapsed().as_millis()
        );

        let (status, became_best) = if wts.l2_norm() == 0.0 {
            warn!("Point {} ended with an all-zero weight vector, rejected", point);
            (PointStatus::ZeroNorm, false)
        } else {
            trace!("worker {}: updating best with point {}", worker, point);
            (
                PointStatus::Ok,
                best.offer(&wts, final_score, point, self.options.tie_break),
            )
        };

        Ok(PointReport {
            point,
            start_score,
            final_score,
            status,
            became_best,
            millis: timer.elapsed().as_millis() as u64,
        })
    }
}
