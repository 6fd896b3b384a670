//! Asynchronous online tuning.
//!
//! Gradient jobs run on a worker pool against a snapshot of the weights taken
//! at submission time. A single controller applies results in the order they
//! complete, so a gradient may be several updates stale by the time it lands.

use crate::error::{MertError, MertResult};
use crate::util::seed_from_str;
use crate::weights::WeightVector;
use std::collections::{BTreeMap, VecDeque};
use std::sync::mpsc::{self, Sender};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Produces per-input loss gradients, typically by decoding the input under
/// the given weights. Updates move against the gradient.
pub trait GradientSource: Send + Sync {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn gradient(&self, input: usize, weights: &WeightVector) -> MertResult<WeightVector>;
}

pub trait UpdateRule: Send {
    fn name(&self) -> &'static str;
    fn apply(&mut self, weights: &mut WeightVector, gradient: &WeightVector);
}

/// Plain stochastic gradient descent with a fixed rate.
#[derive(Debug, Clone)]
pub struct Sgd {
    pub rate: f64,
}

impl UpdateRule for Sgd {
    fn name(&self) -> &'static str {
        "sgd"
    }

    fn apply(&mut self, weights: &mut WeightVector, gradient: &WeightVector) {
        weights.add_scaled(gradient, -self.rate);
    }
}

/// AdaGrad step followed by the L1 proximal operator (FOBOS). Features whose
/// weight is clipped to zero are dropped from the vector.
#[derive(Debug, Clone)]
pub struct AdaGradFobos {
    pub eta: f64,
    pub l1: f64,
    sum_sq: BTreeMap<String, f64>,
}

impl AdaGradFobos {
    pub fn new(eta: f64, l1: f64) -> Self {
        Self {
            eta,
            l1,
            sum_sq: BTreeMap::new(),
        }
    }
}

impl UpdateRule for AdaGradFobos {
    fn name(&self) -> &'static str {
        "adagrad-fobos"
    }

    fn apply(&mut self, weights: &mut WeightVector, gradient: &WeightVector) {
        for (name, g) in gradient.iter() {
            if g == 0.0 {
                continue;
            }
            let acc = self.sum_sq.entry(name.to_string()).or_insert(0.0);
            *acc += g * g;
            let rate = self.eta / acc.sqrt();

            let stepped = weights.get(name) - rate * g;
            let shrunk = stepped.signum() * (stepped.abs() - rate * self.l1).max(0.0);
            if shrunk == 0.0 {
                weights.remove(name);
            } else {
                weights.set(name, shrunk);
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct OnlineOptions {
    /// Gradient jobs in flight at once.
    pub threads: usize,
    pub seed: String,
    /// Also return the average of the weights after every update.
    pub average: bool,
}

impl Default for OnlineOptions {
    fn default() -> Self {
        Self {
            threads: crate::consts::DEFAULT_THREADS,
            seed: crate::consts::DEFAULT_SEED.to_string(),
            average: false,
        }
    }
}

/// One applied update.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateRecord {
    pub update_id: usize,
    pub epoch: usize,
    pub input: usize,
    /// Number of updates applied when the gradient's job was submitted.
    pub origin: usize,
    pub staleness: usize,
    pub grad_norm: f64,
    pub grad_nnz: usize,
}

#[derive(Debug, Clone)]
pub struct OnlineOutcome {
    pub weights: WeightVector,
    pub averaged: Option<WeightVector>,
    pub updates: Vec<UpdateRecord>,
}

struct Completed {
    epoch: usize,
    input: usize,
    origin: usize,
    gradient: MertResult<WeightVector>,
}

pub struct OnlineTuner {
    source: Arc<dyn GradientSource>,
    rule: Box<dyn UpdateRule>,
    options: OnlineOptions,
}

impl OnlineTuner {
    pub fn new(source: Arc<dyn GradientSource>, rule: Box<dyn UpdateRule>, options: OnlineOptions) -> Self {
        Self {
            source,
            rule,
            options,
        }
    }

    /// Input order for every epoch, shuffled with a per-epoch seed.
    fn schedule(&self, epochs: usize) -> VecDeque<(usize, usize)> {
        let master = seed_from_str(&self.options.seed);
        let mut jobs = VecDeque::with_capacity(epochs * self.source.len());
        for epoch in 0..epochs {
            let mut order: Vec<usize> = (0..self.source.len()).collect();
            fastrand::Rng::with_seed(master.wrapping_add(epoch as u64)).shuffle(&mut order);
            jobs.extend(order.into_iter().map(|input| (epoch, input)));
        }
        jobs
    }

    fn submit(
        &self,
        pool: &rayon::ThreadPool,
        tx: &Sender<Completed>,
        (epoch, input): (usize, usize),
        weights: WeightVector,
        origin: usize,
    ) {
        let source = Arc::clone(&self.source);
        let tx = tx.clone();
        pool.spawn(move || {
            let gradient = source.gradient(input, &weights);
            // The controller only hangs up after an error; late results are dropped.
            let _ = tx.send(Completed {
                epoch,
                input,
                origin,
                gradient,
            });
        });
    }

    pub fn run(&mut self, initial: WeightVector, epochs: usize) -> MertResult<OnlineOutcome> {
        let threads = self.options.threads.max(1);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build()
            .map_err(|e| MertError::Config(format!("thread pool: {}", e)))?;

        let mut jobs = self.schedule(epochs);
        info!(
            "🚀 Online tuning: {} inputs x {} epochs, rule '{}', {} jobs in flight",
            self.source.len(),
            epochs,
            self.rule.name(),
            threads
        );

        let (tx, rx) = mpsc::channel();
        let mut weights = initial;
        let mut updates: Vec<UpdateRecord> = Vec::with_capacity(jobs.len());
        let mut sum = WeightVector::new();
        let mut in_flight = 0;

        while in_flight < threads {
            let Some(job) = jobs.pop_front() else { break };
            self.submit(&pool, &tx, job, weights.clone(), 0);
            in_flight += 1;
        }

        while in_flight > 0 {
            let done = rx
                .recv()
                .map_err(|_| MertError::Config("gradient workers disconnected".to_string()))?;
            in_flight -= 1;

            match done.gradient {
                Ok(gradient) => {
                    if !gradient.is_finite() {
                        return Err(MertError::Numeric(format!(
                            "non-finite gradient for input {}",
                            done.input
                        )));
                    }
                    let update_id = updates.len();
                    let record = UpdateRecord {
                        update_id,
                        epoch: done.epoch,
                        input: done.input,
                        origin: done.origin,
                        staleness: update_id - done.origin,
                        grad_norm: gradient.l2_norm(),
                        grad_nnz: gradient.len(),
                    };
                    debug!(
                        "update {} (epoch {}, input {}): staleness {}, |g| {:.5}, nnz {}",
                        record.update_id,
                        record.epoch,
                        record.input,
                        record.staleness,
                        record.grad_norm,
                        record.grad_nnz
                    );
                    self.rule.apply(&mut weights, &gradient);
                    if self.options.average {
                        sum.add_scaled(&weights, 1.0);
                    }
                    updates.push(record);
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => warn!("⚠️  Gradient for input {} failed: {}", done.input, e),
            }

            if let Some(job) = jobs.pop_front() {
                self.submit(&pool, &tx, job, weights.clone(), updates.len());
                in_flight += 1;
            }
        }

        let averaged = (self.options.average && !updates.is_empty())
            .then(|| sum.scaled(1.0 / updates.len() as f64));
        let max_staleness = updates.iter().map(|u| u.staleness).max().unwrap_or(0);
        info!(
            "Online tuning done: {} updates, max staleness {}",
            updates.len(),
            max_staleness
        );

        Ok(OnlineOutcome {
            weights,
            averaged,
            updates,
        })
    }
}
