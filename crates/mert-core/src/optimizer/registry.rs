use super::{CerStyle, CoordinateAscent, PointOptimizer, Powell, RandomAltPair, RandomPairs, RandomPoint};
use crate::consts::{MAX_LOOP_ROUNDS, MIN_OBJECTIVE_DIFF};
use crate::context::TuneContext;
use crate::error::{MertError, MertResult};
use crate::weights::WeightVector;
use fastrand::Rng;
use itertools::Itertools;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

pub type OptimizerFactory = fn() -> Box<dyn PointOptimizer>;

/// Name → factory table for per-point optimizers.
pub struct OptimizerRegistry {
    factories: BTreeMap<&'static str, OptimizerFactory>,
}

impl Default for OptimizerRegistry {
    fn default() -> Self {
        let mut reg = Self {
            factories: BTreeMap::new(),
        };
        reg.register("koehn", || Box::new(CoordinateAscent));
        reg.register("powell", || Box::new(Powell::new()));
        reg.register("basic-powell", || Box::new(Powell::basic()));
        reg.register("cer", || Box::new(CerStyle));
        reg.register("random-pairs", || Box::new(RandomPairs));
        reg.register("random-point", || Box::new(RandomPoint { better: false }));
        reg.register("random-better", || Box::new(RandomPoint { better: true }));
        reg.register("random-alt-pair", || Box::new(RandomAltPair { better: false }));
        reg.register("random-better-alt-pair", || Box::new(RandomAltPair { better: true }));
        reg
    }
}

impl OptimizerRegistry {
    pub fn register(&mut self, name: &'static str, factory: OptimizerFactory) {
        self.factories.insert(name, factory);
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.factories.keys().copied().collect()
    }

    pub fn create(&self, name: &str) -> MertResult<Box<dyn PointOptimizer>> {
        let key = name.trim().to_ascii_lowercase();
        self.factories
            .get(key.as_str())
            .map(|factory| factory())
            .ok_or_else(|| MertError::UnknownOptimizer(name.to_string()))
    }

    /// Parses `a`, `a+b+c` (run in order) or either form with a trailing `~`
    /// (repeat until the score stops improving).
    pub fn resolve(&self, expr: &str) -> MertResult<Arc<dyn PointOptimizer>> {
        let expr = expr.trim();
        let (body, looping) = match expr.strip_suffix('~') {
            Some(body) => (body, true),
            None => (expr, false),
        };

        let mut steps = body
            .split('+')
            .map(|part| {
                if part.trim().is_empty() {
                    Err(MertError::UnknownOptimizer(expr.to_string()))
                } else {
                    self.create(part)
                }
            })
            .collect::<MertResult<Vec<_>>>()?;

        if steps.len() == 1 && !looping {
            if let Some(single) = steps.pop() {
                return Ok(Arc::from(single));
            }
        }
        Ok(Arc::new(Sequence { steps, looping }))
    }
}

/// Runs several optimizers back to back, optionally looping.
pub struct Sequence {
    steps: Vec<Box<dyn PointOptimizer>>,
    looping: bool,
}

impl Sequence {
    pub fn new(steps: Vec<Box<dyn PointOptimizer>>, looping: bool) -> Self {
        Self { steps, looping }
    }
}

impl PointOptimizer for Sequence {
    fn name(&self) -> String {
        let joined = self.steps.iter().map(|s| s.name()).join("+");
        if self.looping {
            format!("{}~", joined)
        } else {
            joined
        }
    }

    fn optimize(
        &self,
        ctx: &TuneContext,
        start: WeightVector,
        rng: &mut Rng,
    ) -> MertResult<WeightVector> {
        let rounds = if self.looping { MAX_LOOP_ROUNDS } else { 1 };
        let mut wts = start;
        let mut obj = ctx.evaluate(&wts);

        for round in 0..rounds {
            for step in &self.steps {
                wts = step.optimize(ctx, wts, rng)?;
            }
            let e = ctx.evaluate(&wts);
            debug!("{} round {}: {:.5} -> {:.5}", self.name(), round, obj, e);
            let gain = e - obj;
            obj = e;
            if gain < MIN_OBJECTIVE_DIFF {
                break;
            }
        }
        Ok(wts)
    }

    fn normalizes(&self) -> bool {
        self.steps.iter().any(|s| s.normalizes())
    }
}
