/// Upper bound on full re-optimization passes in hill climbing.
pub const HILL_CLIMB_MAX_PASSES: usize = 25;

/// Objective gain below which iterative optimizers consider themselves converged.
pub const MIN_OBJECTIVE_DIFF: f64 = 1e-5;

/// Minimum distance a crossing must lie beyond the previous breakpoint.
pub const MIN_PLATEAU_DIFF: f64 = 0.0;

/// Squared weight change below which a step counts as "no progress".
pub const NO_PROGRESS_SSD: f64 = 1e-6;

/// Consecutive no-progress steps before a random-direction optimizer stops.
pub const NO_PROGRESS_LIMIT: usize = 20;

/// Consecutive no-progress steps before the CER optimizer stops.
pub const CER_NO_PROGRESS_LIMIT: usize = 15;

/// Features must appear in at least this many n-best lists to get a random direction component.
pub const MIN_NBEST_OCCURRENCES: usize = 5;

/// Rounds of a looping ("~") optimizer sequence.
pub const MAX_LOOP_ROUNDS: usize = 10;

pub const DEFAULT_SEED: &str = "mert";
pub const DEFAULT_STARTING_POINTS: usize = 20;
pub const DEFAULT_THREADS: usize = 4;
pub const DEFAULT_SEARCH_WINDOW: usize = 1;
pub const DEFAULT_BLEU_ORDER: usize = 4;
