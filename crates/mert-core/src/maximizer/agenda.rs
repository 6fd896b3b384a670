use super::{MetricMaximizer, MultiTranslationState};
use crate::error::{MertError, MertResult};
use crate::metric::Metric;
use crate::nbest::{Candidate, NBestList};
use fnv::FnvHashMap;
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use tracing::debug;

/// Best-first search over partial selections, bounded by a depth window.
#[derive(Debug, Clone, Copy)]
pub struct Agenda {
    window: usize,
}

struct Entry {
    state: MultiTranslationState,
    seq: u64,
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Entry {}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Entry {
    // Highest score first, then deeper, then older.
    fn cmp(&self, other: &Self) -> Ordering {
        self.state
            .score()
            .total_cmp(&other.state.score())
            .then_with(|| self.state.depth().cmp(&other.state.depth()))
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl Agenda {
    pub fn new(window: usize) -> Self {
        Self { window }
    }

    pub fn window(&self) -> usize {
        self.window
    }
}

impl MetricMaximizer for Agenda {
    fn maximize<'a>(
        &self,
        nbest: &'a NBestList,
        metric: &dyn Metric,
    ) -> MertResult<Vec<&'a Candidate>> {
        let n = nbest.len();
        let mut heap = BinaryHeap::new();
        let mut seq = 0u64;
        heap.push(Entry {
            state: MultiTranslationState::root(metric),
            seq,
        });

        // Best score seen per (depth, recombination signature).
        let mut seen: FnvHashMap<(usize, Vec<i64>), f64> = FnvHashMap::default();
        let mut max_depth = 0usize;
        let mut popped = 0usize;

        while let Some(Entry { state, .. }) = heap.pop() {
            popped += 1;
            let depth = state.depth();

            if depth + self.window < max_depth {
                continue;
            }
            if let Some(sig) = state.signature() {
                if let Some(&best) = seen.get(&(depth, sig)) {
                    if best > state.score() {
                        continue;
                    }
                }
            }

            max_depth = max_depth.max(depth);
            if depth == n {
                debug!("agenda search finished after {} pops", popped);
                return Ok(state.selection(nbest));
            }

            for cand in nbest.get(depth) {
                let child = state.extend(cand);
                if let Some(sig) = child.signature() {
                    let key = (depth + 1, sig);
                    match seen.get(&key) {
                        Some(&best) if best >= child.score() => continue,
                        _ => {
                            seen.insert(key, child.score());
                        }
                    }
                }
                seq += 1;
                heap.push(Entry { state: child, seq });
            }
        }

        Err(MertError::SearchExhausted(format!(
            "agenda emptied at depth {} of {} after {} pops",
            max_depth, n, popped
        )))
    }
}
