use super::{MetricMaximizer, MultiTranslationState};
use crate::error::{MertError, MertResult};
use crate::metric::Metric;
use crate::nbest::{Candidate, NBestList};
use fnv::FnvHashMap;

/// Left-to-right beam over partial selections with state recombination.
#[derive(Debug, Clone, Copy)]
pub struct Beam {
    width: usize,
}

impl Beam {
    pub fn new(width: usize) -> Self {
        Self {
            width: width.max(1),
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    /// Expands every state by every candidate of the next sentence. Equivalent
    /// children are merged, keeping the higher score (the earlier one on ties).
    pub fn expand(
        beam: &[MultiTranslationState],
        list: &[Candidate],
    ) -> Vec<MultiTranslationState> {
        let mut next: Vec<MultiTranslationState> = Vec::with_capacity(beam.len() * list.len());
        let mut slots: FnvHashMap<Vec<i64>, usize> = FnvHashMap::default();

        for state in beam {
            for cand in list {
                let child = state.extend(cand);
                match child.signature() {
                    Some(sig) => match slots.get(&sig) {
                        Some(&slot) => {
                            if child.score() > next[slot].score() {
                                next[slot] = child;
                            }
                        }
                        None => {
                            slots.insert(sig, next.len());
                            next.push(child);
                        }
                    },
                    None => next.push(child),
                }
            }
        }
        next
    }

    /// Stable sort by descending score, then cut to the beam width.
    pub fn prune(&self, mut states: Vec<MultiTranslationState>) -> Vec<MultiTranslationState> {
        states.sort_by(|a, b| b.score().total_cmp(&a.score()));
        states.truncate(self.width);
        states
    }
}

impl MetricMaximizer for Beam {
    fn maximize<'a>(
        &self,
        nbest: &'a NBestList,
        metric: &dyn Metric,
    ) -> MertResult<Vec<&'a Candidate>> {
        let mut beam = vec![MultiTranslationState::root(metric)];

        for list in nbest.sentences() {
            beam = self.prune(Self::expand(&beam, list));
        }

        beam.first()
            .map(|best| best.selection(nbest))
            .ok_or_else(|| MertError::SearchExhausted("beam emptied before the last sentence".to_string()))
    }
}
