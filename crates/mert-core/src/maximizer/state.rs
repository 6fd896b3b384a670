use crate::metric::{Accumulator, Metric};
use crate::nbest::{Candidate, NBestList};
use std::rc::Rc;

struct Choice {
    rank: usize,
    parent: Option<Rc<Choice>>,
}

/// A selection for sentences `0..depth` together with its running metric.
///
/// States are never modified after construction; `extend` builds a child that
/// shares its ancestry with the parent.
#[derive(Clone)]
pub struct MultiTranslationState {
    choices: Option<Rc<Choice>>,
    acc: Box<dyn Accumulator>,
    score: f64,
    depth: usize,
}

impl MultiTranslationState {
    pub fn root(metric: &dyn Metric) -> Self {
        let acc = metric.accumulator();
        let score = acc.score();
        Self {
            choices: None,
            acc,
            score,
            depth: 0,
        }
    }

    pub fn extend(&self, cand: &Candidate) -> Self {
        let mut acc = self.acc.clone();
        acc.add(Some(cand));
        let score = acc.score();
        Self {
            choices: Some(Rc::new(Choice {
                rank: cand.rank,
                parent: self.choices.clone(),
            })),
            acc,
            score,
            depth: self.depth + 1,
        }
    }

    pub fn score(&self) -> f64 {
        self.score
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn signature(&self) -> Option<Vec<i64>> {
        self.acc.recombination_signature()
    }

    /// Candidate rank chosen for each sentence, in sentence order.
    pub fn ranks(&self) -> Vec<usize> {
        let mut ranks = Vec::with_capacity(self.depth);
        let mut node = self.choices.as_deref();
        while let Some(choice) = node {
            ranks.push(choice.rank);
            node = choice.parent.as_deref();
        }
        ranks.reverse();
        ranks
    }

    pub fn selection<'a>(&self, nbest: &'a NBestList) -> Vec<&'a Candidate> {
        self.ranks()
            .into_iter()
            .enumerate()
            .map(|(sentence, rank)| &nbest.get(sentence)[rank])
            .collect()
    }
}
