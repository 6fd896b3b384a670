#![allow(dead_code)] // Not every test binary uses every helper

use mert_core::features::{FeatureIndex, FeatureVector};
use mert_core::metric::{Accumulator, Metric};
use mert_core::nbest::{Candidate, NBestList};
use mert_core::weights::WeightVector;
use std::sync::Arc;

/// Builder for n-best lists to clean up tests
pub struct NBestBuilder {
    index: Arc<FeatureIndex>,
    lists: Vec<Vec<Candidate>>,
}

impl NBestBuilder {
    pub fn new() -> Self {
        Self {
            index: Arc::new(FeatureIndex::new()),
            lists: Vec::new(),
        }
    }

    /// Starts a new sentence; following `cand` calls add to it.
    pub fn sentence(mut self) -> Self {
        self.lists.push(Vec::new());
        self
    }

    pub fn cand(mut self, tokens: &str, features: &[(&str, f64)]) -> Self {
        let fv = FeatureVector::from_named(features.iter().copied(), &self.index);
        let cand = Candidate::new(tokens.split_whitespace().map(String::from).collect(), fv);
        self.lists
            .last_mut()
            .expect("call sentence() before cand()")
            .push(cand);
        self
    }

    pub fn build(self) -> NBestList {
        NBestList::from_lists(self.lists, self.index).unwrap()
    }
}

/// Lines `y = slope·t + intercept` per sentence, encoded as features `d`
/// (slope) and `w` (intercept). Use with weights `{w: 1, d: 0}` and
/// direction `{d: 1}`.
pub fn lines_nbest(sentences: &[Vec<(i32, i32)>]) -> NBestList {
    let mut b = NBestBuilder::new();
    for (s, lines) in sentences.iter().enumerate() {
        b = b.sentence();
        for (c, &(slope, intercept)) in lines.iter().enumerate() {
            b = b.cand(
                &format!("s{} c{}", s, c),
                &[("d", slope as f64), ("w", intercept as f64)],
            );
        }
    }
    b.build()
}

pub fn weights(pairs: &[(&str, f64)]) -> WeightVector {
    pairs.iter().copied().collect()
}

/// Counts how many sentences select their "correct" rank.
pub struct IndexMatchMetric {
    correct: Arc<Vec<usize>>,
}

impl IndexMatchMetric {
    pub fn new(correct: Vec<usize>) -> Self {
        Self {
            correct: Arc::new(correct),
        }
    }
}

#[derive(Clone)]
struct IndexMatchAcc {
    correct: Arc<Vec<usize>>,
    hits: Vec<bool>,
}

impl Accumulator for IndexMatchAcc {
    fn add(&mut self, candidate: Option<&Candidate>) {
        let pos = self.hits.len();
        self.hits.push(false);
        self.replace(pos, candidate);
    }

    fn replace(&mut self, index: usize, candidate: Option<&Candidate>) {
        while self.hits.len() <= index {
            self.hits.push(false);
        }
        self.hits[index] =
            candidate.map_or(false, |c| self.correct.get(c.sentence) == Some(&c.rank));
    }

    fn score(&self) -> f64 {
        self.hits.iter().filter(|&&h| h).count() as f64
    }

    fn len(&self) -> usize {
        self.hits.len()
    }

    fn recombination_signature(&self) -> Option<Vec<i64>> {
        Some(vec![self.hits.iter().filter(|&&h| h).count() as i64])
    }

    fn clone_box(&self) -> Box<dyn Accumulator> {
        Box::new(self.clone())
    }
}

impl Metric for IndexMatchMetric {
    fn name(&self) -> String {
        "index-match".to_string()
    }

    fn accumulator(&self) -> Box<dyn Accumulator> {
        Box::new(IndexMatchAcc {
            correct: self.correct.clone(),
            hits: Vec::new(),
        })
    }
}

/// A small corpus with overlapping vocabulary, for BLEU-driven tests.
pub fn toy_corpus() -> (NBestList, Vec<&'static str>) {
    let nbest = NBestBuilder::new()
        .sentence()
        .cand("the cat sat on the mat", &[("lm", -2.0), ("tm", -1.0), ("wp", 6.0)])
        .cand("a cat sat on a mat", &[("lm", -3.0), ("tm", -0.5), ("wp", 6.0)])
        .cand("the cat on mat", &[("lm", -1.0), ("tm", -2.0), ("wp", 4.0)])
        .sentence()
        .cand("there is a dog here", &[("lm", -1.5), ("tm", -1.0), ("wp", 5.0)])
        .cand("a dog is here", &[("lm", -1.0), ("tm", -2.5), ("wp", 4.0)])
        .cand("here is the dog", &[("lm", -2.5), ("tm", -0.5), ("wp", 4.0)])
        .sentence()
        .cand("he reads a book", &[("lm", -1.0), ("tm", -1.0), ("wp", 4.0)])
        .cand("he is reading a book", &[("lm", -2.0), ("tm", -0.2), ("wp", 5.0)])
        .cand("reads book", &[("lm", -0.5), ("tm", -3.0), ("wp", 2.0)])
        .build();
    let refs = vec![
        "the cat sat on the mat",
        "here is a dog",
        "he is reading a book",
    ];
    (nbest, refs)
}
