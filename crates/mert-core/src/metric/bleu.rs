use super::{Accumulator, Metric, References};
use crate::error::{MertError, MertResult};
use crate::nbest::{Candidate, NBestList};
use fnv::{FnvHashMap, FnvHasher};
use std::hash::{Hash, Hasher};
use std::sync::{Arc, OnceLock};
use tracing::debug;

/// Sufficient statistics of one candidate against its references.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BleuStats {
    /// Clipped n-gram matches, index `n` holds order `n + 1`.
    pub matches: Vec<i64>,
    pub possible: Vec<i64>,
    /// Candidate length.
    pub c: i64,
    /// Closest reference length.
    pub r: i64,
}

impl BleuStats {
    pub fn compute(tokens: &[String], refs: &SentenceRefs, order: usize) -> Self {
        let mut counts: FnvHashMap<&[String], i64> = FnvHashMap::default();
        for n in 1..=order.min(tokens.len()) {
            for gram in tokens.windows(n) {
                *counts.entry(gram).or_insert(0) += 1;
            }
        }

        let mut matches = vec![0i64; order];
        for (gram, count) in counts {
            let max_ref = refs.max_counts.get(gram).copied().unwrap_or(0);
            matches[gram.len() - 1] += count.min(max_ref);
        }

        let len = tokens.len() as i64;
        let possible = (0..order as i64).map(|n| (len - n).max(0)).collect();

        Self {
            matches,
            possible,
            c: len,
            r: refs.closest_length(tokens.len()) as i64,
        }
    }
}

/// Reference n-gram ceilings for one sentence.
#[derive(Debug, Clone, Default)]
pub struct SentenceRefs {
    max_counts: FnvHashMap<Vec<String>, i64>,
    lengths: Vec<usize>,
}

impl SentenceRefs {
    pub fn new(refs: &[Vec<String>], order: usize) -> Self {
        let mut max_counts: FnvHashMap<Vec<String>, i64> = FnvHashMap::default();
        for tokens in refs {
            let mut local: FnvHashMap<&[String], i64> = FnvHashMap::default();
            for n in 1..=order.min(tokens.len()) {
                for gram in tokens.windows(n) {
                    *local.entry(gram).or_insert(0) += 1;
                }
            }
            for (gram, count) in local {
                let slot = max_counts.entry(gram.to_vec()).or_insert(0);
                *slot = (*slot).max(count);
            }
        }
        Self {
            max_counts,
            lengths: refs.iter().map(Vec::len).collect(),
        }
    }

    /// Reference length closest to `len`; the earliest reference wins ties.
    pub fn closest_length(&self, len: usize) -> usize {
        let mut best: Option<usize> = None;
        for &r in &self.lengths {
            match best {
                Some(b) if r.abs_diff(len) >= b.abs_diff(len) => {}
                _ => best = Some(r),
            }
        }
        best.unwrap_or(0)
    }
}

struct BleuTables {
    order: usize,
    refs: Vec<SentenceRefs>,
    /// Per-candidate statistics, tagged with a hash of the tokens they were computed from.
    cache: OnceLock<Vec<Vec<(u64, Arc<BleuStats>)>>>,
}

fn token_hash(tokens: &[String]) -> u64 {
    let mut hasher = FnvHasher::default();
    tokens.hash(&mut hasher);
    hasher.finish()
}

impl BleuTables {
    fn stats(&self, position: usize, cand: &Candidate) -> Arc<BleuStats> {
        if cand.sentence == position {
            if let Some(cached) = self
                .cache
                .get()
                .and_then(|c| c.get(position))
                .and_then(|list| list.get(cand.rank))
            {
                if cached.0 == token_hash(&cand.tokens) {
                    return cached.1.clone();
                }
            }
        }
        let empty = SentenceRefs::default();
        let refs = self.refs.get(position).unwrap_or(&empty);
        Arc::new(BleuStats::compute(&cand.tokens, refs, self.order))
    }
}

/// Corpus BLEU with clipped n-gram precision and brevity penalty.
#[derive(Clone)]
pub struct BleuMetric {
    tables: Arc<BleuTables>,
}

impl BleuMetric {
    pub fn new(references: Arc<References>, order: usize) -> Self {
        let refs = (0..references.len())
            .map(|i| SentenceRefs::new(references.get(i), order))
            .collect();
        Self {
            tables: Arc::new(BleuTables {
                order,
                refs,
                cache: OnceLock::new(),
            }),
        }
    }

    pub fn order(&self) -> usize {
        self.tables.order
    }

    /// Corpus score from aggregated statistics. Any zero precision scores 0.
    pub fn score_totals(matches: &[i64], possible: &[i64], c: i64, r: i64) -> f64 {
        if c == 0 || matches.is_empty() {
            return 0.0;
        }
        let order = matches.len() as f64;
        let mut log_precision = 0.0;
        for (&m, &p) in matches.iter().zip(possible) {
            if m == 0 || p == 0 {
                return 0.0;
            }
            log_precision += (m as f64 / p as f64).ln() / order;
        }
        let log_bp = if c < r { 1.0 - r as f64 / c as f64 } else { 0.0 };
        let score = (log_bp + log_precision).exp();
        if score.is_nan() {
            0.0
        } else {
            score
        }
    }
}

impl Metric for BleuMetric {
    fn name(&self) -> String {
        format!("BLEU:{}", self.tables.order)
    }

    fn accumulator(&self) -> Box<dyn Accumulator> {
        let order = self.tables.order;
        Box::new(BleuAccumulator {
            tables: self.tables.clone(),
            positions: Vec::new(),
            matches: vec![0; order],
            possible: vec![0; order],
            c: 0,
            r: 0,
        })
    }

    fn prepare(&self, nbest: &NBestList) -> MertResult<()> {
        if nbest.len() != self.tables.refs.len() {
            return Err(MertError::LengthMismatch {
                what: "reference set".to_string(),
                expected: nbest.len(),
                found: self.tables.refs.len(),
            });
        }
        let table: Vec<Vec<(u64, Arc<BleuStats>)>> = nbest
            .sentences()
            .iter()
            .enumerate()
            .map(|(i, list)| {
                list.iter()
                    .map(|c| {
                        let stats = BleuStats::compute(&c.tokens, &self.tables.refs[i], self.tables.order);
                        (token_hash(&c.tokens), Arc::new(stats))
                    })
                    .collect()
            })
            .collect();
        if self.tables.cache.set(table).is_err() {
            debug!("BLEU statistics already cached, keeping the first table");
        }
        Ok(())
    }
}

#[derive(Clone)]
struct BleuAccumulator {
    tables: Arc<BleuTables>,
    positions: Vec<Option<Arc<BleuStats>>>,
    matches: Vec<i64>,
    possible: Vec<i64>,
    c: i64,
    r: i64,
}

impl BleuAccumulator {
    fn apply(&mut self, stats: &BleuStats, sign: i64) {
        for (total, v) in self.matches.iter_mut().zip(&stats.matches) {
            *total += sign * v;
        }
        for (total, v) in self.possible.iter_mut().zip(&stats.possible) {
            *total += sign * v;
        }
        self.c += sign * stats.c;
        self.r += sign * stats.r;
    }
}

impl Accumulator for BleuAccumulator {
    fn add(&mut self, candidate: Option<&Candidate>) {
        let position = self.positions.len();
        let stats = candidate.map(|c| self.tables.stats(position, c));
        if let Some(s) = &stats {
            self.apply(s, 1);
        }
        self.positions.push(stats);
    }

    fn replace(&mut self, index: usize, candidate: Option<&Candidate>) {
        while self.positions.len() <= index {
            self.positions.push(None);
        }
        if let Some(old) = self.positions[index].take() {
            self.apply(&old, -1);
        }
        let stats = candidate.map(|c| self.tables.stats(index, c));
        if let Some(s) = &stats {
            self.apply(s, 1);
        }
        self.positions[index] = stats;
    }

    fn score(&self) -> f64 {
        BleuMetric::score_totals(&self.matches, &self.possible, self.c, self.r)
    }

    fn len(&self) -> usize {
        self.positions.len()
    }

    fn recombination_signature(&self) -> Option<Vec<i64>> {
        let mut sig = Vec::with_capacity(2 + 2 * self.matches.len());
        sig.push(self.r);
        sig.push(self.c);
        sig.extend_from_slice(&self.matches);
        sig.extend_from_slice(&self.possible);
        Some(sig)
    }

    fn clone_box(&self) -> Box<dyn Accumulator> {
        Box::new(self.clone())
    }
}
