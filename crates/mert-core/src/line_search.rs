//! Exact line search along a direction in weight space.
//!
//! Along `w(t) = w + t·d` every candidate's model score is a line in `t`, so
//! each sentence's 1-best is piecewise constant with breakpoints on the upper
//! envelope of its lines. Merging all sentences' breakpoints partitions the
//! real line into segments of constant corpus metric, and the search only has
//! to score one point per segment.

use crate::config::LineSearchParams;
use crate::consts::MIN_PLATEAU_DIFF;
use crate::error::{MertError, MertResult};
use crate::metric::Metric;
use crate::nbest::NBestList;
use crate::weights::WeightVector;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString};
use tracing::{debug, trace};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, EnumString, EnumIter, Display, Serialize, Deserialize,
)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum Smoothing {
    #[default]
    Min,
    Avg,
}

/// A step size where the 1-best of at least one sentence changes.
#[derive(Debug, Clone, PartialEq)]
pub struct InterceptPoint {
    pub t: f64,
    /// `(sentence, rank)` pairs that become 1-best at `t`.
    pub changes: Vec<(usize, usize)>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LineSearchOutcome {
    /// New free weights (fixed features not included).
    pub weights: WeightVector,
    pub step: f64,
    /// Unsmoothed metric value of the chosen segment.
    pub score: f64,
    pub segments: usize,
}

#[derive(Debug, Clone, Copy)]
pub struct LineSearch {
    pub window: usize,
    pub smoothing: Smoothing,
    pub normalize: bool,
}

impl Default for LineSearch {
    fn default() -> Self {
        Self::from(&LineSearchParams::default())
    }
}

impl From<&LineSearchParams> for LineSearch {
    fn from(p: &LineSearchParams) -> Self {
        Self {
            window: p.search_window,
            smoothing: p.smoothing,
            normalize: p.normalize,
        }
    }
}

/// Upper envelope of the lines `y = slopes[i]·t + intercepts[i]`.
///
/// Returns `(start, line)` pairs in increasing `start`; the first start is
/// `-inf`. Ties are resolved towards the line that stays on top to the right
/// (larger slope), then larger intercept, then lower index.
pub fn upper_envelope(slopes: &[f64], intercepts: &[f64]) -> MertResult<Vec<(f64, usize)>> {
    if slopes.is_empty() {
        return Ok(Vec::new());
    }
    if let Some(i) = (0..slopes.len()).find(|&i| !slopes[i].is_finite() || !intercepts[i].is_finite()) {
        return Err(MertError::Numeric(format!(
            "non-finite line for candidate {}: slope {}, intercept {}",
            i, slopes[i], intercepts[i]
        )));
    }

    let mut cur = 0;
    for i in 1..slopes.len() {
        if slopes[i] < slopes[cur] || (slopes[i] == slopes[cur] && intercepts[i] > intercepts[cur]) {
            cur = i;
        }
    }

    let mut envelope = vec![(f64::NEG_INFINITY, cur)];
    let mut limit = f64::NEG_INFINITY;

    loop {
        let mut next: Option<(f64, usize)> = None;
        for i in 0..slopes.len() {
            if slopes[i] <= slopes[cur] {
                continue;
            }
            let t = (intercepts[cur] - intercepts[i]) / (slopes[i] - slopes[cur]);
            if !t.is_finite() {
                return Err(MertError::Numeric(format!(
                    "intercept of candidates {} and {} is {}",
                    cur, i, t
                )));
            }
            if t <= limit + MIN_PLATEAU_DIFF {
                continue;
            }
            let better = match next {
                None => true,
                Some((bt, bi)) => {
                    t < bt
                        || (t == bt
                            && (slopes[i] > slopes[bi]
                                || (slopes[i] == slopes[bi] && intercepts[i] > intercepts[bi])))
                }
            };
            if better {
                next = Some((t, i));
            }
        }

        match next {
            Some((t, i)) => {
                envelope.push((t, i));
                limit = t;
                cur = i;
            }
            None => break,
        }
    }

    Ok(envelope)
}

/// Merged, sorted breakpoints of all sentences. The first point is `-inf` and
/// carries every sentence's leftmost 1-best.
pub fn breakpoints(
    nbest: &NBestList,
    weights: &[f64],
    direction: &[f64],
) -> MertResult<Vec<InterceptPoint>> {
    let mut first = Vec::with_capacity(nbest.len());
    let mut crossings: Vec<(f64, usize, usize)> = Vec::new();

    let mut slopes = Vec::new();
    let mut intercepts = Vec::new();

    for (s, list) in nbest.sentences().iter().enumerate() {
        slopes.clear();
        intercepts.clear();
        for cand in list {
            slopes.push(cand.features.dot(direction));
            intercepts.push(cand.features.dot(weights));
        }

        let envelope = upper_envelope(&slopes, &intercepts)?;
        first.push((s, envelope[0].1));
        crossings.extend(envelope[1..].iter().map(|&(t, c)| (t, s, c)));
    }

    crossings.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));

    let mut points = vec![InterceptPoint {
        t: f64::NEG_INFINITY,
        changes: first,
    }];
    for (t, s, c) in crossings {
        match points.last_mut() {
            Some(p) if p.t == t => p.changes.push((s, c)),
            _ => points.push(InterceptPoint {
                t,
                changes: vec![(s, c)],
            }),
        }
    }
    Ok(points)
}

/// A point strictly inside the segment starting at `points[i]`.
/// Zero is preferred when the segment contains it.
pub fn representative(points: &[InterceptPoint], i: usize) -> f64 {
    let lo = points[i].t;
    let hi = points.get(i + 1).map(|p| p.t).unwrap_or(f64::INFINITY);
    if lo < 0.0 && hi > 0.0 {
        return 0.0;
    }
    match (lo.is_finite(), hi.is_finite()) {
        (false, true) => hi - 1.0,
        (true, false) => lo + 1.0,
        (true, true) => lo + (hi - lo) / 2.0,
        (false, false) => 0.0,
    }
}

fn smooth(scores: &[f64], i: usize, window: usize, kind: Smoothing) -> f64 {
    let lo = i.saturating_sub(window);
    let hi = (i + window).min(scores.len() - 1);
    let span = &scores[lo..=hi];
    match kind {
        Smoothing::Min => span.iter().copied().fold(f64::INFINITY, f64::min),
        Smoothing::Avg => span.iter().sum::<f64>() / span.len() as f64,
    }
}

impl LineSearch {
    pub fn new(window: usize, smoothing: Smoothing, normalize: bool) -> Self {
        Self {
            window,
            smoothing,
            normalize,
        }
    }

    /// Metric value of every segment, in breakpoint order.
    ///
    /// One accumulator is carried across segments and only the changed
    /// sentences are replaced at each breakpoint.
    pub fn segment_scores(
        nbest: &NBestList,
        metric: &dyn Metric,
        points: &[InterceptPoint],
    ) -> Vec<f64> {
        let mut acc = metric.accumulator();
        for _ in 0..nbest.len() {
            acc.add(None);
        }

        let mut scores = Vec::with_capacity(points.len());
        for p in points {
            for &(s, c) in &p.changes {
                acc.replace(s, Some(&nbest.get(s)[c]));
            }
            scores.push(acc.score());
        }
        scores
    }

    /// Moves `weights` to the best segment along `direction`.
    ///
    /// `weights` and the returned weights are free weights; `fixed` features
    /// are attached for scoring only and are never moved.
    pub fn search(
        &self,
        nbest: &NBestList,
        metric: &dyn Metric,
        weights: &WeightVector,
        direction: &WeightVector,
        fixed: &WeightVector,
    ) -> MertResult<LineSearchOutcome> {
        if !direction.is_finite() || !weights.is_finite() {
            return Err(MertError::Numeric(
                "line search called with non-finite weights or direction".to_string(),
            ));
        }

        let index = nbest.index();
        let dense_w = weights.with(fixed).to_dense(index);
        let free_dir = direction.without(fixed);
        let dense_d = free_dir.to_dense(index);

        let points = breakpoints(nbest, &dense_w, &dense_d)?;
        let scores = Self::segment_scores(nbest, metric, &points);

        if points.len() <= 1 {
            trace!("direction does not change any ranking");
            return Ok(LineSearchOutcome {
                weights: weights.clone(),
                step: 0.0,
                score: scores.first().copied().unwrap_or(0.0),
                segments: points.len(),
            });
        }

        let mut best = 0;
        let mut best_eval = f64::NEG_INFINITY;
        for i in 0..scores.len() {
            let eval = if self.window == 0 {
                scores[i]
            } else {
                smooth(&scores, i, self.window, self.smoothing)
            };
            if best_eval < eval {
                best = i;
                best_eval = eval;
            }
        }

        let step = representative(&points, best);
        let mut moved = weights.clone();
        moved.add_scaled(&free_dir, step);

        if self.normalize {
            if fixed.iter().any(|(_, v)| v != 0.0) {
                debug!("skipping normalization: non-zero fixed weights would change the ranking");
            } else if let Some(n) = moved.normalized_l1() {
                moved = n;
            }
        }

        trace!(
            "line search: {} segments, best #{} at t={} ({})",
            points.len(),
            best,
            step,
            scores[best]
        );

        Ok(LineSearchOutcome {
            weights: moved,
            step,
            score: scores[best],
            segments: points.len(),
        })
    }
}
