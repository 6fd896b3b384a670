mod common;

use common::{lines_nbest, weights, IndexMatchMetric, NBestBuilder};
use mert_core::eval;
use mert_core::line_search::{
    breakpoints, representative, upper_envelope, InterceptPoint, LineSearch, Smoothing,
};
use mert_core::MertError;
use proptest::prelude::*;

fn dense(nbest: &mert_core::NBestList, pairs: &[(&str, f64)]) -> Vec<f64> {
    weights(pairs).to_dense(nbest.index())
}

#[test]
fn test_concrete_two_sentence_scenario() {
    println!("\n=== TEST: Two-Sentence Line Search ===");
    // Sentence 1 switches to its second candidate at t = 1, sentence 2 at t = 3.
    let nbest = NBestBuilder::new()
        .sentence()
        .cand("a", &[("lm", 1.0)])
        .cand("b", &[("tm", 1.0)])
        .sentence()
        .cand("c", &[("lm", 3.0)])
        .cand("d", &[("tm", 1.0)])
        .build();
    let metric = IndexMatchMetric::new(vec![1, 0]);

    let w = weights(&[("lm", 1.0), ("tm", 0.0)]);
    let dir = weights(&[("tm", 1.0)]);

    let points = breakpoints(
        &nbest,
        &dense(&nbest, &[("lm", 1.0)]),
        &dense(&nbest, &[("tm", 1.0)]),
    )
    .unwrap();
    let ts: Vec<f64> = points.iter().map(|p| p.t).collect();
    println!("Breakpoints: {:?}", ts);
    assert_eq!(ts, vec![f64::NEG_INFINITY, 1.0, 3.0]);

    let scores = LineSearch::segment_scores(&nbest, &metric, &points);
    assert_eq!(scores, vec![1.0, 2.0, 1.0]);

    let ls = LineSearch::new(0, Smoothing::Min, true);
    let out = ls.search(&nbest, &metric, &w, &dir, &Default::default()).unwrap();
    println!("Step {} -> {:?}", out.step, out.weights);

    assert_eq!(out.segments, 3);
    assert_eq!(out.step, 2.0);
    assert_eq!(out.score, 2.0);
    assert!((out.weights.get("lm") - 1.0 / 3.0).abs() < 1e-12);
    assert!((out.weights.get("tm") - 2.0 / 3.0).abs() < 1e-12);
    println!("✅ Middle segment selected.");
}

#[test]
fn test_breakpoints_of_overtaking_candidates() {
    let nbest = NBestBuilder::new()
        .sentence()
        .cand("a", &[("lm", -2.0), ("tm", 1.0)])
        .cand("b", &[("lm", -1.0), ("tm", 2.0)])
        .sentence()
        .cand("c", &[("lm", -3.0), ("tm", 0.0)])
        .cand("d", &[("lm", 0.0), ("tm", 1.0)])
        .build();

    let points = breakpoints(
        &nbest,
        &dense(&nbest, &[("lm", 1.0), ("tm", 1.0)]),
        &dense(&nbest, &[("tm", 1.0)]),
    )
    .unwrap();

    let ts: Vec<f64> = points.iter().map(|p| p.t).collect();
    assert_eq!(ts, vec![f64::NEG_INFINITY, -4.0, -2.0]);
    assert_eq!(points[1].changes, vec![(1, 1)]);
    assert_eq!(points[2].changes, vec![(0, 1)]);
}

#[test]
fn test_envelope_tie_breaks() {
    // Identical lines: the lower index is kept.
    let env = upper_envelope(&[1.0, 1.0], &[2.0, 2.0]).unwrap();
    assert_eq!(env, vec![(f64::NEG_INFINITY, 0)]);

    // Three lines through one point: the steepest takes over directly.
    let env = upper_envelope(&[-1.0, 0.0, 1.0], &[0.0, 0.0, 0.0]).unwrap();
    assert_eq!(env, vec![(f64::NEG_INFINITY, 0), (0.0, 2)]);
}

#[test]
fn test_envelope_rejects_non_finite_lines() {
    let err = upper_envelope(&[1.0, f64::NAN], &[0.0, 0.0]).unwrap_err();
    assert!(matches!(err, MertError::Numeric(_)));
}

#[test]
fn test_representative_points() {
    let nbest = lines_nbest(&[vec![(0, 0), (1, -5), (2, -15)]]);
    let points = breakpoints(
        &nbest,
        &dense(&nbest, &[("w", 1.0)]),
        &dense(&nbest, &[("d", 1.0)]),
    )
    .unwrap();
    let ts: Vec<f64> = points.iter().map(|p| p.t).collect();
    assert_eq!(ts, vec![f64::NEG_INFINITY, 5.0, 10.0]);

    // First segment contains zero.
    assert_eq!(representative(&points, 0), 0.0);
    assert_eq!(representative(&points, 1), 7.5);
    assert_eq!(representative(&points, 2), 11.0);
}

#[test]
fn test_representative_of_huge_segment_stays_finite() {
    let at = |t: f64| InterceptPoint { t, changes: vec![] };
    let points = vec![at(f64::NEG_INFINITY), at(1.0e308), at(1.5e308)];
    let mid = representative(&points, 1);
    assert!(mid.is_finite());
    assert!(mid > 1.0e308 && mid < 1.5e308);
    assert!((mid / 1.25e308 - 1.0).abs() < 1e-12);

    let negative = vec![at(f64::NEG_INFINITY), at(-1.5e308), at(-1.0e308)];
    let mid = representative(&negative, 1);
    assert!(mid.is_finite());
    assert!((mid / -1.25e308 - 1.0).abs() < 1e-12);
}

#[test]
fn test_direction_without_effect_keeps_weights() {
    let nbest = lines_nbest(&[vec![(0, 1), (0, 3)], vec![(0, 2)]]);
    let metric = IndexMatchMetric::new(vec![0, 0]);
    let w = weights(&[("w", 1.0), ("d", 0.0)]);

    let out = LineSearch::default()
        .search(&nbest, &metric, &w, &weights(&[("d", 1.0)]), &Default::default())
        .unwrap();
    assert_eq!(out.weights, w);
    assert_eq!(out.step, 0.0);
    assert_eq!(out.segments, 1);
}

#[test]
fn test_fixed_features_are_not_moved() {
    let nbest = NBestBuilder::new()
        .sentence()
        .cand("a", &[("lm", 1.0), ("wp", 1.0)])
        .cand("b", &[("tm", 1.0)])
        .build();
    let metric = IndexMatchMetric::new(vec![1]);
    let fixed = weights(&[("wp", 0.5)]);
    let w = weights(&[("lm", 1.0), ("tm", 0.0)]);

    // The direction also points along the fixed feature; that part is ignored.
    let dir = weights(&[("tm", 1.0), ("wp", 1.0)]);
    let out = LineSearch::new(0, Smoothing::Min, true)
        .search(&nbest, &metric, &w, &dir, &fixed)
        .unwrap();

    assert!(!out.weights.contains("wp"));
    // Crossing at t = 1.5; last segment representative is 2.5, no normalization.
    assert_eq!(out.step, 2.5);
    assert_eq!(out.weights.get("tm"), 2.5);
    assert_eq!(out.weights.get("lm"), 1.0);
}

#[test]
fn test_min_smoothing_avoids_narrow_peaks() {
    // Crossings at 1, 2, 4 and 6; only the last segment gets two sentences right.
    let nbest = lines_nbest(&[
        vec![(0, 0), (1, -1), (2, -3)],
        vec![(0, 0), (1, -4)],
        vec![(0, 0), (1, -6)],
    ]);
    let metric = IndexMatchMetric::new(vec![1, 1, 1]);
    let points = breakpoints(
        &nbest,
        &dense(&nbest, &[("w", 1.0)]),
        &dense(&nbest, &[("d", 1.0)]),
    )
    .unwrap();
    let scores = LineSearch::segment_scores(&nbest, &metric, &points);
    println!("Segment scores: {:?}", scores);
    assert_eq!(scores, vec![0.0, 1.0, 0.0, 1.0, 2.0]);

    let w = weights(&[("w", 1.0), ("d", 0.0)]);
    let dir = weights(&[("d", 1.0)]);

    let raw = LineSearch::new(0, Smoothing::Min, false)
        .search(&nbest, &metric, &w, &dir, &Default::default())
        .unwrap();
    assert_eq!(raw.score, 2.0);
    assert_eq!(raw.step, 7.0);

    let smoothed = LineSearch::new(1, Smoothing::Min, false)
        .search(&nbest, &metric, &w, &dir, &Default::default())
        .unwrap();
    // Windowed minima: 0, 0, 0, 0, 1 -> still the last segment.
    assert_eq!(smoothed.step, 7.0);

    let avg = LineSearch::new(1, Smoothing::Avg, false)
        .search(&nbest, &metric, &w, &dir, &Default::default())
        .unwrap();
    assert_eq!(avg.step, 7.0);
}

// --- PROPERTIES ---

prop_compose! {
    fn arb_sentence()(
        lines in proptest::collection::vec((-5i32..=5, -20i32..=20), 1..6)
    )(
        correct in 0..lines.len(),
        lines in Just(lines)
    ) -> (Vec<(i32, i32)>, usize) {
        (lines, correct)
    }
}

prop_compose! {
    fn arb_lines()(
        sentences in proptest::collection::vec(arb_sentence(), 1..5)
    ) -> (Vec<Vec<(i32, i32)>>, Vec<usize>) {
        sentences.into_iter().unzip()
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn test_line_search_beats_dense_sampling((lines, correct) in arb_lines()) {
        let nbest = lines_nbest(&lines);
        let metric = IndexMatchMetric::new(correct);
        let w = weights(&[("w", 1.0), ("d", 0.0)]);
        let dir = weights(&[("d", 1.0)]);

        let out = LineSearch::new(0, Smoothing::Min, false)
            .search(&nbest, &metric, &w, &dir, &Default::default())
            .unwrap();

        // The returned score is what the model actually selects there.
        let at_step = eval::evaluate(&nbest, &metric, &out.weights);
        prop_assert!((at_step - out.score).abs() < 1e-12);

        for i in -600..600 {
            let t = i as f64 * 0.1 + 0.0371;
            let sampled = eval::evaluate(&nbest, &metric, &weights(&[("w", 1.0), ("d", t)]));
            prop_assert!(
                sampled <= out.score + 1e-12,
                "t={} scores {} but line search returned {} at {}",
                t, sampled, out.score, out.step
            );
        }
    }

    #[test]
    fn test_one_best_constant_between_breakpoints((lines, _) in arb_lines()) {
        let nbest = lines_nbest(&lines);
        let points = breakpoints(
            &nbest,
            &dense(&nbest, &[("w", 1.0)]),
            &dense(&nbest, &[("d", 1.0)]),
        )
        .unwrap();

        let mut current = vec![0usize; nbest.len()];
        for i in 0..points.len() {
            for &(s, c) in &points[i].changes {
                current[s] = c;
            }

            let lo = points[i].t;
            let hi = points.get(i + 1).map(|p| p.t).unwrap_or(f64::INFINITY);
            let samples: Vec<f64> = match (lo.is_finite(), hi.is_finite()) {
                (true, true) => vec![0.25, 0.5, 0.75].into_iter().map(|f| lo + (hi - lo) * f).collect(),
                (false, true) => vec![hi - 0.5, hi - 3.0, hi - 100.0],
                (true, false) => vec![lo + 0.5, lo + 3.0, lo + 100.0],
                (false, false) => vec![-100.0, 0.0, 100.0],
            };

            for t in samples {
                let ranks: Vec<usize> = eval::argmax(&nbest, &weights(&[("w", 1.0), ("d", t)]))
                    .iter()
                    .map(|c| c.rank)
                    .collect();
                prop_assert_eq!(&ranks, &current, "segment {} at t={}", i, t);
            }
        }
    }
}
