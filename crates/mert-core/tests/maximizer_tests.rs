mod common;

use common::{toy_corpus, IndexMatchMetric, NBestBuilder};
use mert_core::config::MaximizerParams;
use mert_core::features::FeatureIndex;
use mert_core::maximizer::{self, Agenda, Beam, Greedy, HillClimbing, MaximizerKind, MetricMaximizer};
use mert_core::metric::{Accumulator, BleuMetric, Metric, References};
use mert_core::{Candidate, MertError, NBestList};
use proptest::prelude::*;
use rstest::rstest;
use std::sync::Arc;
use strum::IntoEnumIterator;

fn ranks(selection: &[&Candidate]) -> Vec<usize> {
    selection.iter().map(|c| c.rank).collect()
}

fn bleu_for(nbest: &NBestList, refs: &[&str]) -> BleuMetric {
    let metric = BleuMetric::new(Arc::new(References::from_lines(refs)), 4);
    metric.prepare(nbest).unwrap();
    metric
}

/// Exhaustive best selection score.
fn brute_force(nbest: &NBestList, metric: &dyn Metric) -> f64 {
    let mut best = f64::NEG_INFINITY;
    let mut choice = vec![0usize; nbest.len()];
    loop {
        let selection: Vec<&Candidate> = choice
            .iter()
            .enumerate()
            .map(|(s, &c)| &nbest.get(s)[c])
            .collect();
        best = best.max(metric.score_selection(&selection));

        // Odometer increment.
        let mut pos = 0;
        loop {
            if pos == choice.len() {
                return best;
            }
            choice[pos] += 1;
            if choice[pos] < nbest.get(pos).len() {
                break;
            }
            choice[pos] = 0;
            pos += 1;
        }
    }
}

#[test]
fn test_greedy_is_idempotent() {
    println!("\n=== TEST: Greedy Idempotence ===");
    let (nbest, refs) = toy_corpus();
    let metric = bleu_for(&nbest, &refs);

    let first = Greedy.maximize(&nbest, &metric).unwrap();
    let second = Greedy.maximize(&nbest, &metric).unwrap();
    println!("Selection: {:?}", ranks(&first));
    assert_eq!(ranks(&first), ranks(&second));
    assert_eq!(first.len(), nbest.len());
    println!("✅ Same selection on repeat.");
}

#[test]
fn test_every_strategy_finds_index_match_optimum() {
    let nbest = NBestBuilder::new()
        .sentence()
        .cand("a", &[])
        .cand("b", &[])
        .cand("c", &[])
        .sentence()
        .cand("d", &[])
        .cand("e", &[])
        .sentence()
        .cand("f", &[])
        .build();
    let metric = IndexMatchMetric::new(vec![2, 1, 0]);

    for kind in MaximizerKind::iter() {
        let params = MaximizerParams {
            maximizer: kind,
            ..MaximizerParams::default()
        };
        let selection = maximizer::build(&params).maximize(&nbest, &metric).unwrap();
        assert_eq!(ranks(&selection), vec![2, 1, 0], "strategy {}", kind);
    }
}

#[test]
fn test_hill_climbing_improves_on_greedy() {
    let (nbest, refs) = toy_corpus();
    let metric = bleu_for(&nbest, &refs);

    let greedy = metric.score_selection(&Greedy.maximize(&nbest, &metric).unwrap());
    let (selection, trace) = HillClimbing::new().climb(&nbest, &metric);
    let climbed = metric.score_selection(&selection);

    println!("Greedy {:.4}, hill climbing {:.4}, passes {:?}", greedy, climbed, trace.pass_changes);
    assert_eq!(trace.initial_score, greedy);
    assert!(climbed >= greedy);
    assert_eq!(trace.pass_changes.last(), Some(&0));
}

#[test]
fn test_model_guided_tie_break_prefers_model() {
    // Both candidates of sentence 0 are equally (in)correct.
    let nbest = NBestBuilder::new()
        .sentence()
        .cand("a", &[("lm", -5.0)])
        .cand("b", &[("lm", -1.0)])
        .sentence()
        .cand("c", &[("lm", 0.0)])
        .build();
    let metric = IndexMatchMetric::new(vec![9, 0]);
    let weights: mert_core::WeightVector = [("lm", 1.0)].into_iter().collect();

    let selection = mert_core::eval::model_guided_oracle(&nbest, &metric, &weights);
    assert_eq!(ranks(&selection), vec![1, 0]);
}

#[test]
fn test_beam_width_is_at_least_one() {
    let (nbest, refs) = toy_corpus();
    let metric = bleu_for(&nbest, &refs);

    let beam = Beam::new(0);
    assert_eq!(beam.width(), 1);
    let selection = beam.maximize(&nbest, &metric).unwrap();
    assert_eq!(selection.len(), nbest.len());
}

#[test]
fn test_agenda_returns_full_selection() {
    let (nbest, refs) = toy_corpus();
    let metric = bleu_for(&nbest, &refs);

    let selection = Agenda::new(2).maximize(&nbest, &metric).unwrap();
    assert_eq!(selection.len(), nbest.len());
    for (s, cand) in selection.iter().enumerate() {
        assert_eq!(cand.sentence, s);
    }
}

#[test]
fn test_agenda_on_empty_corpus() {
    let nbest = NBestBuilder::new().build();
    let metric = IndexMatchMetric::new(vec![]);
    let selection = Agenda::new(0).maximize(&nbest, &metric).unwrap();
    assert!(selection.is_empty());
}

/// Per-candidate values, except that picking rank 0 for sentence 0 costs
/// -10 for every sentence from `trap_from` on. The cost only shows up deep in
/// the search, after the trapped branch has pulled ahead.
struct DelayedPenalty {
    values: Vec<Vec<f64>>,
    trap_from: usize,
    coarse: bool,
}

#[derive(Clone)]
struct DelayedPenaltyAcc {
    values: Arc<Vec<Vec<f64>>>,
    trap_from: usize,
    coarse: bool,
    picks: Vec<Option<(usize, usize)>>,
}

impl Accumulator for DelayedPenaltyAcc {
    fn add(&mut self, candidate: Option<&Candidate>) {
        self.picks.push(candidate.map(|c| (c.sentence, c.rank)));
    }

    fn replace(&mut self, index: usize, candidate: Option<&Candidate>) {
        while self.picks.len() <= index {
            self.picks.push(None);
        }
        self.picks[index] = candidate.map(|c| (c.sentence, c.rank));
    }

    fn score(&self) -> f64 {
        let trapped = self.picks.first() == Some(&Some((0, 0)));
        self.picks
            .iter()
            .flatten()
            .map(|&(s, r)| {
                if trapped && s >= self.trap_from {
                    -10.0
                } else {
                    self.values[s][r]
                }
            })
            .sum()
    }

    fn len(&self) -> usize {
        self.picks.len()
    }

    fn recombination_signature(&self) -> Option<Vec<i64>> {
        // Coarse: every state at a given depth looks interchangeable.
        self.coarse.then(|| vec![0])
    }

    fn clone_box(&self) -> Box<dyn Accumulator> {
        Box::new(self.clone())
    }
}

impl Metric for DelayedPenalty {
    fn name(&self) -> String {
        "delayed-penalty".to_string()
    }

    fn accumulator(&self) -> Box<dyn Accumulator> {
        Box::new(DelayedPenaltyAcc {
            values: Arc::new(self.values.clone()),
            trap_from: self.trap_from,
            coarse: self.coarse,
            picks: Vec::new(),
        })
    }
}

fn trap_corpus() -> NBestList {
    NBestBuilder::new()
        .sentence()
        .cand("a", &[])
        .cand("b", &[])
        .sentence()
        .cand("c", &[])
        .sentence()
        .cand("d", &[])
        .build()
}

fn trap_metric(coarse: bool) -> DelayedPenalty {
    DelayedPenalty {
        values: vec![vec![5.0, 0.0], vec![1.0], vec![1.0]],
        trap_from: 2,
        coarse,
    }
}

#[rstest]
#[case::no_window(0, vec![0, 0, 0], -4.0)]
#[case::window_one(1, vec![1, 0, 0], 2.0)]
#[case::wide_window(5, vec![1, 0, 0], 2.0)]
fn test_agenda_window_decides_recovery(
    #[case] window: usize,
    #[case] expected: Vec<usize>,
    #[case] score: f64,
) {
    println!("\n=== TEST: Agenda Window {} ===", window);
    let nbest = trap_corpus();
    let metric = trap_metric(false);

    let selection = Agenda::new(window).maximize(&nbest, &metric).unwrap();
    println!("Selection: {:?}", ranks(&selection));
    assert_eq!(ranks(&selection), expected);
    assert_eq!(metric.score_selection(&selection), score);
    if window > 0 {
        assert_eq!(score, brute_force(&nbest, &metric));
    }
}

#[test]
fn test_agenda_drops_states_dominated_at_same_signature() {
    let nbest = trap_corpus();

    // With one shared signature per depth, rank 1 of sentence 0 is dominated
    // by rank 0 as soon as both are pushed, so no window can bring it back.
    let metric = trap_metric(true);
    let selection = Agenda::new(5).maximize(&nbest, &metric).unwrap();
    assert_eq!(ranks(&selection), vec![0, 0, 0]);

    let fine = trap_metric(false);
    let selection = Agenda::new(5).maximize(&nbest, &fine).unwrap();
    assert_eq!(ranks(&selection), vec![1, 0, 0]);
}

#[test]
fn test_empty_list_is_rejected() {
    let lists = vec![vec![Candidate::new(vec!["x".to_string()], Default::default())], vec![]];
    let err = NBestList::from_lists(lists, Arc::new(FeatureIndex::new())).unwrap_err();
    assert!(matches!(err, MertError::EmptyNBest { sentence: 1 }));
}

// --- PROPERTIES ---

const VOCAB: [&str; 6] = ["the", "cat", "sat", "on", "a", "mat"];

prop_compose! {
    fn arb_tokens()(ids in proptest::collection::vec(0usize..VOCAB.len(), 1..7)) -> String {
        ids.into_iter().map(|i| VOCAB[i]).collect::<Vec<_>>().join(" ")
    }
}

prop_compose! {
    fn arb_corpus(max_sentences: usize, max_cands: usize)(
        sentences in proptest::collection::vec(
            (arb_tokens(), proptest::collection::vec(arb_tokens(), 1..=max_cands)),
            1..=max_sentences
        )
    ) -> Vec<(String, Vec<String>)> {
        sentences
    }
}

prop_compose! {
    fn arb_ranked_corpus(max_sentences: usize, max_cands: usize)(
        data in arb_corpus(max_sentences, max_cands)
    )(
        correct in data
            .iter()
            .map(|(_, cands)| 0..cands.len())
            .collect::<Vec<_>>(),
        data in Just(data)
    ) -> (Vec<(String, Vec<String>)>, Vec<usize>) {
        (data, correct)
    }
}

fn build_corpus(data: &[(String, Vec<String>)]) -> (NBestList, Vec<&str>) {
    let mut b = NBestBuilder::new();
    for (_, cands) in data {
        b = b.sentence();
        for c in cands {
            b = b.cand(c, &[]);
        }
    }
    (b.build(), data.iter().map(|(r, _)| r.as_str()).collect())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn test_hill_climbing_passes_never_decrease(data in arb_corpus(6, 4)) {
        let (nbest, refs) = build_corpus(&data);
        let metric = bleu_for(&nbest, &refs);

        let (_, trace) = HillClimbing::new().climb(&nbest, &metric);
        let mut prev = trace.initial_score;
        for s in &trace.pass_scores {
            prop_assert!(*s >= prev, "pass score {} fell below {}", s, prev);
            prev = *s;
        }
    }

    #[test]
    fn test_beam_recombination_is_sound(data in arb_corpus(3, 3)) {
        let (nbest, refs) = build_corpus(&data);
        let metric = bleu_for(&nbest, &refs);

        // Wide enough that nothing is pruned: only recombination discards states.
        let selection = Beam::new(1000).maximize(&nbest, &metric).unwrap();
        let found = metric.score_selection(&selection);
        let best = brute_force(&nbest, &metric);
        prop_assert!((found - best).abs() < 1e-12, "beam {} vs exhaustive {}", found, best);
    }

    #[test]
    fn test_agenda_reaches_optimum_for_any_window(
        (data, correct) in arb_ranked_corpus(6, 4),
        window in 0usize..4
    ) {
        let (nbest, _) = build_corpus(&data);
        let metric = IndexMatchMetric::new(correct);

        let agenda = metric.score_selection(&Agenda::new(window).maximize(&nbest, &metric).unwrap());
        let greedy = metric.score_selection(&Greedy.maximize(&nbest, &metric).unwrap());
        prop_assert_eq!(agenda, nbest.len() as f64);
        prop_assert!(agenda >= greedy, "agenda {} below greedy {}", agenda, greedy);
    }

    #[test]
    fn test_greedy_repeatable(data in arb_corpus(5, 4)) {
        let (nbest, refs) = build_corpus(&data);
        let metric = bleu_for(&nbest, &refs);
        let a = ranks(&Greedy.maximize(&nbest, &metric).unwrap());
        let b = ranks(&Greedy.maximize(&nbest, &metric).unwrap());
        prop_assert_eq!(a, b);
    }
}
