//! Property-based scoring tests using proptest.
//!
//! Tests verify:
//! - Per-criterion medians stay within the sample range
//! - Aggregation is independent of sample order
//! - Weighted grades are monotonic in every criterion
//! - Weight normalization is idempotent
//! - Heuristic scores always respect the configured bound

use evaluation::{
    aggregate, heuristic, weighted_score, Criterion, CriterionScores, WeightConfig,
};
use proptest::prelude::*;

// =========================================================================
// Generation strategies
// =========================================================================

fn arb_scores() -> impl Strategy<Value = CriterionScores> {
    (0.0..=5.0f64, 0.0..=5.0f64, 0.0..=5.0f64)
        .prop_map(|(c, n, r)| CriterionScores::new(c, n, r, 5.0))
}

fn arb_samples() -> impl Strategy<Value = Vec<CriterionScores>> {
    prop::collection::vec(arb_scores(), 1..10)
}

/// A sample list paired with a random permutation of itself.
fn arb_samples_and_permutation(
) -> impl Strategy<Value = (Vec<CriterionScores>, Vec<CriterionScores>)> {
    arb_samples().prop_flat_map(|samples| {
        let shuffled = Just(samples.clone()).prop_shuffle();
        (Just(samples), shuffled)
    })
}

/// Raw weights with a strictly positive sum.
fn arb_weights() -> impl Strategy<Value = WeightConfig> {
    (0.0..=10.0f64, 0.0..=10.0f64, 0.01..=10.0f64)
        .prop_map(|(c, n, r)| WeightConfig::new(c, n, r))
}

fn arb_criterion() -> impl Strategy<Value = Criterion> {
    prop::sample::select(Criterion::ALL.to_vec())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    // ── Property: median within [min, max] ───────────────────────────

    #[test]
    fn prop_median_within_sample_range(samples in arb_samples()) {
        let agg = aggregate(&samples).unwrap();
        for criterion in Criterion::ALL {
            let column: Vec<f64> = samples.iter().map(|s| s.get(criterion)).collect();
            let lo = column.iter().copied().fold(f64::INFINITY, f64::min);
            let hi = column.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            let m = agg.get(criterion);
            prop_assert!(lo <= m && m <= hi, "{} median {} outside [{}, {}]", criterion, m, lo, hi);
        }
    }

    // ── Property: order independence ─────────────────────────────────

    #[test]
    fn prop_aggregation_order_independent(
        (samples, shuffled) in arb_samples_and_permutation()
    ) {
        let baseline = aggregate(&samples).unwrap();
        let agg = aggregate(&shuffled).unwrap();
        // Bit-for-bit, not approximately.
        for criterion in Criterion::ALL {
            prop_assert_eq!(agg.get(criterion).to_bits(), baseline.get(criterion).to_bits());
        }
    }

    #[test]
    fn prop_subsequence_aggregation_reversible(
        samples in arb_samples(),
        picks in prop::sample::subsequence((0..9usize).collect::<Vec<_>>(), 0..9),
    ) {
        // Any subsequence, aggregated forwards and backwards, agrees.
        let subset: Vec<CriterionScores> = picks
            .into_iter()
            .filter(|&i| i < samples.len())
            .map(|i| samples[i])
            .collect();
        prop_assume!(!subset.is_empty());
        let mut reversed = subset.clone();
        reversed.reverse();
        prop_assert_eq!(aggregate(&subset).unwrap(), aggregate(&reversed).unwrap());
    }

    // ── Property: weighted score is monotonic ────────────────────────

    #[test]
    fn prop_weighted_score_monotonic(
        raw in arb_weights(),
        base in arb_scores(),
        criterion in arb_criterion(),
        bump in 0.0..=5.0f64,
    ) {
        let w = raw.normalized().unwrap();
        let before = weighted_score(&base, &w).unwrap();
        let mut raised = base;
        raised.set(criterion, (base.get(criterion) + bump).min(5.0));
        let after = weighted_score(&raised, &w).unwrap();
        prop_assert!(after >= before, "raising {} lowered grade: {} -> {}", criterion, before, after);
    }

    #[test]
    fn prop_weighted_score_within_criterion_scale(raw in arb_weights(), s in arb_scores()) {
        let w = raw.normalized().unwrap();
        let grade = weighted_score(&s, &w).unwrap();
        prop_assert!((0.0..=5.0 + 1e-9).contains(&grade));
    }

    // ── Property: normalization idempotent ───────────────────────────

    #[test]
    fn prop_normalization_idempotent(raw in arb_weights()) {
        let once = raw.normalized().unwrap();
        let twice = once.normalized().unwrap();
        for criterion in Criterion::ALL {
            prop_assert!((once.get(criterion) - twice.get(criterion)).abs() < 1e-12);
        }
        prop_assert!(twice.is_normalized());
    }

    // ── Property: heuristic bounded ──────────────────────────────────

    #[test]
    fn prop_heuristic_scores_bounded(
        expected in "[a-zA-Z0-9 .,!?]{0,60}",
        answer in "[a-zA-Z0-9 .,!?]{0,120}",
        max in prop::sample::select(vec![1.0f64, 5.0, 10.0]),
    ) {
        let sample = heuristic::score(&expected, &answer, max);
        prop_assert!(sample.scores.within(max), "max={} -> {:?}", max, sample.scores);
    }
}
