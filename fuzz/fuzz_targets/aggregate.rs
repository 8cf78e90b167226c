//! Structure-aware fuzzing of sample classification and aggregation.
//!
//! Arbitrary samples (any durations, any outcome/ground-truth mix) must never panic, and every
//! sample must land in exactly one verdict bucket of its strategy's totals.

#![no_main]

use existbench_types::{StrategyKind, StrategyResult};
use libfuzzer_sys::fuzz_target;

#[derive(arbitrary::Arbitrary, Debug)]
struct Input {
    samples: Vec<StrategyResult>,
    baseline: StrategyKind,
}

fuzz_target!(|input: Input| {
    let mut samples = input.samples;
    for s in &mut samples {
        s.verdict = existbench_domain::classify(&s.case, &s.outcome);
    }

    let Ok(agg) = existbench_domain::aggregate(&samples, input.baseline) else {
        assert!(samples.is_empty());
        return;
    };

    let counted: u32 = agg.totals.iter().map(|t| t.counts.total()).sum();
    assert_eq!(counted as usize, samples.len());
    let per_case: u32 = agg.case_stats.iter().map(|s| s.sample_count).sum();
    assert_eq!(per_case as usize, samples.len());
});
