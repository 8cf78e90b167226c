//! The measurement loop: every strategy against every case, sequentially on the calling thread.

use existbench_adapters::ExistenceProbe;
use existbench_domain::{aggregate, classify, Catalog, DomainError};
use existbench_types::{AggregateStat, Failure, PathCase, StrategyKind, StrategyResult};
use std::time::Instant;

/// Warm up, then time `iterations` probes per (strategy, case).
///
/// Samples come back grouped by strategy, then case, in invocation order.
/// A failing probe is a sample like any other; nothing here aborts the run.
pub fn collect_samples<P: ExistenceProbe>(
    strategies: &[P],
    cases: &[PathCase],
    iterations: u32,
    warmup: u32,
) -> Vec<StrategyResult> {
    let mut results = Vec::with_capacity(strategies.len() * cases.len() * iterations as usize);

    for strategy in strategies {
        let kind = strategy.kind();
        for case in cases {
            let path = case.as_path();

            for _ in 0..warmup {
                let _ = strategy.probe(path);
            }

            let mut timeouts = 0u32;
            for _ in 0..iterations {
                let start = Instant::now();
                let outcome = strategy.probe(path);
                let elapsed_ns = u64::try_from(start.elapsed().as_nanos()).unwrap_or(u64::MAX);

                if matches!(outcome.failure, Some(Failure::Timeout { .. })) {
                    timeouts += 1;
                }
                let verdict = classify(case, &outcome);
                results.push(StrategyResult {
                    strategy: kind,
                    case: case.clone(),
                    outcome,
                    elapsed_ns,
                    verdict,
                });
            }

            if timeouts > 0 {
                tracing::warn!(
                    strategy = %kind,
                    case = %case.name,
                    timeouts,
                    in_flight = strategy.in_flight(),
                    "probes timed out"
                );
            } else {
                tracing::debug!(strategy = %kind, case = %case.name, iterations, "measured");
            }
        }
    }

    results
}

/// Run the full matrix and reduce it to per-(strategy, category) statistics.
pub fn run<P: ExistenceProbe>(
    strategies: &[P],
    catalog: &Catalog,
    iterations: u32,
    warmup: u32,
    baseline: StrategyKind,
) -> Result<Vec<AggregateStat>, DomainError> {
    let results = collect_samples(strategies, catalog.cases(), iterations, warmup);
    Ok(aggregate(&results, baseline)?.aggregates)
}
