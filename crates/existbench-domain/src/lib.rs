//! Domain logic for existbench.
//!
//! This crate is intentionally I/O-free: it validates catalogs, judges samples, and does the math.

use existbench_types::{
    AggregateStat, BenchConfig, CaseStat, Category, DurationSummary, Failure, PathCase,
    ProbeOutcome, SampleVerdict, StrategyKind, StrategyResult, StrategyTotals, VerdictCounts,
};
use statrs::statistics::{Data, Median};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, thiserror::Error)]
pub enum DomainError {
    #[error("no samples to summarize")]
    NoSamples,

    #[error("catalog has no cases")]
    EmptyCatalog,

    #[error("case #{0} has an empty name")]
    EmptyCaseName(usize),

    #[error("case {0:?} has an empty path")]
    EmptyPath(String),

    #[error("duplicate case name: {0:?}")]
    DuplicateCase(String),

    #[error("iterations must be >= 1")]
    InvalidIterations,

    #[error("timeout must be > 0 ms")]
    InvalidTimeout,

    #[error("no strategies selected")]
    NoStrategies,

    #[error("strategy {0} selected more than once")]
    DuplicateStrategy(StrategyKind),
}

/// Fixed, ordered, read-only set of path cases.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Catalog {
    cases: Vec<PathCase>,
}

impl Catalog {
    pub fn new(cases: Vec<PathCase>) -> Result<Self, DomainError> {
        validate_catalog(&cases)?;
        Ok(Self { cases })
    }

    pub fn cases(&self) -> &[PathCase] {
        &self.cases
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PathCase> {
        self.cases.iter()
    }

    pub fn len(&self) -> usize {
        self.cases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cases.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&PathCase> {
        self.cases.iter().find(|c| c.name == name)
    }
}

impl<'a> IntoIterator for &'a Catalog {
    type Item = &'a PathCase;
    type IntoIter = std::slice::Iter<'a, PathCase>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

pub fn validate_catalog(cases: &[PathCase]) -> Result<(), DomainError> {
    if cases.is_empty() {
        return Err(DomainError::EmptyCatalog);
    }
    let mut seen = BTreeSet::new();
    for (i, case) in cases.iter().enumerate() {
        if case.name.trim().is_empty() {
            return Err(DomainError::EmptyCaseName(i + 1));
        }
        if case.path.is_empty() {
            return Err(DomainError::EmptyPath(case.name.clone()));
        }
        if !seen.insert(case.name.as_str()) {
            return Err(DomainError::DuplicateCase(case.name.clone()));
        }
    }
    Ok(())
}

pub fn validate_config(config: &BenchConfig) -> Result<(), DomainError> {
    if config.iterations == 0 {
        return Err(DomainError::InvalidIterations);
    }
    if config.timeout_ms == 0 {
        return Err(DomainError::InvalidTimeout);
    }
    if config.strategies.is_empty() {
        return Err(DomainError::NoStrategies);
    }
    let mut seen = BTreeSet::new();
    for kind in &config.strategies {
        if !seen.insert(*kind) {
            return Err(DomainError::DuplicateStrategy(*kind));
        }
    }
    Ok(())
}

/// Judge one outcome against the case's ground truth.
///
/// A `NotFound` failure counts as an observation of "missing"; every other failure kind is
/// `Failed` regardless of the boolean that came with it.
pub fn classify(case: &PathCase, outcome: &ProbeOutcome) -> SampleVerdict {
    match &outcome.failure {
        None => {
            if outcome.exists == case.expected_exists {
                SampleVerdict::Correct
            } else {
                SampleVerdict::Incorrect
            }
        }
        Some(Failure::NotFound) => {
            if case.expected_exists {
                SampleVerdict::Incorrect
            } else {
                SampleVerdict::Correct
            }
        }
        Some(Failure::AccessDenied | Failure::Timeout { .. } | Failure::Unexpected { .. }) => {
            SampleVerdict::Failed
        }
    }
}

/// Summarize elapsed times.
///
/// Mean, min and max come from integer arithmetic so the result does not depend on sample order.
pub fn summarize_durations(values: &[u64]) -> Result<DurationSummary, DomainError> {
    if values.is_empty() {
        return Err(DomainError::NoSamples);
    }
    let n = values.len();
    let sum: u128 = values.iter().map(|&v| v as u128).sum();
    let min = *values.iter().min().unwrap_or(&0);
    let max = *values.iter().max().unwrap_or(&0);
    let mean_ns = sum as f64 / n as f64;

    let as_f64: Vec<f64> = values.iter().map(|&v| v as f64).collect();
    let std_dev_ns = if n < 2 {
        0.0
    } else {
        use statrs::statistics::Statistics;
        as_f64.iter().std_dev()
    };
    let median_ns = Data::new(as_f64).median();

    Ok(DurationSummary {
        mean_ns,
        median_ns,
        min_ns: min,
        max_ns: max,
        std_dev_ns,
    })
}

fn ratio(mean: f64, baseline_mean: Option<f64>) -> Option<f64> {
    match baseline_mean {
        Some(b) if b > 0.0 => Some(mean / b),
        _ => None,
    }
}

/// Everything derived from one run's raw samples.
#[derive(Debug, Clone, PartialEq)]
pub struct Aggregation {
    pub case_stats: Vec<CaseStat>,
    pub aggregates: Vec<AggregateStat>,
    pub totals: Vec<StrategyTotals>,
}

#[derive(Default)]
struct Bucket {
    elapsed: Vec<u64>,
    counts: VerdictCounts,
    seen_exists: BTreeSet<bool>,
    category: Option<Category>,
}

impl Bucket {
    fn push(&mut self, r: &StrategyResult) {
        self.elapsed.push(r.elapsed_ns);
        self.counts.record(r.verdict, r.outcome.failure.as_ref());
        self.seen_exists.insert(r.outcome.exists);
        self.category = Some(r.case.category);
    }
}

/// Recompute all statistics from the full raw sample set.
///
/// Output order is fixed by (strategy, case name) and (strategy, category), so callers get
/// identical results for any permutation of `results`.
pub fn aggregate(
    results: &[StrategyResult],
    baseline: StrategyKind,
) -> Result<Aggregation, DomainError> {
    if results.is_empty() {
        return Err(DomainError::NoSamples);
    }

    let mut by_case: BTreeMap<(StrategyKind, &str), Bucket> = BTreeMap::new();
    let mut by_category: BTreeMap<(StrategyKind, Category), Bucket> = BTreeMap::new();

    for r in results {
        by_case
            .entry((r.strategy, r.case.name.as_str()))
            .or_default()
            .push(r);
        by_category
            .entry((r.strategy, r.case.category))
            .or_default()
            .push(r);
    }

    let mut case_timings = BTreeMap::new();
    for (key, bucket) in &by_case {
        case_timings.insert(*key, summarize_durations(&bucket.elapsed)?);
    }
    let mut category_timings = BTreeMap::new();
    for (key, bucket) in &by_category {
        category_timings.insert(*key, summarize_durations(&bucket.elapsed)?);
    }

    let case_stats = by_case
        .iter()
        .map(|(&(strategy, case), bucket)| {
            let timing = case_timings[&(strategy, case)].clone();
            let baseline_mean = case_timings.get(&(baseline, case)).map(|t| t.mean_ns);
            CaseStat {
                strategy,
                case: case.to_string(),
                category: bucket.category.unwrap_or(Category::LocalFile),
                sample_count: bucket.elapsed.len() as u32,
                relative_to_baseline: ratio(timing.mean_ns, baseline_mean),
                timing,
                counts: bucket.counts.clone(),
                flapped: bucket.seen_exists.len() > 1,
            }
        })
        .collect();

    let aggregates = by_category
        .iter()
        .map(|(&(strategy, category), bucket)| {
            let timing = category_timings[&(strategy, category)].clone();
            let baseline_mean = category_timings
                .get(&(baseline, category))
                .map(|t| t.mean_ns);
            AggregateStat {
                strategy,
                category,
                sample_count: bucket.elapsed.len() as u32,
                relative_to_baseline: ratio(timing.mean_ns, baseline_mean),
                timing,
                counts: bucket.counts.clone(),
            }
        })
        .collect();

    let mut totals: BTreeMap<StrategyKind, VerdictCounts> = BTreeMap::new();
    for ((strategy, _), bucket) in &by_category {
        totals.entry(*strategy).or_default().merge(&bucket.counts);
    }
    let totals = totals
        .into_iter()
        .map(|(strategy, counts)| StrategyTotals { strategy, counts })
        .collect();

    Ok(Aggregation {
        case_stats,
        aggregates,
        totals,
    })
}
