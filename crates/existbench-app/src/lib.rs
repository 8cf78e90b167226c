//! Application layer for existbench.
//!
//! The app layer coordinates adapters and domain logic.
//! It does not parse CLI flags and it does not write reports to disk.

mod config;
mod driver;

pub use config::{parse_config, parse_duration, resolve_config, ConfigOverrides};
pub use driver::{collect_samples, run};

use existbench_adapters::{strategies, CaseSetup, ExistenceProbe};
use existbench_domain::{aggregate, validate_config, Aggregation, Catalog};
use existbench_types::{
    BenchConfig, BenchReport, HostInfo, PathCase, RunMeta, SkippedCase, StrategyKind, ToolInfo,
};
use std::time::Duration;

pub trait Clock: Send + Sync {
    fn now_rfc3339(&self) -> String;
}

#[derive(Debug, Default, Clone)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_rfc3339(&self) -> String {
        use time::format_description::well_known::Rfc3339;
        time::OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .unwrap_or_else(|_| "1970-01-01T00:00:00Z".to_string())
    }
}

#[derive(Debug, Clone)]
pub struct BenchRequest {
    pub catalog: Catalog,
    pub config: BenchConfig,

    /// Attach every timed sample to the report.
    pub keep_samples: bool,
}

#[derive(Debug, Clone)]
pub struct BenchOutcome {
    pub report: BenchReport,

    /// Samples that returned the wrong boolean.
    pub incorrect: u32,

    /// Samples that ended in access denied, timeout or an unexpected error.
    pub failed: u32,

    /// (strategy, case) pairs whose answer changed between iterations.
    pub flapping: Vec<(StrategyKind, String)>,
}

pub struct BenchRunUseCase<S: CaseSetup, C: Clock> {
    setup: S,
    clock: C,
    tool: ToolInfo,
}

impl<S: CaseSetup, C: Clock> BenchRunUseCase<S, C> {
    pub fn new(setup: S, clock: C, tool: ToolInfo) -> Self {
        Self { setup, clock, tool }
    }

    pub fn execute(&self, req: BenchRequest) -> anyhow::Result<BenchOutcome> {
        let probes = strategies(
            &req.config.strategies,
            Duration::from_millis(req.config.timeout_ms),
        );
        self.execute_with(req, &probes)
    }

    /// Same as [`execute`](Self::execute), with the probes supplied by the caller.
    pub fn execute_with<P: ExistenceProbe>(
        &self,
        req: BenchRequest,
        probes: &[P],
    ) -> anyhow::Result<BenchOutcome> {
        validate_config(&req.config)?;

        let run_id = uuid::Uuid::new_v4().to_string();
        let started_at = self.clock.now_rfc3339();

        let host = HostInfo {
            os: std::env::consts::OS.to_string(),
            arch: std::env::consts::ARCH.to_string(),
        };

        tracing::info!(
            run_id = %run_id,
            cases = req.catalog.len(),
            strategies = probes.len(),
            iterations = req.config.iterations,
            "starting benchmark"
        );

        let mut ready: Vec<PathCase> = Vec::new();
        let mut skipped: Vec<SkippedCase> = Vec::new();
        for case in &req.catalog {
            match self.setup.prepare(case) {
                Ok(()) => ready.push(case.clone()),
                Err(err) => {
                    tracing::warn!(case = %case.name, path = %case.path, "skipping case: {err}");
                    skipped.push(SkippedCase {
                        case: case.clone(),
                        reason: err.to_string(),
                    });
                }
            }
        }

        let samples = collect_samples(
            probes,
            &ready,
            req.config.iterations,
            req.config.warmup_iterations,
        );

        let Aggregation {
            case_stats,
            aggregates,
            totals,
        } = if samples.is_empty() {
            Aggregation {
                case_stats: Vec::new(),
                aggregates: Vec::new(),
                totals: Vec::new(),
            }
        } else {
            aggregate(&samples, req.config.baseline)?
        };

        let orphaned: usize =
            probes.iter().map(|p| p.in_flight()).sum::<usize>() + self.setup.in_flight();
        if orphaned > 0 {
            tracing::warn!(orphaned, "bounded probes still running after the deadline");
        }

        let incorrect: u32 = totals.iter().map(|t| t.counts.incorrect).sum();
        let failed: u32 = totals.iter().map(|t| t.counts.failed).sum();
        let flapping = case_stats
            .iter()
            .filter(|s| s.flapped)
            .map(|s| (s.strategy, s.case.clone()))
            .collect();

        let ended_at = self.clock.now_rfc3339();
        tracing::info!(
            run_id = %run_id,
            samples = samples.len(),
            skipped = skipped.len(),
            incorrect,
            failed,
            "benchmark finished"
        );

        let report = BenchReport {
            schema: existbench_types::REPORT_SCHEMA_V1.to_string(),
            tool: self.tool.clone(),
            run: RunMeta {
                id: run_id,
                started_at,
                ended_at,
                host,
            },
            config: req.config,
            cases: req.catalog.cases().to_vec(),
            skipped,
            case_stats,
            aggregates,
            totals,
            orphaned_probes: orphaned as u64,
            samples: req.keep_samples.then_some(samples),
        };

        Ok(BenchOutcome {
            report,
            incorrect,
            failed,
            flapping,
        })
    }
}

// ----------------------------
// Rendering helpers
// ----------------------------

pub fn render_markdown(report: &BenchReport) -> String {
    let mut out = String::new();

    let incorrect: u32 = report.totals.iter().map(|t| t.counts.incorrect).sum();
    let failed: u32 = report.totals.iter().map(|t| t.counts.failed).sum();
    let header = if incorrect == 0 && failed == 0 {
        "✅ existbench: all samples correct"
    } else {
        "⚠️ existbench: incorrect or failed samples"
    };

    out.push_str(header);
    out.push_str("\n\n");

    out.push_str(&format!(
        "**Run:** `{}` ({} iterations, warmup {}, timeout {} ms, baseline `{}`)\n\n",
        report.run.id,
        report.config.iterations,
        report.config.warmup_iterations,
        report.config.timeout_ms,
        report.config.baseline,
    ));

    out.push_str(
        "| strategy | category | samples | mean | median | min | max | vs baseline | correct | incorrect | failed |\n",
    );
    out.push_str("|---|---|---:|---:|---:|---:|---:|---:|---:|---:|---:|\n");

    for a in &report.aggregates {
        out.push_str(&format!(
            "| `{strategy}` | {category} | {n} | {mean} | {median} | {min} | {max} | {ratio} | {ok} | {bad} | {failed} |\n",
            strategy = a.strategy,
            category = a.category,
            n = a.sample_count,
            mean = format_ns(a.timing.mean_ns),
            median = format_ns(a.timing.median_ns),
            min = format_ns(a.timing.min_ns as f64),
            max = format_ns(a.timing.max_ns as f64),
            ratio = format_ratio(a.relative_to_baseline),
            ok = a.counts.correct,
            bad = a.counts.incorrect,
            failed = a.counts.failed,
        ));
    }

    let flapping: Vec<_> = report.case_stats.iter().filter(|s| s.flapped).collect();
    if !report.skipped.is_empty() || !flapping.is_empty() || report.orphaned_probes > 0 {
        out.push_str("\n**Notes:**\n");
        for s in &report.skipped {
            out.push_str(&format!("- skipped `{}`: {}\n", s.case.name, s.reason));
        }
        for s in flapping {
            out.push_str(&format!(
                "- `{}` gave different answers for `{}`\n",
                s.strategy, s.case
            ));
        }
        if report.orphaned_probes > 0 {
            out.push_str(&format!(
                "- {} bounded probe thread(s) were still running at the end of the run\n",
                report.orphaned_probes
            ));
        }
    }

    out
}

fn format_ns(ns: f64) -> String {
    if ns >= 1_000_000_000.0 {
        format!("{:.2} s", ns / 1_000_000_000.0)
    } else if ns >= 1_000_000.0 {
        format!("{:.2} ms", ns / 1_000_000.0)
    } else if ns >= 1_000.0 {
        format!("{:.2} µs", ns / 1_000.0)
    } else {
        format!("{ns:.0} ns")
    }
}

fn format_ratio(ratio: Option<f64>) -> String {
    match ratio {
        Some(r) => format!("{r:.2}x"),
        None => "n/a".to_string(),
    }
}
