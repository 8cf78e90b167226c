//! Shared types for existbench.
//!
//! Design goal: versioned, explicit, boring.
//! These structs flow from the probes through the driver into the JSON report.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

pub const REPORT_SCHEMA_V1: &str = "existbench.report.v1";

pub const DEFAULT_ITERATIONS: u32 = 100;
pub const DEFAULT_WARMUP: u32 = 5;
pub const DEFAULT_TIMEOUT_MS: u64 = 5000;

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct ToolInfo {
    pub name: String,
    pub version: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct HostInfo {
    pub os: String,
    pub arch: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct RunMeta {
    pub id: String,
    pub started_at: String,
    pub ended_at: String,
    pub host: HostInfo,
}

/// Kind of location a case exercises. Only used to group results.
#[derive(
    Debug, Copy, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq, PartialOrd, Ord, Hash,
)]
#[cfg_attr(feature = "arbitrary", derive(arbitrary::Arbitrary))]
#[serde(rename_all = "snake_case")]
pub enum Category {
    LocalFile,
    UncPath,
    MappedDrive,
    InactiveMappedDrive,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::LocalFile,
        Category::UncPath,
        Category::MappedDrive,
        Category::InactiveMappedDrive,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Category::LocalFile => "local_file",
            Category::UncPath => "unc_path",
            Category::MappedDrive => "mapped_drive",
            Category::InactiveMappedDrive => "inactive_mapped_drive",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of the path catalog.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[cfg_attr(feature = "arbitrary", derive(arbitrary::Arbitrary))]
pub struct PathCase {
    pub name: String,

    /// Path exactly as handed to the OS (no normalization).
    pub path: String,

    /// Ground truth for correctness reporting.
    pub expected_exists: bool,

    pub category: Category,

    /// If true, setup creates (or removes) a local fixture to match `expected_exists`.
    #[serde(default, skip_serializing_if = "is_false")]
    pub fixture: bool,
}

impl PathCase {
    pub fn new(
        name: impl Into<String>,
        path: impl Into<String>,
        expected_exists: bool,
        category: Category,
    ) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            expected_exists,
            category,
            fixture: false,
        }
    }

    pub fn with_fixture(mut self) -> Self {
        self.fixture = true;
        self
    }

    pub fn as_path(&self) -> &Path {
        Path::new(&self.path)
    }
}

fn is_false(b: &bool) -> bool {
    !*b
}

/// The interchangeable existence-check mechanisms.
#[derive(
    Debug, Copy, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq, PartialOrd, Ord, Hash,
)]
#[cfg_attr(feature = "arbitrary", derive(arbitrary::Arbitrary))]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    DirectQuery,
    NativeApiQuery,
    MetadataQuery,
    MetadataQueryGuarded,
    OpenAttempt,
    BoundedNativeApiQuery,
}

impl StrategyKind {
    pub const ALL: [StrategyKind; 6] = [
        StrategyKind::DirectQuery,
        StrategyKind::NativeApiQuery,
        StrategyKind::MetadataQuery,
        StrategyKind::MetadataQueryGuarded,
        StrategyKind::OpenAttempt,
        StrategyKind::BoundedNativeApiQuery,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            StrategyKind::DirectQuery => "direct_query",
            StrategyKind::NativeApiQuery => "native_api_query",
            StrategyKind::MetadataQuery => "metadata_query",
            StrategyKind::MetadataQueryGuarded => "metadata_query_guarded",
            StrategyKind::OpenAttempt => "open_attempt",
            StrategyKind::BoundedNativeApiQuery => "bounded_native_api_query",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            StrategyKind::DirectQuery => "standard library existence check, errors propagate",
            StrategyKind::NativeApiQuery => "raw OS existence primitive, error codes surface",
            StrategyKind::MetadataQuery => "metadata lookup, construction failures unguarded",
            StrategyKind::MetadataQueryGuarded => "metadata lookup, every failure reads as missing",
            StrategyKind::OpenAttempt => "open for reading, every failure reads as missing",
            StrategyKind::BoundedNativeApiQuery => {
                "native query on a helper thread with a wall-clock deadline"
            }
        }
    }

    /// Known semantic divergence from a pure existence check, if any.
    pub fn divergence(self) -> Option<&'static str> {
        match self {
            StrategyKind::OpenAttempt => Some("reports existing-but-unreadable paths as missing"),
            StrategyKind::BoundedNativeApiQuery => {
                Some("reports missing on timeout; the helper thread is abandoned, not cancelled")
            }
            _ => None,
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown strategy: {0} (expected one of: direct_query, native_api_query, metadata_query, metadata_query_guarded, open_attempt, bounded_native_api_query)")]
pub struct UnknownStrategy(pub String);

impl FromStr for StrategyKind {
    type Err = UnknownStrategy;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        StrategyKind::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| UnknownStrategy(s.to_string()))
    }
}

/// Why a probe could not produce a plain boolean.
#[derive(
    Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Hash, thiserror::Error,
)]
#[cfg_attr(feature = "arbitrary", derive(arbitrary::Arbitrary))]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Failure {
    #[error("path not found")]
    NotFound,

    #[error("access denied")]
    AccessDenied,

    #[error("no result within {after_ms} ms")]
    Timeout { after_ms: u64 },

    #[error("unexpected platform error: {message}")]
    Unexpected { message: String },
}

impl Failure {
    pub fn unexpected(message: impl Into<String>) -> Self {
        Failure::Unexpected {
            message: message.into(),
        }
    }

    pub fn kind(&self) -> FailureKind {
        match self {
            Failure::NotFound => FailureKind::NotFound,
            Failure::AccessDenied => FailureKind::AccessDenied,
            Failure::Timeout { .. } => FailureKind::Timeout,
            Failure::Unexpected { .. } => FailureKind::Unexpected,
        }
    }
}

#[derive(
    Debug, Copy, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq, PartialOrd, Ord, Hash,
)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    NotFound,
    AccessDenied,
    Timeout,
    Unexpected,
}

/// Result of a single probe invocation.
///
/// `exists` is always meaningful: strategies that fail report `false` alongside the failure.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[cfg_attr(feature = "arbitrary", derive(arbitrary::Arbitrary))]
pub struct ProbeOutcome {
    pub exists: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<Failure>,
}

impl ProbeOutcome {
    pub fn found(exists: bool) -> Self {
        Self {
            exists,
            failure: None,
        }
    }

    pub fn failed(failure: Failure) -> Self {
        Self {
            exists: false,
            failure: Some(failure),
        }
    }
}

#[derive(Debug, Copy, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "arbitrary", derive(arbitrary::Arbitrary))]
#[serde(rename_all = "snake_case")]
pub enum SampleVerdict {
    Correct,
    Incorrect,
    Failed,
}

/// One timed (strategy, case, iteration) invocation.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[cfg_attr(feature = "arbitrary", derive(arbitrary::Arbitrary))]
pub struct StrategyResult {
    pub strategy: StrategyKind,
    pub case: PathCase,
    pub outcome: ProbeOutcome,
    pub elapsed_ns: u64,
    pub verdict: SampleVerdict,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct DurationSummary {
    pub mean_ns: f64,
    pub median_ns: f64,
    pub min_ns: u64,
    pub max_ns: u64,
    pub std_dev_ns: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct VerdictCounts {
    pub correct: u32,
    pub incorrect: u32,
    pub failed: u32,

    /// Failure breakdown; includes `not_found` failures even when they counted as correct.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub failures: BTreeMap<FailureKind, u32>,
}

impl VerdictCounts {
    pub fn record(&mut self, verdict: SampleVerdict, failure: Option<&Failure>) {
        match verdict {
            SampleVerdict::Correct => self.correct += 1,
            SampleVerdict::Incorrect => self.incorrect += 1,
            SampleVerdict::Failed => self.failed += 1,
        }
        if let Some(f) = failure {
            *self.failures.entry(f.kind()).or_insert(0) += 1;
        }
    }

    pub fn merge(&mut self, other: &VerdictCounts) {
        self.correct += other.correct;
        self.incorrect += other.incorrect;
        self.failed += other.failed;
        for (kind, n) in &other.failures {
            *self.failures.entry(*kind).or_insert(0) += n;
        }
    }

    pub fn total(&self) -> u32 {
        self.correct + self.incorrect + self.failed
    }
}

/// Statistics for one (strategy, case) pair.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct CaseStat {
    pub strategy: StrategyKind,
    pub case: String,
    pub category: Category,
    pub sample_count: u32,
    pub timing: DurationSummary,

    /// mean / baseline mean for the same case.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relative_to_baseline: Option<f64>,

    pub counts: VerdictCounts,

    /// True if the observed `exists` value changed between timed iterations.
    #[serde(default)]
    pub flapped: bool,
}

/// Statistics for one (strategy, category) pair.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct AggregateStat {
    pub strategy: StrategyKind,
    pub category: Category,
    pub sample_count: u32,
    pub timing: DurationSummary,

    /// mean / baseline mean over the same category.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relative_to_baseline: Option<f64>,

    pub counts: VerdictCounts,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct StrategyTotals {
    pub strategy: StrategyKind,
    pub counts: VerdictCounts,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct SkippedCase {
    pub case: PathCase,
    pub reason: String,
}

/// Effective settings of one benchmark run.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct BenchConfig {
    /// Timed samples per (strategy, case).
    pub iterations: u32,

    /// Untimed priming runs per (strategy, case).
    pub warmup_iterations: u32,

    /// Deadline for the bounded strategy.
    pub timeout_ms: u64,

    pub baseline: StrategyKind,

    pub strategies: Vec<StrategyKind>,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            iterations: DEFAULT_ITERATIONS,
            warmup_iterations: DEFAULT_WARMUP,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            baseline: StrategyKind::DirectQuery,
            strategies: StrategyKind::ALL.to_vec(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct BenchReport {
    pub schema: String,
    pub tool: ToolInfo,
    pub run: RunMeta,
    pub config: BenchConfig,
    pub cases: Vec<PathCase>,

    #[serde(default)]
    pub skipped: Vec<SkippedCase>,

    pub case_stats: Vec<CaseStat>,
    pub aggregates: Vec<AggregateStat>,
    pub totals: Vec<StrategyTotals>,

    /// Bounded-probe helper threads still running when the report was assembled.
    #[serde(default)]
    pub orphaned_probes: u64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub samples: Option<Vec<StrategyResult>>,
}

// ----------------------------
// Config file schema
// ----------------------------

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Default)]
pub struct ConfigFile {
    #[serde(default)]
    pub defaults: DefaultsConfig,

    #[serde(default, rename = "case")]
    pub cases: Vec<CaseConfigFile>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Default)]
pub struct DefaultsConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iterations: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub warmup: Option<u32>,

    /// Duration string parseable by humantime, e.g. "5s".
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub baseline: Option<StrategyKind>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub strategies: Option<Vec<StrategyKind>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct CaseConfigFile {
    pub name: String,
    pub path: String,
    pub expected_exists: bool,
    pub category: Category,

    #[serde(default)]
    pub fixture: bool,
}

impl From<CaseConfigFile> for PathCase {
    fn from(c: CaseConfigFile) -> Self {
        PathCase {
            name: c.name,
            path: c.path,
            expected_exists: c.expected_exists,
            category: c.category,
            fixture: c.fixture,
        }
    }
}
