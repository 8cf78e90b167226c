//! Turn a parsed config file plus CLI overrides into the effective run settings.

use anyhow::Context;
use existbench_domain::{validate_config, Catalog};
use existbench_types::{BenchConfig, ConfigFile, StrategyKind, DEFAULT_TIMEOUT_MS};
use std::time::Duration;

/// Values given on the command line. `None` / empty means "use the file, then the default".
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub iterations: Option<u32>,
    pub warmup: Option<u32>,
    pub timeout: Option<Duration>,
    pub baseline: Option<StrategyKind>,
    pub strategies: Vec<StrategyKind>,
}

pub fn parse_duration(s: &str) -> anyhow::Result<Duration> {
    let d = humantime::parse_duration(s).with_context(|| format!("invalid duration: {s}"))?;
    Ok(d)
}

pub fn parse_config(text: &str) -> anyhow::Result<ConfigFile> {
    let cfg = toml::from_str(text).context("parse config toml")?;
    Ok(cfg)
}

/// Precedence: CLI override, then `[defaults]`, then built-in defaults.
pub fn resolve_config(
    file: ConfigFile,
    overrides: &ConfigOverrides,
) -> anyhow::Result<(BenchConfig, Catalog)> {
    let defaults = BenchConfig::default();
    let file_defaults = file.defaults;

    let timeout = match (overrides.timeout, file_defaults.timeout.as_deref()) {
        (Some(d), _) => d,
        (None, Some(s)) => parse_duration(s).context("[defaults].timeout")?,
        (None, None) => Duration::from_millis(DEFAULT_TIMEOUT_MS),
    };

    let strategies = if !overrides.strategies.is_empty() {
        overrides.strategies.clone()
    } else {
        file_defaults.strategies.unwrap_or(defaults.strategies)
    };

    let config = BenchConfig {
        iterations: overrides
            .iterations
            .or(file_defaults.iterations)
            .unwrap_or(defaults.iterations),
        warmup_iterations: overrides
            .warmup
            .or(file_defaults.warmup)
            .unwrap_or(defaults.warmup_iterations),
        timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
        baseline: overrides
            .baseline
            .or(file_defaults.baseline)
            .unwrap_or(defaults.baseline),
        strategies,
    };
    validate_config(&config)?;

    let catalog = Catalog::new(file.cases.into_iter().map(Into::into).collect())?;

    Ok((config, catalog))
}
