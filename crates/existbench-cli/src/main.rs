use anyhow::Context;
use clap::{Parser, Subcommand};
use existbench_adapters::StdCaseSetup;
use existbench_app::{
    parse_config, parse_duration, render_markdown, resolve_config, BenchRequest,
    BenchRunUseCase, ConfigOverrides, SystemClock,
};
use existbench_types::{BenchReport, StrategyKind, ToolInfo};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Debug, Parser)]
#[command(
    name = "existbench",
    version,
    about = "Benchmark path-existence checks across local and network paths"
)]
struct Cli {
    /// Log progress (info level) to stderr. RUST_LOG takes precedence.
    #[arg(short, long, global = true, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run every strategy against every case and emit a report (JSON).
    Run {
        /// Catalog and defaults (TOML)
        #[arg(long, default_value = "existbench.toml")]
        config: PathBuf,

        /// Timed samples per (strategy, case)
        #[arg(long)]
        iterations: Option<u32>,

        /// Untimed priming runs per (strategy, case)
        #[arg(long)]
        warmup: Option<u32>,

        /// Deadline for bounded_native_api_query (e.g. "5s")
        #[arg(long)]
        timeout: Option<String>,

        /// Strategy the ratios are computed against
        #[arg(long)]
        baseline: Option<StrategyKind>,

        /// Restrict the run to these strategies. Repeatable.
        #[arg(long = "strategy")]
        strategies: Vec<StrategyKind>,

        /// Include every timed sample in the report
        #[arg(long, default_value_t = false)]
        raw_samples: bool,

        /// Output file path
        #[arg(long, default_value = "existbench.json")]
        out: PathBuf,

        /// Pretty-print JSON
        #[arg(long, default_value_t = false)]
        pretty: bool,

        /// Exit 2 when any sample was incorrect or failed
        #[arg(long, default_value_t = false)]
        fail_on_incorrect: bool,
    },

    /// Validate the catalog and list its cases.
    Cases {
        #[arg(long, default_value = "existbench.toml")]
        config: PathBuf,
    },

    /// Render a Markdown summary from a report.
    Md {
        #[arg(long)]
        report: PathBuf,

        /// Output markdown path (default: stdout)
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// List the available strategies.
    Strategies,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(err) = real_main(cli) {
        eprintln!("{err:#}");
        return ExitCode::from(1);
    }
    ExitCode::from(0)
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("info")
        } else {
            EnvFilter::new("warn")
        }
    });

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .with(filter)
        .init();
}

fn real_main(cli: Cli) -> anyhow::Result<()> {
    match cli.cmd {
        Command::Run {
            config,
            iterations,
            warmup,
            timeout,
            baseline,
            strategies,
            raw_samples,
            out,
            pretty,
            fail_on_incorrect,
        } => {
            let overrides = ConfigOverrides {
                iterations,
                warmup,
                timeout: timeout.as_deref().map(parse_duration).transpose()?,
                baseline,
                strategies,
            };
            let file = parse_config(&read_text(&config)?)
                .with_context(|| format!("load {}", config.display()))?;
            let (config, catalog) = resolve_config(file, &overrides)?;

            let setup = StdCaseSetup::new(Duration::from_millis(config.timeout_ms));
            let usecase = BenchRunUseCase::new(setup, SystemClock, tool_info());
            let outcome = usecase.execute(BenchRequest {
                catalog,
                config,
                keep_samples: raw_samples,
            })?;

            write_json(&out, &outcome.report, pretty)?;
            tracing::info!(path = %out.display(), "wrote report");

            for (strategy, case) in &outcome.flapping {
                eprintln!("warning: {strategy} gave inconsistent answers for {case}");
            }

            if fail_on_incorrect && (outcome.incorrect > 0 || outcome.failed > 0) {
                eprintln!(
                    "existbench: {} incorrect and {} failed samples",
                    outcome.incorrect, outcome.failed
                );
                // The report is written; the exit code carries the verdict.
                std::process::exit(2);
            }

            Ok(())
        }

        Command::Cases { config } => {
            let file = parse_config(&read_text(&config)?)
                .with_context(|| format!("load {}", config.display()))?;
            let (_, catalog) = resolve_config(file, &ConfigOverrides::default())?;

            for case in &catalog {
                println!(
                    "{}\t{}\t{}\t{}",
                    case.name,
                    case.category,
                    if case.expected_exists { "exists" } else { "missing" },
                    case.path
                );
            }
            Ok(())
        }

        Command::Md { report, out } => {
            let report: BenchReport = read_json(&report)?;
            let md = render_markdown(&report);

            match out {
                Some(path) => {
                    fs::write(&path, md).with_context(|| format!("write {}", path.display()))?;
                }
                None => {
                    print!("{md}");
                }
            }

            Ok(())
        }

        Command::Strategies => {
            for kind in StrategyKind::ALL {
                match kind.divergence() {
                    Some(note) => println!("{kind}\t{} ({note})", kind.description()),
                    None => println!("{kind}\t{}", kind.description()),
                }
            }
            Ok(())
        }
    }
}

fn tool_info() -> ToolInfo {
    ToolInfo {
        name: "existbench".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    }
}

fn read_text(path: &Path) -> anyhow::Result<String> {
    fs::read_to_string(path).with_context(|| format!("read {}", path.display()))
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let bytes = fs::read(path).with_context(|| format!("read {}", path.display()))?;
    let v =
        serde_json::from_slice(&bytes).with_context(|| format!("parse json {}", path.display()))?;
    Ok(v)
}

fn write_json<T: serde::Serialize>(path: &Path, value: &T, pretty: bool) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("create dir {}", parent.display()))?;
        }
    }

    let bytes = if pretty {
        serde_json::to_vec_pretty(value)?
    } else {
        serde_json::to_vec(value)?
    };

    atomic_write(path, &bytes)
}

fn atomic_write(path: &Path, bytes: &[u8]) -> anyhow::Result<()> {
    use std::io::Write;

    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let tmp = parent.join(format!(".{}.tmp", uuid::Uuid::new_v4()));

    {
        let mut f =
            fs::File::create(&tmp).with_context(|| format!("create temp {}", tmp.display()))?;
        f.write_all(bytes)
            .with_context(|| format!("write temp {}", tmp.display()))?;
        f.sync_all().ok();
    }

    fs::rename(&tmp, path)
        .with_context(|| format!("rename {} -> {}", tmp.display(), path.display()))?;
    Ok(())
}
