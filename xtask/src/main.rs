use anyhow::Context;
use clap::{Parser, Subcommand};
use schemars::schema_for;
use std::fs;
use std::path::Path;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "xtask", about = "Repo automation for existbench")]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// (Re)generate JSON Schemas for the report and config.
    Schema {
        /// Output directory
        #[arg(long, default_value = "schemas")]
        out_dir: PathBuf,
    },

    /// Run the usual repo checks (fmt, clippy, test, schema).
    Ci,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.cmd {
        Command::Schema { out_dir } => cmd_schema(&out_dir),
        Command::Ci => cmd_ci(),
    }
}

fn cmd_ci() -> anyhow::Result<()> {
    run("cargo", ["fmt", "--all", "--", "--check"])?;
    run(
        "cargo",
        ["clippy", "--all-targets", "--all-features", "--", "-D", "warnings"],
    )?;
    run("cargo", ["test", "--workspace"])?;
    run("cargo", ["run", "-p", "xtask", "--", "schema"])?;
    Ok(())
}

fn run<const N: usize>(bin: &str, args: [&str; N]) -> anyhow::Result<()> {
    let status = std::process::Command::new(bin)
        .args(args)
        .status()
        .with_context(|| format!("running {bin}"))?;
    if !status.success() {
        anyhow::bail!("{bin} {} failed: {status}", args.join(" "));
    }
    Ok(())
}

fn cmd_schema(out_dir: &Path) -> anyhow::Result<()> {
    fs::create_dir_all(out_dir).with_context(|| format!("create dir {}", out_dir.display()))?;

    write_schema(
        out_dir,
        &format!("{}.schema.json", existbench_types::REPORT_SCHEMA_V1),
        schema_for!(existbench_types::BenchReport),
    )?;

    write_schema(
        out_dir,
        "existbench.config.v1.schema.json",
        schema_for!(existbench_types::ConfigFile),
    )?;

    Ok(())
}

fn write_schema<T: serde::Serialize>(out_dir: &Path, name: &str, schema: T) -> anyhow::Result<()> {
    let path = out_dir.join(name);
    let json = serde_json::to_vec_pretty(&schema)?;
    fs::write(&path, json).with_context(|| format!("write {}", path.display()))?;
    println!("wrote {}", path.display());
    Ok(())
}
