//! fcrecon CLI - Forecast Reconciliation Engine
//!
//! Command-line interface for reconciling a constrained forecast against its
//! unconstrained baseline and writing the long-format output table.

mod report;

use std::io;
use std::path::{Path, PathBuf};
use std::process;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use fcrecon_core::ReconcileConfig;
use fcrecon_engine::Pipeline;
use fcrecon_loader::load_table;
use fcrecon_render::{open_sink, write_summary_json};
use tracing::debug;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::report::{write_check, write_run_report, ExitCode};

#[derive(Parser)]
#[command(name = "fcrecon")]
#[command(author, version, about = "Constrained vs. unconstrained forecast reconciliation", long_about = None)]
struct Cli {
    /// Verbose output (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Reconcile two wide forecast tables into the long output table
    Reconcile(ReconcileArgs),

    /// Locate week columns and run the freshness guard on a constrained source
    Check {
        /// Constrained forecast source
        #[arg(long, value_name = "FILE")]
        constrained: PathBuf,

        /// Sheet to read from a workbook (default: first sheet)
        #[arg(long, value_name = "NAME")]
        sheet: Option<String>,

        /// Configuration file (TOML)
        #[arg(short, long, value_name = "FILE", env = "FCRECON_CONFIG")]
        config: Option<PathBuf>,
    },

    /// Print the default configuration as TOML
    Config,
}

#[derive(Args)]
struct ReconcileArgs {
    /// Constrained forecast source (.csv, .xlsx, ...)
    #[arg(long, value_name = "FILE")]
    constrained: PathBuf,

    /// Unconstrained forecast source
    #[arg(long, value_name = "FILE")]
    unconstrained: PathBuf,

    /// Sheet to read from a constrained workbook (default: first sheet)
    #[arg(long, value_name = "NAME")]
    constrained_sheet: Option<String>,

    /// Sheet to read from an unconstrained workbook (default: first sheet)
    #[arg(long, value_name = "NAME")]
    unconstrained_sheet: Option<String>,

    /// Configuration file (TOML)
    #[arg(short, long, value_name = "FILE", env = "FCRECON_CONFIG")]
    config: Option<PathBuf>,

    /// Output file (.csv or .xlsx)
    #[arg(short, long, value_name = "FILE")]
    output: PathBuf,

    /// Records per write batch (overrides the configuration)
    #[arg(long, value_name = "N")]
    batch_size: Option<usize>,

    /// Also write the supply-gap summary as JSON
    #[arg(long, value_name = "FILE")]
    summary_json: Option<PathBuf>,

    /// Also write the full run report as JSON
    #[arg(long, value_name = "FILE")]
    report_json: Option<PathBuf>,
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();
}

fn load_config(path: Option<&Path>) -> Result<ReconcileConfig> {
    let Some(path) = path else {
        return Ok(ReconcileConfig::default());
    };
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    let config = ReconcileConfig::from_toml_str(&text)
        .with_context(|| format!("Invalid config file: {}", path.display()))?;
    debug!(path = %path.display(), "loaded configuration");
    Ok(config)
}

fn cmd_reconcile(args: &ReconcileArgs) -> Result<ExitCode> {
    let mut config = load_config(args.config.as_deref())?;
    if let Some(size) = args.batch_size {
        config.batch.size = size;
    }

    let constrained = load_table(&args.constrained, args.constrained_sheet.as_deref())
        .with_context(|| {
            format!("Failed to load constrained source: {}", args.constrained.display())
        })?;
    let unconstrained = load_table(&args.unconstrained, args.unconstrained_sheet.as_deref())
        .with_context(|| {
            format!("Failed to load unconstrained source: {}", args.unconstrained.display())
        })?;

    let mut sink = open_sink(&args.output)
        .with_context(|| format!("Failed to open output: {}", args.output.display()))?;
    let report = Pipeline::new(config).run(&constrained, &unconstrained, sink.as_mut())?;

    if let Some(path) = &args.summary_json {
        write_summary_json(path, &report.summary)
            .with_context(|| format!("Failed to write summary: {}", path.display()))?;
    }
    if let Some(path) = &args.report_json {
        let json = serde_json::to_string_pretty(&report).context("Failed to serialize run report")?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write run report: {}", path.display()))?;
    }

    write_run_report(&mut io::stdout().lock(), &report, &args.output.display().to_string())?;
    Ok(ExitCode::Success)
}

fn cmd_check(constrained: &Path, sheet: Option<&str>, config: Option<&Path>) -> Result<ExitCode> {
    let config = load_config(config)?;
    let table = load_table(constrained, sheet)
        .with_context(|| format!("Failed to load constrained source: {}", constrained.display()))?;

    let pipeline = Pipeline::new(config);
    let weeks = pipeline.check(&table)?;
    write_check(&mut io::stdout().lock(), &table.name, &weeks, &pipeline.config().calendar)?;
    Ok(ExitCode::Success)
}

fn cmd_config() -> Result<ExitCode> {
    let text = ReconcileConfig::default()
        .to_toml_string()
        .context("Failed to render default configuration")?;
    print!("{text}");
    Ok(ExitCode::Success)
}

fn run(cli: Cli) -> Result<ExitCode> {
    match cli.command {
        Commands::Reconcile(args) => cmd_reconcile(&args),
        Commands::Check {
            constrained,
            sheet,
            config,
        } => cmd_check(&constrained, sheet.as_deref(), config.as_deref()),
        Commands::Config => cmd_config(),
    }
}

fn main() -> process::ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let code = match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::Failure
        }
    };
    debug!(code = code.code(), "exiting");
    code.into()
}
