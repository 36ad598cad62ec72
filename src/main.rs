//! strata — run the hierarchical sequence predictor over text
//!
//! Usage:
//!   strata run corpus.txt                      → adaptive tower, accuracy summary
//!   strata run ./texts --glob '*.md' --tokens words
//!   strata compare corpus.txt --trace out.jsonl → adaptive vs frozen first-order baseline
//!   strata dump-config                         → default config as TOML
//!   strata version                             → show version

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use strata::{format_summary, Experiment, ExperimentConfig, ReportWriter, TokenMode};
use strata_core::{Level, SwitchStrategy};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(
    name = "strata",
    about = "Self-structuring hierarchical sequence predictor",
    version = env!("CARGO_PKG_VERSION")
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to experiment config file (TOML). Default: ./strata.toml
    #[arg(long, global = true)]
    config: Option<String>,

    /// Write JSON logs to a file (in addition to stderr)
    #[arg(long, global = true)]
    log_file: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Feed a text file or directory through the predictor
    Run(RunArgs),
    /// Compare the adaptive tower with a frozen first-order baseline
    Compare(RunArgs),
    /// Dump default config as TOML and exit
    DumpConfig,
    /// Show version
    Version,
}

#[derive(Args)]
struct RunArgs {
    /// Input file or directory
    path: PathBuf,

    /// Breakdown threshold in [0, 1]
    #[arg(long)]
    threshold: Option<f64>,

    /// Never mint new representations
    #[arg(long, default_value_t = false)]
    frozen: bool,

    /// Treat unknown causes as misses instead of no information
    #[arg(long, default_value_t = false)]
    closed_world: bool,

    /// Use the joint (previous, current) search after a breakdown
    #[arg(long, default_value_t = false)]
    joint: bool,

    /// How text is split into symbols
    #[arg(long, value_enum)]
    tokens: Option<TokenMode>,

    /// File-name glob used when PATH is a directory
    #[arg(long)]
    glob: Option<String>,

    /// Lowercase input before tokenizing
    #[arg(long, default_value_t = false)]
    lowercase: bool,

    /// Pre-built layout, e.g. --layout 5,3
    #[arg(long, value_delimiter = ',')]
    layout: Option<Vec<usize>>,

    /// Write a JSON Lines report here
    #[arg(long)]
    trace: Option<PathBuf>,

    /// Include every step in the report, not just header and summary
    #[arg(long, default_value_t = false)]
    trajectory: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Version => {
            println!("strata v{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        Commands::DumpConfig => {
            println!("{}", ExperimentConfig::default().to_toml());
            Ok(())
        }
        Commands::Run(args) => {
            let _guard = init_tracing(cli.log_file.as_deref())?;
            let config = resolve_config(cli.config.as_deref(), &args)?;
            run(&args, &config)
        }
        Commands::Compare(args) => {
            let _guard = init_tracing(cli.log_file.as_deref())?;
            let config = resolve_config(cli.config.as_deref(), &args)?;
            run_compare(&args, &config)
        }
    }
}

fn init_tracing(log_file: Option<&str>) -> anyhow::Result<Option<WorkerGuard>> {
    let (file_layer, guard) = match log_file {
        Some(path) => {
            let path = expand_tilde(path);
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            let name = path
                .file_name()
                .ok_or_else(|| anyhow::anyhow!("--log-file needs a file name"))?;
            std::fs::create_dir_all(dir)?;
            let (writer, guard) =
                tracing_appender::non_blocking(tracing_appender::rolling::never(dir, name));
            // file logs are JSON lines, one event per line
            let layer = tracing_subscriber::fmt::layer().json().with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "strata=info,strata_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .init();
    Ok(guard)
}

fn resolve_config(path: Option<&str>, args: &RunArgs) -> anyhow::Result<ExperimentConfig> {
    let path = path
        .map(expand_tilde)
        .unwrap_or_else(|| PathBuf::from("strata.toml"));
    let mut config = ExperimentConfig::load(&path);

    if let Some(threshold) = args.threshold {
        config.level.threshold = threshold;
    }
    if args.frozen {
        config.level.frozen = true;
    }
    if args.closed_world {
        config.level.open_world = false;
    }
    if args.joint {
        config.level.strategy = SwitchStrategy::Joint;
    }
    if let Some(tokens) = args.tokens {
        config.input.tokens = tokens;
    }
    if let Some(glob) = &args.glob {
        config.input.glob = glob.clone();
    }
    if args.lowercase {
        config.input.lowercase = true;
    }
    if let Some(layout) = &args.layout {
        config.layout = layout.clone();
    }
    if args.trajectory {
        config.report.trajectory = true;
    }

    config.validate().context("invalid configuration")?;
    Ok(config)
}

fn load(args: &RunArgs, config: &ExperimentConfig) -> anyhow::Result<(Vec<String>, Vec<String>)> {
    let (files, symbols) = strata::source::load_stream(
        &args.path,
        &config.input.glob,
        config.input.tokens,
        config.input.lowercase,
    )?;
    tracing::info!("{} symbols from {} file(s)", symbols.len(), files.len());
    let inputs = files.iter().map(|f| f.display().to_string()).collect();
    Ok((inputs, symbols))
}

fn run(args: &RunArgs, config: &ExperimentConfig) -> anyhow::Result<()> {
    let (inputs, symbols) = load(args, config)?;
    let experiment =
        Experiment::new(config.level.clone()).with_trajectory(config.report.trajectory);
    let outcome = if config.layout.is_empty() {
        experiment.run(&symbols)?
    } else {
        let level = Level::build(&config.layout, config.level.clone())?;
        experiment.run_on(level, &symbols)?
    };

    println!("{}", format_summary("adaptive", &outcome));

    if let Some(trace) = &args.trace {
        let mut writer = ReportWriter::new(create_report(trace)?);
        writer.write_run("adaptive", &inputs, config, &outcome)?;
        tracing::info!("Wrote report {} ({})", trace.display(), writer.run_id());
    }
    Ok(())
}

fn run_compare(args: &RunArgs, config: &ExperimentConfig) -> anyhow::Result<()> {
    let (inputs, symbols) = load(args, config)?;
    let comparison = Experiment::new(config.level.clone())
        .with_trajectory(config.report.trajectory)
        .compare(&symbols)?;

    println!("{}", format_summary("adaptive", &comparison.adaptive));
    println!("{}", format_summary("baseline", &comparison.baseline));
    println!("gain      {:+.2} points", comparison.gain() * 100.0);

    if let Some(trace) = &args.trace {
        let mut writer = ReportWriter::new(create_report(trace)?);
        writer.write_run("adaptive", &inputs, config, &comparison.adaptive)?;
        let mut baseline_config = config.clone();
        baseline_config.level.frozen = true;
        writer.write_run("baseline", &inputs, &baseline_config, &comparison.baseline)?;
        tracing::info!("Wrote report {} ({})", trace.display(), writer.run_id());
    }
    Ok(())
}

fn create_report(path: &Path) -> anyhow::Result<BufWriter<File>> {
    if let Some(dir) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)?;
    }
    let file = File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
    Ok(BufWriter::new(file))
}

fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home).join(stripped);
        }
    }
    PathBuf::from(path)
}
