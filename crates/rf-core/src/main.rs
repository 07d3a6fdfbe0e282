//! ratefit - Poisson rate regression over binned hourly counts
//!
//! Commands:
//! - `fit`: load a CSV, bin it into days, fit `log(lambda) = theta_0 + theta_1 * t`
//! - `simulate`: write synthetic hourly counts with a known rate
//! - `config show`: print the resolved configuration

use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};
use rf_common::{format_error_human, Error, OutputFormat, StructuredError};
use rf_core::config::{load_config, Config, ConfigOptions, FitScope, Overrides, ResolvedConfig};
use rf_core::exit_codes::ExitCode;
use rf_core::log_event;
use rf_core::logging::{
    event_names, generate_run_id, init_logging, LogConfig, LogContext, LogFormat, LogLevel, Stage,
};
use rf_core::pipeline::run_fit;
use rf_core::report::render;
use rf_core::simulate::{simulate, write_csv, SimulationConfig, DEFAULT_SEED};
use std::io::IsTerminal;
use std::path::PathBuf;

/// Default input file name.
const DEFAULT_INPUT: &str = "hw3_question2.csv";

/// Fit a log-linear Poisson rate to daily totals of hourly counts
#[derive(Parser)]
#[command(name = "ratefit")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    global: GlobalOpts,
}

/// Global options available to all commands
#[derive(Args, Debug)]
struct GlobalOpts {
    /// Config file (TOML)
    #[arg(long, global = true, env = "RATEFIT_CONFIG")]
    config: Option<PathBuf>,

    /// Output format
    #[arg(long, short = 'f', global = true, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Log line format on stderr
    #[arg(long, global = true, value_enum)]
    log_format: Option<LogFormat>,
}

#[derive(Subcommand)]
enum Commands {
    /// Fit the rate model to a CSV of hourly counts
    Fit(FitArgs),

    /// Generate synthetic hourly counts from known parameters
    Simulate(SimulateArgs),

    /// Configuration management
    Config(ConfigArgs),
}

impl Commands {
    fn name(&self) -> &'static str {
        match self {
            Commands::Fit(_) => "fit",
            Commands::Simulate(_) => "simulate",
            Commands::Config(_) => "config",
        }
    }
}

#[derive(Args, Debug)]
struct FitArgs {
    /// Input CSV (header row, count in column 1)
    #[arg(default_value = DEFAULT_INPUT)]
    csv: PathBuf,

    /// Bins the likelihood is summed over
    #[arg(long, value_enum)]
    scope: Option<FitScope>,

    /// Initial theta_0
    #[arg(long, allow_hyphen_values = true)]
    theta0: Option<f64>,

    /// Initial theta_1
    #[arg(long, allow_hyphen_values = true)]
    theta1: Option<f64>,

    /// Zero-based column holding the count
    #[arg(long)]
    count_column: Option<usize>,

    /// Rows per bin
    #[arg(long)]
    bin_size: Option<usize>,

    /// Leading bins assigned to training
    #[arg(long)]
    train_size: Option<usize>,
}

#[derive(Args, Debug)]
struct SimulateArgs {
    /// True theta_0
    #[arg(long, allow_hyphen_values = true)]
    theta0: f64,

    /// True theta_1
    #[arg(long, allow_hyphen_values = true)]
    theta1: f64,

    /// Number of complete bins to generate
    #[arg(long)]
    bins: usize,

    /// RNG seed
    #[arg(long, default_value_t = DEFAULT_SEED)]
    seed: u64,

    /// Timestamp of the first row (RFC 3339)
    #[arg(long)]
    start: Option<DateTime<Utc>>,

    /// Write to this file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct ConfigArgs {
    #[command(subcommand)]
    command: ConfigCommands,
}

#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Print the resolved configuration
    Show,
}

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let code = if err.use_stderr() {
                ExitCode::ArgsError
            } else {
                ExitCode::Clean
            };
            let _ = err.print();
            std::process::exit(code.as_i32());
        }
    };

    let log_config = LogConfig::from_env(
        LogLevel::from_verbosity(cli.global.verbose, cli.global.quiet),
        cli.global.log_format,
    );
    init_logging(&log_config);
    let ctx = LogContext::new(generate_run_id());
    log_event!(
        ctx,
        DEBUG,
        event_names::RUN_STARTED,
        Stage::Init,
        "run started",
        command = cli.command.name(),
        version = env!("CARGO_PKG_VERSION")
    );

    let result = match &cli.command {
        Commands::Fit(args) => run_fit_command(&cli.global, args, &ctx),
        Commands::Simulate(args) => run_simulate(&cli.global, args, &ctx),
        Commands::Config(args) => match args.command {
            ConfigCommands::Show => run_config_show(&cli.global),
        },
    };

    let exit_code = match result {
        Ok(code) => code,
        Err(err) => {
            if cli.global.format == OutputFormat::Json {
                eprintln!("{}", StructuredError::from(&err).to_json());
            } else {
                let use_color = std::io::stderr().is_terminal();
                eprintln!("{}", format_error_human(&err, use_color));
            }
            ExitCode::from_error(&err)
        }
    };
    log_event!(
        ctx,
        DEBUG,
        event_names::RUN_FINISHED,
        Stage::Report,
        "run finished",
        exit_code = exit_code.as_i32(),
        code = exit_code.code_name()
    );

    std::process::exit(exit_code.as_i32());
}

fn resolve_config(global: &GlobalOpts) -> Result<ResolvedConfig, Error> {
    let options = ConfigOptions {
        config_path: global.config.clone(),
        config_dir: None,
    };
    Ok(load_config(&options)?)
}

fn run_fit_command(global: &GlobalOpts, args: &FitArgs, ctx: &LogContext) -> Result<ExitCode, Error> {
    let resolved = resolve_config(global)?;
    let source = resolved.source.to_string();
    log_event!(
        ctx,
        DEBUG,
        event_names::CONFIG_LOADED,
        Stage::Init,
        "configuration loaded",
        source = source.as_str()
    );

    let mut config: Config = resolved.config;
    config.apply(&Overrides {
        count_column: args.count_column,
        bin_size: args.bin_size,
        train_size: args.train_size,
        scope: args.scope,
        theta0: args.theta0,
        theta1: args.theta1,
    });
    config.validate()?;

    let report = run_fit(&args.csv, &config, ctx)?;
    let rendered = render(&report, global.format)?;
    println!("{}", rendered.trim_end());
    Ok(ExitCode::from_convergence(report.converged()))
}

fn run_simulate(global: &GlobalOpts, args: &SimulateArgs, ctx: &LogContext) -> Result<ExitCode, Error> {
    let config = resolve_config(global)?.config;
    let mut sim = SimulationConfig {
        theta: [args.theta0, args.theta1],
        bins: args.bins,
        bin_size: config.data.bin_size,
        seed: args.seed,
        ..SimulationConfig::default()
    };
    if let Some(start) = args.start {
        sim.start = start;
    }

    let records = simulate(&sim)?;
    match &args.output {
        Some(path) => {
            let file = std::fs::File::create(path)?;
            write_csv(&records, std::io::BufWriter::new(file))?;
            let target = path.display().to_string();
            log_event!(
                ctx,
                INFO,
                event_names::SIMULATE_WRITTEN,
                Stage::Simulate,
                "synthetic counts written",
                path = target.as_str(),
                rows = records.len()
            );
        }
        None => write_csv(&records, std::io::stdout().lock())?,
    }
    Ok(ExitCode::Clean)
}

fn run_config_show(global: &GlobalOpts) -> Result<ExitCode, Error> {
    let resolved = resolve_config(global)?;
    match global.format {
        OutputFormat::Json => {
            let value = serde_json::json!({
                "source": resolved.source.to_string(),
                "config": &resolved.config,
            });
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
        OutputFormat::Text | OutputFormat::Summary => {
            println!("# source: {}", resolved.source);
            println!("{}", resolved.config.to_toml()?.trim_end());
        }
    }
    Ok(ExitCode::Clean)
}
