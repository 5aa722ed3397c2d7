mod commands;
mod input;
mod output;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use serde_json::Value;
use std::{env, io, process};

use dcf_valuation_core::EngineConfig;

use commands::metrics::MetricsArgs;
use commands::scenarios::{ScenariosArgs, SensitivityArgs};
use commands::valuation::{ForecastArgs, ValueArgs, WaccArgs};
use output::ReportRenderer;

/// Discounted cash flow valuation from historical statements
#[derive(Parser)]
#[command(
    name = "dcf",
    version,
    about = "Discounted cash flow valuation from historical statements",
    long_about = "Derives forecast drivers from historical financials, projects free cash \
                  flow to the firm, and discounts it to an intrinsic price per share with \
                  decimal precision. Supports bull/base/bear scenarios, a WACC x terminal \
                  growth sensitivity grid, and a CAPM WACC build-up."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, default_value = "json", global = true)]
    output: OutputFormat,

    /// Engine configuration file (JSON or YAML)
    #[arg(long, global = true)]
    config: Option<String>,

    /// Log engine decisions to stderr
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Derive historical growth and margin drivers
    Metrics(MetricsArgs),
    /// Project the explicit-period FCFF forecast
    Forecast(ForecastArgs),
    /// Run the full valuation pipeline
    Value(ValueArgs),
    /// Compare bull, base and bear scenarios
    Scenarios(ScenariosArgs),
    /// WACC x terminal growth price grid
    Sensitivity(SensitivityArgs),
    /// Calculate Weighted Average Cost of Capital (CAPM build-up)
    Wacc(WaccArgs),
    /// Print version information
    Version,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Csv,
    Minimal,
}

fn init_tracing(verbose: bool) {
    let default = if verbose {
        "warn,dcf_valuation_core=debug,dcf_valuation_cli=debug"
    } else {
        "warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(env::var("RUST_LOG").unwrap_or_else(|_| default.to_string()))
        .with_writer(io::stderr)
        .init();
}

fn load_config(path: Option<&str>) -> Result<EngineConfig, Box<dyn std::error::Error>> {
    match path {
        Some(path) => {
            let config: EngineConfig = input::file::read_structured(path)?;
            tracing::debug!(path, "loaded engine config");
            Ok(config)
        }
        None => Ok(EngineConfig::default()),
    }
}

fn dispatch(
    command: Commands,
    format: &OutputFormat,
    config_path: Option<&str>,
) -> Result<Option<Value>, Box<dyn std::error::Error>> {
    let config = load_config(config_path)?;

    let value = match command {
        Commands::Metrics(args) => commands::metrics::run_metrics(args, &config)?,
        Commands::Forecast(args) => commands::valuation::run_forecast(args, &config)?,
        Commands::Value(args) => {
            let renderer = ReportRenderer::new(format.clone());
            commands::valuation::run_value(args, &config, &renderer)?;
            return Ok(None);
        }
        Commands::Scenarios(args) => commands::scenarios::run_scenarios(args, &config)?,
        Commands::Sensitivity(args) => commands::scenarios::run_sensitivity(args, &config)?,
        Commands::Wacc(args) => commands::valuation::run_wacc(args)?,
        Commands::Version => {
            println!("dcf {}", env!("CARGO_PKG_VERSION"));
            return Ok(None);
        }
    };
    Ok(Some(value))
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match dispatch(cli.command, &cli.output, cli.config.as_deref()) {
        Ok(Some(value)) => {
            output::format_output(&cli.output, &value);
            process::exit(0);
        }
        Ok(None) => process::exit(0),
        Err(e) => {
            eprintln!("{}: {}", "error".red().bold(), e);
            process::exit(1);
        }
    }
}
