use clap::Args;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;
use serde_json::Value;
use std::time::{Duration, Instant};

/// How long a fetched company snapshot is reused within one run.
const SNAPSHOT_TTL: Duration = Duration::from_secs(900);

use dcf_valuation_core::assumptions::set::{build_assumptions, AssumptionInput, AssumptionSet};
use dcf_valuation_core::historical::metrics::derive_metrics;
use dcf_valuation_core::interfaces::{HistoricalDataSource, ResultRenderer};
use dcf_valuation_core::types::with_metadata;
use dcf_valuation_core::valuation::forecast::{project_forecast, ForecastYear};
use dcf_valuation_core::valuation::sensitivity::SensitivityAxes;
use dcf_valuation_core::valuation::wacc::{self, WaccInput};
use dcf_valuation_core::{
    run_valuation, value_company, DcfResult, EngineConfig, ValuationRequest,
};

use crate::input;
use crate::input::collector::{AssumptionFlags, FlagCollector};
use crate::input::source::{CachedSource, FileSource};

/// Arguments for WACC calculation
#[derive(Args)]
#[command(allow_hyphen_values = true)]
pub struct WaccArgs {
    /// Risk-free rate (e.g. 0.042 for 4.2%)
    #[arg(long)]
    pub risk_free_rate: Option<Decimal>,

    /// Equity risk premium (e.g. 0.055 for 5.5%)
    #[arg(long, alias = "erp")]
    pub equity_risk_premium: Option<Decimal>,

    /// Levered beta
    #[arg(long)]
    pub beta: Option<Decimal>,

    /// Pre-tax cost of debt
    #[arg(long)]
    pub cost_of_debt: Option<Decimal>,

    /// Marginal corporate tax rate
    #[arg(long)]
    pub tax_rate: Option<Decimal>,

    /// Debt weight in capital structure (market value basis)
    #[arg(long)]
    pub debt_weight: Option<Decimal>,

    /// Equity weight in capital structure (market value basis)
    #[arg(long)]
    pub equity_weight: Option<Decimal>,

    /// Size premium
    #[arg(long)]
    pub size_premium: Option<Decimal>,

    /// Country risk premium
    #[arg(long)]
    pub country_risk: Option<Decimal>,

    /// Company-specific risk premium
    #[arg(long)]
    pub specific_risk: Option<Decimal>,

    /// Path to JSON/YAML input file (overrides individual flags)
    #[arg(long)]
    pub input: Option<String>,
}

/// Arguments for the explicit forecast only
#[derive(Args)]
pub struct ForecastArgs {
    /// Valuation request file (JSON or YAML); reads stdin when omitted
    #[arg(long)]
    pub input: Option<String>,

    #[command(flatten)]
    pub assumptions: AssumptionFlags,
}

/// Arguments for a full valuation
#[derive(Args)]
pub struct ValueArgs {
    /// Valuation request file (JSON or YAML); reads stdin when neither this nor --symbol is given
    #[arg(long, conflicts_with = "symbol")]
    pub input: Option<String>,

    /// Look companies up in --data-dir instead of reading a request file;
    /// comma separated, one report per symbol
    #[arg(long, value_delimiter = ',')]
    pub symbol: Vec<String>,

    /// Directory holding <SYMBOL>.json / .yaml company files
    #[arg(long, default_value = ".")]
    pub data_dir: String,

    /// Assumptions file used with --symbol
    #[arg(long, requires = "symbol")]
    pub assumptions_file: Option<String>,

    #[command(flatten)]
    pub assumptions: AssumptionFlags,

    /// Sensitivity WACC axis, comma separated
    #[arg(long, value_delimiter = ',')]
    pub wacc_values: Option<Vec<Decimal>>,

    /// Sensitivity terminal growth axis, comma separated
    #[arg(long, value_delimiter = ',')]
    pub growth_values: Option<Vec<Decimal>>,
}

/// Assumption set and projected years, for charting trajectories.
#[derive(Serialize)]
struct ForecastView {
    symbol: String,
    assumptions: AssumptionSet,
    forecast: Vec<ForecastYear>,
}

pub fn run_wacc(args: WaccArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let wacc_input: WaccInput = if let Some(ref path) = args.input {
        input::file::read_structured(path)?
    } else if let Some(data) = input::stdin::read_stdin()? {
        data
    } else {
        WaccInput {
            risk_free_rate: args
                .risk_free_rate
                .ok_or("--risk-free-rate is required (or provide --input)")?,
            equity_risk_premium: args
                .equity_risk_premium
                .ok_or("--equity-risk-premium is required (or provide --input)")?,
            beta: args.beta.unwrap_or(dec!(1.0)),
            cost_of_debt: args
                .cost_of_debt
                .ok_or("--cost-of-debt is required (or provide --input)")?,
            tax_rate: args
                .tax_rate
                .ok_or("--tax-rate is required (or provide --input)")?,
            debt_weight: args
                .debt_weight
                .ok_or("--debt-weight is required (or provide --input)")?,
            equity_weight: args
                .equity_weight
                .ok_or("--equity-weight is required (or provide --input)")?,
            size_premium: args.size_premium,
            country_risk_premium: args.country_risk,
            specific_risk_premium: args.specific_risk,
        }
    };

    let result = wacc::calculate_wacc(&wacc_input)?;
    Ok(serde_json::to_value(result)?)
}

pub fn run_forecast(
    args: ForecastArgs,
    config: &EngineConfig,
) -> Result<Value, Box<dyn std::error::Error>> {
    let start = Instant::now();
    let mut request = load_request(args.input.as_deref())?;
    args.assumptions.apply(&mut request.assumptions);

    let metrics = derive_metrics(&request.company.periods, &config.derivation)?;
    let set = build_assumptions(&request.assumptions, Some(&metrics.result), &config.defaults)?;
    let forecast = project_forecast(
        metrics.result.seed_revenue,
        metrics.result.last_fiscal_year,
        &set.result,
    )?;

    let mut warnings = metrics.warnings;
    warnings.extend(set.warnings);
    let view = ForecastView {
        symbol: request.company.symbol.clone(),
        assumptions: set.result,
        forecast,
    };
    let elapsed = start.elapsed().as_micros() as u64;
    let out = with_metadata(
        "Revenue-driven FCFF forecast",
        &request.assumptions,
        warnings,
        elapsed,
        view,
    );
    Ok(serde_json::to_value(out)?)
}

pub fn run_value(
    args: ValueArgs,
    config: &EngineConfig,
    renderer: &dyn ResultRenderer,
) -> Result<(), Box<dyn std::error::Error>> {
    let axes = SensitivityAxes {
        wacc_values: args.wacc_values,
        growth_values: args.growth_values,
    };

    if !args.symbol.is_empty() {
        let source = CachedSource::new(FileSource::new(&args.data_dir), SNAPSHOT_TTL);
        let base: Option<AssumptionInput> = match args.assumptions_file {
            Some(ref path) => Some(input::file::read_structured(path)?),
            None => None,
        };
        let collector = FlagCollector::new(base, args.assumptions, axes);
        value_symbols(&args.symbol, &source, &collector, renderer, config)?;
        tracing::debug!(cached = source.len(), "snapshot cache size");
        return Ok(());
    }

    let mut request = load_request(args.input.as_deref())?;
    args.assumptions.apply(&mut request.assumptions);
    if axes.wacc_values.is_some() {
        request.sensitivity.wacc_values = axes.wacc_values;
    }
    if axes.growth_values.is_some() {
        request.sensitivity.growth_values = axes.growth_values;
    }
    let report = run_valuation(&request, config)?;
    renderer.render(&report)?;
    Ok(())
}

/// Value each symbol in turn against one source, so a symbol repeated in the
/// list (in any case) is read once through the snapshot cache.
fn value_symbols(
    symbols: &[String],
    source: &dyn HistoricalDataSource,
    collector: &FlagCollector,
    renderer: &dyn ResultRenderer,
    config: &EngineConfig,
) -> DcfResult<()> {
    for symbol in symbols {
        value_company(symbol, source, collector, renderer, config)?;
    }
    Ok(())
}

/// Read a valuation request from `--input` or piped stdin.
pub fn load_request(path: Option<&str>) -> Result<ValuationRequest, Box<dyn std::error::Error>> {
    if let Some(path) = path {
        return input::file::read_structured(path);
    }
    input::stdin::read_stdin()?
        .ok_or_else(|| "--input file is required (or pipe a request on stdin)".into())
}
