use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::assumptions::scenario::Scenario;
use crate::assumptions::set::{build_assumptions, AssumptionInput, AssumptionSet};
use crate::config::EngineConfig;
use crate::historical::metrics::{derive_metrics, DerivedMetrics};
use crate::interfaces::{AssumptionCollector, CompanySnapshot, HistoricalDataSource, ResultRenderer};
use crate::types::{with_metadata, ComputationOutput, Currency, Money, Rate};
use crate::valuation::dcf::{calculate_valuation, EquityBridge, ValuationResult};
use crate::valuation::forecast::{project_forecast, ForecastYear};
use crate::valuation::sensitivity::SensitivityAxes;
use crate::DcfResult;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// One valuation run: the company's data plus the collector's choices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValuationRequest {
    pub company: CompanySnapshot,
    #[serde(default)]
    pub assumptions: AssumptionInput,
    #[serde(default)]
    pub sensitivity: SensitivityAxes,
}

/// Every stage's output for one run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValuationReport {
    pub symbol: String,
    pub currency: Currency,
    pub scenario: Scenario,
    pub metrics: DerivedMetrics,
    pub assumptions: AssumptionSet,
    pub forecast: Vec<ForecastYear>,
    pub valuation: ValuationResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_price: Option<Money>,
    /// Intrinsic price / current price - 1
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upside: Option<Rate>,
}

/// Headline numbers of one scenario in a side-by-side comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioSummary {
    pub scenario: Scenario,
    pub first_year_growth: Rate,
    pub first_year_ebit_margin: Rate,
    pub wacc: Rate,
    pub terminal_growth_rate: Rate,
    pub enterprise_value: Money,
    pub equity_value: Money,
    pub intrinsic_price_per_share: Money,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upside: Option<Rate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioComparison {
    pub symbol: String,
    pub scenarios: Vec<ScenarioSummary>,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Metrics -> Assumptions -> Forecast -> DCF in a single stateless pass.
/// Any stage failing aborts the run.
pub fn run_valuation(
    request: &ValuationRequest,
    config: &EngineConfig,
) -> DcfResult<ComputationOutput<ValuationReport>> {
    let start = Instant::now();
    let metrics = derive_metrics(&request.company.periods, &config.derivation)?;
    let mut warnings = prefixed("metrics", metrics.warnings);
    let report = value_from_metrics(request, metrics.result, config, &mut warnings)?;

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "DCF valuation pipeline",
        request,
        warnings,
        elapsed,
        report,
    ))
}

/// Run the same company through several scenarios.
pub fn compare_scenarios(
    request: &ValuationRequest,
    scenarios: &[Scenario],
    config: &EngineConfig,
) -> DcfResult<ComputationOutput<ScenarioComparison>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();
    let mut rows = Vec::with_capacity(scenarios.len());

    for &scenario in scenarios {
        let mut run = request.clone();
        run.assumptions.scenario = scenario;
        let out = run_valuation(&run, config)?;
        warnings.extend(prefixed(scenario.name(), out.warnings));

        let report = out.result;
        rows.push(ScenarioSummary {
            scenario,
            first_year_growth: report.assumptions.revenue_growth()[0],
            first_year_ebit_margin: report.assumptions.ebit_margin()[0],
            wacc: report.valuation.wacc,
            terminal_growth_rate: report.valuation.terminal_growth_rate,
            enterprise_value: report.valuation.enterprise_value,
            equity_value: report.valuation.equity_value,
            intrinsic_price_per_share: report.valuation.intrinsic_price_per_share,
            upside: report.upside,
        });
    }

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Scenario comparison",
        &serde_json::json!({ "request": request, "scenarios": scenarios }),
        warnings,
        elapsed,
        ScenarioComparison {
            symbol: request.company.symbol.clone(),
            scenarios: rows,
        },
    ))
}

/// Fetch, collect, value and render one company through the collaborator traits.
pub fn value_company<S, C, R>(
    symbol: &str,
    source: &S,
    collector: &C,
    renderer: &R,
    config: &EngineConfig,
) -> DcfResult<ComputationOutput<ValuationReport>>
where
    S: HistoricalDataSource + ?Sized,
    C: AssumptionCollector + ?Sized,
    R: ResultRenderer + ?Sized,
{
    let start = Instant::now();
    let company = source.fetch(symbol)?;
    tracing::debug!(symbol, periods = company.periods.len(), "fetched snapshot");

    let metrics = derive_metrics(&company.periods, &config.derivation)?;
    let mut warnings = prefixed("metrics", metrics.warnings);
    let assumptions = collector.collect(&company, &metrics.result)?;
    let request = ValuationRequest {
        sensitivity: collector.sensitivity_axes(),
        company,
        assumptions,
    };
    let report = value_from_metrics(&request, metrics.result, config, &mut warnings)?;

    let elapsed = start.elapsed().as_micros() as u64;
    let output = with_metadata("DCF valuation pipeline", &request, warnings, elapsed, report);
    renderer.render(&output)?;
    Ok(output)
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

fn value_from_metrics(
    request: &ValuationRequest,
    metrics: DerivedMetrics,
    config: &EngineConfig,
    warnings: &mut Vec<String>,
) -> DcfResult<ValuationReport> {
    let company = &request.company;

    let assumptions = build_assumptions(&request.assumptions, Some(&metrics), &config.defaults)?;
    warnings.extend(prefixed("assumptions", assumptions.warnings));
    let assumptions = assumptions.result;

    let forecast = project_forecast(metrics.seed_revenue, metrics.last_fiscal_year, &assumptions)?;

    let bridge = EquityBridge {
        net_debt: company.net_debt,
        shares_outstanding: company.shares_outstanding,
    };
    let valuation = calculate_valuation(&forecast, &assumptions, &bridge, &request.sensitivity, config)?;
    warnings.extend(prefixed("dcf", valuation.warnings));
    let valuation = valuation.result;

    let upside = match company.current_price {
        Some(p) if p > Decimal::ZERO => valuation
            .intrinsic_price_per_share
            .checked_div(p)
            .map(|r| r - Decimal::ONE),
        _ => None,
    };

    tracing::info!(
        symbol = %company.symbol,
        scenario = %assumptions.scenario(),
        price = %valuation.intrinsic_price_per_share,
        "valuation run finished"
    );

    Ok(ValuationReport {
        symbol: company.symbol.clone(),
        currency: company.currency.clone(),
        scenario: assumptions.scenario(),
        metrics,
        assumptions,
        forecast,
        valuation,
        current_price: company.current_price,
        upside,
    })
}

fn prefixed(stage: &str, warnings: Vec<String>) -> Vec<String> {
    warnings
        .into_iter()
        .map(|w| format!("[{stage}] {w}"))
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
