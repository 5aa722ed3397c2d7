use clap::Args;
use rust_decimal::Decimal;
use serde_json::Value;
use std::time::Instant;

use dcf_valuation_core::assumptions::scenario::Scenario;
use dcf_valuation_core::types::with_metadata;
use dcf_valuation_core::{compare_scenarios, run_valuation, EngineConfig};

use crate::commands::valuation::load_request;
use crate::input::collector::AssumptionFlags;

/// Arguments for the side-by-side scenario comparison
#[derive(Args)]
pub struct ScenariosArgs {
    /// Valuation request file (JSON or YAML); reads stdin when omitted
    #[arg(long)]
    pub input: Option<String>,

    /// Also run the request's own drivers as the custom scenario
    #[arg(long)]
    pub include_custom: bool,

    #[command(flatten)]
    pub assumptions: AssumptionFlags,
}

/// Arguments for the WACC x terminal growth grid
#[derive(Args)]
#[command(allow_hyphen_values = true)]
pub struct SensitivityArgs {
    /// Valuation request file (JSON or YAML); reads stdin when omitted
    #[arg(long)]
    pub input: Option<String>,

    #[command(flatten)]
    pub assumptions: AssumptionFlags,

    /// WACC axis, comma separated (e.g. 0.08,0.09,0.10)
    #[arg(long, value_delimiter = ',', conflicts_with = "wacc_range")]
    pub wacc_values: Option<Vec<Decimal>>,

    /// Terminal growth axis, comma separated
    #[arg(long, value_delimiter = ',', conflicts_with = "growth_range")]
    pub growth_values: Option<Vec<Decimal>>,

    /// WACC axis as min:max:step (e.g. 0.07:0.11:0.01)
    #[arg(long)]
    pub wacc_range: Option<String>,

    /// Terminal growth axis as min:max:step
    #[arg(long)]
    pub growth_range: Option<String>,
}

pub fn run_scenarios(
    args: ScenariosArgs,
    config: &EngineConfig,
) -> Result<Value, Box<dyn std::error::Error>> {
    let mut request = load_request(args.input.as_deref())?;
    args.assumptions.apply(&mut request.assumptions);

    let mut scenarios = Scenario::PRESETS.to_vec();
    if args.include_custom {
        scenarios.push(Scenario::Custom);
    }
    let result = compare_scenarios(&request, &scenarios, config)?;
    Ok(serde_json::to_value(result)?)
}

pub fn run_sensitivity(
    args: SensitivityArgs,
    config: &EngineConfig,
) -> Result<Value, Box<dyn std::error::Error>> {
    let start = Instant::now();
    let mut request = load_request(args.input.as_deref())?;
    args.assumptions.apply(&mut request.assumptions);

    if let Some(values) = axis(args.wacc_values, args.wacc_range.as_deref())? {
        request.sensitivity.wacc_values = Some(values);
    }
    if let Some(values) = axis(args.growth_values, args.growth_range.as_deref())? {
        request.sensitivity.growth_values = Some(values);
    }

    let report = run_valuation(&request, config)?;
    let elapsed = start.elapsed().as_micros() as u64;
    let out = with_metadata(
        "WACC x terminal growth sensitivity (price per share)",
        &request.sensitivity,
        report.warnings,
        elapsed,
        report.result.valuation.sensitivity_grid,
    );
    Ok(serde_json::to_value(out)?)
}

fn axis(
    values: Option<Vec<Decimal>>,
    range: Option<&str>,
) -> Result<Option<Vec<Decimal>>, Box<dyn std::error::Error>> {
    match (values, range) {
        (Some(v), _) => Ok(Some(v)),
        (None, Some(spec)) => Ok(Some(parse_range(spec)?)),
        (None, None) => Ok(None),
    }
}

/// Expand `min:max:step` into an inclusive sweep.
fn parse_range(spec: &str) -> Result<Vec<Decimal>, Box<dyn std::error::Error>> {
    let parts: Vec<&str> = spec.split(':').collect();
    if parts.len() != 3 {
        return Err(format!("Range must be min:max:step, got '{spec}'").into());
    }
    let (min, max, step): (Decimal, Decimal, Decimal) =
        (parts[0].parse()?, parts[1].parse()?, parts[2].parse()?);
    if step <= Decimal::ZERO {
        return Err(format!("Range step must be positive, got {step}").into());
    }
    if min > max {
        return Err(format!("Range min {min} exceeds max {max}").into());
    }

    let mut values = Vec::new();
    let mut current = min;
    while current <= max {
        values.push(current);
        current += step;
    }
    // Include max when the step does not land on it
    if values.last().is_some_and(|last| *last < max) {
        values.push(max);
    }
    Ok(values)
}
