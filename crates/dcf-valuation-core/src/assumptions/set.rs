use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Instant;

use crate::config::BaseDefaults;
use crate::error::DcfError;
use crate::historical::metrics::{DerivedMetrics, Driver, GrowthBasis};
use crate::time_value::DiscountConvention;
use crate::types::{with_metadata, ComputationOutput, Multiple, Rate};
use crate::valuation::wacc::{calculate_wacc, WaccInput};
use crate::DcfResult;

use super::driver::DriverValue;
use super::scenario::{Adjustment, Scenario};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Assumptions as handed over by an `AssumptionCollector`; anything left
/// unset is filled from history (Base/Bull/Bear) or from `BaseDefaults`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssumptionInput {
    pub scenario: Scenario,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub forecast_horizon_years: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revenue_growth: Option<DriverValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ebit_margin: Option<DriverValue>,
    /// When set, EBIT is derived as EBITDA - D&A instead of from `ebit_margin`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ebitda_margin: Option<DriverValue>,
    /// Derive EBITDA margin from history and forecast EBIT from it.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub use_ebitda_margin: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tax_rate: Option<Rate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub da_pct: Option<DriverValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capex_pct: Option<DriverValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nwc_pct: Option<DriverValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub terminal_growth_rate: Option<Rate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wacc: Option<Rate>,
    /// CAPM build-up; takes precedence over `wacc` when both are given.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wacc_input: Option<WaccInput>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discounting: Option<DiscountConvention>,
    /// EV/EBITDA multiple used to cross-check the terminal value.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_multiple: Option<Multiple>,
}

/// Where a resolved assumption came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    Collector,
    Historical,
    ScenarioAdjusted,
    ConfigDefault,
    CapmBuildUp,
    /// EBITDA margin less D&A, floored at zero
    DerivedFromEbitda,
}

/// Validated, per-year assumptions for one valuation run. Only obtainable
/// through [`build_assumptions`], so every per-year vector has length
/// `horizon` and `terminal_growth_rate < wacc` holds.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssumptionSet {
    scenario: Scenario,
    forecast_horizon_years: u32,
    revenue_growth: Vec<Rate>,
    ebit_margin: Vec<Rate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    ebitda_margin: Option<Vec<Rate>>,
    ebit_from_ebitda: bool,
    tax_rate: Rate,
    da_pct: Vec<Rate>,
    capex_pct: Vec<Rate>,
    nwc_pct: Vec<Rate>,
    terminal_growth_rate: Rate,
    wacc: Rate,
    discounting: DiscountConvention,
    #[serde(skip_serializing_if = "Option::is_none")]
    exit_multiple: Option<Multiple>,
    provenance: BTreeMap<String, Provenance>,
}

impl AssumptionSet {
    pub fn scenario(&self) -> Scenario {
        self.scenario
    }

    pub fn horizon(&self) -> u32 {
        self.forecast_horizon_years
    }

    pub fn revenue_growth(&self) -> &[Rate] {
        &self.revenue_growth
    }

    pub fn ebit_margin(&self) -> &[Rate] {
        &self.ebit_margin
    }

    pub fn ebitda_margin(&self) -> Option<&[Rate]> {
        self.ebitda_margin.as_deref()
    }

    /// EBIT is EBITDA - D&A rather than revenue * `ebit_margin`.
    pub fn ebit_from_ebitda(&self) -> bool {
        self.ebit_from_ebitda
    }

    pub fn tax_rate(&self) -> Rate {
        self.tax_rate
    }

    pub fn da_pct(&self) -> &[Rate] {
        &self.da_pct
    }

    pub fn capex_pct(&self) -> &[Rate] {
        &self.capex_pct
    }

    pub fn nwc_pct(&self) -> &[Rate] {
        &self.nwc_pct
    }

    pub fn terminal_growth_rate(&self) -> Rate {
        self.terminal_growth_rate
    }

    pub fn wacc(&self) -> Rate {
        self.wacc
    }

    pub fn discounting(&self) -> DiscountConvention {
        self.discounting
    }

    pub fn exit_multiple(&self) -> Option<Multiple> {
        self.exit_multiple
    }

    pub fn provenance(&self) -> &BTreeMap<String, Provenance> {
        &self.provenance
    }
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Validate collector input and fill the gaps into an [`AssumptionSet`].
///
/// `metrics` supplies the history-derived defaults for Base/Bull/Bear; it may
/// be `None` only when the collector sets every driver explicitly.
pub fn build_assumptions(
    input: &AssumptionInput,
    metrics: Option<&DerivedMetrics>,
    defaults: &BaseDefaults,
) -> DcfResult<ComputationOutput<AssumptionSet>> {
    let start = Instant::now();
    let mut resolver = Resolver {
        input,
        metrics,
        defaults,
        warnings: Vec::new(),
        provenance: BTreeMap::new(),
    };

    let horizon = resolver.scalar(
        "forecast_horizon_years",
        input.forecast_horizon_years,
        defaults.horizon_years,
    );
    if horizon < 1 {
        return Err(DcfError::InvalidAssumptions {
            field: "forecast_horizon_years".into(),
            reason: "Forecast horizon must be at least 1 year".into(),
        });
    }
    if horizon > defaults.max_horizon_years {
        return Err(DcfError::InvalidAssumptions {
            field: "forecast_horizon_years".into(),
            reason: format!(
                "Forecast horizon of {horizon} years exceeds the maximum of {}",
                defaults.max_horizon_years
            ),
        });
    }

    let shift = input.scenario.shift();
    let revenue_growth = resolver
        .driver(
            Driver::RevenueGrowth,
            input.revenue_growth.as_ref(),
            shift.map(|s| s.revenue_growth),
        )?
        .broadcast(Driver::RevenueGrowth.name(), horizon)?;
    let da_pct = resolver
        .driver(Driver::DaPct, input.da_pct.as_ref(), shift.map(|s| s.da_pct))?
        .broadcast(Driver::DaPct.name(), horizon)?;
    let ebitda_margin = if input.ebitda_margin.is_some() || input.use_ebitda_margin {
        let margins = resolver
            .driver(
                Driver::EbitdaMargin,
                input.ebitda_margin.as_ref(),
                shift.map(|s| s.ebitda_margin),
            )?
            .broadcast(Driver::EbitdaMargin.name(), horizon)?;
        Some(margins)
    } else {
        None
    };
    let ebit_from_ebitda = input.ebit_margin.is_none() && ebitda_margin.is_some();
    let ebit_margin = match ebitda_margin {
        Some(ref margins) if ebit_from_ebitda => {
            resolver.record(Driver::EbitMargin.name(), Provenance::DerivedFromEbitda);
            margins
                .iter()
                .zip(&da_pct)
                .map(|(m, da)| (*m - *da).max(Decimal::ZERO))
                .collect()
        }
        _ => resolver
            .driver(
                Driver::EbitMargin,
                input.ebit_margin.as_ref(),
                shift.map(|s| s.ebit_margin),
            )?
            .broadcast(Driver::EbitMargin.name(), horizon)?,
    };
    let capex_pct = resolver
        .driver(
            Driver::CapexPct,
            input.capex_pct.as_ref(),
            shift.map(|s| s.capex_pct),
        )?
        .broadcast(Driver::CapexPct.name(), horizon)?;
    let nwc_pct = resolver
        .driver(Driver::NwcPct, input.nwc_pct.as_ref(), shift.map(|s| s.nwc_pct))?
        .broadcast(Driver::NwcPct.name(), horizon)?;

    let tax_rate = resolver.scalar("tax_rate", input.tax_rate, defaults.tax_rate);
    if tax_rate < Decimal::ZERO || tax_rate >= Decimal::ONE {
        return Err(DcfError::InvalidAssumptions {
            field: "tax_rate".into(),
            reason: format!("Tax rate must be in [0, 1), got {tax_rate}"),
        });
    }

    let terminal_growth_rate = match input.terminal_growth_rate {
        Some(g) => {
            resolver.record("terminal_growth_rate", Provenance::Collector);
            g
        }
        None => match shift {
            Some(s) => {
                resolver.record("terminal_growth_rate", Provenance::ScenarioAdjusted);
                s.terminal_growth_rate.apply_rate(defaults.terminal_growth_rate)
            }
            None => {
                resolver.record("terminal_growth_rate", Provenance::ConfigDefault);
                defaults.terminal_growth_rate
            }
        },
    };

    let wacc = resolver.wacc()?;
    if wacc <= Decimal::ZERO {
        return Err(DcfError::InvalidAssumptions {
            field: "wacc".into(),
            reason: format!("WACC must be positive, got {wacc}"),
        });
    }
    if wacc <= terminal_growth_rate {
        return Err(DcfError::InvalidTerminalAssumption {
            wacc,
            terminal_growth: terminal_growth_rate,
        });
    }

    if let Some(m) = input.exit_multiple {
        if m <= Decimal::ZERO {
            return Err(DcfError::InvalidAssumptions {
                field: "exit_multiple".into(),
                reason: "Exit multiple must be positive".into(),
            });
        }
    }

    let discounting = input.discounting.unwrap_or(defaults.discounting);

    let Resolver {
        warnings,
        provenance,
        ..
    } = resolver;

    let set = AssumptionSet {
        scenario: input.scenario,
        forecast_horizon_years: horizon,
        revenue_growth,
        ebit_margin,
        ebitda_margin,
        ebit_from_ebitda,
        tax_rate,
        da_pct,
        capex_pct,
        nwc_pct,
        terminal_growth_rate,
        wacc,
        discounting,
        exit_multiple: input.exit_multiple,
        provenance,
    };

    tracing::debug!(
        scenario = %set.scenario,
        horizon = set.forecast_horizon_years,
        wacc = %set.wacc,
        terminal_growth = %set.terminal_growth_rate,
        "assumption set built"
    );

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        &format!("Assumption set ({} scenario)", input.scenario),
        input,
        warnings,
        elapsed,
        set,
    ))
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

struct Resolver<'a> {
    input: &'a AssumptionInput,
    metrics: Option<&'a DerivedMetrics>,
    defaults: &'a BaseDefaults,
    warnings: Vec<String>,
    provenance: BTreeMap<String, Provenance>,
}

impl Resolver<'_> {
    fn record(&mut self, field: &str, source: Provenance) {
        self.provenance.insert(field.to_string(), source);
    }

    fn scalar<T: Copy>(&mut self, field: &str, explicit: Option<T>, fallback: T) -> T {
        match explicit {
            Some(v) => {
                self.record(field, Provenance::Collector);
                v
            }
            None => {
                self.record(field, Provenance::ConfigDefault);
                fallback
            }
        }
    }

    /// Collector value if present, else the historical summary (shifted for Bull/Bear).
    fn driver(
        &mut self,
        driver: Driver,
        explicit: Option<&DriverValue>,
        adjustment: Option<Adjustment>,
    ) -> DcfResult<DriverValue> {
        let scenario = self.input.scenario;
        if let Some(value) = explicit {
            if scenario.uses_history() && self.metrics.is_some() {
                let msg = format!("Override {driver} = {}", describe(value));
                tracing::info!("{msg}");
                self.warnings.push(msg);
            }
            self.record(driver.name(), Provenance::Collector);
            return Ok(value.clone());
        }

        if !scenario.uses_history() {
            return Err(DcfError::InvalidAssumptions {
                field: driver.name().into(),
                reason: "Required for the custom scenario".into(),
            });
        }
        let metrics = self.metrics.ok_or_else(|| DcfError::InvalidAssumptions {
            field: driver.name().into(),
            reason: "Not supplied and no historical metrics to derive it from".into(),
        })?;
        let historical = match driver {
            Driver::RevenueGrowth => self.historical_growth(metrics),
            other => metrics.get(other).summary(self.defaults.ratio_basis),
        }
        .ok_or_else(|| {
            DcfError::InsufficientHistory(format!(
                "No defined historical values to derive {driver}"
            ))
        })?;

        let value = DriverValue::Flat(historical);
        match adjustment {
            Some(adj) => {
                self.record(driver.name(), Provenance::ScenarioAdjusted);
                Ok(adj.apply(&value))
            }
            None => {
                self.record(driver.name(), Provenance::Historical);
                Ok(value)
            }
        }
    }

    /// Growth under the configured basis; an undefined CAGR falls back to the
    /// mean of the defined year-on-year rates.
    fn historical_growth(&mut self, metrics: &DerivedMetrics) -> Option<Rate> {
        let basis = self.defaults.growth_basis;
        match metrics.growth(basis) {
            None if basis == GrowthBasis::Cagr => {
                let mean = metrics.growth(GrowthBasis::Mean)?;
                let msg = format!("Revenue CAGR undefined; using mean growth {mean}");
                tracing::warn!("{msg}");
                self.warnings.push(msg);
                Some(mean)
            }
            growth => growth,
        }
    }

    fn wacc(&mut self) -> DcfResult<Rate> {
        if let Some(ref capm) = self.input.wacc_input {
            let out = calculate_wacc(capm)?;
            for w in &out.warnings {
                self.warnings.push(format!("[WACC] {w}"));
            }
            if self.input.wacc.is_some() {
                self.warnings
                    .push("Both wacc and wacc_input given; using the CAPM build-up".into());
            }
            self.record("wacc", Provenance::CapmBuildUp);
            return Ok(out.result.wacc);
        }
        match self.input.wacc {
            Some(w) => {
                self.record("wacc", Provenance::Collector);
                Ok(w)
            }
            None => Err(DcfError::InvalidAssumptions {
                field: "wacc".into(),
                reason: "Provide either wacc or wacc_input".into(),
            }),
        }
    }
}

fn describe(value: &DriverValue) -> String {
    match value {
        DriverValue::Flat(r) => r.to_string(),
        DriverValue::PerYear(v) => {
            let parts: Vec<String> = v.iter().map(|r| r.to_string()).collect();
            format!("[{}]", parts.join(", "))
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::historical::metrics::{derive_metrics, DerivationOptions};
    use crate::historical::period::HistoricalPeriod;
    use rust_decimal_macros::dec;

    fn custom_input() -> AssumptionInput {
        AssumptionInput {
            scenario: Scenario::Custom,
            forecast_horizon_years: Some(5),
            revenue_growth: Some(dec!(0.10).into()),
            ebit_margin: Some(dec!(0.20).into()),
            tax_rate: Some(dec!(0.25)),
            da_pct: Some(dec!(0.05).into()),
            capex_pct: Some(dec!(0.06).into()),
            nwc_pct: Some(dec!(0.01).into()),
            terminal_growth_rate: Some(dec!(0.02)),
            wacc: Some(dec!(0.10)),
            ..Default::default()
        }
    }

    fn sample_metrics() -> DerivedMetrics {
        let periods = vec![
            HistoricalPeriod {
                fiscal_year: Some(2022),
                revenue: dec!(1000),
                ebit: dec!(150),
                da: dec!(40),
                capex: dec!(50),
                delta_nwc: dec!(10),
            },
            HistoricalPeriod {
                fiscal_year: Some(2023),
                revenue: dec!(1100),
                ebit: dec!(187),
                da: dec!(44),
                capex: dec!(55),
                delta_nwc: dec!(11),
            },
        ];
        derive_metrics(&periods, &DerivationOptions::default())
            .unwrap()
            .result
    }

    #[test]
    fn test_custom_scalars_broadcast() {
        let set = build_assumptions(&custom_input(), None, &BaseDefaults::default())
            .unwrap()
            .result;
        assert_eq!(set.horizon(), 5);
        assert_eq!(set.revenue_growth(), &[dec!(0.10); 5]);
        assert_eq!(set.nwc_pct().len(), 5);
        assert_eq!(set.provenance()["wacc"], Provenance::Collector);
    }

    #[test]
    fn test_length_mismatch() {
        let mut input = custom_input();
        input.revenue_growth = Some(vec![dec!(0.1); 4].into());
        let err = build_assumptions(&input, None, &BaseDefaults::default()).unwrap_err();
        assert!(matches!(
            err,
            DcfError::AssumptionLengthMismatch {
                expected: 5,
                actual: 4,
                ..
            }
        ));
    }

    #[test]
    fn test_zero_horizon_rejected() {
        let mut input = custom_input();
        input.forecast_horizon_years = Some(0);
        let err = build_assumptions(&input, None, &BaseDefaults::default()).unwrap_err();
        assert!(matches!(err, DcfError::InvalidAssumptions { ref field, .. } if field == "forecast_horizon_years"));
    }

    #[test]
    fn test_horizon_above_maximum_rejected() {
        let mut input = custom_input();
        input.forecast_horizon_years = Some(4_000_000_000);
        let err = build_assumptions(&input, None, &BaseDefaults::default()).unwrap_err();
        assert!(matches!(err, DcfError::InvalidAssumptions { ref field, .. } if field == "forecast_horizon_years"));

        input.forecast_horizon_years = Some(BaseDefaults::default().max_horizon_years);
        assert!(build_assumptions(&input, None, &BaseDefaults::default()).is_ok());
    }

    #[test]
    fn test_tax_rate_bounds() {
        let mut input = custom_input();
        input.tax_rate = Some(Decimal::ONE);
        assert!(matches!(
            build_assumptions(&input, None, &BaseDefaults::default()),
            Err(DcfError::InvalidAssumptions { .. })
        ));
        input.tax_rate = Some(dec!(-0.01));
        assert!(build_assumptions(&input, None, &BaseDefaults::default()).is_err());
    }

    #[test]
    fn test_non_positive_wacc_rejected() {
        let mut input = custom_input();
        input.wacc = Some(Decimal::ZERO);
        input.terminal_growth_rate = Some(dec!(-0.01));
        assert!(matches!(
            build_assumptions(&input, None, &BaseDefaults::default()),
            Err(DcfError::InvalidAssumptions { .. })
        ));
    }

    #[test]
    fn test_terminal_growth_equal_to_wacc() {
        let mut input = custom_input();
        input.wacc = Some(dec!(0.08));
        input.terminal_growth_rate = Some(dec!(0.08));
        assert!(matches!(
            build_assumptions(&input, None, &BaseDefaults::default()),
            Err(DcfError::InvalidTerminalAssumption { .. })
        ));
    }

    #[test]
    fn test_custom_requires_every_driver() {
        let mut input = custom_input();
        input.capex_pct = None;
        let metrics = sample_metrics();
        let err = build_assumptions(&input, Some(&metrics), &BaseDefaults::default()).unwrap_err();
        assert!(matches!(err, DcfError::InvalidAssumptions { ref field, .. } if field == "capex_pct"));
    }

    #[test]
    fn test_base_fills_from_history() {
        let metrics = sample_metrics();
        let input = AssumptionInput {
            wacc: Some(dec!(0.09)),
            ..Default::default()
        };
        let out = build_assumptions(&input, Some(&metrics), &BaseDefaults::default()).unwrap();
        let set = out.result;

        assert_eq!(set.horizon(), 10);
        assert_eq!(set.revenue_growth()[0], dec!(0.1));
        // Median of margins 0.15 and 0.17
        assert_eq!(set.ebit_margin()[9], dec!(0.16));
        assert_eq!(set.da_pct()[0], dec!(0.04));
        assert_eq!(set.capex_pct()[0], dec!(0.05));
        assert_eq!(set.nwc_pct()[0], dec!(0.01));
        assert_eq!(set.tax_rate(), dec!(0.25));
        assert_eq!(set.terminal_growth_rate(), dec!(0.02));
        assert_eq!(set.provenance()["ebit_margin"], Provenance::Historical);
        assert!(out.warnings.is_empty());
    }

    #[test]
    fn test_bull_shifts_history_but_not_overrides() {
        let metrics = sample_metrics();
        let input = AssumptionInput {
            scenario: Scenario::Bull,
            wacc: Some(dec!(0.09)),
            capex_pct: Some(dec!(0.07).into()),
            ..Default::default()
        };
        let out = build_assumptions(&input, Some(&metrics), &BaseDefaults::default()).unwrap();
        let set = out.result;

        assert_eq!(set.revenue_growth()[0], dec!(0.13));
        assert_eq!(set.ebit_margin()[0], dec!(0.19));
        assert_eq!(set.capex_pct()[0], dec!(0.07));
        assert_eq!(set.terminal_growth_rate(), dec!(0.025));
        assert_eq!(set.provenance()["revenue_growth"], Provenance::ScenarioAdjusted);
        assert!(out.warnings.iter().any(|w| w.contains("Override capex_pct")));
    }

    #[test]
    fn test_missing_history_default_is_an_error() {
        let mut metrics = sample_metrics();
        metrics.da_pct.mean = None;
        let input = AssumptionInput {
            wacc: Some(dec!(0.09)),
            ..Default::default()
        };
        let err = build_assumptions(&input, Some(&metrics), &BaseDefaults::default()).unwrap_err();
        assert!(matches!(err, DcfError::InsufficientHistory(_)));
    }

    #[test]
    fn test_undefined_cagr_falls_back_to_mean_growth() {
        let mut metrics = sample_metrics();
        metrics.revenue_cagr = None;
        metrics.revenue_growth.mean = Some(dec!(0.07));
        let input = AssumptionInput {
            wacc: Some(dec!(0.09)),
            ..Default::default()
        };
        let out = build_assumptions(&input, Some(&metrics), &BaseDefaults::default()).unwrap();
        assert_eq!(out.result.revenue_growth()[0], dec!(0.07));
        assert!(out.warnings.iter().any(|w| w.starts_with("Revenue CAGR undefined")));
    }

    #[test]
    fn test_wacc_from_capm() {
        let mut input = custom_input();
        input.wacc = None;
        input.wacc_input = Some(WaccInput {
            risk_free_rate: dec!(0.04),
            equity_risk_premium: dec!(0.05),
            beta: dec!(1.10),
            cost_of_debt: dec!(0.05),
            tax_rate: dec!(0.25),
            equity_weight: dec!(0.7),
            debt_weight: dec!(0.3),
            size_premium: None,
            country_risk_premium: None,
            specific_risk_premium: None,
        });
        let set = build_assumptions(&input, None, &BaseDefaults::default())
            .unwrap()
            .result;
        assert_eq!(set.wacc(), dec!(0.07775));
        assert_eq!(set.provenance()["wacc"], Provenance::CapmBuildUp);
    }

    #[test]
    fn test_ebitda_margin_without_ebit_margin() {
        let mut input = custom_input();
        input.ebit_margin = None;
        input.ebitda_margin = Some(dec!(0.25).into());
        let set = build_assumptions(&input, None, &BaseDefaults::default())
            .unwrap()
            .result;
        assert!(set.ebit_from_ebitda());
        assert_eq!(set.ebitda_margin(), Some(&[dec!(0.25); 5][..]));
        // 0.25 EBITDA less 0.05 D&A
        assert_eq!(set.ebit_margin(), &[dec!(0.20); 5][..]);
        assert_eq!(set.provenance()["ebit_margin"], Provenance::DerivedFromEbitda);
    }

    #[test]
    fn test_implied_ebit_margin_floors_at_zero() {
        let mut input = custom_input();
        input.ebit_margin = None;
        input.ebitda_margin = Some(vec![dec!(0.03), dec!(0.05), dec!(0.08), dec!(0.10), dec!(0.04)].into());
        let set = build_assumptions(&input, None, &BaseDefaults::default())
            .unwrap()
            .result;
        assert_eq!(
            set.ebit_margin(),
            &[dec!(0), dec!(0), dec!(0.03), dec!(0.05), dec!(0)][..]
        );
    }

    #[test]
    fn test_ebitda_margin_from_history_with_bear_shift() {
        let metrics = sample_metrics();
        let input = AssumptionInput {
            scenario: Scenario::Bear,
            wacc: Some(dec!(0.09)),
            use_ebitda_margin: true,
            ..Default::default()
        };
        let set = build_assumptions(&input, Some(&metrics), &BaseDefaults::default())
            .unwrap()
            .result;
        // Median EBITDA margin (0.19 + 0.21) / 2 = 0.20, less two points
        assert_eq!(set.ebitda_margin().unwrap()[0], dec!(0.18));
        // D&A 0.04 + 0.005 bear shift
        assert_eq!(set.ebit_margin()[0], dec!(0.135));
        assert_eq!(set.provenance()["ebitda_margin"], Provenance::ScenarioAdjusted);
    }

    #[test]
    fn test_missing_wacc() {
        let mut input = custom_input();
        input.wacc = None;
        assert!(matches!(
            build_assumptions(&input, None, &BaseDefaults::default()),
            Err(DcfError::InvalidAssumptions { ref field, .. }) if field == "wacc"
        ));
    }
}
