use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::assumptions::set::AssumptionSet;
use crate::config::EngineConfig;
use crate::error::DcfError;
use crate::time_value::{
    checked_difference, checked_product, checked_quotient, checked_sum, discount_factor,
    present_value, DiscountConvention,
};
use crate::types::{with_metadata, ComputationOutput, Money, Multiple, Rate};
use crate::DcfResult;

use super::forecast::ForecastYear;
use super::sensitivity::{build_sensitivity_grid, SensitivityAxes, SensitivityGrid};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Balance-sheet inputs that turn enterprise value into a per-share price.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EquityBridge {
    /// Total debt minus cash; negative for a net cash position.
    pub net_debt: Money,
    pub shares_outstanding: Decimal,
}

/// Discounting detail for one forecast year.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscountedYear {
    pub year_index: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fiscal_year: Option<i32>,
    pub fcff: Money,
    pub discount_factor: Rate,
    pub pv_fcff: Money,
}

/// Enterprise-level value of a forecast at one (WACC, g) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnterpriseValuation {
    pub schedule: Vec<DiscountedYear>,
    pub pv_fcff: Money,
    pub terminal_value: Money,
    pub pv_terminal: Money,
    pub enterprise_value: Money,
}

/// Terminal value implied by an EV/EBITDA exit multiple, reported next to
/// the Gordon growth value but never used in the headline numbers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExitMultipleCheck {
    pub exit_multiple: Multiple,
    pub final_ebitda: Money,
    pub terminal_value: Money,
    pub pv_terminal: Money,
    pub enterprise_value: Money,
}

/// Output of the DCF calculator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValuationResult {
    /// Sum of discounted explicit-period FCFF
    pub present_value_fcff: Money,
    /// Gordon growth terminal value at the end of the horizon
    pub terminal_value: Money,
    pub present_value_terminal: Money,
    pub enterprise_value: Money,
    pub net_debt: Money,
    pub equity_value: Money,
    pub shares_outstanding: Decimal,
    pub intrinsic_price_per_share: Money,
    pub wacc: Rate,
    pub terminal_growth_rate: Rate,
    pub discounting: DiscountConvention,
    /// PV(terminal) / EV
    pub terminal_value_pct: Rate,
    /// Gordon TV / final-year EBITDA
    #[serde(skip_serializing_if = "Option::is_none")]
    pub implied_exit_multiple: Option<Multiple>,
    pub discount_schedule: Vec<DiscountedYear>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_multiple_check: Option<ExitMultipleCheck>,
    pub sensitivity_grid: SensitivityGrid,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Discount a forecast and its Gordon terminal value to an enterprise value.
///
/// The terminal value is discounted at the horizon with an end-of-year factor
/// regardless of `convention`; only the explicit-period flows move to mid-year.
pub fn discount_forecast(
    forecast: &[ForecastYear],
    wacc: Rate,
    terminal_growth_rate: Rate,
    convention: DiscountConvention,
) -> DcfResult<EnterpriseValuation> {
    let last = forecast.last().ok_or_else(|| DcfError::InvalidAssumptions {
        field: "forecast".into(),
        reason: "Cannot discount an empty forecast".into(),
    })?;

    let mut schedule = Vec::with_capacity(forecast.len());
    for year in forecast {
        schedule.push(DiscountedYear {
            year_index: year.year_index,
            fiscal_year: year.fiscal_year,
            fcff: year.fcff,
            discount_factor: discount_factor(wacc, year.year_index, convention)?,
            pv_fcff: present_value(year.fcff, wacc, year.year_index, convention)?,
        });
    }
    let pv_fcff = schedule
        .iter()
        .try_fold(Decimal::ZERO, |acc, y| checked_sum(acc, y.pv_fcff, "PV of FCFF"))?;

    let terminal_value = terminal_value(last.fcff, wacc, terminal_growth_rate)?;
    let pv_terminal = present_value(
        terminal_value,
        wacc,
        last.year_index,
        DiscountConvention::EndOfYear,
    )?;

    Ok(EnterpriseValuation {
        schedule,
        pv_fcff,
        terminal_value,
        pv_terminal,
        enterprise_value: checked_sum(pv_fcff, pv_terminal, "enterprise value")?,
    })
}

/// Gordon growth: TV = FCFF_N * (1 + g) / (WACC - g). Requires WACC > g.
pub fn terminal_value(final_fcff: Money, wacc: Rate, terminal_growth_rate: Rate) -> DcfResult<Money> {
    if wacc <= terminal_growth_rate {
        return Err(DcfError::InvalidTerminalAssumption {
            wacc,
            terminal_growth: terminal_growth_rate,
        });
    }
    let grown = checked_product(
        final_fcff,
        Decimal::ONE + terminal_growth_rate,
        "terminal value",
    )?;
    checked_quotient(grown, wacc - terminal_growth_rate, "terminal value")
}

/// Equity value and price per share: EV - net debt, then / shares.
pub fn equity_bridge(enterprise_value: Money, bridge: &EquityBridge) -> DcfResult<(Money, Money)> {
    if bridge.shares_outstanding <= Decimal::ZERO {
        return Err(DcfError::InvalidShareCount(bridge.shares_outstanding));
    }
    let equity_value = checked_difference(enterprise_value, bridge.net_debt, "equity value")?;
    let price = checked_quotient(equity_value, bridge.shares_outstanding, "price per share")?;
    Ok((equity_value, price))
}

/// Run the DCF calculator: discounting, terminal value, equity bridge and the
/// WACC x terminal-growth sensitivity grid.
pub fn calculate_valuation(
    forecast: &[ForecastYear],
    assumptions: &AssumptionSet,
    bridge: &EquityBridge,
    axes: &SensitivityAxes,
    config: &EngineConfig,
) -> DcfResult<ComputationOutput<ValuationResult>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    if bridge.shares_outstanding <= Decimal::ZERO {
        return Err(DcfError::InvalidShareCount(bridge.shares_outstanding));
    }

    let wacc = assumptions.wacc();
    let g = assumptions.terminal_growth_rate();
    let convention = assumptions.discounting();

    let base = discount_forecast(forecast, wacc, g, convention)?;
    let (equity_value, price) = equity_bridge(base.enterprise_value, bridge)?;

    let terminal_value_pct = if base.enterprise_value.is_zero() {
        Decimal::ZERO
    } else {
        checked_quotient(base.pv_terminal, base.enterprise_value, "terminal value share")?
    };
    if terminal_value_pct > config.terminal_value_warning_pct {
        let msg = format!(
            "Terminal value represents {:.1}% of enterprise value; consider extending the explicit forecast period",
            terminal_value_pct.saturating_mul(dec!(100))
        );
        tracing::warn!("{msg}");
        warnings.push(msg);
    }
    if equity_value < Decimal::ZERO {
        warnings.push(format!(
            "Net debt ({}) exceeds enterprise value; equity value is negative",
            bridge.net_debt
        ));
    }

    // Forecast is non-empty once discount_forecast succeeded.
    let final_ebitda = forecast.last().map(|y| y.ebitda).unwrap_or(Decimal::ZERO);
    // Out of range reads as no meaningful multiple
    let implied_exit_multiple = base.terminal_value.checked_div(final_ebitda);
    let exit_multiple_check = match assumptions.exit_multiple() {
        Some(multiple) => Some(exit_cross_check(
            forecast,
            final_ebitda,
            multiple,
            wacc,
            base.pv_fcff,
        )?),
        None => None,
    };

    let grid = build_sensitivity_grid(forecast, assumptions, bridge, axes, &config.sensitivity)?;
    warnings.extend(grid.warnings);

    let output = ValuationResult {
        present_value_fcff: base.pv_fcff,
        terminal_value: base.terminal_value,
        present_value_terminal: base.pv_terminal,
        enterprise_value: base.enterprise_value,
        net_debt: bridge.net_debt,
        equity_value,
        shares_outstanding: bridge.shares_outstanding,
        intrinsic_price_per_share: price,
        wacc,
        terminal_growth_rate: g,
        discounting: convention,
        terminal_value_pct,
        implied_exit_multiple,
        discount_schedule: base.schedule,
        exit_multiple_check,
        sensitivity_grid: grid.result,
    };

    tracing::debug!(
        enterprise_value = %output.enterprise_value,
        price = %output.intrinsic_price_per_share,
        "valuation complete"
    );

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "FCFF DCF with Gordon growth terminal value",
        &serde_json::json!({
            "wacc": wacc,
            "terminal_growth_rate": g,
            "discounting": convention,
            "bridge": bridge,
            "axes": axes,
        }),
        warnings,
        elapsed,
        output,
    ))
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

fn exit_cross_check(
    forecast: &[ForecastYear],
    final_ebitda: Money,
    exit_multiple: Multiple,
    wacc: Rate,
    pv_fcff: Money,
) -> DcfResult<ExitMultipleCheck> {
    let horizon = forecast.last().map(|y| y.year_index).unwrap_or(0);
    let terminal_value = checked_product(final_ebitda, exit_multiple, "exit multiple terminal value")?;
    let pv_terminal = present_value(terminal_value, wacc, horizon, DiscountConvention::EndOfYear)?;
    tracing::info!(
        pv_terminal = %pv_terminal,
        "exit multiple alternative terminal value"
    );
    Ok(ExitMultipleCheck {
        exit_multiple,
        final_ebitda,
        terminal_value,
        pv_terminal,
        enterprise_value: checked_sum(pv_fcff, pv_terminal, "exit multiple enterprise value")?,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assumptions::scenario::Scenario;
    use crate::assumptions::set::{build_assumptions, AssumptionInput};
    use crate::config::BaseDefaults;
    use crate::valuation::forecast::project_forecast;

    fn input() -> AssumptionInput {
        AssumptionInput {
            scenario: Scenario::Custom,
            forecast_horizon_years: Some(2),
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

    fn run(input: &AssumptionInput, bridge: &EquityBridge) -> DcfResult<ComputationOutput<ValuationResult>> {
        let set = build_assumptions(input, None, &BaseDefaults::default())?.result;
        let forecast = project_forecast(dec!(1000), None, &set)?;
        calculate_valuation(
            &forecast,
            &set,
            bridge,
            &SensitivityAxes::default(),
            &EngineConfig::default(),
        )
    }

    fn bridge() -> EquityBridge {
        EquityBridge {
            net_debt: dec!(417.5),
            shares_outstanding: dec!(100),
        }
    }

    #[test]
    fn test_two_year_valuation() {
        let out = run(&input(), &bridge()).unwrap().result;
        assert_eq!(out.present_value_fcff, dec!(260));
        assert_eq!(out.terminal_value, dec!(2005.575));
        assert_eq!(out.present_value_terminal, dec!(1657.5));
        assert_eq!(out.enterprise_value, dec!(1917.5));
        assert_eq!(out.equity_value, dec!(1500));
        assert_eq!(out.intrinsic_price_per_share, dec!(15));
        assert_eq!(out.discount_schedule[0].pv_fcff, dec!(130));
        assert_eq!(out.discount_schedule[1].pv_fcff, dec!(130));
    }

    #[test]
    fn test_terminal_value_requires_wacc_above_growth() {
        let err = terminal_value(dec!(100), dec!(0.08), dec!(0.08)).unwrap_err();
        assert!(matches!(err, DcfError::InvalidTerminalAssumption { .. }));
        assert!(terminal_value(dec!(100), dec!(0.05), dec!(0.06)).is_err());
    }

    #[test]
    fn test_zero_shares_rejected() {
        let bad = EquityBridge {
            net_debt: Decimal::ZERO,
            shares_outstanding: Decimal::ZERO,
        };
        assert!(matches!(
            run(&input(), &bad),
            Err(DcfError::InvalidShareCount(_))
        ));
    }

    #[test]
    fn test_net_cash_increases_equity() {
        let cash_rich = EquityBridge {
            net_debt: dec!(-82.5),
            shares_outstanding: dec!(10),
        };
        let out = run(&input(), &cash_rich).unwrap().result;
        assert_eq!(out.equity_value, dec!(2000));
        assert_eq!(out.intrinsic_price_per_share, dec!(200));
    }

    #[test]
    fn test_terminal_value_share_warning() {
        // 1657.5 / 1917.5 is above the 75% default threshold
        let out = run(&input(), &bridge()).unwrap();
        assert!(out.result.terminal_value_pct > dec!(0.75));
        assert!(out.warnings.iter().any(|w| w.contains("Terminal value represents")));
    }

    #[test]
    fn test_mid_year_raises_explicit_pv_only() {
        let mut mid = input();
        mid.discounting = Some(DiscountConvention::MidYear);
        let end = run(&input(), &bridge()).unwrap().result;
        let mid = run(&mid, &bridge()).unwrap().result;
        assert!(mid.present_value_fcff > end.present_value_fcff);
        assert_eq!(mid.present_value_terminal, end.present_value_terminal);
    }

    #[test]
    fn test_exit_multiple_cross_check() {
        let mut with_exit = input();
        with_exit.exit_multiple = Some(dec!(8));
        let out = run(&with_exit, &bridge()).unwrap().result;
        let check = out.exit_multiple_check.unwrap();
        // Year 2 EBITDA = 1210 * (0.20 + 0.05) = 302.5
        assert_eq!(check.final_ebitda, dec!(302.5));
        assert_eq!(check.terminal_value, dec!(2420));
        assert_eq!(check.pv_terminal, dec!(2000));
        assert_eq!(check.enterprise_value, dec!(2260));
        // Headline numbers still come from the Gordon value
        assert_eq!(out.enterprise_value, dec!(1917.5));
    }

    #[test]
    fn test_terminal_value_overflow_is_an_error() {
        // WACC - g is 1e-28, so the Gordon value leaves the decimal range
        let err = terminal_value(dec!(157.3), dec!(0.1), dec!(0.0999999999999999999999999999)).unwrap_err();
        assert!(matches!(err, DcfError::Overflow { .. }), "got {err:?}");
    }

    #[test]
    fn test_equity_bridge_overflow_is_an_error() {
        let tiny = EquityBridge {
            net_debt: Decimal::ZERO,
            shares_outstanding: dec!(0.0000000000000000000000000001),
        };
        assert!(matches!(
            equity_bridge(Decimal::MAX, &tiny),
            Err(DcfError::Overflow { .. })
        ));
    }
}
