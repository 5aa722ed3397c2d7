use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::assumptions::set::AssumptionSet;
use crate::error::DcfError;
use crate::time_value::{checked_difference, checked_product, checked_sum};
use crate::types::Money;
use crate::DcfResult;

/// One projected year of the explicit forecast.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastYear {
    /// 1-based position within the horizon
    pub year_index: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fiscal_year: Option<i32>,
    pub revenue: Money,
    pub ebitda: Money,
    pub ebit: Money,
    pub nopat: Money,
    pub da: Money,
    pub capex: Money,
    pub delta_nwc: Money,
    /// FCFF = NOPAT + D&A - CapEx - delta NWC
    pub fcff: Money,
}

/// Project the explicit forecast from `seed_revenue` (the last historical
/// revenue). Each year depends only on the prior year's revenue.
///
/// When `last_fiscal_year` is known, year t is labelled `last_fiscal_year + t`.
pub fn project_forecast(
    seed_revenue: Money,
    last_fiscal_year: Option<i32>,
    assumptions: &AssumptionSet,
) -> DcfResult<Vec<ForecastYear>> {
    if seed_revenue <= Decimal::ZERO {
        return Err(DcfError::InvalidAssumptions {
            field: "seed_revenue".into(),
            reason: format!("Seed revenue must be positive, got {seed_revenue}"),
        });
    }
    let horizon = assumptions.horizon();
    if horizon < 1 {
        return Err(DcfError::InvalidAssumptions {
            field: "forecast_horizon_years".into(),
            reason: "Forecast horizon must be at least 1 year".into(),
        });
    }

    let tax_keep = Decimal::ONE - assumptions.tax_rate();
    let mut years = Vec::with_capacity(horizon as usize);
    let mut prev_revenue = seed_revenue;

    for idx in 0..horizon as usize {
        let year_index = idx as u32 + 1;
        let growth = checked_sum(Decimal::ONE, assumptions.revenue_growth()[idx], "revenue growth")?;
        let revenue = checked_product(prev_revenue, growth, "revenue")?;
        let of_revenue = |pct: Decimal, context: &str| checked_product(revenue, pct, context);
        let da = of_revenue(assumptions.da_pct()[idx], "D&A")?;

        let (ebitda, ebit) = match assumptions.ebitda_margin() {
            // EBIT derived from EBITDA is floored at zero
            Some(margins) if assumptions.ebit_from_ebitda() => {
                let ebitda = of_revenue(margins[idx], "EBITDA")?;
                let ebit = checked_difference(ebitda, da, "EBIT")?.max(Decimal::ZERO);
                (ebitda, ebit)
            }
            Some(margins) => (
                of_revenue(margins[idx], "EBITDA")?,
                of_revenue(assumptions.ebit_margin()[idx], "EBIT")?,
            ),
            None => {
                let ebit = of_revenue(assumptions.ebit_margin()[idx], "EBIT")?;
                (checked_sum(ebit, da, "EBITDA")?, ebit)
            }
        };

        let nopat = checked_product(ebit, tax_keep, "NOPAT")?;
        let capex = of_revenue(assumptions.capex_pct()[idx], "capex")?;
        let delta_nwc = of_revenue(assumptions.nwc_pct()[idx], "working capital")?;
        let fcff = checked_sum(nopat, da, "FCFF")
            .and_then(|v| checked_difference(v, capex, "FCFF"))
            .and_then(|v| checked_difference(v, delta_nwc, "FCFF"))?;

        years.push(ForecastYear {
            year_index,
            fiscal_year: last_fiscal_year.map(|fy| fy + year_index as i32),
            revenue,
            ebitda,
            ebit,
            nopat,
            da,
            capex,
            delta_nwc,
            fcff,
        });
        prev_revenue = revenue;
    }

    tracing::debug!(
        horizon,
        final_revenue = %prev_revenue,
        "forecast projected"
    );

    Ok(years)
}
