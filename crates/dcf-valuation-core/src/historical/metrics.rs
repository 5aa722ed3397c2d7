use rust_decimal::Decimal;
use rust_decimal::MathematicalOps;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Instant;

use crate::error::DcfError;
use crate::types::{with_metadata, ComputationOutput, Money, Rate};
use crate::DcfResult;

use super::period::{HistoricalPeriod, History};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// A forecast driver expressed as a ratio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Driver {
    RevenueGrowth,
    EbitMargin,
    EbitdaMargin,
    CapexPct,
    DaPct,
    NwcPct,
}

impl Driver {
    pub const ALL: [Driver; 6] = [
        Driver::RevenueGrowth,
        Driver::EbitMargin,
        Driver::EbitdaMargin,
        Driver::CapexPct,
        Driver::DaPct,
        Driver::NwcPct,
    ];

    /// Canonical snake_case name.
    pub fn name(self) -> &'static str {
        match self {
            Driver::RevenueGrowth => "revenue_growth",
            Driver::EbitMargin => "ebit_margin",
            Driver::EbitdaMargin => "ebitda_margin",
            Driver::CapexPct => "capex_pct",
            Driver::DaPct => "da_pct",
            Driver::NwcPct => "nwc_pct",
        }
    }
}

impl fmt::Display for Driver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Driver {
    type Err = DcfError;

    fn from_str(s: &str) -> DcfResult<Self> {
        Driver::ALL
            .into_iter()
            .find(|d| d.name() == s)
            .ok_or_else(|| DcfError::InvalidInput {
                field: "driver".into(),
                reason: format!("Unknown driver '{s}'"),
            })
    }
}

/// Which summary of a ratio history to carry forward.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricBasis {
    Latest,
    Mean,
    #[default]
    Median,
}

/// Summary used for the revenue growth default; adds compound annual growth.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrowthBasis {
    Latest,
    Mean,
    Median,
    #[default]
    Cagr,
}

/// Periods kept when no lookback is configured.
pub const DEFAULT_LOOKBACK: usize = 5;

/// Options controlling which periods feed the ratios.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DerivationOptions {
    /// Use only the most recent N periods (at least 2 must remain).
    /// `None` keeps the full history.
    pub lookback: Option<usize>,
}

impl Default for DerivationOptions {
    fn default() -> Self {
        Self {
            lookback: Some(DEFAULT_LOOKBACK),
        }
    }
}

/// One ratio per historical period plus summaries over the defined values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriverSeries {
    /// `None` where the ratio is undefined (non-positive revenue denominator).
    pub values: Vec<Option<Rate>>,
    pub mean: Option<Rate>,
    pub median: Option<Rate>,
    pub latest: Option<Rate>,
}

impl DriverSeries {
    fn from_values(values: Vec<Option<Rate>>) -> Self {
        let mut defined: Vec<Rate> = values.iter().flatten().copied().collect();
        let latest = values.last().copied().flatten();
        let mean = if defined.is_empty() {
            None
        } else {
            defined
                .iter()
                .try_fold(Decimal::ZERO, |acc, r| acc.checked_add(*r))
                .map(|sum| sum / Decimal::from(defined.len()))
        };
        defined.sort();
        let median = match defined.len() {
            0 => None,
            n if n % 2 == 1 => Some(defined[n / 2]),
            n => defined[n / 2 - 1]
                .checked_add(defined[n / 2])
                .map(|sum| sum / dec!(2)),
        };
        Self {
            values,
            mean,
            median,
            latest,
        }
    }

    pub fn summary(&self, basis: MetricBasis) -> Option<Rate> {
        match basis {
            MetricBasis::Latest => self.latest,
            MetricBasis::Mean => self.mean,
            MetricBasis::Median => self.median,
        }
    }

    /// Number of periods with a defined ratio.
    pub fn defined_count(&self) -> usize {
        self.values.iter().flatten().count()
    }
}

/// Historical ratios usable as forecast drivers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DerivedMetrics {
    pub fiscal_years: Vec<Option<i32>>,
    /// `revenue_growth.values[0]` is always undefined.
    pub revenue_growth: DriverSeries,
    pub ebit_margin: DriverSeries,
    pub ebitda_margin: DriverSeries,
    pub capex_pct: DriverSeries,
    pub da_pct: DriverSeries,
    pub nwc_pct: DriverSeries,
    /// Compound annual growth from first to last period in the window.
    pub revenue_cagr: Option<Rate>,
    /// Indices (within the window) of periods whose revenue could not be a denominator.
    pub excluded_periods: Vec<usize>,
    pub periods_used: usize,
    /// Latest historical revenue, the forecast seed.
    pub seed_revenue: Money,
    pub last_fiscal_year: Option<i32>,
}

impl DerivedMetrics {
    pub fn get(&self, driver: Driver) -> &DriverSeries {
        match driver {
            Driver::RevenueGrowth => &self.revenue_growth,
            Driver::EbitMargin => &self.ebit_margin,
            Driver::EbitdaMargin => &self.ebitda_margin,
            Driver::CapexPct => &self.capex_pct,
            Driver::DaPct => &self.da_pct,
            Driver::NwcPct => &self.nwc_pct,
        }
    }

    /// Carry-forward growth rate under the chosen basis.
    pub fn growth(&self, basis: GrowthBasis) -> Option<Rate> {
        match basis {
            GrowthBasis::Latest => self.revenue_growth.latest,
            GrowthBasis::Mean => self.revenue_growth.mean,
            GrowthBasis::Median => self.revenue_growth.median,
            GrowthBasis::Cagr => self.revenue_cagr,
        }
    }
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Derive forecast-driver ratios from historical statements.
///
/// Periods with zero (or negative) revenue are not a hard failure: their
/// ratios are reported as undefined, excluded from the summaries, and a
/// warning is attached to the output.
pub fn derive_metrics(
    periods: &[HistoricalPeriod],
    options: &DerivationOptions,
) -> DcfResult<ComputationOutput<DerivedMetrics>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    let history = History::new(periods.to_vec())?.window(options.lookback)?;
    let metrics = compute_metrics(&history, &mut warnings);

    tracing::debug!(
        periods = metrics.periods_used,
        excluded = metrics.excluded_periods.len(),
        "derived historical metrics"
    );

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Historical ratio derivation (percent of revenue)",
        options,
        warnings,
        elapsed,
        metrics,
    ))
}

/// Pure ratio computation over a validated history.
pub fn compute_metrics(history: &History, warnings: &mut Vec<String>) -> DerivedMetrics {
    let periods = history.periods();

    let mut excluded_periods = Vec::new();
    for (idx, p) in periods.iter().enumerate() {
        if !p.has_usable_revenue() {
            let label = period_label(idx, p);
            let msg = format!(
                "{label} has non-positive revenue ({}); its ratios are undefined and excluded from averages",
                p.revenue
            );
            tracing::warn!("{msg}");
            warnings.push(msg);
            excluded_periods.push(idx);
        }
    }

    let growth: Vec<Option<Rate>> = periods
        .iter()
        .enumerate()
        .map(|(idx, p)| {
            if idx == 0 {
                return None;
            }
            let prev = &periods[idx - 1];
            if prev.has_usable_revenue() && p.has_usable_revenue() {
                p.revenue.checked_div(prev.revenue).map(|r| r - Decimal::ONE)
            } else {
                None
            }
        })
        .collect();

    let ratio = |f: fn(&HistoricalPeriod) -> Money| -> Vec<Option<Rate>> {
        periods
            .iter()
            .map(|p| {
                if p.has_usable_revenue() {
                    f(p).checked_div(p.revenue)
                } else {
                    None
                }
            })
            .collect()
    };

    let revenue_cagr = compute_cagr(periods);
    if revenue_cagr.is_none() {
        warnings.push("Revenue CAGR undefined: first or last period revenue is non-positive".into());
    }

    DerivedMetrics {
        fiscal_years: periods.iter().map(|p| p.fiscal_year).collect(),
        revenue_growth: DriverSeries::from_values(growth),
        ebit_margin: DriverSeries::from_values(ratio(|p| p.ebit)),
        ebitda_margin: DriverSeries::from_values(ratio(|p| p.ebit + p.da)),
        capex_pct: DriverSeries::from_values(ratio(|p| p.capex)),
        da_pct: DriverSeries::from_values(ratio(|p| p.da)),
        nwc_pct: DriverSeries::from_values(ratio(|p| p.delta_nwc)),
        revenue_cagr,
        excluded_periods,
        periods_used: periods.len(),
        seed_revenue: history.seed_revenue(),
        last_fiscal_year: history.last_fiscal_year(),
    }
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

fn compute_cagr(periods: &[HistoricalPeriod]) -> Option<Rate> {
    let first = periods.first()?;
    let last = periods.last()?;
    if !first.has_usable_revenue() || !last.has_usable_revenue() {
        return None;
    }
    let n = periods.len() - 1;
    let ratio = last.revenue.checked_div(first.revenue)?;
    if n == 1 {
        return Some(ratio - Decimal::ONE);
    }
    let exponent = Decimal::ONE / Decimal::from(n);
    ratio.checked_powd(exponent).map(|r| r - Decimal::ONE)
}

fn period_label(idx: usize, p: &HistoricalPeriod) -> String {
    match p.fiscal_year {
        Some(y) => format!("FY{y}"),
        None => format!("Period {}", idx + 1),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn period(year: i32, revenue: Money, ebit: Money) -> HistoricalPeriod {
        HistoricalPeriod {
            fiscal_year: Some(year),
            revenue,
            ebit,
            da: revenue * dec!(0.05),
            capex: revenue * dec!(0.06),
            delta_nwc: revenue * dec!(0.01),
        }
    }

    fn sample_periods() -> Vec<HistoricalPeriod> {
        vec![
            period(2021, dec!(1000), dec!(180)),
            period(2022, dec!(1100), dec!(220)),
            period(2023, dec!(1210), dec!(266.2)),
        ]
    }

    #[test]
    fn test_growth_series() {
        let out = derive_metrics(&sample_periods(), &DerivationOptions::default()).unwrap();
        let m = &out.result;
        assert_eq!(m.revenue_growth.values, vec![None, Some(dec!(0.1)), Some(dec!(0.1))]);
        assert_eq!(m.revenue_growth.mean, Some(dec!(0.1)));
        let cagr = m.revenue_cagr.unwrap();
        assert!((cagr - dec!(0.1)).abs() < dec!(0.000001), "CAGR ~10%, got {cagr}");
        assert_eq!(m.seed_revenue, dec!(1210));
        assert_eq!(m.last_fiscal_year, Some(2023));
    }

    #[test]
    fn test_margin_summaries() {
        let out = derive_metrics(&sample_periods(), &DerivationOptions::default()).unwrap();
        let m = &out.result;
        // 0.18, 0.20, 0.22
        assert_eq!(m.ebit_margin.mean, Some(dec!(0.2)));
        assert_eq!(m.ebit_margin.median, Some(dec!(0.2)));
        assert_eq!(m.ebit_margin.latest, Some(dec!(0.22)));
        assert_eq!(m.capex_pct.mean, Some(dec!(0.06)));
        assert_eq!(m.ebitda_margin.latest, Some(dec!(0.27)));
    }

    #[test]
    fn test_zero_revenue_period_excluded() {
        let mut periods = sample_periods();
        periods[1] = period(2022, Decimal::ZERO, dec!(10));
        let out = derive_metrics(&periods, &DerivationOptions::default()).unwrap();
        let m = &out.result;

        assert_eq!(m.excluded_periods, vec![1]);
        assert_eq!(m.ebit_margin.values[1], None);
        // Growth into and out of the zero period is undefined
        assert_eq!(m.revenue_growth.values, vec![None, None, None]);
        assert_eq!(m.revenue_growth.mean, None);
        // Mean over the two remaining margins: (0.18 + 0.22) / 2
        assert_eq!(m.ebit_margin.mean, Some(dec!(0.2)));
        assert!(out.warnings.iter().any(|w| w.contains("FY2022")));
    }

    #[test]
    fn test_insufficient_history() {
        let result = derive_metrics(&sample_periods()[..1], &DerivationOptions::default());
        assert!(matches!(result, Err(DcfError::InsufficientHistory(_))));
    }

    #[test]
    fn test_lookback_window() {
        let options = DerivationOptions { lookback: Some(2) };
        let out = derive_metrics(&sample_periods(), &options).unwrap();
        assert_eq!(out.result.periods_used, 2);
        assert_eq!(out.result.ebit_margin.values, vec![Some(dec!(0.2)), Some(dec!(0.22))]);
    }

    #[test]
    fn test_median_even_count() {
        let series = DriverSeries::from_values(vec![
            Some(dec!(0.4)),
            Some(dec!(0.1)),
            None,
            Some(dec!(0.3)),
            Some(dec!(0.2)),
        ]);
        assert_eq!(series.median, Some(dec!(0.25)));
        assert_eq!(series.latest, Some(dec!(0.2)));
        assert_eq!(series.defined_count(), 4);
    }

    #[test]
    fn test_driver_lookup_by_name() {
        let out = derive_metrics(&sample_periods(), &DerivationOptions::default()).unwrap();
        let driver: Driver = "capex_pct".parse().unwrap();
        assert_eq!(out.result.get(driver).mean, Some(dec!(0.06)));
        assert!("capex".parse::<Driver>().is_err());
    }

    #[test]
    fn test_default_lookback_keeps_five_latest() {
        let periods: Vec<HistoricalPeriod> = (0..7)
            .map(|i| period(2017 + i, dec!(1000) + Decimal::from(100 * i), dec!(150)))
            .collect();
        let out = derive_metrics(&periods, &DerivationOptions::default()).unwrap();
        assert_eq!(out.result.periods_used, 5);
        assert_eq!(out.result.fiscal_years.first(), Some(&Some(2019)));

        let full = derive_metrics(&periods, &DerivationOptions { lookback: None }).unwrap();
        assert_eq!(full.result.periods_used, 7);
    }

    #[test]
    fn test_growth_basis_selection() {
        let out = derive_metrics(&sample_periods(), &DerivationOptions::default()).unwrap();
        let m = &out.result;
        assert_eq!(m.growth(GrowthBasis::Latest), Some(dec!(0.1)));
        let two_period = derive_metrics(&sample_periods()[1..], &DerivationOptions::default())
            .unwrap()
            .result;
        // Single interval: CAGR is the plain growth rate
        assert_eq!(two_period.growth(GrowthBasis::Cagr), Some(dec!(0.1)));
    }
}
