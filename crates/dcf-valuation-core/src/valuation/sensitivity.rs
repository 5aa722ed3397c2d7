use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Instant;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::assumptions::set::AssumptionSet;
use crate::config::GridDefaults;
use crate::error::DcfError;
use crate::time_value::DiscountConvention;
use crate::types::{with_metadata, ComputationOutput, Money, Rate};
use crate::DcfResult;

use super::dcf::{discount_forecast, equity_bridge, EquityBridge};
use super::forecast::ForecastYear;

/// Caller-supplied sweep values. An axis left unset is generated around the
/// base assumption from [`GridDefaults`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SensitivityAxes {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wacc_values: Option<Vec<Rate>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub growth_values: Option<Vec<Rate>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensitivityCell {
    pub enterprise_value: Money,
    pub equity_value: Money,
    pub price_per_share: Money,
}

/// WACC x terminal-growth surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensitivityGrid {
    /// Row axis, in the order supplied
    pub wacc_values: Vec<Rate>,
    /// Column axis, in the order supplied
    pub growth_values: Vec<Rate>,
    /// cells[i][j] is the value at (wacc_values[i], growth_values[j]);
    /// `None` where the pair has no finite Gordon value.
    pub cells: Vec<Vec<Option<SensitivityCell>>>,
    /// (row, col) of the base (WACC, g) pair, if it lies on the grid
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_position: Option<(usize, usize)>,
}

impl SensitivityGrid {
    /// Look up a cell by its axis values.
    pub fn get(&self, wacc: Rate, terminal_growth: Rate) -> Option<&SensitivityCell> {
        let row = self.wacc_values.iter().position(|w| *w == wacc)?;
        let col = self.growth_values.iter().position(|g| *g == terminal_growth)?;
        self.cells[row][col].as_ref()
    }

    pub fn undefined_count(&self) -> usize {
        self.cells.iter().flatten().filter(|c| c.is_none()).count()
    }
}

/// `points` evenly spaced values from max(base - half_width, floor) to
/// base + half_width, rounded to 4 dp.
pub fn axis_around(
    base: Rate,
    half_width: Rate,
    points: usize,
    floor: Rate,
) -> DcfResult<Vec<Rate>> {
    if points == 0 {
        return Err(DcfError::InvalidInput {
            field: "sensitivity.points".into(),
            reason: "Axis must have at least one point".into(),
        });
    }
    let lo = (base - half_width).max(floor);
    let hi = base + half_width;
    if points == 1 {
        return Ok(vec![lo.round_dp(4)]);
    }
    let step = (hi - lo) / Decimal::from(points - 1);
    Ok((0..points)
        .map(|i| (lo + step * Decimal::from(i)).round_dp(4))
        .collect())
}

/// Recompute EV, equity value and price for every (WACC, g) pair.
///
/// Cells are independent; pairs with `wacc <= g` or `wacc <= 0`, and pairs
/// whose value overflows the decimal range, come back as `None` and are
/// reported in the warnings instead of failing the grid.
pub fn build_sensitivity_grid(
    forecast: &[ForecastYear],
    assumptions: &AssumptionSet,
    bridge: &EquityBridge,
    axes: &SensitivityAxes,
    defaults: &GridDefaults,
) -> DcfResult<ComputationOutput<SensitivityGrid>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    let base_wacc = assumptions.wacc();
    let base_g = assumptions.terminal_growth_rate();

    let wacc_values = match axes.wacc_values {
        Some(ref v) => non_empty("wacc_values", v)?,
        None => axis_around(
            base_wacc,
            defaults.wacc_half_width,
            defaults.points,
            defaults.wacc_floor,
        )?,
    };
    let growth_values = match axes.growth_values {
        Some(ref v) => non_empty("growth_values", v)?,
        None => axis_around(
            base_g,
            defaults.growth_half_width,
            defaults.points,
            defaults.growth_floor,
        )?,
    };

    let convention = assumptions.discounting();
    let row = |wacc: Rate| -> Vec<Option<SensitivityCell>> {
        growth_values
            .iter()
            .map(|&g| evaluate_cell(forecast, wacc, g, convention, bridge))
            .collect()
    };

    #[cfg(feature = "parallel")]
    let cells: Vec<Vec<Option<SensitivityCell>>> = wacc_values.par_iter().map(|&w| row(w)).collect();
    #[cfg(not(feature = "parallel"))]
    let cells: Vec<Vec<Option<SensitivityCell>>> = wacc_values.iter().map(|&w| row(w)).collect();

    for (i, w) in wacc_values.iter().enumerate() {
        for (j, g) in growth_values.iter().enumerate() {
            if cells[i][j].is_none() {
                tracing::debug!(wacc = %w, terminal_growth = %g, "sensitivity cell undefined");
            }
        }
    }

    let grid = SensitivityGrid {
        base_position: base_position(&wacc_values, &growth_values, base_wacc, base_g),
        wacc_values,
        growth_values,
        cells,
    };

    let undefined = grid.undefined_count();
    if undefined > 0 {
        let msg = format!(
            "{undefined} of {} sensitivity cells undefined (WACC <= terminal growth or value out of range)",
            grid.wacc_values.len() * grid.growth_values.len()
        );
        tracing::warn!("{msg}");
        warnings.push(msg);
    }

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "WACC x terminal growth sensitivity",
        axes,
        warnings,
        elapsed,
        grid,
    ))
}

fn evaluate_cell(
    forecast: &[ForecastYear],
    wacc: Rate,
    terminal_growth: Rate,
    convention: DiscountConvention,
    bridge: &EquityBridge,
) -> Option<SensitivityCell> {
    if wacc <= terminal_growth || wacc <= Decimal::ZERO {
        return None;
    }
    let ev = discount_forecast(forecast, wacc, terminal_growth, convention).ok()?;
    let (equity_value, price_per_share) = equity_bridge(ev.enterprise_value, bridge).ok()?;
    Some(SensitivityCell {
        enterprise_value: ev.enterprise_value,
        equity_value,
        price_per_share,
    })
}

fn non_empty(field: &str, values: &[Rate]) -> DcfResult<Vec<Rate>> {
    if values.is_empty() {
        return Err(DcfError::InvalidInput {
            field: field.into(),
            reason: "Sensitivity axis cannot be empty".into(),
        });
    }
    Ok(values.to_vec())
}

fn base_position(
    wacc_values: &[Rate],
    growth_values: &[Rate],
    wacc: Rate,
    g: Rate,
) -> Option<(usize, usize)> {
    let row = wacc_values.iter().position(|w| *w == wacc)?;
    let col = growth_values.iter().position(|v| *v == g)?;
    Some((row, col))
}
