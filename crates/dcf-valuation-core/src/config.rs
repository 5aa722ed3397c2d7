use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::historical::metrics::{DerivationOptions, GrowthBasis, MetricBasis};
use crate::time_value::DiscountConvention;
use crate::types::Rate;

/// Fallbacks used when the collector leaves a non-historical assumption unset,
/// and the summaries used to carry history forward.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BaseDefaults {
    pub horizon_years: u32,
    /// Longest forecast horizon accepted from a collector.
    pub max_horizon_years: u32,
    pub tax_rate: Rate,
    pub terminal_growth_rate: Rate,
    pub ratio_basis: MetricBasis,
    pub growth_basis: GrowthBasis,
    pub discounting: DiscountConvention,
}

impl Default for BaseDefaults {
    fn default() -> Self {
        Self {
            horizon_years: 10,
            max_horizon_years: 50,
            tax_rate: dec!(0.25),
            terminal_growth_rate: dec!(0.02),
            ratio_basis: MetricBasis::Median,
            growth_basis: GrowthBasis::Cagr,
            discounting: DiscountConvention::EndOfYear,
        }
    }
}

/// Shape of the sensitivity axes generated around the base (WACC, g) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridDefaults {
    pub wacc_half_width: Rate,
    pub growth_half_width: Rate,
    pub points: usize,
    pub wacc_floor: Rate,
    pub growth_floor: Rate,
}

impl Default for GridDefaults {
    fn default() -> Self {
        Self {
            wacc_half_width: dec!(0.02),
            growth_half_width: dec!(0.01),
            points: 5,
            wacc_floor: dec!(0.03),
            growth_floor: dec!(0.0),
        }
    }
}

/// Engine-wide configuration. Every key is optional in a config file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub defaults: BaseDefaults,
    pub derivation: DerivationOptions,
    pub sensitivity: GridDefaults,
    /// Warn when PV(terminal) exceeds this share of enterprise value.
    pub terminal_value_warning_pct: Rate,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            defaults: BaseDefaults::default(),
            derivation: DerivationOptions::default(),
            sensitivity: GridDefaults::default(),
            terminal_value_warning_pct: dec!(0.75),
        }
    }
}
