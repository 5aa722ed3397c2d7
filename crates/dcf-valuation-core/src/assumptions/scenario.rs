use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::DcfError;
use crate::types::Rate;
use crate::DcfResult;

use super::driver::DriverValue;

/// Which preset the history-derived defaults follow.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scenario {
    /// Carry historical metrics forward unchanged.
    #[default]
    Base,
    /// Base shifted towards faster growth and better margins.
    Bull,
    /// Base shifted towards slower growth and thinner margins.
    Bear,
    /// Every history-derived driver must come from the collector.
    Custom,
}

impl Scenario {
    /// Presets compared side by side by `compare_scenarios`.
    pub const PRESETS: [Scenario; 3] = [Scenario::Base, Scenario::Bull, Scenario::Bear];

    pub fn name(self) -> &'static str {
        match self {
            Scenario::Base => "base",
            Scenario::Bull => "bull",
            Scenario::Bear => "bear",
            Scenario::Custom => "custom",
        }
    }

    pub fn uses_history(self) -> bool {
        !matches!(self, Scenario::Custom)
    }

    /// Adjustments applied to history-derived (not collector-supplied) values.
    pub fn shift(self) -> Option<ScenarioShift> {
        match self {
            Scenario::Bull => Some(ScenarioShift {
                revenue_growth: Adjustment::new(dec!(0.03), None, None),
                ebit_margin: Adjustment::new(dec!(0.03), None, Some(dec!(0.40))),
                ebitda_margin: Adjustment::new(dec!(0.02), None, None),
                da_pct: Adjustment::new(dec!(-0.005), Some(dec!(0)), None),
                capex_pct: Adjustment::new(dec!(-0.005), Some(dec!(0)), None),
                nwc_pct: Adjustment::new(dec!(-0.003), Some(dec!(0)), None),
                terminal_growth_rate: Adjustment::new(dec!(0.005), None, None),
            }),
            Scenario::Bear => Some(ScenarioShift {
                revenue_growth: Adjustment::new(dec!(-0.03), Some(dec!(-0.10)), None),
                ebit_margin: Adjustment::new(dec!(-0.03), Some(dec!(0)), None),
                ebitda_margin: Adjustment::new(dec!(-0.02), Some(dec!(0)), None),
                da_pct: Adjustment::new(dec!(0.005), None, None),
                capex_pct: Adjustment::new(dec!(0.005), None, None),
                nwc_pct: Adjustment::new(dec!(0.003), None, None),
                terminal_growth_rate: Adjustment::new(dec!(-0.005), Some(dec!(0)), None),
            }),
            Scenario::Base | Scenario::Custom => None,
        }
    }
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Scenario {
    type Err = DcfError;

    fn from_str(s: &str) -> DcfResult<Self> {
        match s.to_ascii_lowercase().as_str() {
            "base" => Ok(Scenario::Base),
            "bull" => Ok(Scenario::Bull),
            "bear" => Ok(Scenario::Bear),
            "custom" => Ok(Scenario::Custom),
            other => Err(DcfError::InvalidInput {
                field: "scenario".into(),
                reason: format!("Unknown scenario '{other}' (expected base, bull, bear or custom)"),
            }),
        }
    }
}

/// Additive shift with optional bounds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Adjustment {
    pub delta: Rate,
    pub floor: Option<Rate>,
    pub cap: Option<Rate>,
}

impl Adjustment {
    fn new(delta: Rate, floor: Option<Rate>, cap: Option<Rate>) -> Self {
        Self { delta, floor, cap }
    }

    pub fn apply(&self, value: &DriverValue) -> DriverValue {
        value.map(|r| self.apply_rate(r))
    }

    pub fn apply_rate(&self, rate: Rate) -> Rate {
        let mut v = rate + self.delta;
        if let Some(lo) = self.floor {
            v = v.max(lo);
        }
        if let Some(hi) = self.cap {
            v = v.min(hi);
        }
        v
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScenarioShift {
    pub revenue_growth: Adjustment,
    pub ebit_margin: Adjustment,
    pub ebitda_margin: Adjustment,
    pub da_pct: Adjustment,
    pub capex_pct: Adjustment,
    pub nwc_pct: Adjustment,
    pub terminal_growth_rate: Adjustment,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_base_and_custom_have_no_shift() {
        assert!(Scenario::Base.shift().is_none());
        assert!(Scenario::Custom.shift().is_none());
    }

    #[test]
    fn test_bull_margin_cap() {
        let shift = Scenario::Bull.shift().unwrap();
        assert_eq!(shift.ebit_margin.apply_rate(dec!(0.39)), dec!(0.40));
        assert_eq!(shift.ebit_margin.apply_rate(dec!(0.20)), dec!(0.23));
    }

    #[test]
    fn test_bear_floors() {
        let shift = Scenario::Bear.shift().unwrap();
        assert_eq!(shift.revenue_growth.apply_rate(dec!(-0.09)), dec!(-0.10));
        assert_eq!(shift.terminal_growth_rate.apply_rate(dec!(0.002)), dec!(0));
        assert_eq!(shift.capex_pct.apply_rate(dec!(0.06)), dec!(0.065));
        let per_year = shift
            .ebit_margin
            .apply(&DriverValue::PerYear(vec![dec!(0.02), dec!(0.10)]));
        assert_eq!(per_year, DriverValue::PerYear(vec![dec!(0), dec!(0.07)]));
    }

    #[test]
    fn test_ebitda_margin_moves_two_points() {
        let bull = Scenario::Bull.shift().unwrap();
        let bear = Scenario::Bear.shift().unwrap();
        assert_eq!(bull.ebitda_margin.apply_rate(dec!(0.25)), dec!(0.27));
        assert_eq!(bear.ebitda_margin.apply_rate(dec!(0.25)), dec!(0.23));
        assert_eq!(bear.ebitda_margin.apply_rate(dec!(0.01)), dec!(0));
    }

    #[test]
    fn test_parse_scenario() {
        assert_eq!("Bull".parse::<Scenario>().unwrap(), Scenario::Bull);
        assert!("sideways".parse::<Scenario>().is_err());
    }
}
