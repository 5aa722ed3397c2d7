use serde::{Deserialize, Serialize};

use crate::error::DcfError;
use crate::types::Money;
use crate::DcfResult;

/// One fiscal period's operating line items, all in the same currency unit.
///
/// `capex` is the positive cash outflow for capital expenditure and
/// `delta_nwc` the increase in net working capital (positive = cash outflow).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricalPeriod {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fiscal_year: Option<i32>,
    pub revenue: Money,
    pub ebit: Money,
    pub da: Money,
    pub capex: Money,
    pub delta_nwc: Money,
}

impl HistoricalPeriod {
    /// Whether revenue can serve as a ratio denominator.
    pub fn has_usable_revenue(&self) -> bool {
        self.revenue > Money::ZERO
    }
}

/// Chronological sequence of at least two historical periods.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<HistoricalPeriod>", into = "Vec<HistoricalPeriod>")]
pub struct History {
    periods: Vec<HistoricalPeriod>,
}

impl History {
    pub fn new(periods: Vec<HistoricalPeriod>) -> DcfResult<Self> {
        if periods.len() < 2 {
            return Err(DcfError::InsufficientHistory(format!(
                "At least 2 historical periods are required, got {}",
                periods.len()
            )));
        }
        validate_chronology(&periods)?;
        Ok(Self { periods })
    }

    pub fn periods(&self) -> &[HistoricalPeriod] {
        &self.periods
    }

    pub fn len(&self) -> usize {
        self.periods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.periods.is_empty()
    }

    pub fn latest(&self) -> &HistoricalPeriod {
        // Non-empty by construction.
        &self.periods[self.periods.len() - 1]
    }

    /// Revenue of the most recent period; the forecast seed.
    pub fn seed_revenue(&self) -> Money {
        self.latest().revenue
    }

    pub fn last_fiscal_year(&self) -> Option<i32> {
        self.latest().fiscal_year
    }

    /// Restrict to the `lookback` most recent periods.
    pub fn window(&self, lookback: Option<usize>) -> DcfResult<History> {
        match lookback {
            Some(n) if n < self.periods.len() => {
                let start = self.periods.len() - n;
                History::new(self.periods[start..].to_vec())
            }
            _ => Ok(self.clone()),
        }
    }
}

impl TryFrom<Vec<HistoricalPeriod>> for History {
    type Error = DcfError;

    fn try_from(periods: Vec<HistoricalPeriod>) -> DcfResult<Self> {
        History::new(periods)
    }
}

impl From<History> for Vec<HistoricalPeriod> {
    fn from(history: History) -> Self {
        history.periods
    }
}

fn validate_chronology(periods: &[HistoricalPeriod]) -> DcfResult<()> {
    let labelled = periods.iter().filter(|p| p.fiscal_year.is_some()).count();
    if labelled == 0 {
        return Ok(());
    }
    if labelled != periods.len() {
        return Err(DcfError::InvalidInput {
            field: "fiscal_year".into(),
            reason: "Fiscal years must be given for every period or for none".into(),
        });
    }
    for pair in periods.windows(2) {
        if let (Some(prev), Some(next)) = (pair[0].fiscal_year, pair[1].fiscal_year) {
            if next <= prev {
                return Err(DcfError::InvalidInput {
                    field: "fiscal_year".into(),
                    reason: format!(
                        "Periods must be chronological; FY{next} follows FY{prev}"
                    ),
                });
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn period(year: i32, revenue: Money) -> HistoricalPeriod {
        HistoricalPeriod {
            fiscal_year: Some(year),
            revenue,
            ebit: revenue * dec!(0.2),
            da: revenue * dec!(0.05),
            capex: revenue * dec!(0.06),
            delta_nwc: revenue * dec!(0.01),
        }
    }

    #[test]
    fn test_single_period_is_insufficient() {
        let result = History::new(vec![period(2023, dec!(100))]);
        assert!(matches!(result, Err(DcfError::InsufficientHistory(_))));
    }

    #[test]
    fn test_out_of_order_years_rejected() {
        let result = History::new(vec![period(2023, dec!(100)), period(2022, dec!(110))]);
        assert!(matches!(result, Err(DcfError::InvalidInput { .. })));
    }

    #[test]
    fn test_mixed_year_labels_rejected() {
        let mut unlabelled = period(2023, dec!(110));
        unlabelled.fiscal_year = None;
        let result = History::new(vec![period(2022, dec!(100)), unlabelled]);
        assert!(result.is_err());
    }

    #[test]
    fn test_window_keeps_most_recent() {
        let history = History::new(vec![
            period(2020, dec!(80)),
            period(2021, dec!(90)),
            period(2022, dec!(100)),
            period(2023, dec!(110)),
        ])
        .unwrap();
        let window = history.window(Some(2)).unwrap();
        assert_eq!(window.len(), 2);
        assert_eq!(window.periods()[0].fiscal_year, Some(2022));
        assert_eq!(window.seed_revenue(), dec!(110));
    }

    #[test]
    fn test_window_of_one_is_insufficient() {
        let history = History::new(vec![period(2022, dec!(100)), period(2023, dec!(110))]).unwrap();
        assert!(history.window(Some(1)).is_err());
    }

    #[test]
    fn test_deserialize_validates() {
        let json = r#"[{"revenue": "100", "ebit": "20", "da": "5", "capex": "6", "delta_nwc": "1"}]"#;
        let parsed: Result<History, _> = serde_json::from_str(json);
        assert!(parsed.is_err());
    }
}
