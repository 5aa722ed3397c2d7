use serde::{Deserialize, Serialize};

use crate::error::DcfError;
use crate::types::Rate;
use crate::DcfResult;

/// A driver given either as one rate for every forecast year or year by year.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DriverValue {
    Flat(Rate),
    PerYear(Vec<Rate>),
}

impl DriverValue {
    /// Expand to exactly `horizon` per-year values.
    pub fn broadcast(&self, driver: &str, horizon: u32) -> DcfResult<Vec<Rate>> {
        let horizon = horizon as usize;
        match self {
            DriverValue::Flat(rate) => Ok(vec![*rate; horizon]),
            DriverValue::PerYear(values) if values.len() == horizon => Ok(values.clone()),
            DriverValue::PerYear(values) => Err(DcfError::AssumptionLengthMismatch {
                driver: driver.to_string(),
                expected: horizon,
                actual: values.len(),
            }),
        }
    }

    /// Apply `f` to every year's value.
    pub fn map(&self, f: impl Fn(Rate) -> Rate) -> DriverValue {
        match self {
            DriverValue::Flat(rate) => DriverValue::Flat(f(*rate)),
            DriverValue::PerYear(values) => DriverValue::PerYear(values.iter().map(|r| f(*r)).collect()),
        }
    }
}

impl From<Rate> for DriverValue {
    fn from(rate: Rate) -> Self {
        DriverValue::Flat(rate)
    }
}

impl From<Vec<Rate>> for DriverValue {
    fn from(values: Vec<Rate>) -> Self {
        DriverValue::PerYear(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_flat_broadcast() {
        let v = DriverValue::Flat(dec!(0.1));
        assert_eq!(v.broadcast("revenue_growth", 3).unwrap(), vec![dec!(0.1); 3]);
    }

    #[test]
    fn test_per_year_length_mismatch() {
        let v = DriverValue::PerYear(vec![dec!(0.1); 4]);
        match v.broadcast("revenue_growth", 5).unwrap_err() {
            DcfError::AssumptionLengthMismatch {
                driver,
                expected,
                actual,
            } => {
                assert_eq!(driver, "revenue_growth");
                assert_eq!(expected, 5);
                assert_eq!(actual, 4);
            }
            e => panic!("Expected AssumptionLengthMismatch, got {e:?}"),
        }
    }

    #[test]
    fn test_map_per_year() {
        let v = DriverValue::PerYear(vec![dec!(0.38), dec!(0.20)]);
        assert_eq!(
            v.map(|r| r + dec!(0.01)),
            DriverValue::PerYear(vec![dec!(0.39), dec!(0.21)])
        );
    }

    #[test]
    fn test_untagged_deserialize() {
        let flat: DriverValue = serde_json::from_str("0.05").unwrap();
        assert_eq!(flat, DriverValue::Flat(dec!(0.05)));
        let per_year: DriverValue = serde_json::from_str(r#"["0.1", "0.08"]"#).unwrap();
        assert_eq!(per_year, DriverValue::PerYear(vec![dec!(0.1), dec!(0.08)]));
    }
}
