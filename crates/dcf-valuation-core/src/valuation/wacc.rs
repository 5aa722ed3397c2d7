use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::error::DcfError;
use crate::types::{with_metadata, ComputationOutput, Rate};
use crate::DcfResult;

/// CAPM build-up inputs for the discount rate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaccInput {
    pub risk_free_rate: Rate,
    pub equity_risk_premium: Rate,
    /// Levered equity beta
    pub beta: Decimal,
    /// Pre-tax cost of debt
    pub cost_of_debt: Rate,
    pub tax_rate: Rate,
    /// Market-value weights; must sum to 1 within 1%.
    pub equity_weight: Rate,
    pub debt_weight: Rate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size_premium: Option<Rate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country_risk_premium: Option<Rate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub specific_risk_premium: Option<Rate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaccOutput {
    pub wacc: Rate,
    pub cost_of_equity: Rate,
    pub after_tax_cost_of_debt: Rate,
    pub equity_contribution: Rate,
    pub debt_contribution: Rate,
}

/// Weighted average cost of capital.
///
/// Ke = Rf + beta * ERP + premiums; Kd_at = Kd * (1 - t);
/// WACC = We * Ke + Wd * Kd_at.
pub fn calculate_wacc(input: &WaccInput) -> DcfResult<ComputationOutput<WaccOutput>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    validate(input)?;

    let premiums = [
        input.size_premium,
        input.country_risk_premium,
        input.specific_risk_premium,
    ]
    .into_iter()
    .flatten()
    .sum::<Decimal>();
    let cost_of_equity = input.risk_free_rate + input.beta * input.equity_risk_premium + premiums;
    let after_tax_cost_of_debt = input.cost_of_debt * (Decimal::ONE - input.tax_rate);

    let equity_contribution = input.equity_weight * cost_of_equity;
    let debt_contribution = input.debt_weight * after_tax_cost_of_debt;
    let wacc = equity_contribution + debt_contribution;

    if input.beta > dec!(3.0) {
        warnings.push(format!(
            "High beta ({}): betas above 3.0 are unusual, verify the estimate",
            input.beta
        ));
    }
    if after_tax_cost_of_debt > cost_of_equity {
        warnings.push(format!(
            "After-tax cost of debt ({after_tax_cost_of_debt}) exceeds cost of equity ({cost_of_equity})"
        ));
    }
    if wacc > dec!(0.20) {
        warnings.push(format!("WACC of {wacc} exceeds 20%"));
    }

    let output = WaccOutput {
        wacc,
        cost_of_equity,
        after_tax_cost_of_debt,
        equity_contribution,
        debt_contribution,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "WACC via CAPM build-up",
        input,
        warnings,
        elapsed,
        output,
    ))
}

fn validate(input: &WaccInput) -> DcfResult<()> {
    let non_negative = [
        ("risk_free_rate", input.risk_free_rate),
        ("equity_risk_premium", input.equity_risk_premium),
        ("cost_of_debt", input.cost_of_debt),
        ("equity_weight", input.equity_weight),
        ("debt_weight", input.debt_weight),
    ];
    for (field, value) in non_negative {
        if value < Decimal::ZERO {
            return Err(DcfError::InvalidInput {
                field: field.into(),
                reason: format!("Cannot be negative, got {value}"),
            });
        }
    }
    if input.beta <= Decimal::ZERO {
        return Err(DcfError::InvalidInput {
            field: "beta".into(),
            reason: "Beta must be positive".into(),
        });
    }
    if input.tax_rate < Decimal::ZERO || input.tax_rate >= Decimal::ONE {
        return Err(DcfError::InvalidInput {
            field: "tax_rate".into(),
            reason: "Tax rate must be in [0, 1)".into(),
        });
    }
    let weight_sum = input.equity_weight + input.debt_weight;
    if (weight_sum - Decimal::ONE).abs() > dec!(0.01) {
        return Err(DcfError::InvalidInput {
            field: "equity_weight + debt_weight".into(),
            reason: format!("Capital structure weights must sum to 1.0, got {weight_sum}"),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn sample_input() -> WaccInput {
        WaccInput {
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
        }
    }

    #[test]
    fn test_capm_wacc() {
        let out = calculate_wacc(&sample_input()).unwrap().result;
        // Ke = 0.04 + 1.1 * 0.05 = 0.095
        assert_eq!(out.cost_of_equity, dec!(0.095));
        // Kd_at = 0.05 * 0.75 = 0.0375
        assert_eq!(out.after_tax_cost_of_debt, dec!(0.0375));
        // 0.7 * 0.095 + 0.3 * 0.0375 = 0.0665 + 0.01125
        assert_eq!(out.wacc, dec!(0.07775));
    }

    #[test]
    fn test_premiums_add_to_cost_of_equity() {
        let mut input = sample_input();
        input.size_premium = Some(dec!(0.01));
        input.country_risk_premium = Some(dec!(0.02));
        let out = calculate_wacc(&input).unwrap().result;
        assert_eq!(out.cost_of_equity, dec!(0.125));
    }

    #[test]
    fn test_weights_must_sum_to_one() {
        let mut input = sample_input();
        input.debt_weight = dec!(0.5);
        match calculate_wacc(&input).unwrap_err() {
            DcfError::InvalidInput { field, .. } => assert!(field.contains("weight")),
            e => panic!("Expected InvalidInput, got {e:?}"),
        }
    }

    #[test]
    fn test_zero_beta_rejected() {
        let mut input = sample_input();
        input.beta = Decimal::ZERO;
        assert!(calculate_wacc(&input).is_err());
    }

    #[test]
    fn test_high_beta_warning() {
        let mut input = sample_input();
        input.beta = dec!(3.5);
        let result = calculate_wacc(&input).unwrap();
        assert!(result.warnings.iter().any(|w| w.contains("High beta")));
    }
}
