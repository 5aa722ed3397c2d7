use rust_decimal::Decimal;
use rust_decimal::MathematicalOps;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::DcfError;
use crate::types::{Money, Rate};
use crate::DcfResult;

/// When within a forecast year a cash flow is assumed to arrive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscountConvention {
    /// Cash flow of year t arrives at t.
    #[default]
    EndOfYear,
    /// Cash flow of year t arrives at t - 0.5.
    MidYear,
}

impl DiscountConvention {
    /// Discount period (in years) applied to the cash flow of `year` (1-based).
    pub fn period(self, year: u32) -> Decimal {
        match self {
            DiscountConvention::EndOfYear => Decimal::from(year),
            DiscountConvention::MidYear => Decimal::from(year) - dec!(0.5),
        }
    }
}

/// Growth of one unit over `year` periods at `rate`: (1 + rate)^period.
///
/// Whole periods are compounded with integer powers so results stay exact;
/// half periods (mid-year) fall back to `powd`.
pub fn compound_factor(rate: Rate, year: u32, convention: DiscountConvention) -> DcfResult<Decimal> {
    if rate <= dec!(-1) {
        return Err(DcfError::InvalidInput {
            field: "rate".into(),
            reason: "Discount rate must be greater than -100%".into(),
        });
    }
    let base = Decimal::ONE + rate;
    let factor = match convention {
        DiscountConvention::EndOfYear => base.checked_powi(i64::from(year)),
        DiscountConvention::MidYear => base.checked_powd(convention.period(year)),
    };
    factor.ok_or_else(|| DcfError::InvalidInput {
        field: "rate".into(),
        reason: format!("Compounding (1 + {rate})^{year} overflows"),
    })
}

/// a * b, or `Overflow` naming `context`.
pub fn checked_product(a: Decimal, b: Decimal, context: &str) -> DcfResult<Decimal> {
    a.checked_mul(b).ok_or_else(|| overflow(context))
}

/// a / b; a zero divisor is `DivisionByZero`, an out-of-range quotient `Overflow`.
pub fn checked_quotient(a: Decimal, b: Decimal, context: &str) -> DcfResult<Decimal> {
    if b.is_zero() {
        return Err(DcfError::DivisionByZero {
            context: context.into(),
        });
    }
    a.checked_div(b).ok_or_else(|| overflow(context))
}

pub fn checked_sum(a: Decimal, b: Decimal, context: &str) -> DcfResult<Decimal> {
    a.checked_add(b).ok_or_else(|| overflow(context))
}

pub fn checked_difference(a: Decimal, b: Decimal, context: &str) -> DcfResult<Decimal> {
    a.checked_sub(b).ok_or_else(|| overflow(context))
}

fn overflow(context: &str) -> DcfError {
    DcfError::Overflow {
        context: context.into(),
    }
}

/// 1 / (1 + rate)^period
pub fn discount_factor(rate: Rate, year: u32, convention: DiscountConvention) -> DcfResult<Decimal> {
    let factor = compound_factor(rate, year, convention)?;
    checked_quotient(Decimal::ONE, factor, &format!("discount factor at year {year}"))
}

/// Present value of `amount` received in `year`.
///
/// Divides by the compound factor rather than multiplying by the rounded
/// discount factor, so e.g. 143 / 1.1 stays exactly 130.
pub fn present_value(
    amount: Money,
    rate: Rate,
    year: u32,
    convention: DiscountConvention,
) -> DcfResult<Money> {
    let factor = compound_factor(rate, year, convention)?;
    checked_quotient(amount, factor, &format!("present value at year {year}"))
}
