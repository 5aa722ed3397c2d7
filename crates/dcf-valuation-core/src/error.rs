use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DcfError {
    #[error("Insufficient history: {0}")]
    InsufficientHistory(String),

    #[error("Division by zero in {context}")]
    DivisionByZero { context: String },

    #[error("Arithmetic overflow in {context}: result exceeds the decimal range")]
    Overflow { context: String },

    #[error("Invalid assumptions: {field} — {reason}")]
    InvalidAssumptions { field: String, reason: String },

    #[error("Assumption length mismatch: {driver} has {actual} values, forecast horizon is {expected} years")]
    AssumptionLengthMismatch {
        driver: String,
        expected: usize,
        actual: usize,
    },

    #[error("Invalid terminal assumption: WACC ({wacc}) must exceed terminal growth rate ({terminal_growth})")]
    InvalidTerminalAssumption {
        wacc: Decimal,
        terminal_growth: Decimal,
    },

    #[error("Invalid share count: shares outstanding must be positive, got {0}")]
    InvalidShareCount(Decimal),

    #[error("Invalid input: {field} — {reason}")]
    InvalidInput { field: String, reason: String },

    #[error("Data source error: {0}")]
    DataSource(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<serde_json::Error> for DcfError {
    fn from(e: serde_json::Error) -> Self {
        DcfError::SerializationError(e.to_string())
    }
}
