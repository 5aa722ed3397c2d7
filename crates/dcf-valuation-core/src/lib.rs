pub mod assumptions;
pub mod config;
pub mod error;
pub mod historical;
pub mod interfaces;
pub mod pipeline;
pub mod time_value;
pub mod types;
pub mod valuation;

pub use config::EngineConfig;
pub use error::DcfError;
pub use pipeline::{compare_scenarios, run_valuation, value_company, ValuationReport, ValuationRequest};
pub use types::*;

/// Standard result type for all valuation operations
pub type DcfResult<T> = Result<T, DcfError>;
