pub mod metrics;
pub mod scenarios;
pub mod valuation;
