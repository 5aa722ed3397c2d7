pub mod csv_out;
pub mod json;
pub mod minimal;
pub mod table;

use dcf_valuation_core::interfaces::ResultRenderer;
use dcf_valuation_core::types::ComputationOutput;
use dcf_valuation_core::{DcfResult, ValuationReport};
use serde_json::Value;

use crate::OutputFormat;

/// Dispatch output to the appropriate formatter.
pub fn format_output(format: &OutputFormat, value: &Value) {
    match format {
        OutputFormat::Json => json::print_json(value),
        OutputFormat::Table => table::print_table(value),
        OutputFormat::Csv => csv_out::print_csv(value),
        OutputFormat::Minimal => minimal::print_minimal(value),
    }
}

/// Prints a finished valuation to stdout in the selected format.
pub struct ReportRenderer {
    format: OutputFormat,
}

impl ReportRenderer {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }
}

impl ResultRenderer for ReportRenderer {
    fn render(&self, report: &ComputationOutput<ValuationReport>) -> DcfResult<()> {
        match self.format {
            OutputFormat::Json => json::print_json(&serde_json::to_value(report)?),
            OutputFormat::Table => table::print_report(report),
            OutputFormat::Csv => csv_out::print_report(report),
            OutputFormat::Minimal => println!(
                "{}",
                report.result.valuation.intrinsic_price_per_share.round_dp(2)
            ),
        }
        Ok(())
    }
}
