//! Seams to the collaborators the engine does not own: where historical
//! statements come from, who picks the assumptions, and how results are shown.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::assumptions::set::AssumptionInput;
use crate::historical::metrics::DerivedMetrics;
use crate::historical::period::HistoricalPeriod;
use crate::pipeline::ValuationReport;
use crate::types::{ComputationOutput, Currency, Money};
use crate::valuation::sensitivity::SensitivityAxes;
use crate::DcfResult;

/// Everything the data-retrieval side supplies for one company.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompanySnapshot {
    pub symbol: String,
    #[serde(default)]
    pub currency: Currency,
    /// Chronological, oldest first
    pub periods: Vec<HistoricalPeriod>,
    pub shares_outstanding: Decimal,
    /// Total debt minus cash
    pub net_debt: Money,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_price: Option<Money>,
}

/// Supplies historical statements and balance-sheet inputs.
pub trait HistoricalDataSource {
    fn fetch(&self, symbol: &str) -> DcfResult<CompanySnapshot>;
}

/// Chooses the assumptions for a run, usually after looking at the history.
pub trait AssumptionCollector {
    fn collect(
        &self,
        snapshot: &CompanySnapshot,
        metrics: &DerivedMetrics,
    ) -> DcfResult<AssumptionInput>;

    fn sensitivity_axes(&self) -> SensitivityAxes {
        SensitivityAxes::default()
    }
}

/// Presents a finished valuation.
pub trait ResultRenderer {
    fn render(&self, report: &ComputationOutput<ValuationReport>) -> DcfResult<()>;
}
