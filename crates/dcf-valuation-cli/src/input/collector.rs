use clap::Args;
use rust_decimal::Decimal;

use dcf_valuation_core::assumptions::scenario::Scenario;
use dcf_valuation_core::assumptions::set::AssumptionInput;
use dcf_valuation_core::historical::metrics::DerivedMetrics;
use dcf_valuation_core::interfaces::{AssumptionCollector, CompanySnapshot};
use dcf_valuation_core::time_value::DiscountConvention;
use dcf_valuation_core::valuation::sensitivity::SensitivityAxes;
use dcf_valuation_core::DcfResult;

/// Command-line overrides layered on top of file assumptions.
#[derive(Args, Debug, Clone, Default)]
#[command(allow_hyphen_values = true)]
pub struct AssumptionFlags {
    /// Scenario preset: base, bull, bear or custom
    #[arg(long)]
    pub scenario: Option<Scenario>,

    /// Discount rate (e.g. 0.09 for 9%)
    #[arg(long)]
    pub wacc: Option<Decimal>,

    /// Perpetual growth rate after the forecast horizon
    #[arg(long)]
    pub terminal_growth: Option<Decimal>,

    /// Explicit forecast years
    #[arg(long)]
    pub horizon: Option<u32>,

    /// Flat revenue growth for every forecast year
    #[arg(long)]
    pub growth: Option<Decimal>,

    /// Flat EBIT margin for every forecast year
    #[arg(long)]
    pub ebit_margin: Option<Decimal>,

    /// Flat EBITDA margin; EBIT becomes EBITDA less D&A unless --ebit-margin is set
    #[arg(long)]
    pub ebitda_margin: Option<Decimal>,

    /// Forecast EBIT from the historical EBITDA margin
    #[arg(long)]
    pub use_ebitda_margin: bool,

    /// Marginal tax rate
    #[arg(long)]
    pub tax_rate: Option<Decimal>,

    /// EV/EBITDA multiple for the terminal value cross-check
    #[arg(long)]
    pub exit_multiple: Option<Decimal>,

    /// Discount explicit-period cash flows at mid-year
    #[arg(long)]
    pub mid_year: bool,
}

impl AssumptionFlags {
    /// Overwrite whatever the flags set; leave the rest untouched.
    pub fn apply(&self, input: &mut AssumptionInput) {
        if let Some(s) = self.scenario {
            input.scenario = s;
        }
        if let Some(w) = self.wacc {
            input.wacc = Some(w);
            input.wacc_input = None;
        }
        if let Some(g) = self.terminal_growth {
            input.terminal_growth_rate = Some(g);
        }
        if let Some(h) = self.horizon {
            input.forecast_horizon_years = Some(h);
        }
        if let Some(g) = self.growth {
            input.revenue_growth = Some(g.into());
        }
        if let Some(m) = self.ebit_margin {
            input.ebit_margin = Some(m.into());
        }
        if let Some(m) = self.ebitda_margin {
            input.ebitda_margin = Some(m.into());
        }
        if self.use_ebitda_margin {
            input.use_ebitda_margin = true;
        }
        if let Some(t) = self.tax_rate {
            input.tax_rate = Some(t);
        }
        if let Some(m) = self.exit_multiple {
            input.exit_multiple = Some(m);
        }
        if self.mid_year {
            input.discounting = Some(DiscountConvention::MidYear);
        }
    }
}

/// Collects assumptions from an optional file plus command-line flags.
pub struct FlagCollector {
    base: AssumptionInput,
    flags: AssumptionFlags,
    axes: SensitivityAxes,
}

impl FlagCollector {
    pub fn new(base: Option<AssumptionInput>, flags: AssumptionFlags, axes: SensitivityAxes) -> Self {
        Self {
            base: base.unwrap_or_default(),
            flags,
            axes,
        }
    }
}

impl AssumptionCollector for FlagCollector {
    fn collect(&self, snapshot: &CompanySnapshot, metrics: &DerivedMetrics) -> DcfResult<AssumptionInput> {
        let mut input = self.base.clone();
        self.flags.apply(&mut input);
        tracing::debug!(
            symbol = %snapshot.symbol,
            periods = metrics.periods_used,
            scenario = %input.scenario,
            "assumptions collected"
        );
        Ok(input)
    }

    fn sensitivity_axes(&self) -> SensitivityAxes {
        self.axes.clone()
    }
}
