use clap::Args;
use serde_json::Value;

use dcf_valuation_core::historical::metrics::{derive_metrics, DerivationOptions};
use dcf_valuation_core::interfaces::{CompanySnapshot, HistoricalDataSource};
use dcf_valuation_core::EngineConfig;

use crate::input;
use crate::input::source::{CompanyFile, FileSource};

/// Arguments for historical driver derivation
#[derive(Args)]
pub struct MetricsArgs {
    /// Company file (JSON or YAML); reads stdin when neither this nor --symbol is given
    #[arg(long, conflicts_with = "symbol")]
    pub input: Option<String>,

    /// Look the company up in --data-dir
    #[arg(long)]
    pub symbol: Option<String>,

    /// Directory holding <SYMBOL>.json / .yaml company files
    #[arg(long, default_value = ".")]
    pub data_dir: String,

    /// Only use the most recent N periods
    #[arg(long)]
    pub lookback: Option<usize>,
}

pub fn run_metrics(args: MetricsArgs, config: &EngineConfig) -> Result<Value, Box<dyn std::error::Error>> {
    let company: CompanySnapshot = if let Some(ref symbol) = args.symbol {
        FileSource::new(&args.data_dir).fetch(symbol)?
    } else if let Some(ref path) = args.input {
        input::file::read_structured::<CompanyFile>(path)?.try_into()?
    } else if let Some(file) = input::stdin::read_stdin::<CompanyFile>()? {
        file.try_into()?
    } else {
        return Err("--input or --symbol is required for metrics".into());
    };

    let options = DerivationOptions {
        lookback: args.lookback.or(config.derivation.lookback),
    };
    let result = derive_metrics(&company.periods, &options)?;
    Ok(serde_json::to_value(result)?)
}
