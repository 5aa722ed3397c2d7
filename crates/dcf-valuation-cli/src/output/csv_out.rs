use serde_json::Value;
use std::io::{self, Write};

use dcf_valuation_core::types::ComputationOutput;
use dcf_valuation_core::valuation::sensitivity::SensitivityGrid;
use dcf_valuation_core::ValuationReport;

/// Write output as CSV to stdout.
pub fn print_csv(value: &Value) {
    let stdout = io::stdout();
    let mut wtr = csv::Writer::from_writer(stdout.lock());

    match value {
        Value::Object(map) => match map.get("result") {
            Some(result @ Value::Object(fields)) => {
                if let Ok(grid) = serde_json::from_value::<SensitivityGrid>(result.clone()) {
                    write_grid(&mut wtr, &grid);
                } else if let Some(Value::Array(rows)) = fields.get("scenarios") {
                    write_array_csv(&mut wtr, rows);
                } else {
                    write_fields(&mut wtr, fields.iter());
                }
            }
            _ => write_fields(&mut wtr, map.iter()),
        },
        Value::Array(arr) => write_array_csv(&mut wtr, arr),
        _ => {
            let _ = wtr.write_record([&format_csv_value(value)]);
        }
    }

    let _ = wtr.flush();
}

/// Forecast rows joined with their discounting, one line per year.
pub fn print_report(report: &ComputationOutput<ValuationReport>) {
    let stdout = io::stdout();
    let mut wtr = csv::Writer::from_writer(stdout.lock());
    let _ = write_report(&mut wtr, report);
    let _ = wtr.flush();
}

fn write_report<W: Write>(
    wtr: &mut csv::Writer<W>,
    report: &ComputationOutput<ValuationReport>,
) -> csv::Result<()> {
    wtr.write_record([
        "year_index",
        "fiscal_year",
        "revenue",
        "ebitda",
        "ebit",
        "nopat",
        "da",
        "capex",
        "delta_nwc",
        "fcff",
        "discount_factor",
        "pv_fcff",
    ])?;

    let valuation = &report.result.valuation;
    for (year, disc) in report
        .result
        .forecast
        .iter()
        .zip(&valuation.discount_schedule)
    {
        wtr.write_record([
            year.year_index.to_string(),
            year.fiscal_year.map(|fy| fy.to_string()).unwrap_or_default(),
            year.revenue.to_string(),
            year.ebitda.to_string(),
            year.ebit.to_string(),
            year.nopat.to_string(),
            year.da.to_string(),
            year.capex.to_string(),
            year.delta_nwc.to_string(),
            year.fcff.to_string(),
            disc.discount_factor.to_string(),
            disc.pv_fcff.to_string(),
        ])?;
    }
    Ok(())
}

/// First column is WACC, then one price column per terminal growth rate.
/// Undefined cells are left empty.
fn write_grid<W: Write>(wtr: &mut csv::Writer<W>, grid: &SensitivityGrid) {
    let mut header = vec!["wacc".to_string()];
    header.extend(grid.growth_values.iter().map(|g| g.to_string()));
    let _ = wtr.write_record(&header);

    for (w, row) in grid.wacc_values.iter().zip(&grid.cells) {
        let mut record = vec![w.to_string()];
        record.extend(row.iter().map(|cell| {
            cell.as_ref()
                .map(|c| c.price_per_share.to_string())
                .unwrap_or_default()
        }));
        let _ = wtr.write_record(&record);
    }
}

fn write_fields<'a, W: Write>(
    wtr: &mut csv::Writer<W>,
    fields: impl Iterator<Item = (&'a String, &'a Value)>,
) {
    let _ = wtr.write_record(["field", "value"]);
    for (key, val) in fields {
        let _ = wtr.write_record([key.as_str(), &format_csv_value(val)]);
    }
}

fn write_array_csv<W: Write>(wtr: &mut csv::Writer<W>, arr: &[Value]) {
    if arr.is_empty() {
        return;
    }

    if let Some(Value::Object(first)) = arr.first() {
        let headers: Vec<&str> = first.keys().map(|k| k.as_str()).collect();
        let _ = wtr.write_record(&headers);

        for item in arr {
            if let Value::Object(map) = item {
                let row: Vec<String> = headers
                    .iter()
                    .map(|h| map.get(*h).map(format_csv_value).unwrap_or_default())
                    .collect();
                let _ = wtr.write_record(&row);
            }
        }
    } else {
        for item in arr {
            let _ = wtr.write_record([&format_csv_value(item)]);
        }
    }
}

fn format_csv_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        _ => serde_json::to_string(value).unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dcf_valuation_core::valuation::sensitivity::SensitivityCell;
    use rust_decimal_macros::dec;

    #[test]
    fn test_grid_leaves_undefined_cells_empty() {
        let grid = SensitivityGrid {
            wacc_values: vec![dec!(0.03), dec!(0.10)],
            growth_values: vec![dec!(0.03)],
            cells: vec![
                vec![None],
                vec![Some(SensitivityCell {
                    enterprise_value: dec!(1500),
                    equity_value: dec!(1400),
                    price_per_share: dec!(14),
                })],
            ],
            base_position: Some((1, 0)),
        };

        let mut wtr = csv::Writer::from_writer(Vec::new());
        write_grid(&mut wtr, &grid);
        let text = String::from_utf8(wtr.into_inner().unwrap()).unwrap();
        assert_eq!(text, "wacc,0.03\n0.03,\n0.10,14\n");
    }
}
