use colored::Colorize;
use rust_decimal::Decimal;
use serde_json::{Map, Value};
use tabled::{builder::Builder, Table};

use dcf_valuation_core::types::ComputationOutput;
use dcf_valuation_core::valuation::sensitivity::SensitivityGrid;
use dcf_valuation_core::ValuationReport;

/// Format output as a table using the tabled crate.
pub fn print_table(value: &Value) {
    match value {
        Value::Object(map) => {
            if let Some(result) = map.get("result") {
                print_result_table(result, map);
            } else {
                print_flat_object(map);
            }
        }
        Value::Array(arr) => print_array_table(arr),
        _ => println!("{value}"),
    }
}

/// Summary, forecast, sensitivity grid and warnings of one valuation.
pub fn print_report(report: &ComputationOutput<ValuationReport>) {
    let r = &report.result;
    let v = &r.valuation;

    println!(
        "{} {} ({} scenario)",
        r.symbol.bold(),
        format!("{:?}", r.currency).dimmed(),
        r.scenario
    );

    let mut summary = Builder::default();
    summary.push_record(["Field", "Value"]);
    let rows: Vec<(&str, String)> = vec![
        ("PV of FCFF", money(v.present_value_fcff)),
        ("Terminal value", money(v.terminal_value)),
        ("PV of terminal value", money(v.present_value_terminal)),
        ("Enterprise value", money(v.enterprise_value)),
        ("Net debt", money(v.net_debt)),
        ("Equity value", money(v.equity_value)),
        ("Shares outstanding", money(v.shares_outstanding)),
        ("Intrinsic price / share", money(v.intrinsic_price_per_share)),
        ("WACC", pct(v.wacc)),
        ("Terminal growth", pct(v.terminal_growth_rate)),
        ("Terminal value % of EV", pct(v.terminal_value_pct)),
    ];
    for (field, val) in rows {
        summary.push_record([field.to_string(), val]);
    }
    if let Some(m) = v.implied_exit_multiple {
        summary.push_record(["Implied EV/EBITDA".to_string(), format!("{}x", m.round_dp(1))]);
    }
    if let Some(ref check) = v.exit_multiple_check {
        summary.push_record([
            format!("EV at {}x exit", check.exit_multiple),
            money(check.enterprise_value),
        ]);
    }
    if let Some(price) = r.current_price {
        summary.push_record(["Current price".to_string(), money(price)]);
    }
    if let Some(up) = r.upside {
        summary.push_record(["Upside".to_string(), pct(up)]);
    }
    println!("{}", Table::from(summary));

    let mut forecast = Builder::default();
    forecast.push_record([
        "Year", "Revenue", "EBITDA", "EBIT", "NOPAT", "D&A", "CapEx", "dNWC", "FCFF", "DF", "PV FCFF",
    ]);
    for (year, disc) in r.forecast.iter().zip(&v.discount_schedule) {
        let label = year
            .fiscal_year
            .map(|fy| fy.to_string())
            .unwrap_or_else(|| format!("Y{}", year.year_index));
        forecast.push_record([
            label,
            money(year.revenue),
            money(year.ebitda),
            money(year.ebit),
            money(year.nopat),
            money(year.da),
            money(year.capex),
            money(year.delta_nwc),
            money(year.fcff),
            disc.discount_factor.round_dp(4).to_string(),
            money(disc.pv_fcff),
        ]);
    }
    println!("\nForecast:\n{}", Table::from(forecast));

    println!("\nPrice per share by WACC (rows) and terminal growth (columns):");
    print_grid(&v.sensitivity_grid);

    print_warnings(&report.warnings);
}

fn print_grid(grid: &SensitivityGrid) {
    let mut builder = Builder::default();
    let mut header = vec!["WACC \\ g".to_string()];
    header.extend(grid.growth_values.iter().map(|g| pct(*g)));
    builder.push_record(header);

    for (i, w) in grid.wacc_values.iter().enumerate() {
        let mut row = vec![pct(*w)];
        for (j, cell) in grid.cells[i].iter().enumerate() {
            let text = match cell {
                Some(c) => money(c.price_per_share),
                None => "N/A".to_string(),
            };
            if grid.base_position == Some((i, j)) {
                row.push(format!("[{text}]"));
            } else {
                row.push(text);
            }
        }
        builder.push_record(row);
    }
    println!("{}", Table::from(builder));
}

fn print_result_table(result: &Value, envelope: &Map<String, Value>) {
    match result {
        Value::Object(res_map) => {
            if let Ok(grid) = serde_json::from_value::<SensitivityGrid>(result.clone()) {
                print_grid(&grid);
            } else {
                print_flat_object(res_map);
                // Lists of records (forecast years, scenario rows) get their own table
                for (key, val) in res_map {
                    if let Value::Array(items) = val {
                        if items.first().is_some_and(Value::is_object) {
                            println!("\n{key}:");
                            print_array_table(items);
                        }
                    }
                }
            }
        }
        other => println!("{}", format_value(other)),
    }

    if let Some(Value::Array(warnings)) = envelope.get("warnings") {
        let lines: Vec<String> = warnings
            .iter()
            .filter_map(|w| w.as_str().map(str::to_string))
            .collect();
        print_warnings(&lines);
    }

    if let Some(Value::String(meth)) = envelope.get("methodology") {
        println!("\nMethodology: {meth}");
    }
}

fn print_flat_object(map: &Map<String, Value>) {
    let mut builder = Builder::default();
    builder.push_record(["Field", "Value"]);
    for (key, val) in map {
        match val {
            Value::Array(items) if items.first().is_some_and(Value::is_object) => continue,
            // One level of nesting is flattened, e.g. ebit_margin.mean
            Value::Object(inner) => {
                for (sub, v) in inner {
                    builder.push_record([format!("{key}.{sub}"), format_value(v)]);
                }
            }
            _ => builder.push_record([key.clone(), format_value(val)]),
        }
    }
    println!("{}", Table::from(builder));
}

fn print_array_table(arr: &[Value]) {
    if arr.is_empty() {
        println!("(empty)");
        return;
    }

    if let Some(Value::Object(first)) = arr.first() {
        let headers: Vec<String> = first.keys().cloned().collect();
        let mut builder = Builder::default();
        builder.push_record(&headers);

        for item in arr {
            if let Value::Object(map) = item {
                let row: Vec<String> = headers
                    .iter()
                    .map(|h| map.get(h.as_str()).map(format_value).unwrap_or_default())
                    .collect();
                builder.push_record(row);
            }
        }
        println!("{}", Table::from(builder));
    } else {
        for item in arr {
            println!("{}", format_value(item));
        }
    }
}

fn print_warnings(warnings: &[String]) {
    if warnings.is_empty() {
        return;
    }
    println!("\n{}", "Warnings:".yellow().bold());
    for w in warnings {
        println!("  - {w}");
    }
}

fn money(v: Decimal) -> String {
    v.round_dp(2).to_string()
}

fn pct(v: Decimal) -> String {
    format!("{}%", (v * Decimal::ONE_HUNDRED).round_dp(2).normalize())
}

fn format_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "N/A".to_string(),
        Value::Array(arr) => {
            let items: Vec<String> = arr.iter().map(format_value).collect();
            items.join(", ")
        }
        Value::Object(_) => serde_json::to_string(value).unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_percent_formatting() {
        assert_eq!(pct(dec!(0.0775)), "7.75%");
        assert_eq!(pct(dec!(0.1)), "10%");
        assert_eq!(pct(dec!(-0.0125)), "-1.25%");
    }

    #[test]
    fn test_null_cells_render_as_na() {
        let v: Value = serde_json::json!([null, "1.5", ["0.1", null]]);
        assert_eq!(format_value(&v), "N/A, 1.5, 0.1, N/A");
    }
}
