use serde_json::Value;

/// Print just the headline number of a command's output.
///
/// Looks for well-known result fields in priority order, then falls back
/// to the first field in the result object.
pub fn print_minimal(value: &Value) {
    let result_obj = value
        .as_object()
        .and_then(|m| m.get("result"))
        .unwrap_or(value);
    println!("{}", headline(result_obj));
}

fn headline(result: &Value) -> String {
    let priority_keys = [
        "intrinsic_price_per_share",
        "wacc",
        "enterprise_value",
        "equity_value",
        "revenue_cagr",
    ];

    if let Value::Object(map) = result {
        for key in &priority_keys {
            if let Some(val) = map.get(*key) {
                if !val.is_null() {
                    return format_minimal(val);
                }
            }
        }

        // Scenario comparison: one price per scenario
        if let Some(Value::Array(rows)) = map.get("scenarios") {
            return rows
                .iter()
                .map(|row| {
                    format!(
                        "{}: {}",
                        row.get("scenario").map(format_minimal).unwrap_or_default(),
                        row.get("intrinsic_price_per_share")
                            .map(format_minimal)
                            .unwrap_or_default()
                    )
                })
                .collect::<Vec<_>>()
                .join("\n");
        }

        if let Some((key, val)) = map.iter().next() {
            return format!("{}: {}", key, format_minimal(val));
        }
    }

    format_minimal(result)
}

fn format_minimal(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "null".to_string(),
        _ => serde_json::to_string(value).unwrap_or_default(),
    }
}
