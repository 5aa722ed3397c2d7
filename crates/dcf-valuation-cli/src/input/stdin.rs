use serde::de::DeserializeOwned;
use std::io::{self, Read};

/// Deserialize piped stdin (JSON, falling back to YAML).
/// Returns None if stdin is a TTY or empty.
pub fn read_stdin<T: DeserializeOwned>() -> Result<Option<T>, Box<dyn std::error::Error>> {
    if atty::is(atty::Stream::Stdin) {
        return Ok(None);
    }

    let mut buffer = String::new();
    io::stdin().read_to_string(&mut buffer)?;
    parse_piped(&buffer)
}

fn parse_piped<T: DeserializeOwned>(buffer: &str) -> Result<Option<T>, Box<dyn std::error::Error>> {
    let trimmed = buffer.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    if trimmed.starts_with('{') || trimmed.starts_with('[') {
        return Ok(Some(serde_json::from_str(trimmed)?));
    }
    Ok(Some(serde_yaml::from_str(trimmed)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use dcf_valuation_core::valuation::sensitivity::SensitivityAxes;
    use rust_decimal_macros::dec;

    #[test]
    fn test_empty_input_is_none() {
        assert!(parse_piped::<SensitivityAxes>("  \n").unwrap().is_none());
    }

    #[test]
    fn test_json_and_yaml() {
        let json: SensitivityAxes = parse_piped(r#"{"wacc_values": ["0.08", "0.1"]}"#)
            .unwrap()
            .unwrap();
        assert_eq!(json.wacc_values, Some(vec![dec!(0.08), dec!(0.1)]));

        let yaml: SensitivityAxes = parse_piped("growth_values:\n  - \"0.02\"\n")
            .unwrap()
            .unwrap();
        assert_eq!(yaml.growth_values, Some(vec![dec!(0.02)]));
    }
}
