//! Command-line parameter parsing
//!
//! Converts `name=value` pairs into typed template parameters using the
//! template's declared parameter types.

use std::collections::BTreeMap;

use chado_engine::query::{ParamType, ParamValue, QueryTemplate};

use crate::error::{CliError, Result};

/// Parse `name=value` pairs against a template's declared parameters.
///
/// Values are coerced to the declared type; unknown names and missing
/// parameters are left for the engine's own validation to report.
pub fn parse_params(
    template: &QueryTemplate,
    pairs: &[String],
) -> Result<BTreeMap<String, ParamValue>> {
    let declared: BTreeMap<&str, ParamType> = template.parameters().collect();

    let mut params = BTreeMap::new();
    for pair in pairs {
        let Some((name, raw)) = pair.split_once('=') else {
            return Err(CliError::invalid_argument(format!(
                "'{}' is not a name=value pair",
                pair
            )));
        };

        let value = match declared.get(name) {
            Some(ParamType::Integer) => {
                let parsed = raw.parse::<i64>().map_err(|_| {
                    CliError::invalid_argument(format!(
                        "parameter '{}' expects an integer, got '{}'",
                        name, raw
                    ))
                })?;
                ParamValue::Integer(parsed)
            },
            Some(ParamType::Boolean) => match raw.to_ascii_lowercase().as_str() {
                "t" | "true" | "1" => ParamValue::Boolean(true),
                "f" | "false" | "0" => ParamValue::Boolean(false),
                _ => {
                    return Err(CliError::invalid_argument(format!(
                        "parameter '{}' expects a boolean, got '{}'",
                        name, raw
                    )))
                },
            },
            // Unknown names stay text; the engine reports them with
            // template context.
            Some(ParamType::Text) | None => ParamValue::Text(raw.to_string()),
        };
        params.insert(name.to_string(), value);
    }
    Ok(params)
}
