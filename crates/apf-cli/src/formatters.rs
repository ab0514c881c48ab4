//! Output formatters for CLI commands.
//!
//! Every command builds a serializable result and hands it to
//! [`format_output`], so the three output modes always carry the same data.

use anyhow::Result;
use apf_core::cli::OutputFormat;
use serde::Serialize;

/// Formats `data` according to `format`.
///
/// # Errors
///
/// Returns an error if `data` cannot be serialized.
///
/// # Examples
///
/// ```
/// use apf_cli::formatters::format_output;
/// use apf_core::cli::OutputFormat;
/// use serde::Serialize;
///
/// #[derive(Serialize)]
/// struct Installed {
///     package_id: String,
///     version: u64,
/// }
///
/// let result = Installed {
///     package_id: "com.x.plugin".to_string(),
///     version: 2,
/// };
///
/// let output = format_output(&result, OutputFormat::Text)?;
/// assert_eq!(output, "package_id=com.x.plugin\nversion=2");
/// # Ok::<(), anyhow::Error>(())
/// ```
pub fn format_output<T: Serialize>(data: &T, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => json::format(data),
        OutputFormat::Text => text::format(data),
        OutputFormat::Pretty => pretty::format(data),
    }
}

/// JSON output formatting.
pub mod json {
    use super::{Result, Serialize};

    /// Formats data as indented JSON.
    pub fn format<T: Serialize>(data: &T) -> Result<String> {
        Ok(serde_json::to_string_pretty(data)?)
    }
}

/// Line-oriented `key=value` output for scripts.
pub mod text {
    use super::{Result, Serialize};
    use serde_json::Value;

    /// Flattens data into one `path=value` line per scalar.
    ///
    /// Nested keys are joined with `.`, array elements use their index.
    /// Empty arrays and objects produce no lines.
    pub fn format<T: Serialize>(data: &T) -> Result<String> {
        let value = serde_json::to_value(data)?;
        let mut lines = Vec::new();
        flatten(&value, "", &mut lines);
        Ok(lines.join("\n"))
    }

    fn flatten(value: &Value, path: &str, lines: &mut Vec<String>) {
        let child = |key: &str| {
            if path.is_empty() {
                key.to_string()
            } else {
                format!("{path}.{key}")
            }
        };

        match value {
            Value::Object(map) => {
                for (key, val) in map {
                    flatten(val, &child(key), lines);
                }
            }
            Value::Array(items) => {
                for (i, item) in items.iter().enumerate() {
                    flatten(item, &child(&i.to_string()), lines);
                }
            }
            Value::String(s) => lines.push(format!("{path}={s}")),
            Value::Null => lines.push(format!("{path}=")),
            scalar => lines.push(format!("{path}={scalar}")),
        }
    }
}

/// Pretty (human-readable) output formatting.
pub mod pretty {
    use super::{Result, Serialize};
    use colored::Colorize;
    use serde_json::Value;

    /// Formats data as a colorized, indented tree.
    pub fn format<T: Serialize>(data: &T) -> Result<String> {
        let value = serde_json::to_value(data)?;
        let mut lines = Vec::new();
        match &value {
            Value::Object(_) | Value::Array(_) => render(&value, 0, &mut lines),
            scalar => lines.push(scalar_text(scalar)),
        }
        Ok(lines.join("\n"))
    }

    fn render(value: &Value, indent: usize, lines: &mut Vec<String>) {
        let pad = "  ".repeat(indent);
        match value {
            Value::Object(map) => {
                for (key, val) in map {
                    let key = key.blue().bold();
                    if is_nested(val) {
                        lines.push(format!("{pad}{key}:"));
                        render(val, indent + 1, lines);
                    } else {
                        lines.push(format!("{pad}{key}: {}", scalar_text(val)));
                    }
                }
            }
            Value::Array(items) => {
                for item in items {
                    if is_nested(item) {
                        lines.push(format!("{pad}-"));
                        render(item, indent + 1, lines);
                    } else {
                        lines.push(format!("{pad}- {}", scalar_text(item)));
                    }
                }
            }
            scalar => lines.push(format!("{pad}{}", scalar_text(scalar))),
        }
    }

    fn is_nested(value: &Value) -> bool {
        match value {
            Value::Object(map) => !map.is_empty(),
            Value::Array(items) => !items.is_empty(),
            _ => false,
        }
    }

    fn scalar_text(value: &Value) -> String {
        match value {
            Value::Null => "-".dimmed().to_string(),
            Value::Bool(b) => b.to_string().yellow().to_string(),
            Value::Number(n) => n.to_string().cyan().to_string(),
            Value::String(s) => s.green().to_string(),
            Value::Array(_) => "[]".dimmed().to_string(),
            Value::Object(_) => "{}".dimmed().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_json_round_trips() {
        let data = json!({"package_id": "com.x.plugin", "version": 2});
        let output = format_output(&data, OutputFormat::Json).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(parsed, data);
    }

    #[test]
    fn test_text_flattens_nested_values() {
        let data = json!({
            "plugins": [
                {"package_id": "a", "capabilities": ["greet", "wave"]},
                {"package_id": "b", "description": null}
            ],
            "failed": []
        });

        let output = format_output(&data, OutputFormat::Text).unwrap();
        let lines: Vec<_> = output.lines().collect();
        assert!(lines.contains(&"plugins.0.package_id=a"));
        assert!(lines.contains(&"plugins.0.capabilities.1=wave"));
        assert!(lines.contains(&"plugins.1.description="));
        assert!(!output.contains("failed"));
    }

    #[test]
    fn test_pretty_contains_keys_and_values() {
        colored::control::set_override(false);
        let data = json!({
            "package_id": "com.x.plugin",
            "capabilities": [{"id": "greet"}],
            "failed": []
        });

        let output = format_output(&data, OutputFormat::Pretty).unwrap();
        assert!(output.contains("package_id: com.x.plugin"));
        assert!(output.contains("capabilities:\n  -\n    id: greet"));
        assert!(output.contains("failed: []"));
    }

    #[test]
    fn test_pretty_scalar() {
        colored::control::set_override(false);
        assert_eq!(format_output(&3, OutputFormat::Pretty).unwrap(), "3");
    }
}
