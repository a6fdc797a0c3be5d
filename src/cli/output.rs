//! Output formatting for CLI commands.

use serde::Serialize;
use serde_json::Value;

use crate::cli::args::{OutputFormat, TermSyncArgs};
use crate::error::Result;

/// Output a result in the specified format.
pub fn output_result<T: Serialize>(message: &str, result: &T, args: &TermSyncArgs) -> Result<()> {
    println!("{}", render(message, result, args)?);
    Ok(())
}

/// Render a result the way [`output_result`] prints it.
pub fn render<T: Serialize>(message: &str, result: &T, args: &TermSyncArgs) -> Result<String> {
    match args.output_format {
        OutputFormat::Json if args.pretty => Ok(serde_json::to_string_pretty(result)?),
        OutputFormat::Json => Ok(serde_json::to_string(result)?),
        OutputFormat::Human => render_human(message, &serde_json::to_value(result)?, args),
    }
}

fn render_human(message: &str, value: &Value, args: &TermSyncArgs) -> Result<String> {
    let mut lines = Vec::new();
    if args.verbosity() > 0 {
        lines.push(message.to_string());
    }
    match value.as_object() {
        Some(fields) => {
            for (name, field) in fields {
                let shown = match field {
                    Value::String(text) => text.clone(),
                    Value::Array(items) if items.iter().all(|item| !item.is_object()) => items
                        .iter()
                        .map(|item| item.as_str().map(str::to_string).unwrap_or_else(|| item.to_string()))
                        .collect::<Vec<_>>()
                        .join(", "),
                    other => other.to_string(),
                };
                lines.push(format!("  {name}: {shown}"));
            }
        }
        None => lines.push(value.to_string()),
    }
    Ok(lines.join("\n"))
}
