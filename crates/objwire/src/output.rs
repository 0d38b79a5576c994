use std::io::{IsTerminal, Write};
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;
use serde_json::Value;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct ValueOutput<'a> {
    peer: &'a str,
    kind: &'static str,
    encrypted: bool,
    value: &'a Value,
    timestamp: String,
}

/// Print one received value.
pub fn print_value(value: &Value, peer: &str, encrypted: bool, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = ValueOutput {
                peer,
                kind: value_kind(value),
                encrypted,
                value,
                timestamp: now_unix_seconds(),
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["PEER", "KIND", "ENCRYPTED", "VALUE"])
                .add_row(vec![
                    peer.to_string(),
                    value_kind(value).to_string(),
                    encrypted.to_string(),
                    value.to_string(),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            let body = serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string());
            println!("peer={peer} kind={} encrypted={encrypted}", value_kind(value));
            println!("{body}");
        }
        OutputFormat::Raw => {
            let mut out = std::io::stdout();
            let _ = writeln!(out, "{value}");
            let _ = out.flush();
        }
    }
}

pub fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn kinds() {
        assert_eq!(value_kind(&json!(null)), "null");
        assert_eq!(value_kind(&json!(1.5)), "number");
        assert_eq!(value_kind(&json!({"a": [1]})), "object");
        assert_eq!(value_kind(&json!(["x"])), "array");
    }
}
