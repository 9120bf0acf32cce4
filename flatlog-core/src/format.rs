//! Delimited-line rendering for headers and records
//!
//! Rendering is pure and infallible: any record renders against any
//! schema, with absent fields written as `null`. Separator characters
//! inside field values are not escaped; producers must keep them out.

use crate::types::{Record, Schema};
use serde_json::Value;

/// Render the header row for a schema
pub fn render_header(schema: &Schema, separator: &str) -> String {
    schema.fields().join(separator)
}

/// Render one record as a data line, fields in schema order
pub fn render_line(record: &Record, schema: &Schema, separator: &str) -> String {
    let mut line = String::new();
    for (i, field) in schema.fields().iter().enumerate() {
        if i > 0 {
            line.push_str(separator);
        }
        push_value(&mut line, record.get(field));
    }
    line
}

fn push_value(line: &mut String, value: Option<&Value>) {
    match value {
        None | Some(Value::Null) => line.push_str("null"),
        Some(Value::String(s)) => line.push_str(s),
        // Numbers, booleans, and nested values use their compact JSON form
        Some(other) => line.push_str(&other.to_string()),
    }
}
