//! Core types for flatlog

use serde::{Deserialize, Serialize};
use std::fmt;

/// One structured event to be logged.
///
/// Producers hand records over as JSON objects; the write path extracts
/// the fields named by a [`Schema`] and renders everything else away.
pub type Record = serde_json::Value;

/// Ordered field-name sequence defining a file's header and column order.
///
/// Equality is order-sensitive: two schemas with the same fields in a
/// different order are distinct schema generations and land in distinct
/// candidate files.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Schema {
    fields: Vec<String>,
}

impl Schema {
    /// Create a schema from an ordered list of field names
    pub fn new<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fields: fields.into_iter().map(Into::into).collect(),
        }
    }

    /// Reconstruct a schema from a persisted header row
    pub fn parse(header_line: &str, separator: &str) -> Self {
        Self::new(header_line.split(separator))
    }

    /// Field names in column order
    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    /// Number of fields
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Check if the schema has no fields
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl fmt::Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.fields.join(","))
    }
}
