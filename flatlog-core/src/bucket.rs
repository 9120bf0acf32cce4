//! Time bucketing - maps (root, stream type, timestamp) to a dated directory

use crate::error::{FlatlogError, Result};
use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, TimeZone, Utc};
use std::path::{Path, PathBuf};

/// Validated strftime pattern used to derive time-bucket subdirectories.
///
/// The pattern carries its own path separators (the default `/%Y/%m/%d/`
/// yields daily buckets), so bucket paths are built by plain string
/// concatenation under `root/type`. An invalid pattern is a fatal
/// configuration error at construction time, never at write time.
#[derive(Debug, Clone)]
pub struct DirPattern {
    pattern: String,
}

impl DirPattern {
    /// Validate and wrap a strftime pattern
    pub fn new(pattern: &str) -> Result<Self> {
        let invalid = StrftimeItems::new(pattern).any(|item| matches!(item, Item::Error));
        if invalid {
            return Err(FlatlogError::Config(format!(
                "invalid directory pattern: {pattern}"
            )));
        }
        Ok(Self {
            pattern: pattern.to_string(),
        })
    }

    /// Compute the bucket directory for one (root, type, timestamp) triple.
    ///
    /// Timestamps are seconds since the Unix epoch, interpreted in UTC;
    /// out-of-range values clamp to the epoch. Pure, no I/O.
    pub fn bucket_dir(&self, root: &Path, stream_type: &str, epoch_seconds: i64) -> PathBuf {
        let when = Utc
            .timestamp_opt(epoch_seconds, 0)
            .single()
            .unwrap_or(DateTime::<Utc>::UNIX_EPOCH);
        let formatted = when.format(&self.pattern);
        PathBuf::from(format!("{}/{}{}", root.display(), stream_type, formatted))
    }
}
