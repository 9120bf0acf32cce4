//! Flatlog Core - Concurrent Write Path for a Time-Partitioned Flat-File Event Store
//!
//! A Rust engine for logging structured events to delimited flat files,
//! partitioned by stream type and time bucket, for later batch consumption.
//!
//! # Architecture
//!
//! Flatlog manages a bounded pool of open output files under concurrent
//! writers with the following components:
//!
//! - **Time Bucketing**: maps (root, stream type, timestamp) to a dated
//!   directory using a configurable calendar pattern
//! - **Handle Pool**: per-stream-type pool of open append writers, one
//!   write-exclusion lock per file, bounded by a configurable ceiling
//! - **Eviction**: closes the oldest handles when the ceiling is reached,
//!   without interrupting in-flight writers
//! - **File Resolver**: finds or creates the numbered candidate file whose
//!   header matches the record's schema, so one bucket can host several
//!   schema generations side by side
//! - **Failover**: storage roots are tried in priority order; a failed
//!   root is skipped for the rest of the process lifetime

pub mod bucket;
pub mod format;
pub mod pool;
pub mod store;

mod error;
mod types;

pub use error::{FlatlogError, Result};
pub use store::{FileStore, StoreConfig};
pub use types::{Record, Schema};

/// Flatlog version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default configuration values
pub mod config {
    /// Field delimiter for header and data lines
    pub const SEPARATOR: &str = "\t";

    /// Daily bucket directories
    pub const DIR_PATTERN: &str = "/%Y/%m/%d/";

    /// Per-stream-type ceiling on simultaneously open files
    pub const MAX_OPEN_FILES: usize = 16;

    /// Candidate file extension
    pub const FILE_EXTENSION: &str = "csv";

    /// Upper bound on schema-generation probing within one bucket
    pub const MAX_CANDIDATE_PROBES: usize = 1024;

    /// Discovery walks bucket directories at hour granularity
    pub const DISCOVERY_STEP_SECS: i64 = 3600;
}
