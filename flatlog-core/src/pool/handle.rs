//! Open handles and write leases

use crate::error::Result;
use crate::types::Schema;
use parking_lot::lock_api::ArcMutexGuard;
use parking_lot::{Mutex, RawMutex};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Owned guard over one file's write-exclusion lock
pub(crate) type WriterGuard = ArcMutexGuard<RawMutex, BufWriter<File>>;

/// A candidate file currently open for append.
///
/// At most one of these exists per candidate file; the schema is the one
/// the file was created with or validated against on disk.
pub(crate) struct OpenHandle {
    pub(crate) schema: Schema,
    pub(crate) writer: Arc<Mutex<BufWriter<File>>>,
}

/// Exclusive write lease on one candidate file.
///
/// Returned by the resolver with the write-exclusion lock already held;
/// the lock releases when the lease drops, on every exit path.
pub struct FileLease {
    path: PathBuf,
    schema: Schema,
    guard: WriterGuard,
}

impl FileLease {
    pub(crate) fn new(path: PathBuf, schema: Schema, guard: WriterGuard) -> Self {
        Self {
            path,
            schema,
            guard,
        }
    }

    /// Absolute path of the leased candidate file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Schema the leased file was opened with
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Append one rendered line and flush the buffer to the OS.
    ///
    /// No fsync: the store makes no durability guarantee beyond the OS
    /// page cache.
    pub fn append_line(&mut self, line: &str) -> Result<()> {
        self.guard.write_all(line.as_bytes())?;
        self.guard.write_all(b"\n")?;
        self.guard.flush()?;
        Ok(())
    }
}
