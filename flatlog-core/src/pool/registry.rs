//! Handle registry - schema-aware file resolution, pooling, and eviction

use super::handle::{FileLease, OpenHandle};
use crate::config;
use crate::error::{FlatlogError, Result};
use crate::format;
use crate::types::Schema;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// Per-stream-type pool of open handles.
///
/// Keyed by candidate path, so iteration order is path order and the
/// first entry is the deterministic "oldest" candidate for eviction.
/// The map doubles as the schema registry: closing a handle removes its
/// schema entry in the same mutation.
#[derive(Default)]
struct StreamPool {
    handles: BTreeMap<PathBuf, OpenHandle>,
}

/// How an unopened candidate index resolves against the disk
enum Admission {
    /// File exists with a matching header; reopen for append
    Reopen,
    /// File does not exist; create it with a fresh header
    Create,
}

/// Registry of open append handles across all stream types.
///
/// The outer mutex is the structural lock: namespace creation, handle
/// registration, and eviction all serialize through it. Per-file locks
/// are acquired while the structural lock is still held, so a returned
/// lease is locked atomically with being found or created.
pub struct HandleRegistry {
    separator: String,
    max_open: usize,
    pools: Mutex<HashMap<String, StreamPool>>,
}

impl HandleRegistry {
    /// Create a registry with a per-type ceiling on open handles
    pub fn new(separator: String, max_open: usize) -> Self {
        Self {
            separator,
            max_open,
            pools: Mutex::new(HashMap::new()),
        }
    }

    /// Find or create the candidate file for `schema` under `dir` and
    /// return it write-locked.
    ///
    /// Candidate indices are probed in order: an index held by a
    /// different schema generation (open or on disk) is skipped, the
    /// first index with a matching header is appended to, and the first
    /// absent index is created with a fresh header row.
    pub fn resolve_and_lock(
        &self,
        stream_type: &str,
        dir: &Path,
        schema: &Schema,
    ) -> Result<FileLease> {
        let mut pools = self.pools.lock();
        if !pools.contains_key(stream_type) {
            debug!("Opening handle pool for stream type {}", stream_type);
        }
        let pool = pools.entry(stream_type.to_string()).or_default();
        Self::evict_to(stream_type, pool, self.max_open);

        for index in 0..config::MAX_CANDIDATE_PROBES {
            let path = dir.join(format!("{index}.{}", config::FILE_EXTENSION));

            if let Some(handle) = pool.handles.get(&path) {
                if handle.schema == *schema {
                    let guard = handle.writer.lock_arc();
                    return Ok(FileLease::new(path, schema.clone(), guard));
                }
                // Index held by a different schema generation
                continue;
            }

            let Some(admission) = self.probe_candidate(&path, schema)? else {
                continue;
            };

            // Make room before the new handle opens so the ceiling
            // holds at all times
            if pool.handles.len() >= self.max_open {
                Self::evict_to(stream_type, pool, self.max_open.saturating_sub(1));
            }

            let writer = match admission {
                Admission::Reopen => {
                    BufWriter::new(OpenOptions::new().append(true).open(&path)?)
                }
                Admission::Create => self.create_candidate(&path, dir, schema)?,
            };
            let writer = Arc::new(Mutex::new(writer));
            let guard = writer.lock_arc();
            pool.handles.insert(
                path.clone(),
                OpenHandle {
                    schema: schema.clone(),
                    writer,
                },
            );
            return Ok(FileLease::new(path, schema.clone(), guard));
        }

        Err(FlatlogError::CandidatesExhausted {
            dir: dir.display().to_string(),
            probed: config::MAX_CANDIDATE_PROBES,
        })
    }

    /// Number of open handles for a stream type
    pub fn open_handles(&self, stream_type: &str) -> usize {
        self.pools
            .lock()
            .get(stream_type)
            .map_or(0, |pool| pool.handles.len())
    }

    /// Flush and close every open handle of every stream type. Best-effort.
    pub fn close_all(&self) {
        let mut pools = self.pools.lock();
        for (stream_type, pool) in pools.iter_mut() {
            Self::evict_to(stream_type, pool, 0);
        }
    }

    /// Close the oldest handles until at most `keep` remain.
    ///
    /// Blocks on each handle's write-exclusion lock, so an in-flight
    /// append always completes before its file closes. Flush failures
    /// are logged and never propagate.
    fn evict_to(stream_type: &str, pool: &mut StreamPool, keep: usize) {
        while pool.handles.len() > keep {
            let Some((path, handle)) = pool.handles.pop_first() else {
                break;
            };
            let mut writer = handle.writer.lock();
            if let Err(e) = writer.flush() {
                warn!(
                    "Failed to flush {:?} while evicting from {}: {}",
                    path, stream_type, e
                );
            }
            debug!("Evicted handle {:?} from {}", path, stream_type);
            // Dropping the handle closes the file once the guard releases
        }
    }

    /// Check how the candidate at `path` resolves against the disk.
    ///
    /// Returns `None` when the index is taken by a different schema
    /// generation (or by a headerless leftover) and must be skipped.
    fn probe_candidate(&self, path: &Path, schema: &Schema) -> Result<Option<Admission>> {
        match File::open(path) {
            Ok(file) => {
                let mut header = String::new();
                BufReader::new(file).read_line(&mut header)?;
                let header = header.trim_end_matches(['\r', '\n']);
                // A headerless file is never appended to
                if header.is_empty() || Schema::parse(header, &self.separator) != *schema {
                    Ok(None)
                } else {
                    Ok(Some(Admission::Reopen))
                }
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Some(Admission::Create)),
            Err(e) => Err(e.into()),
        }
    }

    /// Create the candidate file and persist its header row
    fn create_candidate(&self, path: &Path, dir: &Path, schema: &Schema) -> Result<BufWriter<File>> {
        std::fs::create_dir_all(dir)?;
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let mut writer = BufWriter::new(file);
        writer.write_all(format::render_header(schema, &self.separator).as_bytes())?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        debug!("Created candidate file {:?} for schema [{}]", path, schema);
        Ok(writer)
    }
}
