//! File store service - orchestrates bucketing, resolution, and appends

use super::StoreConfig;
use crate::bucket::DirPattern;
use crate::config;
use crate::error::{FlatlogError, Result};
use crate::format;
use crate::pool::HandleRegistry;
use crate::types::{Record, Schema};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{error, warn};

/// Concurrent write path for the time-partitioned flat-file store.
///
/// Producers call [`FileStore::write`] from any number of threads; each
/// record lands in the candidate file matching its stream type, time
/// bucket, and schema. Consumers find files through
/// [`FileStore::list_files`].
pub struct FileStore {
    separator: String,
    data_dirs: Vec<PathBuf>,
    pattern: DirPattern,
    registry: HandleRegistry,
    /// Per-type index of the first storage root still considered usable.
    /// Only ever advances: a root that failed once for a type is not
    /// retried for the life of the process.
    root_cursor: Mutex<HashMap<String, usize>>,
    dropped_writes: AtomicU64,
}

impl FileStore {
    /// Create a file store, validating the configuration.
    ///
    /// Fails fast on an invalid directory pattern, an empty root list,
    /// or a zero handle ceiling.
    pub fn new(store_config: StoreConfig) -> Result<Self> {
        if store_config.data_dirs.is_empty() {
            return Err(FlatlogError::Config(
                "at least one data directory is required".to_string(),
            ));
        }
        if store_config.max_open_files == 0 {
            return Err(FlatlogError::Config(
                "max_open_files must be at least 1".to_string(),
            ));
        }
        let pattern = DirPattern::new(&store_config.dir_pattern)?;
        Ok(Self {
            registry: HandleRegistry::new(
                store_config.separator.clone(),
                store_config.max_open_files,
            ),
            separator: store_config.separator,
            data_dirs: store_config.data_dirs,
            pattern,
            root_cursor: Mutex::new(HashMap::new()),
            dropped_writes: AtomicU64::new(0),
        })
    }

    /// Append one record to the store. Fire-and-forget.
    ///
    /// A failing root is permanently skipped for this stream type and the
    /// next root is tried; once every root is exhausted the record is
    /// dropped without surfacing an error. Dropped records are logged and
    /// counted — monitor [`FileStore::dropped_writes`].
    pub fn write(&self, stream_type: &str, record: &Record, schema: &Schema, epoch_seconds: i64) {
        let first = self.first_root(stream_type);
        for idx in first..self.data_dirs.len() {
            let dir = self
                .pattern
                .bucket_dir(&self.data_dirs[idx], stream_type, epoch_seconds);
            match self.registry.resolve_and_lock(stream_type, &dir, schema) {
                Ok(mut lease) => {
                    let line = format::render_line(record, lease.schema(), &self.separator);
                    match lease.append_line(&line) {
                        Ok(()) => return,
                        Err(e) => {
                            drop(lease);
                            self.disable_root(stream_type, idx, &e);
                        }
                    }
                }
                Err(e) => self.disable_root(stream_type, idx, &e),
            }
        }
        self.dropped_writes.fetch_add(1, Ordering::Relaxed);
        error!(
            "Dropped {} record: no usable storage root remains",
            stream_type
        );
    }

    /// List every file in the buckets covering `[begin, end]` across all
    /// roots, stepping at hour granularity.
    ///
    /// Deduplicated and unordered. Files currently open for writing are
    /// included, so a concurrent reader may observe a partial last line.
    pub fn list_files(
        &self,
        stream_type: &str,
        begin_seconds: i64,
        end_seconds: i64,
    ) -> HashSet<PathBuf> {
        let mut files = HashSet::new();
        for root in &self.data_dirs {
            for t in (begin_seconds..=end_seconds).step_by(config::DISCOVERY_STEP_SECS as usize) {
                let dir = self.pattern.bucket_dir(root, stream_type, t);
                if !dir.is_dir() {
                    continue;
                }
                let Ok(entries) = std::fs::read_dir(&dir) else {
                    continue;
                };
                for entry in entries.flatten() {
                    let path = entry.path();
                    if path.is_file() {
                        files.insert(path);
                    }
                }
            }
        }
        files
    }

    /// Field delimiter in use, for consumers parsing the files back
    pub fn separator(&self) -> &str {
        &self.separator
    }

    /// Number of records dropped after exhausting every storage root
    pub fn dropped_writes(&self) -> u64 {
        self.dropped_writes.load(Ordering::Relaxed)
    }

    /// Number of open handles for a stream type, for monitoring
    pub fn open_handles(&self, stream_type: &str) -> usize {
        self.registry.open_handles(stream_type)
    }

    /// Flush and close every open handle. Best-effort; call at shutdown.
    pub fn close_all(&self) {
        self.registry.close_all();
    }

    fn first_root(&self, stream_type: &str) -> usize {
        self.root_cursor
            .lock()
            .get(stream_type)
            .copied()
            .unwrap_or(0)
    }

    fn disable_root(&self, stream_type: &str, idx: usize, cause: &FlatlogError) {
        warn!(
            "Disabling storage root {:?} for {}: {}",
            self.data_dirs[idx], stream_type, cause
        );
        let mut cursors = self.root_cursor.lock();
        let cursor = cursors.entry(stream_type.to_string()).or_insert(0);
        if *cursor <= idx {
            *cursor = idx + 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs;
    use std::sync::Arc;
    use tempfile::TempDir;

    // 2024-01-29 00:00:00 UTC
    const T0: i64 = 1_706_486_400;

    fn store_with_roots(roots: Vec<PathBuf>, max_open_files: usize) -> FileStore {
        FileStore::new(StoreConfig {
            data_dirs: roots,
            max_open_files,
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_end_to_end_two_schema_generations() {
        let root0 = TempDir::new().unwrap();
        let root1 = TempDir::new().unwrap();
        let store = store_with_roots(
            vec![root0.path().to_path_buf(), root1.path().to_path_buf()],
            1,
        );

        store.write("events", &json!({"a": 1, "b": 2}), &Schema::new(["a", "b"]), T0);
        store.write("events", &json!({"a": 1, "c": 3}), &Schema::new(["a", "c"]), T0);
        store.close_all();

        let day_dir = root0.path().join("events/2024/01/29");
        let first = fs::read_to_string(day_dir.join("0.csv")).unwrap();
        assert_eq!(first, "a\tb\n1\t2\n");
        let second = fs::read_to_string(day_dir.join("1.csv")).unwrap();
        assert_eq!(second, "a\tc\n1\t3\n");

        let files = store.list_files("events", T0, T0);
        assert_eq!(files.len(), 2);
        assert!(files.contains(&day_dir.join("0.csv")));
        assert!(files.contains(&day_dir.join("1.csv")));
    }

    #[test]
    fn test_same_schema_reuses_one_file() {
        let root = TempDir::new().unwrap();
        let store = store_with_roots(vec![root.path().to_path_buf()], 4);
        let schema = Schema::new(["n"]);

        for n in 0..10 {
            store.write("events", &json!({ "n": n }), &schema, T0);
        }
        store.close_all();

        let content = fs::read_to_string(root.path().join("events/2024/01/29/0.csv")).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 11);
        assert_eq!(lines[0], "n");
        assert_eq!(lines[10], "9");
    }

    #[test]
    fn test_distinct_days_land_in_distinct_buckets() {
        let root = TempDir::new().unwrap();
        let store = store_with_roots(vec![root.path().to_path_buf()], 4);
        let schema = Schema::new(["n"]);

        store.write("events", &json!({"n": 1}), &schema, T0);
        store.write("events", &json!({"n": 2}), &schema, T0 + 86_400);
        store.close_all();

        assert!(root.path().join("events/2024/01/29/0.csv").is_file());
        assert!(root.path().join("events/2024/01/30/0.csv").is_file());
    }

    #[test]
    fn test_eviction_ceiling_holds_across_many_schemas() {
        let root = TempDir::new().unwrap();
        let store = store_with_roots(vec![root.path().to_path_buf()], 2);

        for i in 0..6 {
            let field = format!("f{i}");
            let schema = Schema::new([field.clone()]);
            store.write("events", &json!({ (field): i }), &schema, T0);
            assert!(store.open_handles("events") <= 2);
        }

        // Evicted files stay complete and readable
        for i in 0..6 {
            let path = root.path().join(format!("events/2024/01/29/{i}.csv"));
            let content = fs::read_to_string(path).unwrap();
            assert_eq!(content, format!("f{i}\n{i}\n"));
        }
    }

    #[test]
    fn test_failed_root_is_never_retried() {
        let tmp = TempDir::new().unwrap();
        // root0 is a regular file: directory creation under it must fail
        let root0 = tmp.path().join("blocked");
        fs::write(&root0, "not a directory").unwrap();
        let root1 = tmp.path().join("good");
        let store = store_with_roots(vec![root0.clone(), root1.clone()], 4);
        let schema = Schema::new(["n"]);

        store.write("events", &json!({"n": 1}), &schema, T0);

        // Unblock root0; the cursor must not move back
        fs::remove_file(&root0).unwrap();
        fs::create_dir_all(&root0).unwrap();
        store.write("events", &json!({"n": 2}), &schema, T0 + 86_400);
        store.close_all();

        assert!(fs::read_dir(&root0).unwrap().next().is_none());
        assert!(root1.join("events/2024/01/29/0.csv").is_file());
        assert!(root1.join("events/2024/01/30/0.csv").is_file());
        assert_eq!(store.dropped_writes(), 0);
    }

    #[test]
    fn test_root_failure_is_scoped_to_one_type() {
        let tmp = TempDir::new().unwrap();
        let root0 = tmp.path().join("root0");
        let root1 = tmp.path().join("root1");
        fs::create_dir_all(&root0).unwrap();
        let store = store_with_roots(vec![root0.clone(), root1.clone()], 4);
        let schema = Schema::new(["n"]);

        // Block only the "events" bucket path under root0
        fs::write(root0.join("events"), "not a directory").unwrap();

        store.write("events", &json!({"n": 1}), &schema, T0);
        store.write("clicks", &json!({"n": 1}), &schema, T0);
        store.close_all();

        assert!(root1.join("events/2024/01/29/0.csv").is_file());
        assert!(root0.join("clicks/2024/01/29/0.csv").is_file());
    }

    #[test]
    fn test_write_drops_silently_when_all_roots_fail() {
        let tmp = TempDir::new().unwrap();
        let root0 = tmp.path().join("bad0");
        let root1 = tmp.path().join("bad1");
        fs::write(&root0, "").unwrap();
        fs::write(&root1, "").unwrap();
        let store = store_with_roots(vec![root0, root1], 4);

        store.write("events", &json!({"n": 1}), &Schema::new(["n"]), T0);
        assert_eq!(store.dropped_writes(), 1);

        // Subsequent writes drop immediately, cursor already exhausted
        store.write("events", &json!({"n": 2}), &Schema::new(["n"]), T0);
        assert_eq!(store.dropped_writes(), 2);
    }

    #[test]
    fn test_discovery_spans_roots_and_buckets() {
        let root0 = TempDir::new().unwrap();
        let root1 = TempDir::new().unwrap();
        let store = store_with_roots(
            vec![root0.path().to_path_buf(), root1.path().to_path_buf()],
            4,
        );
        let schema = Schema::new(["n"]);

        store.write("events", &json!({"n": 1}), &schema, T0);
        store.write("events", &json!({"n": 2}), &schema, T0 + 86_400);
        store.close_all();

        // A file placed under the second root is discovered too
        let other_bucket = root1.path().join("events/2024/01/29");
        fs::create_dir_all(&other_bucket).unwrap();
        fs::write(other_bucket.join("0.csv"), "n\n7\n").unwrap();

        let files = store.list_files("events", T0, T0 + 86_400);
        assert_eq!(files.len(), 3);

        // Range excludes the second day: only the first-day files remain
        let files = store.list_files("events", T0, T0 + 3600);
        assert_eq!(files.len(), 2);
    }

    #[test]
    fn test_concurrent_writers_never_interleave_lines() {
        let root = TempDir::new().unwrap();
        let store = Arc::new(store_with_roots(vec![root.path().to_path_buf()], 4));
        let schema = Schema::new(["writer", "seq"]);

        let mut handles = Vec::new();
        for w in 0..8 {
            let store = Arc::clone(&store);
            let schema = schema.clone();
            handles.push(std::thread::spawn(move || {
                for seq in 0..50 {
                    store.write(
                        "events",
                        &json!({"writer": w, "seq": seq}),
                        &schema,
                        T0,
                    );
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }
        store.close_all();

        let content = fs::read_to_string(root.path().join("events/2024/01/29/0.csv")).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 1 + 8 * 50);
        assert_eq!(lines[0], "writer\tseq");
        for line in &lines[1..] {
            let cols: Vec<&str> = line.split('\t').collect();
            assert_eq!(cols.len(), 2);
            let writer: u32 = cols[0].parse().unwrap();
            let seq: u32 = cols[1].parse().unwrap();
            assert!(writer < 8 && seq < 50);
        }
        assert_eq!(store.dropped_writes(), 0);
    }

    #[test]
    fn test_rejects_bad_configuration() {
        assert!(FileStore::new(StoreConfig {
            data_dirs: vec![],
            ..Default::default()
        })
        .is_err());

        assert!(FileStore::new(StoreConfig {
            dir_pattern: "/%Q/".to_string(),
            ..Default::default()
        })
        .is_err());

        assert!(FileStore::new(StoreConfig {
            max_open_files: 0,
            ..Default::default()
        })
        .is_err());
    }
}
