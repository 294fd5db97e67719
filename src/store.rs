//! Store - the value-log engine root.
//!
//! The store persists value payloads in append-only files grouped into
//! numbered levels. Puts append to the active level-0 file and hand back an
//! opaque [`Location`]; gets read a record back through its location. A
//! background compactor migrates live records upward level by level and
//! reclaims the space held by stale ones.
//!
//! # Thread Safety
//!
//! The store is thread-safe and shared via Arc. A single mutex serializes
//! the write cursor, sequence counter, and file rotation; it is held only
//! across offset/sequence assignment and the one bounded write call. Gets
//! take no lock: record bytes are immutable once their location has been
//! published.

use std::fs::{File, OpenOptions};
use std::io::Write as IoWrite;
use std::os::unix::fs::FileExt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;

use crate::compaction::{CompactionStats, CompactionWorker, Compactor};
use crate::key_index::KeyIndex;
use crate::level::LevelTable;
use crate::location::Location;
use crate::manifest::ManifestState;
use crate::metrics::StoreMetrics;
use crate::options::Options;
use crate::record::{Record, RecordView};
use crate::util::filename::{
    create_dir_if_missing, list_value_files, lock_file_path, manifest_file_path,
    value_file_path,
};
use crate::{Error, Result};

/// Mutable write-path state, guarded by the store's write mutex.
pub(crate) struct WriteState {
    /// Open handle to the active level-0 file.
    pub(crate) file: File,
    /// Number of the active level-0 file.
    pub(crate) current_file_number: u32,
    /// Write cursor within the active level-0 file.
    pub(crate) offset: u32,
    /// Next sequence number to assign.
    pub(crate) sequence: u32,
    /// Per-level file ranges.
    pub(crate) levels: LevelTable,
}

/// Shared engine state, referenced by the store handle and the compactor.
pub(crate) struct StoreCore {
    /// Store directory path.
    pub(crate) path: PathBuf,
    /// Configuration.
    pub(crate) options: Options,
    /// External key index, source of truth for record liveness.
    pub(crate) index: Arc<dyn KeyIndex>,
    /// Write-path state.
    pub(crate) write: Mutex<WriteState>,
    /// Logical size estimate: incremented on append, decremented on drop.
    size: AtomicU64,
    /// Set while a compaction pass is running. Transitions via CAS only.
    compacting: AtomicBool,
    /// Set once close has begun.
    shutting_down: AtomicBool,
    /// Observability counters.
    pub(crate) metrics: Arc<StoreMetrics>,
    /// Lock file handle (kept open to hold the flock).
    _lock_file: File,
}

impl StoreCore {
    /// Path of a value file in this store.
    pub(crate) fn value_file_path(&self, level: u32, file_number: u32) -> PathBuf {
        value_file_path(
            &self.path,
            level,
            file_number,
            self.options.file_extension.as_deref(),
        )
    }

    /// Open a value file, creating it when opened for writing.
    pub(crate) fn open_value_file(&self, level: u32, file_number: u32, write: bool) -> Result<File> {
        let path = self.value_file_path(level, file_number);
        let file = if write {
            OpenOptions::new()
                .create(true)
                .read(true)
                .write(true)
                .open(&path)?
        } else {
            File::open(&path)?
        };
        Ok(file)
    }

    /// Append a record to the active level-0 file.
    ///
    /// Exactly one physical write per call; the sequence is assigned and the
    /// location computed under the write mutex, before the cursor advances.
    pub(crate) fn append(&self, key: &[u8], value: &[u8]) -> Result<Location> {
        let mut record = Record::new(key, value)?;
        let length = record.total_length();

        let mut state = self.write.lock();
        record.set_sequence(state.sequence);
        state
            .file
            .write_all_at(record.as_bytes(), state.offset as u64)?;

        let location = Location {
            length,
            file_number: state.current_file_number,
            offset: state.offset,
            sequence: state.sequence,
            level: 0,
        };

        state.offset += length;
        state.sequence = state.sequence.wrapping_add(1);

        if state.offset as usize >= self.options.file_capacity {
            self.rotate_active_file(&mut state)?;
        }

        Ok(location)
    }

    /// Seal the active level-0 file and open the next one.
    fn rotate_active_file(&self, state: &mut WriteState) -> Result<()> {
        state.current_file_number += 1;
        state.offset = 0;

        // Replacing the handle closes the sealed file.
        state.file = self.open_value_file(0, state.current_file_number, true)?;
        state.levels.get_mut(0).end = state.current_file_number;

        Ok(())
    }

    /// Read the value a location points at.
    pub(crate) fn read(&self, location: &Location) -> Result<Bytes> {
        let path = self.value_file_path(location.level, location.file_number);

        let file = match File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::NotFound(path.display().to_string()));
            }
            Err(e) => return Err(e.into()),
        };

        let mut buf = vec![0u8; location.length as usize];
        match file.read_exact_at(&mut buf, location.offset as u64) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                // File shorter than the record: it was deleted and recreated
                // under this location by compaction.
                return Err(Error::NotFound(path.display().to_string()));
            }
            Err(e) => return Err(e.into()),
        }

        let view = RecordView::parse(&buf)?;
        Ok(Bytes::copy_from_slice(view.value()))
    }

    /// Take the next global sequence number.
    pub(crate) fn allocate_sequence(&self) -> u32 {
        let mut state = self.write.lock();
        let sequence = state.sequence;
        state.sequence = state.sequence.wrapping_add(1);
        sequence
    }

    /// Run a closure with the level table locked.
    pub(crate) fn with_levels<R>(&self, f: impl FnOnce(&mut LevelTable) -> R) -> R {
        f(&mut self.write.lock().levels)
    }

    /// Current logical size estimate.
    pub(crate) fn size(&self) -> u64 {
        self.size.load(Ordering::SeqCst)
    }

    /// Account for appended bytes; returns the new size.
    pub(crate) fn add_size(&self, n: u64) -> u64 {
        let size = self.size.fetch_add(n, Ordering::SeqCst) + n;
        self.metrics.live_size.set(size as i64);
        size
    }

    /// Account for reclaimed bytes; returns the new size.
    pub(crate) fn sub_size(&self, n: u64) -> u64 {
        let mut size = self.size.load(Ordering::SeqCst);
        loop {
            let next = size.saturating_sub(n);
            match self.size.compare_exchange_weak(
                size,
                next,
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => {
                    self.metrics.live_size.set(next as i64);
                    return next;
                }
                Err(observed) => size = observed,
            }
        }
    }

    /// Try to claim the compaction slot. At most one pass runs at a time.
    pub(crate) fn begin_compaction(&self) -> bool {
        self.compacting
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    /// Release the compaction slot.
    pub(crate) fn end_compaction(&self) {
        self.compacting.store(false, Ordering::SeqCst);
    }

    /// Whether a compaction pass currently holds the slot.
    pub(crate) fn is_compacting(&self) -> bool {
        self.compacting.load(Ordering::SeqCst)
    }

    /// Whether close has begun.
    pub(crate) fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::SeqCst)
    }

    /// Snapshot the persistent state for the manifest.
    fn manifest_state(&self) -> ManifestState {
        let state = self.write.lock();
        ManifestState {
            sequence: state.sequence,
            size: self.size(),
            current_file_number: state.current_file_number,
            offset: state.offset,
            levels: state.levels.clone(),
        }
    }
}

/// Point-in-time view of the store's counters and level table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreStats {
    /// Logical size estimate.
    pub size: u64,
    /// Next sequence number to assign.
    pub sequence: u32,
    /// Active level-0 file number.
    pub current_file_number: u32,
    /// Write cursor within the active level-0 file.
    pub offset: u32,
    /// Per-level file ranges.
    pub levels: LevelTable,
}

/// The value-log store.
pub struct Store {
    core: Arc<StoreCore>,
    worker: Arc<CompactionWorker>,
}

impl Store {
    /// Open a store at the given path with default options.
    pub fn open(path: impl AsRef<Path>, index: Arc<dyn KeyIndex>) -> Result<Arc<Self>> {
        Self::open_with_options(path, Options::default(), index)
    }

    /// Open a store with custom options.
    ///
    /// Loads the manifest when one exists; a missing manifest initializes a
    /// fresh store, while a truncated one fails with `CorruptManifest`.
    pub fn open_with_options(
        path: impl AsRef<Path>,
        options: Options,
        index: Arc<dyn KeyIndex>,
    ) -> Result<Arc<Self>> {
        options.validate()?;
        let path = path.as_ref().to_path_buf();

        if !path.exists() {
            if options.create_if_missing {
                create_dir_if_missing(&path)?;
            } else {
                return Err(Error::StoreNotFound(path.display().to_string()));
            }
        } else if options.error_if_exists && store_exists(&path)? {
            return Err(Error::StoreExists(path.display().to_string()));
        }

        let lock_file = acquire_lock(&path)?;

        let manifest = ManifestState::read_from(&manifest_file_path(&path))?;
        let (current_file_number, offset, sequence, levels, size) = match manifest {
            Some(m) => (m.current_file_number, m.offset, m.sequence, m.levels, m.size),
            None => (0, 0, 0, LevelTable::new(), 0),
        };

        let metrics = Arc::new(StoreMetrics::new());
        metrics.live_size.set(size as i64);

        let active_path = value_file_path(
            &path,
            0,
            current_file_number,
            options.file_extension.as_deref(),
        );
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .open(&active_path)?;

        let core = Arc::new(StoreCore {
            path,
            options,
            index,
            write: Mutex::new(WriteState {
                file,
                current_file_number,
                offset,
                sequence,
                levels,
            }),
            size: AtomicU64::new(size),
            compacting: AtomicBool::new(false),
            shutting_down: AtomicBool::new(false),
            metrics,
            _lock_file: lock_file,
        });

        let worker = CompactionWorker::new(Arc::clone(&core));
        worker.start();

        Ok(Arc::new(Self { core, worker }))
    }

    /// Append a key/value record and return its location.
    ///
    /// The caller is expected to store the location in the key index; the
    /// store itself never registers it.
    pub fn put(&self, key: &[u8], value: &[u8]) -> Result<Location> {
        if self.core.is_shutting_down() {
            return Err(Error::StoreClosed);
        }

        let location = self.core.append(key, value)?;
        let length = location.length as u64;

        self.core.metrics.puts.inc();
        self.core.metrics.bytes_written.add(length);

        // The size threshold is checked outside the write mutex; the CAS
        // ensures at most one pass is ever started.
        let size = self.core.add_size(length);
        if size > self.core.options.high_water_mark() && self.core.begin_compaction() {
            self.worker.signal();
        }

        Ok(location)
    }

    /// Read back the value a location points at.
    ///
    /// `NotFound` means the addressed file was reclaimed by compaction since
    /// the location was issued; re-resolve through the key index and retry.
    pub fn get(&self, location: &Location) -> Result<Bytes> {
        if self.core.is_shutting_down() {
            return Err(Error::StoreClosed);
        }

        let value = self.core.read(location)?;
        self.core.metrics.gets.inc();
        self.core.metrics.bytes_read.add(value.len() as u64);
        Ok(value)
    }

    /// Run a compaction pass synchronously on the calling thread.
    ///
    /// Returns `None` when a background pass already holds the compaction
    /// slot. Primarily useful for tests and manual maintenance.
    pub fn compact(&self) -> Result<Option<CompactionStats>> {
        if self.core.is_shutting_down() {
            return Err(Error::StoreClosed);
        }

        if !self.core.begin_compaction() {
            return Ok(None);
        }

        let stats = Compactor::new(Arc::clone(&self.core)).run_pass();
        self.core.end_compaction();
        Ok(Some(stats))
    }

    /// Close the store: stop the compactor, persist the manifest, release
    /// handles. Idempotent.
    pub fn close(&self) -> Result<()> {
        if self.core.shutting_down.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        self.worker.stop();
        self.core
            .manifest_state()
            .write_to(&manifest_file_path(&self.core.path))?;

        Ok(())
    }

    /// Snapshot the store's counters and level table.
    pub fn stats(&self) -> StoreStats {
        let state = self.core.write.lock();
        StoreStats {
            size: self.core.size(),
            sequence: state.sequence,
            current_file_number: state.current_file_number,
            offset: state.offset,
            levels: state.levels.clone(),
        }
    }

    /// Whether a compaction pass is currently running.
    pub fn is_compacting(&self) -> bool {
        self.core.is_compacting()
    }

    /// Statistics from the most recent background compaction pass.
    pub fn last_compaction_stats(&self) -> Option<CompactionStats> {
        self.worker.last_stats()
    }

    /// The store's metrics collector.
    pub fn metrics(&self) -> Arc<StoreMetrics> {
        Arc::clone(&self.core.metrics)
    }

    /// The options the store was opened with.
    pub fn options(&self) -> &Options {
        &self.core.options
    }
}

impl Drop for Store {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

/// Whether a store has been initialized at this path.
fn store_exists(path: &Path) -> Result<bool> {
    if manifest_file_path(path).exists() {
        return Ok(true);
    }
    Ok(!list_value_files(path)?.is_empty())
}

/// Acquire the store directory lock file.
fn acquire_lock(path: &Path) -> Result<File> {
    let lock_path = lock_file_path(path);

    let mut lock_file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(&lock_path)
        .map_err(|e| {
            Error::LockError(format!(
                "Failed to open lock file {}: {}",
                lock_path.display(),
                e
            ))
        })?;

    #[cfg(unix)]
    {
        use std::os::unix::io::AsRawFd;
        let fd = lock_file.as_raw_fd();
        let result = unsafe { libc::flock(fd, libc::LOCK_EX | libc::LOCK_NB) };
        if result != 0 {
            return Err(Error::LockError(
                "Store is already locked by another process".to_string(),
            ));
        }
    }

    writeln!(lock_file, "valuelog lock").ok();

    Ok(lock_file)
}
