//! Compactor - executes compaction passes.
//!
//! A pass sweeps levels from 0 upward. For each level it streams the sealed
//! source files record by record, asks the key index whether each record is
//! still the authoritative value for its key, and either drops it (stale)
//! or rewrites it into the next level's write file with a fresh sequence.
//! Exhausted source files are deleted. The pass stops as soon as the store's
//! logical size falls below the low-water mark, even mid-level.

use std::fs::File;
use std::io::{BufReader, Read};
use std::os::unix::fs::FileExt;
use std::sync::Arc;
use std::time::Instant;

use crate::location::Location;
use crate::options::MAX_LEVELS;
use crate::record::{patch_sequence, RecordView, HEADER_SIZE};
use crate::store::StoreCore;
use crate::util::filename::delete_file;
use crate::Result;

/// Statistics from a compaction pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompactionStats {
    /// Source files consumed and deleted.
    pub files_compacted: u64,
    /// Records examined.
    pub records_read: u64,
    /// Live records relocated to the next level.
    pub records_rewritten: u64,
    /// Stale records dropped.
    pub records_dropped: u64,
    /// Bytes reclaimed by dropped records.
    pub bytes_reclaimed: u64,
    /// Bytes written into higher levels.
    pub bytes_rewritten: u64,
    /// Levels skipped because of contained I/O failures.
    pub levels_skipped: u64,
    /// Wall time of the pass in milliseconds.
    pub elapsed_ms: u64,
}

/// Outcome of compacting a single level.
#[derive(Debug, Default, Clone, Copy)]
struct LevelOutcome {
    /// Whether any source file was consumed.
    progressed: bool,
    /// Whether the size dropped below the low-water mark.
    reached_low_water: bool,
}

/// Write handle for the output level of a compaction step.
///
/// The compactor is the only writer for levels above 0, so the file handle
/// and cursor live here; the shared level table is updated under the store's
/// write mutex after every append.
struct LevelWriter {
    level: u32,
    file: File,
    file_number: u32,
    offset: u32,
}

impl LevelWriter {
    /// Open the level's active write file at its current end/offset.
    fn open(core: &StoreCore, level: u32) -> Result<Self> {
        let (file_number, offset) = core.with_levels(|levels| {
            let entry = levels.get(level as usize);
            (entry.end, entry.offset)
        });

        let file = core.open_value_file(level, file_number, true)?;
        Ok(Self {
            level,
            file,
            file_number,
            offset,
        })
    }

    /// Append a record buffer, returning the (file_number, offset) it
    /// landed at. Rotates the write file at capacity.
    fn append(&mut self, core: &StoreCore, buf: &[u8]) -> Result<(u32, u32)> {
        self.file.write_all_at(buf, self.offset as u64)?;
        let written_at = (self.file_number, self.offset);
        self.offset += buf.len() as u32;

        if self.offset as usize >= core.options.file_capacity {
            self.file_number += 1;
            self.offset = 0;
            self.file = core.open_value_file(self.level, self.file_number, true)?;
        }

        let (file_number, offset, level) = (self.file_number, self.offset, self.level);
        core.with_levels(|levels| {
            let entry = levels.get_mut(level as usize);
            entry.end = file_number;
            entry.offset = offset;
        });

        Ok(written_at)
    }
}

/// Executes compaction passes against a store.
pub(crate) struct Compactor {
    core: Arc<StoreCore>,
}

impl Compactor {
    /// Create a compactor for a store.
    pub(crate) fn new(core: Arc<StoreCore>) -> Self {
        Self { core }
    }

    /// Run one compaction pass.
    ///
    /// Sweeps all levels repeatedly until the size estimate drops below the
    /// low-water mark or a sweep makes no progress (nothing left to
    /// compact). Per-level I/O failures are counted and skipped; they only
    /// postpone reclamation, so the pass never aborts because of them.
    pub(crate) fn run_pass(&self) -> CompactionStats {
        let start = Instant::now();
        let mut stats = CompactionStats::default();

        'sweep: loop {
            let mut progressed = false;

            for level in 0..(MAX_LEVELS - 1) as u32 {
                if self.core.is_shutting_down() {
                    break 'sweep;
                }

                match self.compact_level(level, &mut stats) {
                    Ok(outcome) => {
                        progressed |= outcome.progressed;
                        if outcome.reached_low_water {
                            break 'sweep;
                        }
                    }
                    Err(_) => {
                        self.core.metrics.compaction_errors.inc();
                        stats.levels_skipped += 1;
                    }
                }
            }

            if !progressed {
                break;
            }
        }

        stats.elapsed_ms = start.elapsed().as_millis() as u64;
        self.core.metrics.compaction_passes.inc();
        stats
    }

    /// Compact all sealed files of one level into the next.
    fn compact_level(&self, level: u32, stats: &mut CompactionStats) -> Result<LevelOutcome> {
        let mut outcome = LevelOutcome::default();

        if !self
            .core
            .with_levels(|levels| levels.get(level as usize).has_compactable_files())
        {
            return Ok(outcome);
        }

        let mut writer = LevelWriter::open(&self.core, level + 1)?;
        let low_water = self.core.options.low_water_mark();

        loop {
            if self.core.is_shutting_down() {
                return Ok(outcome);
            }

            let (start, end) = self.core.with_levels(|levels| {
                let entry = levels.get(level as usize);
                (entry.start, entry.end)
            });
            if start >= end {
                return Ok(outcome);
            }

            let source_path = self.core.value_file_path(level, start);
            let source = File::open(&source_path)?;
            let mut reader = BufReader::new(source);

            while let Some(buf) = read_record(&mut reader)? {
                stats.records_read += 1;
                self.process_record(buf, &mut writer, stats)?;
            }

            // Source exhausted: remove it and advance the level's start.
            delete_file(&source_path)?;
            self.core
                .with_levels(|levels| levels.get_mut(level as usize).start += 1);
            stats.files_compacted += 1;
            outcome.progressed = true;

            if self.core.size() < low_water {
                outcome.reached_low_water = true;
                return Ok(outcome);
            }
        }
    }

    /// Classify one record as stale or live and act accordingly.
    fn process_record(
        &self,
        mut buf: Vec<u8>,
        writer: &mut LevelWriter,
        stats: &mut CompactionStats,
    ) -> Result<()> {
        let (key, record_sequence, length) = {
            let view = RecordView::parse(&buf)?;
            (view.key().to_vec(), view.sequence(), view.total_length())
        };

        // The index's registered location is authoritative: a missing key or
        // a different sequence means this record has been superseded.
        let registered = self.core.index.snapshot_read(&key)?;
        let live = matches!(registered, Some(loc) if loc.sequence == record_sequence);

        if !live {
            self.core.sub_size(length as u64);
            self.core.metrics.records_dropped.inc();
            self.core.metrics.bytes_reclaimed.add(length as u64);
            stats.records_dropped += 1;
            stats.bytes_reclaimed += length as u64;
            return Ok(());
        }

        // Relocate: the rewritten copy carries the fresh sequence in its
        // header so record and index stay in agreement for later passes.
        let sequence = self.core.allocate_sequence();
        patch_sequence(&mut buf, sequence);

        let (file_number, offset) = writer.append(&self.core, &buf)?;
        let location = Location {
            length,
            file_number,
            offset,
            sequence,
            level: writer.level,
        };
        self.core.index.update_location(&key, location)?;

        self.core.metrics.records_rewritten.inc();
        stats.records_rewritten += 1;
        stats.bytes_rewritten += length as u64;

        Ok(())
    }
}

/// Read the next record from a sealed source file.
///
/// Returns `Ok(None)` at a clean end of file; a torn tail (length prefix
/// without a full record behind it) also ends the file, matching the
/// append-then-publish write protocol.
fn read_record(reader: &mut BufReader<File>) -> Result<Option<Vec<u8>>> {
    let mut length_prefix = [0u8; 4];
    match reader.read_exact(&mut length_prefix) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }

    let total = u32::from_be_bytes(length_prefix) as usize;
    if total < HEADER_SIZE {
        return Err(crate::Error::Format(format!(
            "record length prefix {} shorter than header",
            total
        )));
    }

    let mut buf = vec![0u8; total];
    buf[..4].copy_from_slice(&length_prefix);
    match reader.read_exact(&mut buf[4..]) {
        Ok(()) => Ok(Some(buf)),
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => Ok(None),
        Err(e) => Err(e.into()),
    }
}
