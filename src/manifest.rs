//! Manifest - fixed-layout persistence of the store's bookkeeping.
//!
//! The manifest is a single 788-byte binary record: the store-wide
//! counters followed by one slot per level. It is written once on orderly
//! shutdown and read once on open. All integers are big-endian.
//!
//! Layout:
//!   offset  0  sequence             u32
//!   offset  4  size                 u64
//!   offset 12  current_file_number  u32
//!   offset 16  offset               u32
//!   offset 20  64 x { start u32, end u32, offset u32 }

use std::fs::File;
use std::io::Write;
use std::path::Path;

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::level::LevelTable;
use crate::options::MAX_LEVELS;
use crate::util::filename::{manifest_temp_path, sync_dir};
use crate::{Error, Result};

/// Exact size of the encoded manifest.
pub const MANIFEST_SIZE: usize = 20 + MAX_LEVELS * 12;

/// The store state persisted in the manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestState {
    /// Global monotonic write counter.
    pub sequence: u32,
    /// Logical store size estimate.
    pub size: u64,
    /// Active level-0 file number.
    pub current_file_number: u32,
    /// Write cursor within the active level-0 file.
    pub offset: u32,
    /// Per-level file ranges.
    pub levels: LevelTable,
}

impl ManifestState {
    /// Encode into the fixed wire form.
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(MANIFEST_SIZE);
        buf.put_u32(self.sequence);
        buf.put_u64(self.size);
        buf.put_u32(self.current_file_number);
        buf.put_u32(self.offset);
        for level in self.levels.iter() {
            buf.put_u32(level.start);
            buf.put_u32(level.end);
            buf.put_u32(level.offset);
        }
        buf.freeze()
    }

    /// Decode from the wire form.
    ///
    /// A buffer of the wrong size is a corrupt manifest, never zero-filled.
    pub fn decode(mut data: &[u8]) -> Result<Self> {
        if data.len() != MANIFEST_SIZE {
            return Err(Error::CorruptManifest(format!(
                "manifest must be {} bytes, got {}",
                MANIFEST_SIZE,
                data.len()
            )));
        }

        let sequence = data.get_u32();
        let size = data.get_u64();
        let current_file_number = data.get_u32();
        let offset = data.get_u32();

        let mut levels = LevelTable::new();
        for i in 0..MAX_LEVELS {
            let entry = levels.get_mut(i);
            entry.start = data.get_u32();
            entry.end = data.get_u32();
            entry.offset = data.get_u32();

            if entry.start > entry.end {
                return Err(Error::CorruptManifest(format!(
                    "level {} range inverted: start {} > end {}",
                    i, entry.start, entry.end
                )));
            }
        }

        Ok(Self {
            sequence,
            size,
            current_file_number,
            offset,
            levels,
        })
    }

    /// Durably write the manifest to `path`.
    ///
    /// Writes to a temp file, fsyncs, then renames over the target so a
    /// crash mid-write never leaves a truncated manifest behind.
    pub fn write_to(&self, path: &Path) -> Result<()> {
        let dir = path.parent().ok_or_else(|| {
            Error::Io(format!("manifest path has no parent: {}", path.display()))
        })?;
        let temp_path = manifest_temp_path(dir);

        let mut file = File::create(&temp_path)?;
        file.write_all(&self.encode())?;
        file.sync_all()?;
        drop(file);

        std::fs::rename(&temp_path, path)?;
        sync_dir(dir)?;

        Ok(())
    }

    /// Read a manifest from `path`.
    ///
    /// Returns `Ok(None)` when the file is absent (fresh store). A file
    /// that exists but is short or oversized fails with `CorruptManifest`.
    pub fn read_from(path: &Path) -> Result<Option<Self>> {
        let data = match std::fs::read(path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        Self::decode(&data).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sample_state() -> ManifestState {
        let mut levels = LevelTable::new();
        for i in 0..MAX_LEVELS {
            let entry = levels.get_mut(i);
            entry.start = i as u32;
            entry.end = i as u32 * 2;
            entry.offset = i as u32 * 100;
        }

        ManifestState {
            sequence: 123,
            size: 9_876_543_210,
            current_file_number: 17,
            offset: 4096,
            levels,
        }
    }

    #[test]
    fn test_manifest_round_trip() {
        let state = sample_state();
        let encoded = state.encode();
        assert_eq!(encoded.len(), MANIFEST_SIZE);
        assert_eq!(ManifestState::decode(&encoded).unwrap(), state);
    }

    #[test]
    fn test_manifest_rejects_short_buffer() {
        let state = sample_state();
        let encoded = state.encode();

        let err = ManifestState::decode(&encoded[..MANIFEST_SIZE - 1]).unwrap_err();
        assert!(matches!(err, Error::CorruptManifest(_)));

        let err = ManifestState::decode(&[]).unwrap_err();
        assert!(matches!(err, Error::CorruptManifest(_)));
    }

    #[test]
    fn test_manifest_rejects_inverted_range() {
        let mut state = sample_state();
        state.levels.get_mut(5).start = 10;
        state.levels.get_mut(5).end = 3;

        let encoded = state.encode();
        assert!(matches!(
            ManifestState::decode(&encoded),
            Err(Error::CorruptManifest(_))
        ));
    }

    #[test]
    fn test_manifest_file_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("MANIFEST");

        // Absent file means fresh store, not corruption.
        assert_eq!(ManifestState::read_from(&path).unwrap(), None);

        let state = sample_state();
        state.write_to(&path).unwrap();
        assert_eq!(ManifestState::read_from(&path).unwrap(), Some(state));
    }

    #[test]
    fn test_manifest_truncated_file_is_corrupt() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("MANIFEST");

        let state = sample_state();
        let encoded = state.encode();
        std::fs::write(&path, &encoded[..100]).unwrap();

        assert!(matches!(
            ManifestState::read_from(&path),
            Err(Error::CorruptManifest(_))
        ));
    }
}
