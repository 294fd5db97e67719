//! KeyIndex - the external index collaborator boundary.
//!
//! The value log never sorts or indexes keys itself; the surrounding
//! database keeps a sorted key index mapping each key to its current
//! [`Location`]. The index is the source of truth for liveness: during
//! compaction a record survives only if the index still points at it.

use bytes::Bytes;
use crossbeam_skiplist::SkipMap;

use crate::location::Location;
use crate::Result;

/// Capability the compactor consumes from the surrounding database.
///
/// Implementations must be safe to call from the compaction thread while
/// foreground writers mutate the index concurrently.
pub trait KeyIndex: Send + Sync {
    /// Point-in-time lookup of a key's registered location.
    ///
    /// `Ok(None)` means the key is absent, which the compactor treats as
    /// "record is stale", not as a failure.
    fn snapshot_read(&self, key: &[u8]) -> Result<Option<Location>>;

    /// Install a fresh location for a key after its record was relocated.
    fn update_location(&self, key: &[u8], location: Location) -> Result<()>;
}

/// In-memory key index backed by a concurrent skip map.
///
/// Suitable for tests and for embedding the value log without a full
/// on-disk index.
#[derive(Debug, Default)]
pub struct MemoryKeyIndex {
    map: SkipMap<Bytes, Location>,
}

impl MemoryKeyIndex {
    /// Create an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys currently registered.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Whether the index is empty.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Remove a key from the index.
    pub fn remove(&self, key: &[u8]) {
        self.map.remove(key);
    }
}

impl KeyIndex for MemoryKeyIndex {
    fn snapshot_read(&self, key: &[u8]) -> Result<Option<Location>> {
        Ok(self.map.get(key).map(|entry| *entry.value()))
    }

    fn update_location(&self, key: &[u8], location: Location) -> Result<()> {
        self.map.insert(Bytes::copy_from_slice(key), location);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn location(sequence: u32) -> Location {
        Location {
            length: 20,
            file_number: 0,
            offset: 0,
            sequence,
            level: 0,
        }
    }

    #[test]
    fn test_memory_index_read_and_update() {
        let index = MemoryKeyIndex::new();
        assert_eq!(index.snapshot_read(b"k1").unwrap(), None);

        index.update_location(b"k1", location(1)).unwrap();
        assert_eq!(index.snapshot_read(b"k1").unwrap(), Some(location(1)));

        // A newer location replaces the old one.
        index.update_location(b"k1", location(2)).unwrap();
        assert_eq!(index.snapshot_read(b"k1").unwrap(), Some(location(2)));
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn test_memory_index_remove() {
        let index = MemoryKeyIndex::new();
        index.update_location(b"k1", location(1)).unwrap();
        index.remove(b"k1");
        assert_eq!(index.snapshot_read(b"k1").unwrap(), None);
        assert!(index.is_empty());
    }
}
