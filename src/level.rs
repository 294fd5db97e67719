//! Level table - per-level file-range bookkeeping.
//!
//! Each level tracks the range of file numbers currently holding live data
//! plus the write cursor within its newest file. Compaction consumes files
//! from `start` upward and appends to file `end` of the next level.

use crate::options::MAX_LEVELS;

/// File-range descriptor for a single level.
///
/// Files numbered `[start, end)` are sealed and eligible for compaction;
/// file `end` is the level's active write file. Invariant: `start <= end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Level {
    /// Oldest not-yet-compacted file number.
    pub start: u32,
    /// Newest (active) file number.
    pub end: u32,
    /// Write cursor within file `end`.
    pub offset: u32,
}

impl Level {
    /// Whether the level holds sealed files awaiting compaction.
    pub fn has_compactable_files(&self) -> bool {
        self.start < self.end
    }
}

/// Fixed-size table of per-level descriptors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LevelTable {
    levels: [Level; MAX_LEVELS],
}

impl Default for LevelTable {
    fn default() -> Self {
        Self {
            levels: [Level::default(); MAX_LEVELS],
        }
    }
}

impl LevelTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the descriptor for a level.
    pub fn get(&self, level: usize) -> &Level {
        &self.levels[level]
    }

    /// Get a mutable descriptor for a level.
    pub fn get_mut(&mut self, level: usize) -> &mut Level {
        &mut self.levels[level]
    }

    /// Iterate over all levels in order.
    pub fn iter(&self) -> impl Iterator<Item = &Level> {
        self.levels.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_table_default() {
        let table = LevelTable::new();
        assert_eq!(table.iter().count(), MAX_LEVELS);
        for level in table.iter() {
            assert_eq!(*level, Level::default());
            assert!(!level.has_compactable_files());
        }
    }

    #[test]
    fn test_level_compactable() {
        let mut table = LevelTable::new();
        table.get_mut(3).end = 2;
        assert!(table.get(3).has_compactable_files());

        table.get_mut(3).start = 2;
        assert!(!table.get(3).has_compactable_files());
    }
}
