//! Leveled compaction of the value log.
//!
//! Compaction consumes the sealed files of each level in write order,
//! consults the key index for every record, drops the stale ones and
//! rewrites the live ones into the next level. Each level is a
//! decreasing-density funnel: the index, not the log, decides liveness.

mod compactor;
mod worker;

pub use compactor::CompactionStats;

pub(crate) use compactor::Compactor;
pub(crate) use worker::CompactionWorker;
