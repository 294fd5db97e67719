//! # valuelog
//!
//! An append-only, leveled value-log storage engine in the WiscKey style:
//! value payloads live here, sorted keys live in an external index.
//!
//! ## Features
//!
//! - **Append-only writes**: every put is one bounded write to the active
//!   level-0 file, returning an opaque 20-byte [`Location`]
//! - **Random reads**: a location addresses its record directly, no index
//!   lookup on the read path
//! - **Leveled compaction**: a background worker funnels live records
//!   upward level by level and reclaims the space of superseded ones
//! - **Fixed-layout manifest**: counters and per-level file ranges persist
//!   across restarts
//! - **External liveness**: the [`KeyIndex`] collaborator decides which
//!   records are still current
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use valuelog::{MemoryKeyIndex, Store};
//!
//! let index = Arc::new(MemoryKeyIndex::new());
//! let store = Store::open("./values", Arc::clone(&index))?;
//!
//! let location = store.put(b"user:1", b"Alice")?;
//! index.update_location(b"user:1", location)?;
//!
//! let value = store.get(&location)?;
//! store.close()?;
//! ```

// Public modules
pub mod error;
pub mod key_index;
pub mod location;
pub mod options;

// Store module
mod store;

// Internal modules
mod compaction;
mod level;
mod manifest;
mod metrics;
mod record;
mod util;

// Re-export main types for convenience
pub use error::{Error, Result};
pub use key_index::{KeyIndex, MemoryKeyIndex};
pub use location::{Location, LOCATION_SIZE};
pub use options::{Options, OptionsBuilder, MAX_LEVELS};

// Store
pub use store::{Store, StoreStats};

// Level table (visible through StoreStats)
pub use level::{Level, LevelTable};

// Manifest (exposed for tooling that inspects store directories)
pub use manifest::{ManifestState, MANIFEST_SIZE};

// Compaction
pub use compaction::CompactionStats;

// Metrics
pub use metrics::{Counter, Gauge, MetricsSummary, StoreMetrics};
