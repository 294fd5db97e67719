//! Internal utilities.

pub mod filename;
